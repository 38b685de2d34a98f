//! HTTP-backed registry client.
//!
//! Talks to the coordination service's registration API: entries live
//! under `/v1/nodes{path}`, `PUT` upserts `{"data": ..., "alive": ...}`,
//! `DELETE` removes. Connection-level failures surface as
//! [`RegistryError::NotConnected`] so watchers can retry on their own
//! schedule.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::sync::RwLock;
use tracing::debug;

use crate::client::{Credentials, Registry};
use crate::error::{RegistryError, RegistryResult};

/// Registry client over the coordination service's HTTP API.
pub struct HttpRegistry {
    authority: String,
    client: Client<HttpConnector, Full<Bytes>>,
    credentials: RwLock<Credentials>,
}

impl HttpRegistry {
    /// Build a client for the given `host:port` address.
    ///
    /// The address is validated eagerly — a garbage address is a startup
    /// error, not something to discover on the first report.
    pub fn connect(server: &str, credentials: Credentials) -> RegistryResult<Self> {
        let authority = server
            .parse::<http::uri::Authority>()
            .map_err(|_| RegistryError::InvalidAddress(server.to_string()))?;

        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            authority: authority.to_string(),
            client,
            credentials: RwLock::new(credentials),
        })
    }

    fn node_uri(&self, path: &str) -> RegistryResult<http::Uri> {
        if !path.starts_with('/') {
            return Err(RegistryError::InvalidPath(path.to_string()));
        }
        format!("http://{}/v1/nodes{}", self.authority, path)
            .parse()
            .map_err(|_| RegistryError::InvalidPath(path.to_string()))
    }

    async fn request(
        &self,
        method: http::Method,
        uri: http::Uri,
        body: Bytes,
    ) -> RegistryResult<http::StatusCode> {
        let credentials = self.credentials.read().await.clone();

        let mut builder = http::Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json");
        if let Some(user) = &credentials.user {
            builder = builder.header("x-registry-user", user);
        }
        if let Some(password) = &credentials.password {
            builder = builder.header("x-registry-password", password);
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        match self.client.request(request).await {
            Ok(response) => Ok(response.status()),
            Err(e) if e.is_connect() => Err(RegistryError::NotConnected),
            Err(e) => Err(RegistryError::Transport(e.to_string())),
        }
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn set_node(
        &self,
        path: &str,
        data: &BTreeMap<String, String>,
        alive: bool,
    ) -> RegistryResult<()> {
        let uri = self.node_uri(path)?;
        let body = serde_json::json!({ "data": data, "alive": alive }).to_string();

        let status = self
            .request(http::Method::PUT, uri, Bytes::from(body))
            .await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(RegistryError::Rejected {
                status: status.as_u16(),
            })
        }
    }

    async fn unset_node(&self, path: &str) -> RegistryResult<()> {
        let uri = self.node_uri(path)?;
        let status = self
            .request(http::Method::DELETE, uri, Bytes::new())
            .await?;
        // An already-absent entry is the state we wanted.
        if status.is_success() || status == http::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(RegistryError::Rejected {
                status: status.as_u16(),
            })
        }
    }

    async fn update_credentials(&self, credentials: Credentials) {
        debug!(user = ?credentials.user, "swapping registry credentials");
        *self.credentials.write().await = credentials;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_validates_address() {
        assert!(HttpRegistry::connect("zk1.prod:2181", Credentials::default()).is_ok());
        assert!(matches!(
            HttpRegistry::connect("not an address", Credentials::default()),
            Err(RegistryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn node_uri_requires_absolute_path() {
        let registry = HttpRegistry::connect("localhost:2181", Credentials::default()).unwrap();
        assert!(registry.node_uri("/services/mc/host:11211").is_ok());
        assert!(matches!(
            registry.node_uri("services/mc"),
            Err(RegistryError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_registry_is_not_connected() {
        // Port 1 is never listening.
        let registry = HttpRegistry::connect("127.0.0.1:1", Credentials::default()).unwrap();
        let err = registry
            .set_node("/services/mc/host:11211", &BTreeMap::new(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotConnected));
    }

    #[tokio::test]
    async fn credentials_swap_in_place() {
        let registry = HttpRegistry::connect("localhost:2181", Credentials::default()).unwrap();
        registry
            .update_credentials(Credentials::new(
                Some("op".to_string()),
                Some("secret".to_string()),
            ))
            .await;
        assert_eq!(
            registry.credentials.read().await.user.as_deref(),
            Some("op")
        );
    }
}
