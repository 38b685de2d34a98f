//! In-memory registry.
//!
//! Holds the node map in process and records every operation in order.
//! Watcher and supervisor tests assert against the operation log; the
//! `connected` flag simulates a lost coordination-service session.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::{Credentials, Registry};
use crate::error::{RegistryError, RegistryResult};

/// A registration entry as the coordination service would hold it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEntry {
    pub data: BTreeMap<String, String>,
    pub alive: bool,
}

/// One recorded registry operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryOp {
    Set {
        path: String,
        data: BTreeMap<String, String>,
        alive: bool,
    },
    Unset {
        path: String,
    },
    Credentials {
        user: Option<String>,
    },
}

#[derive(Debug, Default)]
struct Inner {
    nodes: BTreeMap<String, NodeEntry>,
    ops: Vec<RegistryOp>,
}

/// In-memory registry twin.
#[derive(Debug)]
pub struct MemoryRegistry {
    connected: AtomicBool,
    inner: Mutex<Inner>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Simulate losing or regaining the coordination-service session.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// The current entry at `path`, if any.
    pub fn node(&self, path: &str) -> Option<NodeEntry> {
        self.inner.lock().unwrap().nodes.get(path).cloned()
    }

    /// Snapshot of all current entries.
    pub fn nodes(&self) -> BTreeMap<String, NodeEntry> {
        self.inner.lock().unwrap().nodes.clone()
    }

    /// Every operation issued so far, in order.
    pub fn ops(&self) -> Vec<RegistryOp> {
        self.inner.lock().unwrap().ops.clone()
    }

    /// Number of `unset_node` calls issued for `path`.
    pub fn unset_count(&self, path: &str) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, RegistryOp::Unset { path: p } if p == path))
            .count()
    }

    /// Number of `set_node` calls issued for `path`.
    pub fn set_count(&self, path: &str) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, RegistryOp::Set { path: p, .. } if p == path))
            .count()
    }

    fn check_connected(&self) -> RegistryResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RegistryError::NotConnected)
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn set_node(
        &self,
        path: &str,
        data: &BTreeMap<String, String>,
        alive: bool,
    ) -> RegistryResult<()> {
        self.check_connected()?;
        let mut inner = self.inner.lock().unwrap();
        inner.nodes.insert(
            path.to_string(),
            NodeEntry {
                data: data.clone(),
                alive,
            },
        );
        inner.ops.push(RegistryOp::Set {
            path: path.to_string(),
            data: data.clone(),
            alive,
        });
        Ok(())
    }

    async fn unset_node(&self, path: &str) -> RegistryResult<()> {
        self.check_connected()?;
        let mut inner = self.inner.lock().unwrap();
        inner.nodes.remove(path);
        inner.ops.push(RegistryOp::Unset {
            path: path.to_string(),
        });
        Ok(())
    }

    async fn update_credentials(&self, credentials: Credentials) {
        let mut inner = self.inner.lock().unwrap();
        inner.ops.push(RegistryOp::Credentials {
            user: credentials.user,
        });
    }
}
