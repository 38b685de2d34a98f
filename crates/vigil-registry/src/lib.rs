//! vigil-registry — client boundary for the coordination service.
//!
//! A registration entry is an ephemeral node keyed by
//! `{path}/{hostname}:{port}` whose value carries the service metadata and
//! an `alive` flag. This crate owns the client side of that contract:
//!
//! - [`Registry`] — the trait watchers report through
//! - [`HttpRegistry`] — client for a coordination service's HTTP
//!   registration API, with credentials swappable in place
//! - [`MemoryRegistry`] — in-memory twin that records every operation,
//!   used throughout the watcher tests
//!
//! The coordination protocol itself (consensus, sessions, watches) lives
//! on the other side of this boundary; `NotConnected` is the only part of
//! it callers see, and they are expected to treat it as transient.

pub mod client;
pub mod error;
pub mod http;
pub mod memory;

pub use client::{Credentials, Registry};
pub use error::{RegistryError, RegistryResult};
pub use http::HttpRegistry;
pub use memory::{MemoryRegistry, NodeEntry, RegistryOp};
