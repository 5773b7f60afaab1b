//! A [`Backend`](indexed_tree_store::Backend) implementation on top of
//! [`sled`], an embedded transactional key-value store.

mod sled_backend;

pub use sled_backend::{SledBackend, SledBackendError};
