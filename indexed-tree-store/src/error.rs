use crate::{BackendError, CodecError};

/// Errors surfaced by [`Store`](crate::Store).
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("tree meta mismatch: expected name={expected_name:?} depth={expected_depth}, found name={found_name:?} depth={found_depth}")]
    MetaMismatch {
        expected_name: String,
        expected_depth: u32,
        found_name: String,
        found_depth: u32,
    },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// `find_low_value` was asked about a key with no predecessor in
    /// the backend at all. Callers are expected to guarantee the tree
    /// carries a sentinel minimal key, so this indicates misuse.
    #[error("no predecessor found for low-value lookup; tree is missing its sentinel key")]
    NotFound,
}
