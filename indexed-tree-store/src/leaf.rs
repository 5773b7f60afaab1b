use crate::{Fr, Index};
use serde::{de::DeserializeOwned, Serialize};

/// A leaf value usable with [`Store`](crate::Store).
///
/// The store is agnostic to what a leaf actually stores; it only ever
/// needs the field-element key a leaf is indexed by.
pub trait LeafValue: Serialize + DeserializeOwned + Clone + Send + Sync {
    fn key(&self) -> Fr;
}

/// A leaf record as stored in the indexed Merkle tree: the caller's
/// leaf value plus the neighbor-link fields that thread leaves into a
/// key-ordered linked list.
///
/// The neighbor-link fields are opaque to the store: it never reads or
/// writes them itself, it only carries them through the codec so that
/// the tree algorithm built on top of this store can maintain the
/// linked list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(bound = "L: Serialize + DeserializeOwned")]
pub struct IndexedLeaf<L> {
    pub value: L,
    pub next_index: Index,
    pub next_value: Fr,
}

impl<L: LeafValue> IndexedLeaf<L> {
    pub fn new(value: L, next_index: Index, next_value: Fr) -> Self {
        Self {
            value,
            next_index,
            next_value,
        }
    }

    pub fn key(&self) -> Fr {
        self.value.key()
    }
}
