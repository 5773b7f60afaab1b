use crate::Fr;
use serde::{Deserialize, Serialize};

/// A 64-bit leaf position within the tree.
pub type Index = u64;

/// A non-empty, insertion-ordered sequence of [`Index`] values that all
/// map to leaves sharing the same key.
///
/// The list is never allowed to become empty: there is no API to
/// remove entries, only to append them or to construct a fresh list
/// from a non-empty seed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexList {
    indices: Vec<Index>,
}

impl IndexList {
    /// Build a list from a non-empty sequence of indices, in order.
    ///
    /// Returns `None` if `indices` is empty.
    pub fn new(indices: Vec<Index>) -> Option<Self> {
        if indices.is_empty() {
            None
        } else {
            Some(Self { indices })
        }
    }

    /// A single-element list.
    pub fn single(index: Index) -> Self {
        Self {
            indices: vec![index],
        }
    }

    /// Append an index to the end of the list.
    pub fn push(&mut self, index: Index) {
        self.indices.push(index);
    }

    /// Prepend `front` to this list, in order (i.e. `front` ends up
    /// before every index already in `self`). Used by `commit` to
    /// graft previously-committed indices ahead of newly uncommitted
    /// ones.
    pub fn prepend(&mut self, front: &IndexList) {
        let mut merged = Vec::with_capacity(front.indices.len() + self.indices.len());
        merged.extend_from_slice(&front.indices);
        merged.append(&mut self.indices);
        self.indices = merged;
    }

    /// The first (earliest / lowest-index-at-commit-time) entry.
    ///
    /// # Panics
    ///
    /// Never — `IndexList` cannot be empty.
    pub fn first(&self) -> Index {
        self.indices[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Index> {
        self.indices.iter()
    }
}

/// The persisted descriptor of a tree: its name, depth, current size
/// and root hash.
///
/// Persisted under the reserved node address `(level = 0, index = 0)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeMeta {
    pub name: String,
    pub depth: u32,
    pub size: Index,
    pub root: Fr,
}
