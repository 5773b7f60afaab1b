use super::Store;
use crate::{backend::Backend, leaf::LeafValue, Fr, Index, IndexedLeaf};
use ethereum_types::U256;

impl<'b, B: Backend, L: LeafValue> Store<'b, B, L> {
    /// Stores `leaf` at `index`. If `add_to_index`, also appends
    /// `index` to the overlay's `IndexList` for `leaf`'s key, creating
    /// the list if this is the first leaf seen with that key.
    ///
    /// Buffers into the in-memory overlay only; no backend I/O.
    pub fn set_at_index(&mut self, index: Index, leaf: IndexedLeaf<L>, add_to_index: bool) {
        let key = leaf.key();
        self.leaves.put(index, leaf);
        if add_to_index {
            self.indices.append(U256::from(key), index);
        }
    }

    /// Appends `index` to the overlay's `IndexList` for `leaf_key`.
    pub fn update_index(&mut self, index: Index, leaf_key: Fr) {
        self.indices.append(U256::from(leaf_key), index);
    }

    /// Stores `bytes` at node address `(level, index)` in the overlay.
    ///
    /// # Panics
    ///
    /// Panics if `level > self.depth()` — levels beyond the tree's
    /// configured depth are a programmer error, not recoverable input.
    pub fn put_node(&mut self, level: u32, index: Index, bytes: Vec<u8>) {
        self.nodes.put(level, index, bytes);
    }

    /// Updates the in-memory size and root. Name and depth are fixed
    /// at construction time and cannot be changed through this API.
    pub fn put_meta(&mut self, size: Index, root: Fr) {
        self.meta.size = size;
        self.meta.root = root;
    }
}
