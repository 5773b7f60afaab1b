use super::{read_persisted_meta, Store};
use crate::{
    backend::{Backend, WriteTransaction},
    cache::{IndexCache, LeafCache, NodeCache},
    codec,
    leaf::LeafValue,
    Fr, IndexList, StoreError,
};
use tracing::{debug, instrument, warn};

impl<'b, B: Backend, L: LeafValue> Store<'b, B, L> {
    /// Atomically flushes every overlay into the backend, merging each
    /// mutated key's `IndexList` with whatever was already committed
    /// there (committed entries first, then the newly uncommitted
    /// ones), then behaves like [`rollback`](Store::rollback).
    ///
    /// On any failure, the write transaction is aborted (where still
    /// possible) and the overlays are left untouched, so the caller
    /// may retry or explicitly [`rollback`](Store::rollback).
    #[instrument(skip(self), fields(name = %self.name, depth = self.depth))]
    pub fn commit(&mut self) -> Result<(), StoreError> {
        self.merge_committed_indices()?;

        let mut tx = self.backend.write_transaction()?;
        if let Err(e) = self.write_overlays(tx.as_mut()) {
            warn!(error = %e, "commit failed, aborting write transaction");
            tx.try_abort();
            return Err(e);
        }

        tx.commit()?;
        debug!("commit succeeded");

        self.rollback()?;
        Ok(())
    }

    /// Discards every overlay and reloads `meta` from the backend.
    ///
    /// If the backend has no persisted meta (e.g. it was wiped out
    /// from under the store), the in-memory meta is left as-is rather
    /// than being reset, matching [`commit`](Store::commit)'s
    /// postcondition that `meta` always reflects the most recent
    /// known-good state.
    pub fn rollback(&mut self) -> Result<(), StoreError> {
        self.nodes = NodeCache::new(self.depth);
        self.indices = IndexCache::default();
        self.leaves = LeafCache::default();

        let tx = self.backend.read_transaction()?;
        if let Some(meta) = read_persisted_meta(tx.as_ref())? {
            self.meta = meta;
        }
        Ok(())
    }

    /// Prepends each mutated key's already-committed `IndexList` (if
    /// any) onto the overlay's list for that key, in place.
    fn merge_committed_indices(&mut self) -> Result<(), StoreError> {
        let tx = self.backend.read_transaction()?;
        for (key, list) in self.indices.inner_mut().iter_mut() {
            let fr = Fr::from(*key);
            if let Some(bytes) = tx.get_index_list(fr)? {
                let committed: IndexList = codec::decode(&bytes)?;
                list.prepend(&committed);
            }
        }
        Ok(())
    }

    /// Writes every overlay into `tx`, in the deterministic order
    /// nodes -> indices -> leaves -> meta. Ordering has no semantic
    /// significance to the backend (the transaction as a whole commits
    /// atomically), but is fixed for reproducible tests.
    fn write_overlays(&self, tx: &mut dyn WriteTransaction) -> Result<(), StoreError> {
        for (level, map) in self.nodes.non_root_levels() {
            for (&index, bytes) in map.iter() {
                tx.put_node(level, index, bytes.clone())?;
            }
        }

        for (key, list) in self.indices.inner().iter() {
            let bytes = codec::encode(list)?;
            tx.put_index_list(Fr::from(*key), bytes)?;
        }

        for (&index, leaf) in self.leaves.iter() {
            let bytes = codec::encode(leaf)?;
            tx.put_leaf(index, bytes)?;
        }

        let meta_bytes = codec::encode(&self.meta)?;
        tx.put_node(0, 0, meta_bytes)?;

        Ok(())
    }
}
