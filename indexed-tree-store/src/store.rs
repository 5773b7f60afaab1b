mod commit;
mod mutate;
mod query;

use crate::{
    backend::{Backend, ReadTransaction},
    cache::{IndexCache, LeafCache, NodeCache},
    codec,
    leaf::LeafValue,
    Fr, StoreError, TreeMeta,
};
use tracing::{debug, instrument, warn};

/// A cached, transactional node store for an indexed Merkle tree of
/// `depth` levels, named `name`, backed by a persisted [`Backend`].
///
/// All mutators buffer into in-memory overlays; nothing reaches the
/// backend until [`commit`](Store::commit). The store assumes a
/// single writer at a time (see the crate's concurrency notes); reads
/// with `include_uncommitted = false` are safe from any number of
/// concurrent readers that each hold their own transaction.
pub struct Store<'b, B: Backend, L: LeafValue> {
    name: String,
    depth: u32,
    backend: &'b B,
    pub(crate) nodes: NodeCache,
    pub(crate) indices: IndexCache,
    pub(crate) leaves: LeafCache<L>,
    pub(crate) meta: TreeMeta,
}

impl<'b, B: Backend, L: LeafValue> Store<'b, B, L> {
    /// Opens (or bootstraps) a store named `name` with `depth` levels
    /// over `backend`.
    ///
    /// If the backend already carries a persisted [`TreeMeta`], its
    /// `name` and `depth` must match the arguments given here, or this
    /// fails with [`StoreError::MetaMismatch`] without touching the
    /// backend. If no meta is persisted yet, a fresh one is written
    /// and committed immediately.
    #[instrument(skip(backend), fields(name = %name.as_ref(), depth))]
    pub fn new(name: impl AsRef<str>, depth: u32, backend: &'b B) -> Result<Self, StoreError> {
        let name = name.as_ref().to_string();
        let default_meta = TreeMeta {
            name: name.clone(),
            depth,
            size: 0,
            root: Fr::zero(),
        };

        let mut store = Self {
            name,
            depth,
            backend,
            nodes: NodeCache::new(depth),
            indices: IndexCache::default(),
            leaves: LeafCache::default(),
            meta: default_meta,
        };
        store.initialise()?;
        Ok(store)
    }

    fn initialise(&mut self) -> Result<(), StoreError> {
        let persisted = {
            let tx = self.backend.read_transaction()?;
            read_persisted_meta(tx.as_ref())?
        };

        match persisted {
            Some(meta) if meta.name == self.name && meta.depth == self.depth => {
                debug!("adopting persisted tree meta");
                self.meta = meta;
                Ok(())
            }
            Some(meta) => {
                warn!(
                    found_name = %meta.name,
                    found_depth = meta.depth,
                    "tree meta mismatch"
                );
                Err(StoreError::MetaMismatch {
                    expected_name: self.name.clone(),
                    expected_depth: self.depth,
                    found_name: meta.name,
                    found_depth: meta.depth,
                })
            }
            None => {
                debug!("no persisted tree meta found, bootstrapping a fresh one");
                let bytes = codec::encode(&self.meta)?;
                let mut tx = self.backend.write_transaction()?;
                if let Err(e) = tx.put_node(0, 0, bytes) {
                    tx.try_abort();
                    return Err(e.into());
                }
                tx.commit()?;
                Ok(())
            }
        }
    }

    /// Open a fresh read transaction against the backend.
    pub fn create_read_transaction(&self) -> Result<Box<dyn ReadTransaction + '_>, StoreError> {
        Ok(self.backend.read_transaction()?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// Reads and decodes the `TreeMeta` persisted at the reserved node
/// address `(0, 0)`, if any.
pub(crate) fn read_persisted_meta(
    tx: &dyn ReadTransaction,
) -> Result<Option<TreeMeta>, StoreError> {
    match tx.get_node(0, 0)? {
        Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
        None => Ok(None),
    }
}
