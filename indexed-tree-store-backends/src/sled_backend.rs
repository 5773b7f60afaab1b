use std::path::Path;

use indexed_tree_store::{Backend, BackendError, Fr, Index, ReadTransaction, WriteTransaction};
use sled::Transactional;
use tracing::{instrument, warn};

const NODES_TREE: &str = "nodes";
const LEAVES_TREE: &str = "leaves";
const INDEX_LISTS_TREE: &str = "index_lists";

#[derive(thiserror::Error, Debug)]
pub enum SledBackendError {
    #[error("failed to open sled database: {0}")]
    Open(#[source] sled::Error),

    #[error("failed to open sled tree {tree:?}: {source}")]
    OpenTree {
        tree: &'static str,
        #[source]
        source: sled::Error,
    },
}

/// A [`Backend`] persisted by a [`sled::Db`], split across three trees
/// so that nodes, leaves and index-lists can be updated atomically in
/// a single [`sled` transaction](sled::Transactional) without
/// colliding on key namespaces.
pub struct SledBackend {
    nodes: sled::Tree,
    leaves: sled::Tree,
    index_lists: sled::Tree,
}

impl SledBackend {
    /// Opens (creating if necessary) a sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SledBackendError> {
        let db = sled::open(path).map_err(SledBackendError::Open)?;
        Self::from_db(&db)
    }

    /// Opens an in-memory, non-durable sled database. Useful for tests
    /// that want the real transactional code path without touching disk.
    pub fn temporary() -> Result<Self, SledBackendError> {
        let db = sled::Config::default()
            .temporary(true)
            .open()
            .map_err(SledBackendError::Open)?;
        Self::from_db(&db)
    }

    fn from_db(db: &sled::Db) -> Result<Self, SledBackendError> {
        let open = |tree: &'static str| {
            db.open_tree(tree)
                .map_err(|source| SledBackendError::OpenTree { tree, source })
        };
        Ok(Self {
            nodes: open(NODES_TREE)?,
            leaves: open(LEAVES_TREE)?,
            index_lists: open(INDEX_LISTS_TREE)?,
        })
    }
}

impl Backend for SledBackend {
    fn read_transaction(
        &self,
    ) -> std::result::Result<Box<dyn ReadTransaction + '_>, BackendError> {
        Ok(Box::new(SledReadTransaction { backend: self }))
    }

    fn write_transaction(
        &self,
    ) -> std::result::Result<Box<dyn WriteTransaction + '_>, BackendError> {
        Ok(Box::new(SledWriteTransaction {
            backend: self,
            nodes: Vec::new(),
            leaves: Vec::new(),
            index_lists: Vec::new(),
        }))
    }
}

struct SledReadTransaction<'b> {
    backend: &'b SledBackend,
}

impl ReadTransaction for SledReadTransaction<'_> {
    fn get_leaf(&self, index: Index) -> std::result::Result<Option<Vec<u8>>, BackendError> {
        self.backend
            .leaves
            .get(leaf_key(index))
            .map(|v| v.map(|ivec| ivec.to_vec()))
            .map_err(to_backend_error)
    }

    fn get_index_list(&self, key: Fr) -> std::result::Result<Option<Vec<u8>>, BackendError> {
        self.backend
            .index_lists
            .get(key.to_be_bytes())
            .map(|v| v.map(|ivec| ivec.to_vec()))
            .map_err(to_backend_error)
    }

    fn get_index_list_or_previous(
        &self,
        key: Fr,
    ) -> std::result::Result<Option<(Fr, Vec<u8>)>, BackendError> {
        self.backend
            .index_lists
            .range(..=key.to_be_bytes())
            .next_back()
            .transpose()
            .map_err(to_backend_error)
            .map(|entry| {
                entry.map(|(k, v)| {
                    let bytes: [u8; 32] = k.as_ref().try_into().expect("index_lists key is 32 bytes");
                    (Fr::from_be_bytes(&bytes), v.to_vec())
                })
            })
    }

    fn get_node(
        &self,
        level: u32,
        index: Index,
    ) -> std::result::Result<Option<Vec<u8>>, BackendError> {
        self.backend
            .nodes
            .get(node_key(level, index))
            .map(|v| v.map(|ivec| ivec.to_vec()))
            .map_err(to_backend_error)
    }
}

/// Buffers writes locally; nothing touches `sled` until
/// [`commit`](WriteTransaction::commit), which applies every buffered
/// write inside one `sled` multi-tree transaction.
struct SledWriteTransaction<'b> {
    backend: &'b SledBackend,
    nodes: Vec<([u8; 12], Vec<u8>)>,
    leaves: Vec<([u8; 8], Vec<u8>)>,
    index_lists: Vec<([u8; 32], Vec<u8>)>,
}

impl WriteTransaction for SledWriteTransaction<'_> {
    fn put_leaf(
        &mut self,
        index: Index,
        bytes: Vec<u8>,
    ) -> std::result::Result<(), BackendError> {
        self.leaves.push((leaf_key(index), bytes));
        Ok(())
    }

    fn put_index_list(
        &mut self,
        key: Fr,
        bytes: Vec<u8>,
    ) -> std::result::Result<(), BackendError> {
        self.index_lists.push((key.to_be_bytes(), bytes));
        Ok(())
    }

    fn put_node(
        &mut self,
        level: u32,
        index: Index,
        bytes: Vec<u8>,
    ) -> std::result::Result<(), BackendError> {
        self.nodes.push((node_key(level, index), bytes));
        Ok(())
    }

    #[instrument(skip(self), fields(nodes = self.nodes.len(), leaves = self.leaves.len(), index_lists = self.index_lists.len()))]
    fn commit(self: Box<Self>) -> std::result::Result<(), BackendError> {
        let trees = (&self.backend.nodes, &self.backend.leaves, &self.backend.index_lists);
        trees
            .transaction(|(nodes, leaves, index_lists)| {
                for (key, value) in &self.nodes {
                    nodes.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &self.leaves {
                    leaves.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &self.index_lists {
                    index_lists.insert(key.as_slice(), value.as_slice())?;
                }
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| {
                BackendError::Transaction(e.to_string())
            })?;

        self.backend
            .nodes
            .flush()
            .map_err(to_backend_error)?;
        Ok(())
    }

    fn try_abort(self: Box<Self>) {
        warn!("discarding uncommitted sled write transaction");
    }
}

fn leaf_key(index: Index) -> [u8; 8] {
    index.to_be_bytes()
}

fn node_key(level: u32, index: Index) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..4].copy_from_slice(&level.to_be_bytes());
    key[4..].copy_from_slice(&index.to_be_bytes());
    key
}

fn to_backend_error(e: sled::Error) -> BackendError {
    BackendError::Transaction(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexed_tree_store::Store;

    #[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct TestLeaf {
        key: u64,
    }

    impl indexed_tree_store::LeafValue for TestLeaf {
        fn key(&self) -> Fr {
            Fr::from(self.key)
        }
    }

    #[test]
    fn leaf_round_trips_through_sled() {
        let backend = SledBackend::temporary().unwrap();
        let mut store = Store::<_, TestLeaf>::new("accts", 8, &backend).unwrap();

        let leaf = indexed_tree_store::IndexedLeaf::new(TestLeaf { key: 9 }, 0, Fr::zero());
        store.set_at_index(3, leaf.clone(), true);
        store.commit().unwrap();

        let tx = store.create_read_transaction().unwrap();
        assert_eq!(store.get_leaf(3, tx.as_ref(), false).unwrap(), Some(leaf));
    }

    #[test]
    fn index_list_range_scan_finds_predecessor() {
        let backend = SledBackend::temporary().unwrap();
        let mut tx = backend.write_transaction().unwrap();
        tx.put_index_list(Fr::from(10u64), vec![1]).unwrap();
        tx.put_index_list(Fr::from(30u64), vec![2]).unwrap();
        tx.commit().unwrap();

        let read = backend.read_transaction().unwrap();
        let (key, bytes) = read
            .get_index_list_or_previous(Fr::from(20u64))
            .unwrap()
            .unwrap();
        assert_eq!(key, Fr::from(10u64));
        assert_eq!(bytes, vec![1]);
    }

    #[test]
    fn reopening_a_durable_backend_preserves_meta() {
        let dir = tempfile::tempdir().unwrap();

        {
            let backend = SledBackend::open(dir.path()).unwrap();
            let mut store = Store::<_, TestLeaf>::new("accts", 8, &backend).unwrap();
            store.put_meta(3, Fr::from(7u64));
            store.commit().unwrap();
        }

        let backend = SledBackend::open(dir.path()).unwrap();
        let store = Store::<_, TestLeaf>::new("accts", 8, &backend).unwrap();
        let tx = store.create_read_transaction().unwrap();
        assert_eq!(
            store.get_meta(tx.as_ref(), false).unwrap(),
            (3, Fr::from(7u64))
        );
    }
}
