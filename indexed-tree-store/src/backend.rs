//! Backends are the persisted key-value stores [`Store`](crate::Store)
//! sits in front of. A [`Backend`] hands out single-use
//! [`ReadTransaction`]s and [`WriteTransaction`]s; it never exposes
//! direct get/put itself.
use crate::{Fr, Index};

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend transaction failed: {0}")]
    Transaction(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// A single-use, read-only view of the backend's committed state.
pub trait ReadTransaction {
    /// Exact lookup in the `u64`-keyed leaf table.
    fn get_leaf(&self, index: Index) -> Result<Option<Vec<u8>>>;

    /// Exact lookup in the `Fr`-keyed index-list table.
    fn get_index_list(&self, key: Fr) -> Result<Option<Vec<u8>>>;

    /// The record stored at the largest key `<= key`, together with
    /// that matched key. `None` when no such key exists.
    fn get_index_list_or_previous(&self, key: Fr) -> Result<Option<(Fr, Vec<u8>)>>;

    /// Lookup in the node table, addressed by `(level, index)`.
    fn get_node(&self, level: u32, index: Index) -> Result<Option<Vec<u8>>>;
}

/// A single-use write transaction. Writes are only guaranteed visible
/// once [`commit`](WriteTransaction::commit) returns `Ok`.
pub trait WriteTransaction {
    fn put_leaf(&mut self, index: Index, bytes: Vec<u8>) -> Result<()>;
    fn put_index_list(&mut self, key: Fr, bytes: Vec<u8>) -> Result<()>;
    fn put_node(&mut self, level: u32, index: Index, bytes: Vec<u8>) -> Result<()>;

    /// Make all writes in this transaction visible together, or none
    /// at all.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Best-effort abort. Called on the error path after a failed
    /// write; implementations should make a reasonable effort to
    /// discard buffered writes but are not required to guarantee it.
    fn try_abort(self: Box<Self>);
}

/// A persisted key-value store, consumed by [`Store`](crate::Store)
/// through single-use transactions.
pub trait Backend: Send + Sync {
    fn read_transaction(&self) -> Result<Box<dyn ReadTransaction + '_>>;
    fn write_transaction(&self) -> Result<Box<dyn WriteTransaction + '_>>;
}

#[cfg(any(test, feature = "test"))]
pub mod memory {
    //! An in-memory [`Backend`] for tests: no real durability, but
    //! otherwise implements the full transactional contract (a write
    //! transaction buffers locally and is only applied to the shared
    //! state on `commit`).
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;

    #[derive(Default)]
    struct Tables {
        nodes: HashMap<(u32, Index), Vec<u8>>,
        leaves: HashMap<Index, Vec<u8>>,
        index_lists: BTreeMap<Fr, Vec<u8>>,
    }

    /// Shared, mutex-guarded in-memory backend.
    #[derive(Clone, Default)]
    pub struct InMemoryBackend(Arc<Mutex<Tables>>);

    impl InMemoryBackend {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Backend for InMemoryBackend {
        fn read_transaction(&self) -> Result<Box<dyn ReadTransaction + '_>> {
            Ok(Box::new(MemoryReadTransaction { backend: self }))
        }

        fn write_transaction(&self) -> Result<Box<dyn WriteTransaction + '_>> {
            Ok(Box::new(MemoryWriteTransaction {
                backend: self,
                nodes: HashMap::new(),
                leaves: HashMap::new(),
                index_lists: HashMap::new(),
            }))
        }
    }

    struct MemoryReadTransaction<'b> {
        backend: &'b InMemoryBackend,
    }

    impl ReadTransaction for MemoryReadTransaction<'_> {
        fn get_leaf(&self, index: Index) -> Result<Option<Vec<u8>>> {
            Ok(self.backend.0.lock().leaves.get(&index).cloned())
        }

        fn get_index_list(&self, key: Fr) -> Result<Option<Vec<u8>>> {
            Ok(self.backend.0.lock().index_lists.get(&key).cloned())
        }

        fn get_index_list_or_previous(&self, key: Fr) -> Result<Option<(Fr, Vec<u8>)>> {
            Ok(self
                .backend
                .0
                .lock()
                .index_lists
                .range(..=key)
                .next_back()
                .map(|(k, v)| (*k, v.clone())))
        }

        fn get_node(&self, level: u32, index: Index) -> Result<Option<Vec<u8>>> {
            Ok(self.backend.0.lock().nodes.get(&(level, index)).cloned())
        }
    }

    struct MemoryWriteTransaction<'b> {
        backend: &'b InMemoryBackend,
        nodes: HashMap<(u32, Index), Vec<u8>>,
        leaves: HashMap<Index, Vec<u8>>,
        index_lists: HashMap<Fr, Vec<u8>>,
    }

    impl WriteTransaction for MemoryWriteTransaction<'_> {
        fn put_leaf(&mut self, index: Index, bytes: Vec<u8>) -> Result<()> {
            self.leaves.insert(index, bytes);
            Ok(())
        }

        fn put_index_list(&mut self, key: Fr, bytes: Vec<u8>) -> Result<()> {
            self.index_lists.insert(key, bytes);
            Ok(())
        }

        fn put_node(&mut self, level: u32, index: Index, bytes: Vec<u8>) -> Result<()> {
            self.nodes.insert((level, index), bytes);
            Ok(())
        }

        fn commit(self: Box<Self>) -> Result<()> {
            let mut tables = self.backend.0.lock();
            tables.nodes.extend(self.nodes);
            tables.leaves.extend(self.leaves);
            tables.index_lists.extend(self.index_lists);
            Ok(())
        }

        fn try_abort(self: Box<Self>) {
            // Buffered writes are dropped with `self`; nothing else to do.
        }
    }

    /// A [`Backend`] whose write transactions always fail to commit.
    /// Used to exercise the `commit`/rollback error path (see §8, S5).
    #[derive(Clone, Default)]
    pub struct FailingBackend(InMemoryBackend);

    impl FailingBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Wraps an already-populated [`InMemoryBackend`] so reads (and
        /// thus `Store::new`'s meta bootstrap) still see prior state;
        /// only subsequent writes are made to fail.
        pub fn wrapping(inner: InMemoryBackend) -> Self {
            Self(inner)
        }
    }

    impl Backend for FailingBackend {
        fn read_transaction(&self) -> Result<Box<dyn ReadTransaction + '_>> {
            self.0.read_transaction()
        }

        fn write_transaction(&self) -> Result<Box<dyn WriteTransaction + '_>> {
            Ok(Box::new(FailingWriteTransaction))
        }
    }

    struct FailingWriteTransaction;

    impl WriteTransaction for FailingWriteTransaction {
        fn put_leaf(&mut self, _index: Index, _bytes: Vec<u8>) -> Result<()> {
            Ok(())
        }

        fn put_index_list(&mut self, _key: Fr, _bytes: Vec<u8>) -> Result<()> {
            Ok(())
        }

        fn put_node(&mut self, _level: u32, _index: Index, _bytes: Vec<u8>) -> Result<()> {
            Ok(())
        }

        fn commit(self: Box<Self>) -> Result<()> {
            Err(BackendError::Transaction("simulated commit failure".into()))
        }

        fn try_abort(self: Box<Self>) {}
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn committed_writes_are_visible_after_commit() {
            let backend = InMemoryBackend::new();
            let mut tx = backend.write_transaction().unwrap();
            tx.put_leaf(7, vec![1, 2, 3]).unwrap();
            tx.commit().unwrap();

            let tx = backend.read_transaction().unwrap();
            assert_eq!(tx.get_leaf(7).unwrap(), Some(vec![1, 2, 3]));
        }

        #[test]
        fn get_index_list_or_previous_finds_the_largest_key_leq() {
            let backend = InMemoryBackend::new();
            let mut tx = backend.write_transaction().unwrap();
            tx.put_index_list(Fr::from(10u64), vec![10]).unwrap();
            tx.put_index_list(Fr::from(30u64), vec![30]).unwrap();
            tx.commit().unwrap();

            let tx = backend.read_transaction().unwrap();
            let (key, bytes) = tx
                .get_index_list_or_previous(Fr::from(20u64))
                .unwrap()
                .unwrap();
            assert_eq!(key, Fr::from(10u64));
            assert_eq!(bytes, vec![10]);
        }

        #[test]
        fn failing_backend_commit_fails() {
            let backend = FailingBackend::new();
            let tx = backend.write_transaction().unwrap();
            assert!(tx.commit().is_err());
        }
    }
}
