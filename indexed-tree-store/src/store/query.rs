use super::{read_persisted_meta, Store};
use crate::{backend::Backend, codec, Fr, Index, IndexedLeaf, LeafValue, StoreError, TreeMeta};
use ethereum_types::U256;
use tracing::instrument;

impl<'b, B: Backend, L: LeafValue> Store<'b, B, L> {
    /// Reads the leaf at `index`.
    ///
    /// If `include_uncommitted` and the overlay has a leaf at `index`,
    /// returns it; otherwise falls back to the backend.
    pub fn get_leaf(
        &self,
        index: Index,
        tx: &dyn crate::ReadTransaction,
        include_uncommitted: bool,
    ) -> Result<Option<IndexedLeaf<L>>, StoreError> {
        if include_uncommitted {
            if let Some(leaf) = self.leaves.get(index) {
                return Ok(Some(leaf.clone()));
            }
        }
        match tx.get_leaf(index)? {
            Some(bytes) => Ok(Some(codec::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Reads the node at `(level, index)`.
    pub fn get_node(
        &self,
        level: u32,
        index: Index,
        tx: &dyn crate::ReadTransaction,
        include_uncommitted: bool,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        if include_uncommitted {
            if let Some(bytes) = self.nodes.get(level, index) {
                return Ok(Some(bytes.clone()));
            }
        }
        Ok(tx.get_node(level, index)?)
    }

    /// Reads the tree's size and root.
    pub fn get_meta(
        &self,
        tx: &dyn crate::ReadTransaction,
        include_uncommitted: bool,
    ) -> Result<(Index, Fr), StoreError> {
        let meta = self.get_full_meta(tx, include_uncommitted)?;
        Ok((meta.size, meta.root))
    }

    /// Reads the full persisted descriptor: name, depth, size and root.
    pub fn get_full_meta(
        &self,
        tx: &dyn crate::ReadTransaction,
        include_uncommitted: bool,
    ) -> Result<TreeMeta, StoreError> {
        if include_uncommitted {
            return Ok(self.meta.clone());
        }
        match read_persisted_meta(tx)? {
            Some(meta) => Ok(meta),
            None => Ok(TreeMeta {
                name: self.name.clone(),
                depth: self.depth,
                size: 0,
                root: Fr::zero(),
            }),
        }
    }

    /// Equivalent to `find_leaf_index_from(leaf, 0, tx, include_uncommitted)`.
    pub fn find_leaf_index(
        &self,
        leaf: &L,
        tx: &dyn crate::ReadTransaction,
        include_uncommitted: bool,
    ) -> Result<Option<Index>, StoreError> {
        self.find_leaf_index_from(leaf, 0, tx, include_uncommitted)
    }

    /// Finds the smallest index `>= start_index` among all indices
    /// sharing `leaf`'s key, across the backend's committed
    /// `IndexList` at that key and, if `include_uncommitted`, the
    /// overlay's `IndexList` at the same key.
    pub fn find_leaf_index_from(
        &self,
        leaf: &L,
        start_index: Index,
        tx: &dyn crate::ReadTransaction,
        include_uncommitted: bool,
    ) -> Result<Option<Index>, StoreError> {
        let key = leaf.key();
        let mut result: Option<Index> = None;

        if let Some(bytes) = tx.get_index_list(key)? {
            let committed: crate::IndexList = codec::decode(&bytes)?;
            for &idx in committed.iter() {
                result = fold_min(result, idx, start_index);
            }
        }

        if include_uncommitted {
            if let Some(list) = self.indices.get(U256::from(key)) {
                for &idx in list.iter() {
                    result = fold_min(result, idx, start_index);
                }
            }
        }

        Ok(result)
    }

    /// The indexed-Merkle-tree "low leaf" lookup: the largest stored
    /// key `<= new_key`, across the union of the backend's committed
    /// state and (if `include_uncommitted`) the overlay.
    ///
    /// Returns `(exact_match, index)` where `index` is the
    /// representative (first-inserted) index for the matched key, and
    /// `exact_match` is whether that key equals `new_key`.
    #[instrument(skip(self, tx))]
    pub fn find_low_value(
        &self,
        new_key: Fr,
        include_uncommitted: bool,
        tx: &dyn crate::ReadTransaction,
    ) -> Result<(bool, Index), StoreError> {
        let v = U256::from(new_key);

        let (db_key, db_bytes) = tx
            .get_index_list_or_previous(new_key)?
            .ok_or(StoreError::NotFound)?;
        let committed: crate::IndexList = codec::decode(&db_bytes)?;
        let db_idx = committed.first();
        let db_key = U256::from(db_key);

        if !include_uncommitted || db_key == v || self.indices.is_empty() {
            return Ok((db_key == v, db_idx));
        }

        let overlay = self.indices.inner();
        match overlay.range(v..).next() {
            None => {
                // All cached keys are below V; take the maximum one.
                let (max_key, max_list) = overlay
                    .iter()
                    .next_back()
                    .expect("checked non-empty above");
                let idx = if *max_key > db_key {
                    max_list.first()
                } else {
                    db_idx
                };
                Ok((false, idx))
            }
            Some((k, list)) if *k == v => Ok((true, list.first())),
            Some((k, _)) => match overlay.range(..*k).next_back() {
                None => Ok((false, db_idx)),
                Some((pred_key, pred_list)) => {
                    let idx = if *pred_key > db_key {
                        pred_list.first()
                    } else {
                        db_idx
                    };
                    Ok((false, idx))
                }
            },
        }
    }
}

fn fold_min(current: Option<Index>, candidate: Index, start_index: Index) -> Option<Index> {
    if candidate < start_index {
        return current;
    }
    Some(match current {
        Some(existing) => existing.min(candidate),
        None => candidate,
    })
}

#[cfg(test)]
mod tests {
    use crate::store::tests::{leaf, TestLeaf};
    use crate::test_backend::InMemoryBackend;
    use crate::{Fr, LeafValue, Store};

    #[test]
    fn s2_set_read_commit() {
        let backend = InMemoryBackend::new();
        let mut store = Store::<_, TestLeaf>::new("accts", 20, &backend).unwrap();

        store.set_at_index(7, leaf(42), true);
        store.put_meta(1, Fr::from(0xdeadu64));

        {
            let tx = store.create_read_transaction().unwrap();
            assert_eq!(
                store.get_leaf(7, tx.as_ref(), true).unwrap(),
                Some(leaf(42))
            );
            assert_eq!(store.get_leaf(7, tx.as_ref(), false).unwrap(), None);
        }

        store.commit().unwrap();

        let tx = store.create_read_transaction().unwrap();
        assert_eq!(
            store.get_leaf(7, tx.as_ref(), false).unwrap(),
            Some(leaf(42))
        );
    }

    #[test]
    fn s3_low_value_across_cache_and_db() {
        let backend = InMemoryBackend::new();
        let mut store = Store::<_, TestLeaf>::new("accts", 20, &backend).unwrap();
        // Sentinel at key 0 so every query below has a committed predecessor
        // to fall back on; `get_index_list_or_previous` only ever finds a
        // committed key <= the query.
        store.set_at_index(1, leaf(0), true);
        store.set_at_index(7, leaf(42), true);
        store.commit().unwrap();

        store.update_index(100, Fr::from(30u64));
        store.update_index(101, Fr::from(50u64));

        let tx = store.create_read_transaction().unwrap();

        // db predecessor is key 0 (idx 1); cached predecessor is key 30
        // (idx 100), which is greater, so the cache wins.
        assert_eq!(
            store
                .find_low_value(Fr::from(40u64), true, tx.as_ref())
                .unwrap(),
            (false, 100)
        );
        // db predecessor is still key 42 (idx 7), which is greater than the
        // cached predecessor (key 30), so the db wins.
        assert_eq!(
            store
                .find_low_value(Fr::from(45u64), true, tx.as_ref())
                .unwrap(),
            (false, 7)
        );
        assert_eq!(
            store
                .find_low_value(Fr::from(42u64), true, tx.as_ref())
                .unwrap(),
            (true, 7)
        );
    }

    #[test]
    fn find_low_value_prefers_whichever_side_has_the_greater_predecessor() {
        let backend = InMemoryBackend::new();
        let mut store = Store::<_, TestLeaf>::new("accts", 20, &backend).unwrap();
        // Only a low sentinel is committed; everything else lives in the
        // overlay, so any cached predecessor outranks it.
        store.set_at_index(1, leaf(0), true);
        store.commit().unwrap();

        store.update_index(100, Fr::from(30u64));
        store.update_index(101, Fr::from(50u64));

        let tx = store.create_read_transaction().unwrap();

        // query 40: overlay lower_bound(40) = 50 (not exact); predecessor is
        // 30, which beats the db's key 0 -> cache wins.
        assert_eq!(
            store
                .find_low_value(Fr::from(40u64), true, tx.as_ref())
                .unwrap(),
            (false, 100)
        );
        // query 60: nothing cached is >= 60, so the max cached entry (50) is
        // the candidate; it beats the db's key 0 -> cache wins.
        assert_eq!(
            store
                .find_low_value(Fr::from(60u64), true, tx.as_ref())
                .unwrap(),
            (false, 101)
        );
    }

    #[test]
    fn s4_index_list_merge_and_find_from() {
        let backend = InMemoryBackend::new();
        {
            let mut store = Store::<_, TestLeaf>::new("accts", 20, &backend).unwrap();
            store.update_index(2, Fr::from(99u64));
            store.update_index(5, Fr::from(99u64));
            store.commit().unwrap();
        }

        let mut store = Store::<_, TestLeaf>::new("accts", 20, &backend).unwrap();
        store.update_index(8, Fr::from(99u64));
        store.commit().unwrap();

        let tx = store.create_read_transaction().unwrap();
        let bytes = tx.get_index_list(Fr::from(99u64)).unwrap().unwrap();
        let list: crate::IndexList = crate::codec::decode(&bytes).unwrap();
        assert_eq!(list.iter().copied().collect::<Vec<_>>(), vec![2, 5, 8]);

        let found = store
            .find_leaf_index_from(&TestLeaf { key: 99 }, 3, tx.as_ref(), false)
            .unwrap();
        assert_eq!(found, Some(5));
    }

    #[test]
    fn find_leaf_index_from_respects_start_index_and_uncommitted_flag() {
        let backend = InMemoryBackend::new();
        let mut store = Store::<_, TestLeaf>::new("accts", 20, &backend).unwrap();
        store.update_index(1, Fr::from(7u64));
        store.update_index(9, Fr::from(7u64));

        let tx = store.create_read_transaction().unwrap();
        assert_eq!(
            store
                .find_leaf_index(&TestLeaf { key: 7 }, tx.as_ref(), true)
                .unwrap(),
            Some(1)
        );
        assert_eq!(
            store
                .find_leaf_index_from(&TestLeaf { key: 7 }, 2, tx.as_ref(), true)
                .unwrap(),
            Some(9)
        );
        assert_eq!(
            store
                .find_leaf_index(&TestLeaf { key: 7 }, tx.as_ref(), false)
                .unwrap(),
            None
        );
    }
}
