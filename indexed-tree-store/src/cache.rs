//! In-memory overlays. These are pure data containers: no backend I/O,
//! no merge logic beyond what [`Store::commit`](crate::Store::commit)
//! does explicitly. Writes never remove entries; only `commit` and
//! `rollback` drain them.

use crate::{Index, IndexList, LeafValue};
use ethereum_types::U256;
use std::collections::{BTreeMap, HashMap};

/// Per-level node cache: `nodes[level][index] -> bytes`.
#[derive(Debug)]
pub(crate) struct NodeCache(Vec<HashMap<Index, Vec<u8>>>);

impl NodeCache {
    pub(crate) fn new(depth: u32) -> Self {
        Self(
            std::iter::repeat_with(HashMap::new)
                .take(depth as usize + 1)
                .collect(),
        )
    }

    pub(crate) fn get(&self, level: u32, index: Index) -> Option<&Vec<u8>> {
        self.0[level as usize].get(&index)
    }

    pub(crate) fn put(&mut self, level: u32, index: Index, bytes: Vec<u8>) {
        self.0[level as usize].insert(index, bytes);
    }

    /// All non-root levels (`1..=depth`), in level order. Level 0 is
    /// reserved for tree meta and is never flushed as a node.
    pub(crate) fn non_root_levels(&self) -> impl Iterator<Item = (u32, &HashMap<Index, Vec<u8>>)> {
        self.0
            .iter()
            .enumerate()
            .skip(1)
            .map(|(level, map)| (level as u32, map))
    }
}

/// Value-to-indices overlay, ordered by the uint256 image of the key
/// so that `find_low_value` can do a lower-bound search.
#[derive(Debug, Default)]
pub(crate) struct IndexCache(BTreeMap<U256, IndexList>);

impl IndexCache {
    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn get(&self, key: U256) -> Option<&IndexList> {
        self.0.get(&key)
    }

    pub(crate) fn append(&mut self, key: U256, index: Index) {
        self.0
            .entry(key)
            .and_modify(|list| list.push(index))
            .or_insert_with(|| IndexList::single(index));
    }

    pub(crate) fn inner(&self) -> &BTreeMap<U256, IndexList> {
        &self.0
    }

    pub(crate) fn inner_mut(&mut self) -> &mut BTreeMap<U256, IndexList> {
        &mut self.0
    }
}

/// Leaf-index-to-leaf overlay.
#[derive(Debug)]
pub(crate) struct LeafCache<L: LeafValue>(HashMap<Index, crate::IndexedLeaf<L>>);

impl<L: LeafValue> Default for LeafCache<L> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<L: LeafValue> LeafCache<L> {
    pub(crate) fn get(&self, index: Index) -> Option<&crate::IndexedLeaf<L>> {
        self.0.get(&index)
    }

    pub(crate) fn put(&mut self, index: Index, leaf: crate::IndexedLeaf<L>) {
        self.0.insert(index, leaf);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&Index, &crate::IndexedLeaf<L>)> {
        self.0.iter()
    }
}
