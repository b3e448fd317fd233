//! Lookup structures over a catalog's parallel columns
//!
//! - [`SpatialIndex`]: halo id -> row offset, O(1) lookup
//! - [`ChildIndex`]: parent id -> child row offsets, so finding the children
//!   of a selected halo costs O(children) instead of a full column scan
//!
//! Both are rebuilt from scratch on every catalog load.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    offsets: HashMap<i64, usize>,
}

impl SpatialIndex {
    /// O(n) build; later duplicates would overwrite earlier ones, the catalog
    /// rejects duplicates before getting here
    pub fn build(ids: &[i64]) -> Self {
        let mut offsets = HashMap::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            offsets.insert(*id, i);
        }
        Self { offsets }
    }

    /// Replace the mapping with one built from `ids`
    pub fn rebuild(&mut self, ids: &[i64]) {
        *self = Self::build(ids);
    }

    pub fn lookup(&self, id: i64) -> Option<usize> {
        self.offsets.get(&id).copied()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.offsets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChildIndex {
    children: HashMap<i64, Vec<usize>>,
}

impl ChildIndex {
    /// Group row offsets by parent id. Roots (negative parents) are skipped.
    pub fn build(parent_ids: &[i64]) -> Self {
        let mut children: HashMap<i64, Vec<usize>> = HashMap::new();
        for (i, parent) in parent_ids.iter().enumerate() {
            if *parent >= 0 {
                children.entry(*parent).or_default().push(i);
            }
        }
        Self { children }
    }

    /// Row offsets of the direct children of `parent`, in catalog order
    pub fn children_of(&self, parent: i64) -> &[usize] {
        self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_children(&self, parent: i64) -> bool {
        !self.children_of(parent).is_empty()
    }
}

/// Children of `parent` found by scanning the whole parent column
///
/// O(n) per call. Kept for comparison against [`ChildIndex`].
pub fn children_by_scan(parent_ids: &[i64], parent: i64) -> Vec<usize> {
    parent_ids
        .iter()
        .enumerate()
        .filter(|(_, p)| **p == parent)
        .map(|(i, _)| i)
        .collect()
}
