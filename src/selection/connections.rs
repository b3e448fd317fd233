//! Line geometry linking a selected halo to its relatives
//!
//! One segment to the parent (only if the parent is in the catalog) and one
//! per direct child. Children come from the catalog's `ChildIndex`; the
//! `_by_scan` variant walks the whole parent column instead and is what the
//! benchmark compares against. The scan is O(n) per selection and stops being
//! interactive somewhere past 10^5..10^6 halos.

use crate::catalog::halo::{Catalog, NVec3};
use crate::catalog::index::children_by_scan;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: NVec3, // selected halo
    pub end: NVec3,   // relative
}

pub fn connection_segments(catalog: &Catalog, index: usize) -> Vec<Segment> {
    let children = catalog.children.children_of(catalog.ids[index]);
    segments_from(catalog, index, children)
}

pub fn connection_segments_by_scan(catalog: &Catalog, index: usize) -> Vec<Segment> {
    let children = match &catalog.parent_ids {
        Some(p) => children_by_scan(p, catalog.ids[index]),
        None => Vec::new(),
    };
    segments_from(catalog, index, &children)
}

fn segments_from(catalog: &Catalog, index: usize, children: &[usize]) -> Vec<Segment> {
    let start = catalog.positions[index];
    let mut segments = Vec::with_capacity(children.len() + 1);

    if let Some(parent) = catalog.parent_of(index).and_then(|p| catalog.index.lookup(p)) {
        segments.push(Segment {
            start,
            end: catalog.positions[parent],
        });
    }
    for child in children {
        segments.push(Segment {
            start,
            end: catalog.positions[*child],
        });
    }
    segments
}

/// Renderable connection state: geometry, visibility and bounding box
#[derive(Debug, Clone, Default)]
pub struct ConnectionView {
    segments: Vec<Segment>,
    visible: bool,
    bounds: Option<(NVec3, NVec3)>,
}

impl ConnectionView {
    /// Rebuild for the halo at `index`; hidden when it has no relatives
    pub fn update(&mut self, catalog: &Catalog, index: usize) {
        self.segments = connection_segments(catalog, index);
        self.visible = !self.segments.is_empty();
        self.bounds = segment_bounds(&self.segments);
    }

    pub fn hide(&mut self) {
        self.segments.clear();
        self.visible = false;
        self.bounds = None;
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn bounds(&self) -> Option<(NVec3, NVec3)> {
        self.bounds
    }
}

fn segment_bounds(segments: &[Segment]) -> Option<(NVec3, NVec3)> {
    let first = segments.first()?;
    let mut min = first.start;
    let mut max = first.start;
    for s in segments {
        min = min.inf(&s.start).inf(&s.end);
        max = max.sup(&s.start).sup(&s.end);
    }
    Some((min, max))
}
