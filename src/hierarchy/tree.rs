//! Lazily loaded halo hierarchy tree
//!
//! The tree starts with the true roots (halos without a parent). Children of
//! a node are fetched the first time it is expanded and then cached: later
//! collapse/expand cycles never hit the provider again.
//!
//! Every loaded node keeps a rendered label: id, mass in scientific notation
//! and its coordinates. When the coordinate settings change only the labels
//! of currently visible nodes are recomputed; hidden ones are refreshed the
//! next time they become visible.
//!
//! Fetching can be driven two ways:
//! - synchronously through a [`HierarchyProvider`] (`load_roots_with`,
//!   `expand_with`)
//! - split, for background fetches: `expand` reports whether a fetch is
//!   needed and `attach_children` installs the result later

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::catalog::halo::{Catalog, NVec3};
use crate::coords::format::CoordinateSettings;
use crate::error::Result;

/// One row of the hierarchy endpoint
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    pub id: i64,
    pub mass: f64,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    pub has_children: bool,
}

impl HierarchyNode {
    pub fn position(&self) -> NVec3 {
        NVec3::new(self.x, self.y, self.z)
    }
}

/// Source of hierarchy rows: `None` asks for the roots, `Some(id)` for the
/// direct children of `id`
pub trait HierarchyProvider {
    fn fetch_children(&self, root: Option<i64>) -> Result<Vec<HierarchyNode>>;
}

/// Serve the hierarchy from an already loaded catalog, heaviest first
impl HierarchyProvider for Catalog {
    fn fetch_children(&self, root: Option<i64>) -> Result<Vec<HierarchyNode>> {
        let rows: Vec<usize> = match root {
            Some(id) => self.children.children_of(id).to_vec(),
            None => (0..self.len()).filter(|i| self.parent_of(*i).is_none()).collect(),
        };

        let mut nodes: Vec<HierarchyNode> = rows
            .into_iter()
            .map(|i| {
                let p = self.positions[i];
                HierarchyNode {
                    id: self.ids[i],
                    mass: self.mass[i],
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    has_children: self.children.has_children(self.ids[i]),
                }
            })
            .collect();
        nodes.sort_by(|a, b| b.mass.total_cmp(&a.mass));
        Ok(nodes)
    }
}

/// What `expand` needs from the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandRequest {
    /// Children must be fetched for this id, then passed to `attach_children`
    Fetch(i64),
    /// Children were already loaded, node is now expanded
    Cached,
    /// Node has no children
    Leaf,
    /// Id is not in the tree
    Unknown,
}

#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub node: HierarchyNode,
    pub expanded: bool,
    pub children: Option<Vec<i64>>, // None until fetched
    pub label: String,
}

#[derive(Debug, Default)]
pub struct HierarchyTree {
    roots: Option<Vec<i64>>,
    entries: HashMap<i64, TreeEntry>,
}

impl HierarchyTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots_loaded(&self) -> bool {
        self.roots.is_some()
    }

    pub fn entry(&self, id: i64) -> Option<&TreeEntry> {
        self.entries.get(&id)
    }

    pub fn label(&self, id: i64) -> Option<&str> {
        self.entries.get(&id).map(|e| e.label.as_str())
    }

    pub fn load_roots_with<P: HierarchyProvider + ?Sized>(
        &mut self,
        provider: &P,
        settings: &CoordinateSettings,
    ) -> Result<()> {
        if self.roots.is_some() {
            return Ok(());
        }
        let nodes = provider.fetch_children(None)?;
        self.attach_children(None, nodes, settings);
        Ok(())
    }

    /// Mark `id` expanded and report whether its children still need fetching
    pub fn expand(&mut self, id: i64) -> ExpandRequest {
        let Some(entry) = self.entries.get_mut(&id) else {
            return ExpandRequest::Unknown;
        };
        if !entry.node.has_children {
            return ExpandRequest::Leaf;
        }
        entry.expanded = true;
        match entry.children {
            Some(_) => ExpandRequest::Cached,
            None => ExpandRequest::Fetch(id),
        }
    }

    /// Expand `id`, fetching its children from `provider` on first use
    pub fn expand_with<P: HierarchyProvider + ?Sized>(
        &mut self,
        provider: &P,
        id: i64,
        settings: &CoordinateSettings,
    ) -> Result<ExpandRequest> {
        let request = self.expand(id);
        if let ExpandRequest::Fetch(parent) = request {
            let nodes = provider.fetch_children(Some(parent))?;
            self.attach_children(Some(parent), nodes, settings);
        }
        Ok(request)
    }

    pub fn collapse(&mut self, id: i64) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.expanded = false;
        }
    }

    /// Flip expansion; returns the fetch request when expanding needs one
    pub fn toggle(&mut self, id: i64) -> ExpandRequest {
        match self.entries.get(&id) {
            Some(e) if e.expanded => {
                self.collapse(id);
                ExpandRequest::Cached
            }
            Some(_) => self.expand(id),
            None => ExpandRequest::Unknown,
        }
    }

    /// Install fetched rows under `parent` (`None` = roots). A second result
    /// for an already loaded parent is ignored.
    pub fn attach_children(
        &mut self,
        parent: Option<i64>,
        nodes: Vec<HierarchyNode>,
        settings: &CoordinateSettings,
    ) {
        let ids: Vec<i64> = nodes.iter().map(|n| n.id).collect();

        match parent {
            None => {
                if self.roots.is_some() {
                    return;
                }
                self.roots = Some(ids);
            }
            Some(p) => match self.entries.get_mut(&p) {
                Some(entry) if entry.children.is_none() => entry.children = Some(ids),
                _ => return,
            },
        }

        for node in nodes {
            let label = node_label(&node, settings);
            self.entries.insert(
                node.id,
                TreeEntry {
                    node,
                    expanded: false,
                    children: None,
                    label,
                },
            );
        }
    }

    /// Depth-first list of visible nodes with their depth (roots at 0)
    pub fn visible_nodes(&self) -> Vec<(usize, &TreeEntry)> {
        let mut out = Vec::new();
        let Some(roots) = &self.roots else {
            return out;
        };
        let mut stack: Vec<(usize, i64)> = roots.iter().rev().map(|id| (0, *id)).collect();
        while let Some((depth, id)) = stack.pop() {
            let Some(entry) = self.entries.get(&id) else {
                continue;
            };
            out.push((depth, entry));
            if entry.expanded {
                if let Some(children) = &entry.children {
                    stack.extend(children.iter().rev().map(|c| (depth + 1, *c)));
                }
            }
        }
        out
    }

    /// Recompute labels of visible nodes; returns how many were updated
    pub fn refresh_labels(&mut self, settings: &CoordinateSettings) -> usize {
        let visible: Vec<i64> = self.visible_nodes().iter().map(|(_, e)| e.node.id).collect();
        for id in &visible {
            if let Some(entry) = self.entries.get_mut(id) {
                entry.label = node_label(&entry.node, settings);
            }
        }
        visible.len()
    }

    /// Refresh `id` and its expanded descendants, used when a collapsed node
    /// is reopened after the settings changed
    pub fn refresh_subtree(&mut self, id: i64, settings: &CoordinateSettings) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            let Some(entry) = self.entries.get_mut(&cur) else {
                continue;
            };
            entry.label = node_label(&entry.node, settings);
            if entry.expanded {
                if let Some(children) = &entry.children {
                    stack.extend(children.iter().copied());
                }
            }
        }
    }
}

pub fn node_label(node: &HierarchyNode, settings: &CoordinateSettings) -> String {
    format!(
        "#{} | M = {} | {}",
        node.id,
        format_mass(node.mass),
        settings.format(&node.position())
    )
}

/// Scientific notation with one decimal and a signed exponent, e.g. `1.5e+12`
pub fn format_mass(mass: f64) -> String {
    let s = format!("{mass:.1e}");
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => s,
    }
}
