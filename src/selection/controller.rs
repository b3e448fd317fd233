//! Selection and highlight state
//!
//! Two states:
//! - `Idle`: nothing selected, nothing emphasised
//! - `Selected`: one primary halo plus its related set (parent and direct
//!   children)
//!
//! Transitions:
//! - pick a halo            Idle/Selected -> Selected (replaces atomically)
//! - pick empty space       Selected -> Idle
//! - select an unknown id   no-op, prior state kept
//! - load a new catalog     -> Idle
//!
//! The controller only tracks state. Each transition returns a
//! [`SelectionChange`] so the caller can apply the side effects (emphasis,
//! coordinate readout, connection geometry).

use crate::catalog::halo::Catalog;

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub id: i64,
    pub index: usize,
    pub related: Vec<i64>,          // parent first (if any), then children in catalog order
    pub related_indices: Vec<usize>, // same order as `related`
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    Selected(Selection),
}

/// What a transition did
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionChange {
    Selected(Selection),
    Cleared,
    Unchanged,
}

/// Visual tier of a halo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    Primary,
    Related,
    None,
}

#[derive(Debug, Default)]
pub struct SelectionController {
    state: SelectionState,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn selection(&self) -> Option<&Selection> {
        match &self.state {
            SelectionState::Selected(s) => Some(s),
            SelectionState::Idle => None,
        }
    }

    pub fn selected_id(&self) -> Option<i64> {
        self.selection().map(|s| s.id)
    }

    pub fn related_ids(&self) -> &[i64] {
        self.selection().map(|s| s.related.as_slice()).unwrap_or(&[])
    }

    /// Select by halo id. Ids missing from the catalog leave the state alone.
    pub fn select_id(&mut self, catalog: &Catalog, id: i64) -> SelectionChange {
        match catalog.index.lookup(id) {
            Some(index) => self.select_index(catalog, index),
            None => SelectionChange::Unchanged,
        }
    }

    /// Select by row offset, replacing any previous selection in one step
    pub fn select_index(&mut self, catalog: &Catalog, index: usize) -> SelectionChange {
        if index >= catalog.len() {
            return SelectionChange::Unchanged;
        }
        let related_indices = related_indices(catalog, index);
        let selection = Selection {
            id: catalog.ids[index],
            index,
            related: related_indices.iter().map(|i| catalog.ids[*i]).collect(),
            related_indices,
        };
        self.state = SelectionState::Selected(selection.clone());
        SelectionChange::Selected(selection)
    }

    /// Result of a pointer pick: a hit selects, a miss clears
    pub fn pick(&mut self, catalog: &Catalog, hit: Option<usize>) -> SelectionChange {
        match hit {
            Some(index) => self.select_index(catalog, index),
            None => self.clear(),
        }
    }

    pub fn clear(&mut self) -> SelectionChange {
        match self.state {
            SelectionState::Idle => SelectionChange::Unchanged,
            SelectionState::Selected(_) => {
                self.state = SelectionState::Idle;
                SelectionChange::Cleared
            }
        }
    }

    /// Drop everything, used when a new catalog replaces the old one
    pub fn reset(&mut self) {
        self.state = SelectionState::Idle;
    }

    pub fn emphasis(&self, index: usize) -> Emphasis {
        match &self.state {
            SelectionState::Selected(s) if s.index == index => Emphasis::Primary,
            SelectionState::Selected(s) if s.related_indices.contains(&index) => Emphasis::Related,
            _ => Emphasis::None,
        }
    }
}

/// Parent (when present in the catalog) followed by direct children
pub fn related_indices(catalog: &Catalog, index: usize) -> Vec<usize> {
    let mut related = Vec::new();
    if let Some(parent) = catalog.parent_of(index).and_then(|p| catalog.index.lookup(p)) {
        related.push(parent);
    }
    related.extend_from_slice(catalog.children.children_of(catalog.ids[index]));
    related
}
