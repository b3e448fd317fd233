//! Inputs to and outputs from [`AppState::dispatch`](crate::app::state::AppState::dispatch)
//!
//! Input systems translate clicks and key presses into [`Command`]s;
//! background work reports back as `Command`s too. Work the state cannot do
//! itself (network, local filtering) comes out as [`Task`]s for the backend.

use crate::client::api::LoadedCatalog;
use crate::client::filters::Filters;
use crate::coords::format::CoordinateSystem;
use crate::error::ViewerError;
use crate::hierarchy::tree::HierarchyNode;

#[derive(Debug)]
pub enum Command {
    /// Pointer pick result: row offset of the nearest halo, or empty space
    Pick(Option<usize>),
    SelectHalo(i64),
    ClearSelection,

    CycleCoordinateSystem,
    SetCoordinateSystem(CoordinateSystem),
    ToggleRelativeOrigin,

    /// Expand or collapse a hierarchy node
    ToggleNode(i64),
    /// Select the halo behind a hierarchy node
    ActivateNode(i64),

    /// Reload the catalog with the given filters
    ApplyFilters(Filters),
    ClearFilters,

    CatalogLoaded {
        generation: u64,
        result: Result<LoadedCatalog, ViewerError>,
    },
    ChildrenLoaded {
        parent: Option<i64>,
        result: Result<Vec<HierarchyNode>, ViewerError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    LoadCatalog {
        generation: u64,
        file_id: Option<String>,
        filters: Filters,
    },
    FetchChildren {
        file_id: Option<String>,
        parent: Option<i64>,
    },
}
