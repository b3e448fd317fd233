//! Application state and its transitions
//!
//! `AppState` owns everything the viewer knows: the current catalog with its
//! indices, selection, connection geometry, coordinate settings, hierarchy
//! tree and request bookkeeping. It changes only through [`AppState::dispatch`],
//! which applies one [`Command`] and returns the [`Task`]s it needs run.
//!
//! Renderers watch the two revision counters instead of diffing state:
//! - `scene_revision` bumps when a new catalog replaces the old one
//! - `emphasis_revision` bumps when selection emphasis changes

use std::collections::HashSet;

use bevy::prelude::Resource;
use tracing::{debug, error, info};

use crate::app::commands::{Command, Task};
use crate::catalog::halo::Catalog;
use crate::catalog::stats::{ChartSet, StatsResponse};
use crate::client::api::LoadedCatalog;
use crate::client::filters::Filters;
use crate::client::requests::RequestTracker;
use crate::coords::format::CoordinateSettings;
use crate::hierarchy::tree::{format_mass, ExpandRequest, HierarchyTree};
use crate::selection::connections::ConnectionView;
use crate::selection::controller::{Emphasis, SelectionChange, SelectionController};

#[derive(Resource, Default)]
pub struct AppState {
    pub catalog: Option<Catalog>,
    pub stats: Option<StatsResponse>,
    pub charts: Option<ChartSet>,
    pub selection: SelectionController,
    pub connections: ConnectionView,
    pub coords: CoordinateSettings,
    pub tree: HierarchyTree,
    pub readout: Option<String>,      // selected halo summary
    pub notification: Option<String>, // last user-facing error
    pub file_id: Option<String>,
    pub filters: Filters,
    pub loading: bool,
    pub scene_revision: u64,
    pub emphasis_revision: u64,
    tracker: RequestTracker,
    pending_children: HashSet<Option<i64>>,
    reload_queued: bool, // filters changed during the first load
}

impl AppState {
    pub fn new(coords: CoordinateSettings, filters: Filters) -> Self {
        Self {
            coords,
            filters,
            ..Default::default()
        }
    }

    /// Initial catalog request
    pub fn start(&mut self) -> Vec<Task> {
        vec![self.load_task()]
    }

    pub fn latest_generation(&self) -> u64 {
        self.tracker.latest()
    }

    pub fn emphasis(&self, index: usize) -> Emphasis {
        self.selection.emphasis(index)
    }

    pub fn dismiss_notification(&mut self) {
        self.notification = None;
    }

    pub fn dispatch(&mut self, command: Command) -> Vec<Task> {
        match command {
            Command::Pick(hit) => {
                if let Some(catalog) = &self.catalog {
                    let change = self.selection.pick(catalog, hit);
                    self.apply_selection(change);
                }
                Vec::new()
            }
            Command::SelectHalo(id) | Command::ActivateNode(id) => {
                if let Some(catalog) = &self.catalog {
                    let change = self.selection.select_id(catalog, id);
                    self.apply_selection(change);
                }
                Vec::new()
            }
            Command::ClearSelection => {
                let change = self.selection.clear();
                self.apply_selection(change);
                Vec::new()
            }

            Command::CycleCoordinateSystem => {
                self.coords.system = self.coords.system.next();
                self.refresh_coordinates();
                Vec::new()
            }
            Command::SetCoordinateSystem(system) => {
                self.coords.system = system;
                self.refresh_coordinates();
                Vec::new()
            }
            Command::ToggleRelativeOrigin => {
                self.coords.relative_origin = !self.coords.relative_origin;
                self.refresh_coordinates();
                Vec::new()
            }

            Command::ToggleNode(id) => match self.tree.toggle(id) {
                ExpandRequest::Fetch(parent) => self.children_task(Some(parent)).into_iter().collect(),
                ExpandRequest::Cached => {
                    self.tree.refresh_subtree(id, &self.coords);
                    Vec::new()
                }
                ExpandRequest::Leaf | ExpandRequest::Unknown => Vec::new(),
            },

            Command::ApplyFilters(filters) => {
                self.filters = filters;
                self.reload()
            }
            Command::ClearFilters => {
                self.filters = Filters::default();
                self.reload()
            }

            Command::CatalogLoaded { generation, result } => {
                if !self.tracker.is_current(generation) {
                    debug!(
                        "discarding stale catalog response (generation {generation}, latest {})",
                        self.tracker.latest()
                    );
                    return Vec::new();
                }
                self.loading = false;
                match result {
                    Ok(loaded) => {
                        let mut tasks = self.install(loaded);
                        if std::mem::take(&mut self.reload_queued) {
                            tasks.push(self.load_task());
                        }
                        tasks
                    }
                    Err(e) => {
                        self.reload_queued = false;
                        error!("catalog load failed: {e}");
                        self.notification = Some(format!("Error loading data: {e}"));
                        Vec::new()
                    }
                }
            }
            Command::ChildrenLoaded { parent, result } => {
                self.pending_children.remove(&parent);
                match result {
                    Ok(nodes) => self.tree.attach_children(parent, nodes, &self.coords),
                    Err(e) => {
                        error!("hierarchy fetch failed: {e}");
                        self.notification = Some(format!("Error loading hierarchy: {e}"));
                        if let Some(id) = parent {
                            self.tree.collapse(id);
                        }
                    }
                }
                Vec::new()
            }
        }
    }

    fn load_task(&mut self) -> Task {
        self.loading = true;
        Task::LoadCatalog {
            generation: self.tracker.next(),
            file_id: self.file_id.clone(),
            filters: self.filters.clone(),
        }
    }

    /// Reload with the current filters. While the first load is still opening
    /// the source there is no file id to query yet, so the reload waits for it
    /// instead of opening the source a second time.
    fn reload(&mut self) -> Vec<Task> {
        if self.catalog.is_none() && self.loading {
            debug!("source still opening, filters apply once it has loaded");
            self.reload_queued = true;
            return Vec::new();
        }
        vec![self.load_task()]
    }

    fn children_task(&mut self, parent: Option<i64>) -> Option<Task> {
        // one request per parent at a time
        if !self.pending_children.insert(parent) {
            return None;
        }
        Some(Task::FetchChildren {
            file_id: self.file_id.clone(),
            parent,
        })
    }

    /// Replace the catalog; selection, connections and indices start over
    fn install(&mut self, loaded: LoadedCatalog) -> Vec<Task> {
        let LoadedCatalog {
            file_id,
            catalog,
            stats,
        } = loaded;
        info!("catalog loaded: {} halos", catalog.len());

        let same_source = file_id == self.file_id;
        if file_id.is_some() {
            self.file_id = file_id;
        }

        self.coords.center = catalog.center();
        self.selection.reset();
        self.connections.hide();
        self.readout = None;
        self.notification = None;
        self.charts = Some(ChartSet::build(&stats, &catalog));
        self.stats = Some(stats);
        self.catalog = Some(catalog);
        self.scene_revision += 1;
        self.emphasis_revision += 1;

        // The hierarchy describes the whole source, so it survives filter reloads
        if same_source && self.tree.roots_loaded() {
            self.tree.refresh_labels(&self.coords);
            return Vec::new();
        }
        self.tree = HierarchyTree::new();
        self.pending_children.clear();
        self.children_task(None).into_iter().collect()
    }

    fn apply_selection(&mut self, change: SelectionChange) {
        match change {
            SelectionChange::Selected(selection) => {
                if let Some(catalog) = &self.catalog {
                    self.connections.update(catalog, selection.index);
                }
                self.readout = self.selected_readout();
                self.emphasis_revision += 1;
            }
            SelectionChange::Cleared => {
                self.connections.hide();
                self.readout = None;
                self.emphasis_revision += 1;
            }
            SelectionChange::Unchanged => {}
        }
    }

    fn refresh_coordinates(&mut self) {
        self.tree.refresh_labels(&self.coords);
        self.readout = self.selected_readout();
    }

    fn selected_readout(&self) -> Option<String> {
        let selection = self.selection.selection()?;
        let halo = self.catalog.as_ref()?.halo(selection.index)?;
        Some(format!(
            "Halo #{} | M = {} | {} [{}] | related: {}",
            halo.id,
            format_mass(halo.mass),
            self.coords.format(&halo.position),
            self.coords.system.name(),
            selection.related.len()
        ))
    }
}
