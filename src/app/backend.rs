//! Runs the tasks `AppState` asks for
//!
//! - `Remote`: talks to the catalogue server, opening (uploading) the source
//!   on the first load
//! - `Offline`: serves an in-memory catalog, filtering and computing
//!   statistics locally
//!
//! Either way the work happens off the render loop and comes back as a
//! [`Command`] to dispatch.

use std::sync::Arc;

use bevy::prelude::Resource;

use crate::app::commands::{Command, Task};
use crate::catalog::halo::Catalog;
use crate::catalog::stats::StatsResponse;
use crate::client::api::{require_halos, ApiClient, LoadedCatalog, RemoteHierarchy, Source};
use crate::client::filters::Filters;
use crate::client::requests::PendingRequest;
use crate::error::{Result, ViewerError};
use crate::hierarchy::tree::HierarchyProvider;

#[derive(Resource, Clone)]
pub enum Backend {
    Remote { client: ApiClient, source: Source },
    Offline { catalog: Arc<Catalog> },
}

impl Backend {
    pub fn spawn(&self, task: Task) -> PendingRequest<Command> {
        match (self.clone(), task) {
            (
                Backend::Remote { client, source },
                Task::LoadCatalog {
                    generation,
                    file_id,
                    filters,
                },
            ) => PendingRequest::spawn(move || {
                let result = load_remote(&client, &source, file_id, &filters);
                Command::CatalogLoaded { generation, result }
            }),

            (Backend::Remote { client, .. }, Task::FetchChildren { file_id, parent }) => {
                PendingRequest::spawn(move || {
                    let result = match file_id {
                        Some(file_id) => RemoteHierarchy { client, file_id }.fetch_children(parent),
                        None => Err(ViewerError::DataAbsence("no file has been loaded yet".into())),
                    };
                    Command::ChildrenLoaded { parent, result }
                })
            }

            (Backend::Offline { catalog }, Task::LoadCatalog { generation, filters, .. }) => {
                PendingRequest::spawn(move || {
                    let result = load_offline(&catalog, &filters);
                    Command::CatalogLoaded { generation, result }
                })
            }

            (Backend::Offline { catalog }, Task::FetchChildren { parent, .. }) => {
                PendingRequest::ready(Command::ChildrenLoaded {
                    parent,
                    result: catalog.fetch_children(parent),
                })
            }
        }
    }
}

fn load_remote(
    client: &ApiClient,
    source: &Source,
    file_id: Option<String>,
    filters: &Filters,
) -> Result<LoadedCatalog> {
    let file_id = match file_id {
        Some(id) => id,
        None => client.open(source)?,
    };
    client.load_data_and_stats(&file_id, filters)
}

/// Filter locally; stats describe the whole catalog with subset totals
pub fn load_offline(catalog: &Catalog, filters: &Filters) -> Result<LoadedCatalog> {
    let stats = StatsResponse::compute(catalog);
    if filters.is_empty() {
        require_halos(catalog, false)?;
        return Ok(LoadedCatalog {
            file_id: None,
            catalog: catalog.clone(),
            stats,
        });
    }
    let subset = filters.apply(catalog)?;
    Ok(LoadedCatalog {
        file_id: None,
        stats: stats.with_subset(&subset),
        catalog: subset,
    })
}
