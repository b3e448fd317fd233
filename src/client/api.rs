//! Blocking HTTP client for the halo catalogue server
//!
//! Every call is blocking and must run off the render loop (see
//! `client::requests`). Non-success statuses become `ViewerError::Network`
//! carrying the server's `detail` message when it sends one.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use reqwest::blocking::{multipart, Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::halo::{Catalog, DataResponse};
use crate::catalog::schema::{ScanResponse, SchemaMapping};
use crate::catalog::stats::StatsResponse;
use crate::client::filters::Filters;
use crate::error::{Result, ViewerError};
use crate::hierarchy::tree::{HierarchyNode, HierarchyProvider};

/// Extensions the server accepts
pub const UPLOAD_EXTENSIONS: [&str; 3] = ["hdf5", "h5", "csv"];

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UploadResponse {
    pub file_id: String,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DemoResponse {
    pub file_id: String,
    pub filename: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Where the catalog comes from
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    File(PathBuf),
    Demo,
}

/// Data and stats fetched together for one file
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub file_id: Option<String>,
    pub catalog: Catalog,
    pub stats: StatsResponse,
}

impl LoadedCatalog {
    /// Combine both halves; when filtered, totals describe the subset
    ///
    /// An empty result is only an error for an unfiltered load. A filter
    /// that matches nothing yields an empty catalog.
    pub fn combine(
        file_id: Option<String>,
        data: DataResponse,
        stats: StatsResponse,
        filtered: bool,
    ) -> Result<Self> {
        let catalog = Catalog::from_response(data)?;
        require_halos(&catalog, filtered)?;
        let stats = if filtered { stats.with_subset(&catalog) } else { stats };
        Ok(Self {
            file_id,
            catalog,
            stats,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    /// `timeout` of `None` waits indefinitely
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn upload(&self, path: &Path) -> Result<UploadResponse> {
        check_extension(path)?;
        let form = multipart::Form::new().file("file", path)?;
        let resp = self.http.post(self.url("/upload")).multipart(form).send()?;
        Ok(check(resp)?.json()?)
    }

    pub fn scan(&self, file_id: &str) -> Result<ScanResponse> {
        let resp = self.http.post(self.url(&format!("/scan/{file_id}"))).send()?;
        Ok(check(resp)?.json()?)
    }

    /// Refuses to send a mapping without `id`, `mass` and `pos`
    pub fn ingest(&self, file_id: &str, mapping: &SchemaMapping) -> Result<()> {
        mapping.validate()?;
        let resp = self
            .http
            .post(self.url(&format!("/ingest/{file_id}")))
            .json(mapping)
            .send()?;
        check(resp)?;
        Ok(())
    }

    pub fn data(&self, file_id: &str, filters: &Filters) -> Result<DataResponse> {
        let resp = self
            .http
            .get(self.url(&format!("/data/{file_id}")))
            .query(&filters.query_pairs())
            .send()?;
        Ok(check(resp)?.json()?)
    }

    pub fn stats(&self, file_id: &str) -> Result<StatsResponse> {
        let resp = self.http.get(self.url(&format!("/stats/{file_id}"))).send()?;
        Ok(check(resp)?.json()?)
    }

    pub fn hierarchy(&self, file_id: &str, root: Option<i64>) -> Result<Vec<HierarchyNode>> {
        let mut req = self.http.get(self.url(&format!("/hierarchy/{file_id}")));
        if let Some(id) = root {
            req = req.query(&[("root_id", id)]);
        }
        Ok(check(req.send()?)?.json()?)
    }

    pub fn demo(&self) -> Result<DemoResponse> {
        let resp = self.http.post(self.url("/demo")).send()?;
        Ok(check(resp)?.json()?)
    }

    /// Upload (and for HDF5, scan + ingest) a source; returns the file id
    pub fn open(&self, source: &Source) -> Result<String> {
        match source {
            Source::Demo => {
                let demo = self.demo()?;
                info!("loaded demo dataset {} ({})", demo.filename, demo.file_id);
                Ok(demo.file_id)
            }
            Source::File(path) => {
                let upload = self.upload(path)?;
                info!("uploaded {} as {}", path.display(), upload.file_id);
                if is_hierarchical(path) {
                    let scan = self.scan(&upload.file_id)?;
                    let mapping = scan.resolved_schema();
                    debug!("schema mapping for {}: {:?}", upload.file_id, mapping);
                    self.ingest(&upload.file_id, &mapping)?;
                }
                Ok(upload.file_id)
            }
        }
    }

    /// Fetch data and stats concurrently; either failing fails both
    pub fn load_data_and_stats(&self, file_id: &str, filters: &Filters) -> Result<LoadedCatalog> {
        let (data, stats) = thread::scope(|s| {
            let data = s.spawn(|| self.data(file_id, filters));
            let stats = s.spawn(|| self.stats(file_id));
            (join(data), join(stats))
        });
        LoadedCatalog::combine(Some(file_id.to_string()), data?, stats?, !filters.is_empty())
    }
}

/// Unfiltered loads must contain at least one halo
pub fn require_halos(catalog: &Catalog, filtered: bool) -> Result<()> {
    if catalog.is_empty() && !filtered {
        return Err(ViewerError::DataAbsence("no x, y, z coordinates in dataset".into()));
    }
    Ok(())
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, Result<T>>) -> Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(ViewerError::Network("request thread panicked".into())))
}

fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.detail)
        .unwrap_or(body);
    Err(ViewerError::Network(format!("{status}: {detail}")))
}

fn extension(path: &Path) -> Option<String> {
    path.extension().and_then(|e| e.to_str()).map(str::to_lowercase)
}

pub fn check_extension(path: &Path) -> Result<()> {
    match extension(path) {
        Some(ext) if UPLOAD_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ViewerError::Validation(format!(
            "unsupported file {}: expected .hdf5, .h5 or .csv",
            path.display()
        ))),
    }
}

/// HDF5 inputs need a schema mapping before their data can be served
pub fn is_hierarchical(path: &Path) -> bool {
    matches!(extension(path).as_deref(), Some("hdf5" | "h5"))
}

/// Hierarchy rows for one uploaded file
#[derive(Debug, Clone)]
pub struct RemoteHierarchy {
    pub client: ApiClient,
    pub file_id: String,
}

impl HierarchyProvider for RemoteHierarchy {
    fn fetch_children(&self, root: Option<i64>) -> Result<Vec<HierarchyNode>> {
        self.client.hierarchy(&self.file_id, root)
    }
}
