//! Configuration types for loading the viewer setup from YAML.
//!
//! This module defines a thin, `serde`-deserializable representation of a
//! viewer session. A session consists of:
//!
//! - [`ServerConfig`]  – where the catalogue server lives and how long to wait
//! - [`DisplayConfig`] – scene scaling and the initial coordinate readout
//! - [`Filters`]       – filters applied to the first data request
//! - [`SourceConfig`]  – which catalogue to open
//! - [`ViewerConfig`]  – top-level wrapper used to load a session from YAML
//!
//! # YAML format
//! An example session matching these types:
//!
//! ```yaml
//! server:
//!   base_url: "http://127.0.0.1:8000"
//!   timeout_secs: 30          # omit to wait indefinitely
//!
//! display:
//!   point_scale: 5.0          # world units per catalogue unit
//!   min_point_radius: 0.15    # catalogue units, keeps tiny halos pickable
//!   coordinate_system: "cartesian"   # or "cylindrical" / "spherical"
//!   relative_origin: false
//!
//! filters:
//!   log_min_mass: 11.0        # log10(M), sent linear
//!   x_min: 0.0
//!   x_max: 50.0
//!
//! source:
//!   kind: "file"              # "file", "demo" or "offline_demo"
//!   path: "catalogs/halos.h5"
//! ```
//!
//! Every section is optional; missing sections fall back to their defaults.

use std::path::PathBuf;

use serde::Deserialize;

use crate::client::filters::Filters;
use crate::coords::format::CoordinateSystem;
use crate::error::{Result, ViewerError};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>, // None - no timeout, like the browser client
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

#[derive(Deserialize, Debug, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_point_scale")]
    pub point_scale: f32, // catalogue -> world scaling
    #[serde(default = "default_min_point_radius")]
    pub min_point_radius: f64, // smallest drawn/picked radius in catalogue units
    #[serde(default)]
    pub coordinate_system: CoordinateSystem,
    #[serde(default)]
    pub relative_origin: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            point_scale: default_point_scale(),
            min_point_radius: default_min_point_radius(),
            coordinate_system: CoordinateSystem::Cartesian,
            relative_origin: false,
        }
    }
}

fn default_point_scale() -> f32 {
    5.0
}

fn default_min_point_radius() -> f64 {
    0.15
}

/// Which catalogue to open
#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(tag = "kind")]
pub enum SourceConfig {
    #[serde(rename = "file")]
    File { path: PathBuf },

    #[serde(rename = "demo")] // sample dataset bundled with the server
    Demo,

    #[default]
    #[serde(rename = "offline_demo")] // generated locally, no server needed
    OfflineDemo,
}

/// Top-level session configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ViewerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub source: SourceConfig,
}

impl ViewerConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: ViewerConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.display.point_scale > 0.0) {
            return Err(ViewerError::Config("display.point_scale must be positive".into()));
        }
        if self.display.min_point_radius < 0.0 {
            return Err(ViewerError::Config("display.min_point_radius must not be negative".into()));
        }
        if !self.server.base_url.starts_with("http://") && !self.server.base_url.starts_with("https://") {
            return Err(ViewerError::Config(format!(
                "server.base_url must be an http(s) URL, got {}",
                self.server.base_url
            )));
        }
        Ok(())
    }
}
