pub mod app;
pub mod benchmark;
pub mod catalog;
pub mod client;
pub mod configuration;
pub mod coords;
pub mod error;
pub mod hierarchy;
pub mod selection;
pub mod visualization;

pub use catalog::halo::{Catalog, DataResponse, Halo, NVec3};
pub use catalog::index::{ChildIndex, SpatialIndex};
pub use coords::format::{format_coordinates, CoordinateSettings, CoordinateSystem};
pub use selection::connections::{ConnectionView, Segment};
pub use selection::controller::{Emphasis, SelectionChange, SelectionController, SelectionState};
pub use hierarchy::tree::{HierarchyNode, HierarchyProvider, HierarchyTree};

pub use app::backend::Backend;
pub use app::commands::{Command, Task};
pub use app::state::AppState;
pub use client::api::{ApiClient, Source};
pub use client::filters::Filters;

pub use configuration::config::{DisplayConfig, ServerConfig, SourceConfig, ViewerConfig};
pub use error::{Result, ViewerError};

pub use visualization::viewer3d::{run_viewer, FilterPreset, SceneSettings};

pub use benchmark::benchmark::{bench_index_build, bench_related_curve};
