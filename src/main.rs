use haloview::catalog::demo::demo_catalog;
use haloview::{bench_index_build, bench_related_curve};
use haloview::{run_viewer, FilterPreset, SceneSettings};
use haloview::{ApiClient, AppState, Backend, CoordinateSettings, Source, SourceConfig, ViewerConfig};

use anyhow::{Context, Result};
use clap::Parser;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
struct Args {
    /// Session file, looked up in `configs/` unless it is a path that exists
    #[arg(short, long, default_value = "default.yaml")]
    config: String,

    /// Catalogue server URL, overrides `server.base_url`
    #[arg(long)]
    server: Option<String>,

    /// Upload this .hdf5/.h5/.csv file
    #[arg(long, conflicts_with_all = ["demo", "offline"])]
    file: Option<PathBuf>,

    /// Ask the server for its bundled sample dataset
    #[arg(long, conflicts_with = "offline")]
    demo: bool,

    /// Generate a demo catalogue locally, no server needed
    #[arg(long)]
    offline: bool,

    /// Run the index benchmarks instead of the viewer
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_config(args: &Args) -> Result<ViewerConfig> {
    let given = PathBuf::from(&args.config);
    let config_path = if given.exists() {
        given
    } else {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("configs").join(&args.config)
    };
    let text = fs::read_to_string(&config_path)
        .with_context(|| format!("failed to read config {}", config_path.display()))?;
    let mut cfg = ViewerConfig::from_yaml(&text)?;

    // CLI flags win over the file
    if let Some(server) = &args.server {
        cfg.server.base_url = server.clone();
    }
    if let Some(path) = &args.file {
        cfg.source = SourceConfig::File { path: path.clone() };
    } else if args.demo {
        cfg.source = SourceConfig::Demo;
    } else if args.offline {
        cfg.source = SourceConfig::OfflineDemo;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn build_backend(cfg: &ViewerConfig) -> Result<Backend> {
    let source = match &cfg.source {
        SourceConfig::OfflineDemo => {
            let catalog = demo_catalog()?;
            return Ok(Backend::Offline {
                catalog: Arc::new(catalog),
            });
        }
        SourceConfig::File { path } => Source::File(path.clone()),
        SourceConfig::Demo => Source::Demo,
    };
    let timeout = cfg.server.timeout_secs.map(Duration::from_secs);
    let client = ApiClient::new(&cfg.server.base_url, timeout)?;
    Ok(Backend::Remote { client, source })
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.bench {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
        bench_index_build();
        bench_related_curve();
        return Ok(());
    }

    let cfg = load_config(&args)?;
    let backend = build_backend(&cfg)?;

    let coords = CoordinateSettings {
        system: cfg.display.coordinate_system,
        relative_origin: cfg.display.relative_origin,
        ..Default::default()
    };
    let state = AppState::new(coords, cfg.filters.clone());
    let settings = SceneSettings {
        point_scale: cfg.display.point_scale,
        min_point_radius: cfg.display.min_point_radius,
    };

    run_viewer(state, backend, settings, FilterPreset(cfg.filters));

    Ok(())
}
