//! Summary statistics and the chart series derived from them
//!
//! The stats endpoint always describes the full file. When a filter is
//! active the particle count and total mass are overridden from the filtered
//! data so the panel matches what is on screen.
//!
//! Chart series follow the dashboard conventions:
//! - mass function and cumulative mass function on log10 axes, counts as
//!   log10(count + 1) so empty bins stay finite
//! - radius histogram on linear axes
//! - mass vs radius scatter, downsampled to roughly `SCATTER_LIMIT` points
//!
//! Optional inputs that are missing produce [`Chart::Placeholder`] rather than
//! an error.
//!
//! For offline catalogs the statistics are computed locally with the server's
//! binning: 24 log-spaced mass bins (20 linear bins if any mass is not
//! positive, with no cumulative function) and 19 linear radius bins.

use serde::{Deserialize, Serialize};

use crate::catalog::halo::Catalog;

/// Upper bound on scatter points before downsampling kicks in
pub const SCATTER_LIMIT: usize = 2000;

const MASS_EDGES: usize = 25;
const LINEAR_MASS_EDGES: usize = 21;
const RADIUS_EDGES: usize = 20;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Histogram {
    #[serde(default)]
    pub bin_centers: Vec<f64>,
    #[serde(default)]
    pub counts: Vec<f64>,
}

impl Histogram {
    /// Usable only if both columns are present, non-empty and aligned
    pub fn is_complete(&self) -> bool {
        !self.bin_centers.is_empty() && self.bin_centers.len() == self.counts.len()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StatsResponse {
    #[serde(default)]
    pub mass_function: Option<Histogram>,
    #[serde(default)]
    pub cumulative_mass_function: Option<Histogram>,
    #[serde(default)]
    pub radius_histogram: Option<Histogram>,
    #[serde(default)]
    pub total_particles: u64,
    #[serde(default)]
    pub total_mass: f64,
}

impl StatsResponse {
    /// Statistics of an in-memory catalog
    pub fn compute(catalog: &Catalog) -> Self {
        let mut stats = StatsResponse {
            total_particles: catalog.len() as u64,
            total_mass: catalog.total_mass(),
            ..Default::default()
        };
        if catalog.is_empty() {
            return stats;
        }

        let (min, max) = catalog.mass_range();
        if min > 0.0 {
            let (lo, hi) = (min.log10(), max.log10());
            let mut edges: Vec<f64> = linspace(lo, hi, MASS_EDGES)
                .into_iter()
                .map(|e| 10f64.powf(e))
                .collect();
            // pin the outer edges so round-off cannot drop the extremes
            edges[0] = min;
            edges[MASS_EDGES - 1] = max;
            let counts = histogram(&catalog.mass, &edges);
            let bin_centers: Vec<f64> = edges
                .windows(2)
                .map(|w| 10f64.powf((w[0].log10() + w[1].log10()) / 2.0))
                .collect();

            let mut cumulative = counts.clone();
            for i in (0..cumulative.len().saturating_sub(1)).rev() {
                cumulative[i] += cumulative[i + 1];
            }

            stats.cumulative_mass_function = Some(Histogram {
                bin_centers: bin_centers.clone(),
                counts: cumulative,
            });
            stats.mass_function = Some(Histogram { bin_centers, counts });
        } else {
            let edges = linspace(min, max, LINEAR_MASS_EDGES);
            stats.mass_function = Some(Histogram {
                counts: histogram(&catalog.mass, &edges),
                bin_centers: midpoints(&edges),
            });
        }

        if let Some(radius) = &catalog.radius {
            let r_min = radius.iter().cloned().fold(f64::INFINITY, f64::min);
            let r_max = radius.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            if r_max > r_min {
                let edges = linspace(r_min, r_max, RADIUS_EDGES);
                stats.radius_histogram = Some(Histogram {
                    counts: histogram(radius, &edges),
                    bin_centers: midpoints(&edges),
                });
            }
        }
        stats
    }

    /// Replace totals with those of the filtered subset
    pub fn with_subset(mut self, subset: &Catalog) -> Self {
        self.total_particles = subset.len() as u64;
        self.total_mass = subset.total_mass();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    Ready(Series),
    Placeholder(&'static str),
}

impl Chart {
    pub fn is_ready(&self) -> bool {
        matches!(self, Chart::Ready(_))
    }
}

/// Everything the statistics panel shows
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSet {
    pub mass_function: Chart,
    pub cumulative_mass_function: Chart,
    pub radius_histogram: Chart,
    pub mass_radius: Chart,
    pub total_particles: u64,
    pub total_mass: f64,
}

impl ChartSet {
    pub fn build(stats: &StatsResponse, data: &Catalog) -> Self {
        Self {
            mass_function: log_log(stats.mass_function.as_ref()),
            cumulative_mass_function: log_log(stats.cumulative_mass_function.as_ref()),
            radius_histogram: match &stats.radius_histogram {
                Some(h) if h.is_complete() => Chart::Ready(Series {
                    x: h.bin_centers.clone(),
                    y: h.counts.clone(),
                }),
                _ => Chart::Placeholder("No Data"),
            },
            mass_radius: mass_radius(data),
            total_particles: stats.total_particles,
            total_mass: stats.total_mass,
        }
    }
}

fn log_log(hist: Option<&Histogram>) -> Chart {
    match hist {
        Some(h) if h.is_complete() => Chart::Ready(Series {
            x: h.bin_centers.iter().map(|m| m.log10()).collect(),
            y: h.counts.iter().map(|c| (c + 1.0).log10()).collect(),
        }),
        _ => Chart::Placeholder("No Data"),
    }
}

fn mass_radius(data: &Catalog) -> Chart {
    let Some(radius) = &data.radius else {
        return Chart::Placeholder("No Radius Data");
    };
    let n = radius.len();
    let step = if n > SCATTER_LIMIT { n / SCATTER_LIMIT } else { 1 };

    let (x, y) = (0..n)
        .step_by(step)
        .map(|i| (radius[i], data.mass[i].log10()))
        .unzip();
    Chart::Ready(Series { x, y })
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![lo];
    }
    let step = (hi - lo) / (n - 1) as f64;
    let mut out: Vec<f64> = (0..n).map(|i| lo + step * i as f64).collect();
    out[n - 1] = hi;
    out
}

fn midpoints(edges: &[f64]) -> Vec<f64> {
    edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
}

/// Counts per bin; the last bin is closed on the right. Values outside the
/// edges are dropped. Identical edges put everything in the last bin.
fn histogram(values: &[f64], edges: &[f64]) -> Vec<f64> {
    let bins = edges.len().saturating_sub(1);
    let mut counts = vec![0.0; bins];
    if bins == 0 {
        return counts;
    }
    let (lo, hi) = (edges[0], edges[bins]);
    for v in values {
        if *v < lo || *v > hi {
            continue;
        }
        // first edge strictly greater than v, minus one
        let bin = edges.partition_point(|e| e <= v).saturating_sub(1).min(bins - 1);
        counts[bin] += 1.0;
    }
    counts
}
