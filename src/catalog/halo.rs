//! Core halo catalog types
//!
//! - `DataResponse` is the wire shape of `GET /data/{file_id}`: parallel
//!   columns of equal length
//! - `Halo` is one row, used where a single halo is handed around
//! - `Catalog` keeps the columns parallel (positions as `NVec3`) and owns
//!   the lookup indices rebuilt on every load

use std::collections::HashSet;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::catalog::index::{ChildIndex, SpatialIndex};
use crate::error::{Result, ViewerError};

pub type NVec3 = Vector3<f64>;

/// Parent id marking a root halo
pub const ROOT_PARENT: i64 = -1;

/// Column-oriented payload returned by the data endpoint
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DataResponse {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub mass: Vec<f64>,
    #[serde(default)]
    pub id: Option<Vec<i64>>,
    #[serde(default)]
    pub parent_id: Option<Vec<i64>>,
    #[serde(default)]
    pub radius: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Halo {
    pub id: i64,
    pub mass: f64,
    pub position: NVec3,
    pub radius: Option<f64>,
    pub parent_id: Option<i64>, // None for roots
}

/// A loaded catalog plus its lookup structures
///
/// Indices and the mass range are built in `from_halos` and never mutated
/// afterwards; a new load produces a new `Catalog`. A catalog may be empty
/// (a filter that matched nothing).
#[derive(Debug, Clone)]
pub struct Catalog {
    pub ids: Vec<i64>,
    pub positions: Vec<NVec3>,
    pub mass: Vec<f64>,
    pub radius: Option<Vec<f64>>,
    pub parent_ids: Option<Vec<i64>>,
    pub index: SpatialIndex,
    pub children: ChildIndex,
    mass_bounds: (f64, f64),
}

impl Catalog {
    pub fn from_response(resp: DataResponse) -> Result<Self> {
        let n = resp.x.len();
        if resp.y.len() != n || resp.z.len() != n || resp.mass.len() != n {
            return Err(ViewerError::Decode(format!(
                "column lengths differ: x={} y={} z={} mass={}",
                n,
                resp.y.len(),
                resp.z.len(),
                resp.mass.len()
            )));
        }
        check_len("id", resp.id.as_deref(), n)?;
        check_len("parent_id", resp.parent_id.as_deref(), n)?;
        check_len("radius", resp.radius.as_deref(), n)?;

        // Rows without an id column are identified by their offset
        let ids = resp.id.unwrap_or_else(|| (0..n as i64).collect());

        let halos = (0..n)
            .map(|i| Halo {
                id: ids[i],
                mass: resp.mass[i],
                position: NVec3::new(resp.x[i], resp.y[i], resp.z[i]),
                radius: resp.radius.as_ref().map(|r| r[i]),
                parent_id: resp.parent_id.as_ref().and_then(|p| normalize_parent(p[i])),
            })
            .collect::<Vec<_>>();

        let has_radius = resp.radius.is_some();
        let has_parents = resp.parent_id.is_some();
        Self::build(halos, has_radius, has_parents)
    }

    /// Build from rows. Radius/parent columns are kept only if some row has them.
    pub fn from_halos(halos: Vec<Halo>) -> Result<Self> {
        let has_radius = halos.iter().any(|h| h.radius.is_some());
        let has_parents = halos.iter().any(|h| h.parent_id.is_some());
        Self::build(halos, has_radius, has_parents)
    }

    fn build(halos: Vec<Halo>, has_radius: bool, has_parents: bool) -> Result<Self> {
        let mut seen = HashSet::with_capacity(halos.len());
        for h in &halos {
            if !seen.insert(h.id) {
                return Err(ViewerError::Validation(format!("duplicate halo id {}", h.id)));
            }
        }

        let ids: Vec<i64> = halos.iter().map(|h| h.id).collect();
        let positions = halos.iter().map(|h| h.position).collect();
        let mass: Vec<f64> = halos.iter().map(|h| h.mass).collect();
        let radius = has_radius.then(|| halos.iter().map(|h| h.radius.unwrap_or(0.0)).collect());
        let parent_ids: Option<Vec<i64>> =
            has_parents.then(|| halos.iter().map(|h| h.parent_id.unwrap_or(ROOT_PARENT)).collect());

        let index = SpatialIndex::build(&ids);
        let children = match &parent_ids {
            Some(p) => ChildIndex::build(p),
            None => ChildIndex::default(),
        };

        let mass_bounds = min_max(&mass);
        Ok(Self {
            ids,
            positions,
            mass,
            radius,
            parent_ids,
            index,
            children,
            mass_bounds,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Parent id of the halo at `index`, `None` for roots or catalogs without hierarchy
    pub fn parent_of(&self, index: usize) -> Option<i64> {
        self.parent_ids.as_ref().and_then(|p| normalize_parent(p[index]))
    }

    pub fn halo(&self, index: usize) -> Option<Halo> {
        if index >= self.len() {
            return None;
        }
        Some(Halo {
            id: self.ids[index],
            mass: self.mass[index],
            position: self.positions[index],
            radius: self.radius.as_ref().map(|r| r[index]),
            parent_id: self.parent_of(index),
        })
    }

    pub fn halo_by_id(&self, id: i64) -> Option<Halo> {
        self.index.lookup(id).and_then(|i| self.halo(i))
    }

    /// Bounding-box midpoint of all positions
    pub fn center(&self) -> NVec3 {
        let (min, max) = self.bounds();
        (min + max) * 0.5
    }

    /// Axis-aligned bounds (min, max) of all positions
    pub fn bounds(&self) -> (NVec3, NVec3) {
        let mut min = NVec3::repeat(f64::INFINITY);
        let mut max = NVec3::repeat(f64::NEG_INFINITY);
        for p in &self.positions {
            min = min.inf(p);
            max = max.sup(p);
        }
        if self.positions.is_empty() {
            return (NVec3::zeros(), NVec3::zeros());
        }
        (min, max)
    }

    /// Radius of the sphere around `center()` enclosing every halo
    pub fn bounding_radius(&self) -> f64 {
        let c = self.center();
        self.positions.iter().map(|p| (p - c).norm()).fold(0.0, f64::max)
    }

    /// (min, max) mass; empty catalogs yield (0, 0)
    pub fn mass_range(&self) -> (f64, f64) {
        self.mass_bounds
    }

    /// Mass of halo `index` mapped into [0, 1] across the catalog
    pub fn normalized_mass(&self, index: usize) -> f64 {
        let (min, max) = self.mass_bounds;
        let range = if max - min > 0.0 { max - min } else { 1.0 };
        (self.mass[index] - min) / range
    }

    pub fn total_mass(&self) -> f64 {
        self.mass.iter().sum()
    }
}

/// Negative parent ids mean "no parent"
pub fn normalize_parent(parent: i64) -> Option<i64> {
    if parent < 0 {
        None
    } else {
        Some(parent)
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

fn check_len<T>(name: &str, column: Option<&[T]>, n: usize) -> Result<()> {
    match column {
        Some(c) if c.len() != n => Err(ViewerError::Decode(format!(
            "column {name} has {} rows, expected {n}",
            c.len()
        ))),
        _ => Ok(()),
    }
}
