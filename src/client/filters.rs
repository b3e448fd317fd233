//! Data filters as collected from the user
//!
//! Mass bounds are entered as log10(M) and sent linear; spatial bounds are
//! sent as given. Unset bounds are left out of the query entirely.
//!
//! The same bounds can be applied locally to an in-memory catalog (offline
//! mode), with the server's semantics: inclusive on both ends, radius bounds
//! ignored when the catalog has no radius column.

use serde::Deserialize;

use crate::catalog::halo::Catalog;
use crate::error::Result;

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Filters {
    #[serde(default)]
    pub log_min_mass: Option<f64>,
    #[serde(default)]
    pub log_max_mass: Option<f64>,
    #[serde(default)]
    pub min_radius: Option<f64>,
    #[serde(default)]
    pub max_radius: Option<f64>,
    #[serde(default)]
    pub x_min: Option<f64>,
    #[serde(default)]
    pub x_max: Option<f64>,
    #[serde(default)]
    pub y_min: Option<f64>,
    #[serde(default)]
    pub y_max: Option<f64>,
    #[serde(default)]
    pub z_min: Option<f64>,
    #[serde(default)]
    pub z_max: Option<f64>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.query_pairs().is_empty()
    }

    /// (name, value) pairs in the order the server documents them
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let mut push = |name: &'static str, value: Option<f64>| {
            if let Some(v) = value.filter(|v| !v.is_nan()) {
                pairs.push((name, v.to_string()));
            }
        };

        push("min_mass", self.log_min_mass.map(|m| 10f64.powf(m)));
        push("max_mass", self.log_max_mass.map(|m| 10f64.powf(m)));
        push("min_radius", self.min_radius);
        push("max_radius", self.max_radius);
        push("x_min", self.x_min);
        push("x_max", self.x_max);
        push("y_min", self.y_min);
        push("y_max", self.y_max);
        push("z_min", self.z_min);
        push("z_max", self.z_max);
        pairs
    }

    /// Keep the halos of `catalog` inside every bound
    pub fn apply(&self, catalog: &Catalog) -> Result<Catalog> {
        let min_mass = self.log_min_mass.map(|m| 10f64.powf(m));
        let max_mass = self.log_max_mass.map(|m| 10f64.powf(m));
        let within = |v: f64, lo: Option<f64>, hi: Option<f64>| {
            lo.map_or(true, |lo| v >= lo) && hi.map_or(true, |hi| v <= hi)
        };

        let halos = (0..catalog.len())
            .filter_map(|i| catalog.halo(i))
            .filter(|h| within(h.mass, min_mass, max_mass))
            .filter(|h| {
                h.radius
                    .map_or(true, |r| within(r, self.min_radius, self.max_radius))
            })
            .filter(|h| {
                within(h.position.x, self.x_min, self.x_max)
                    && within(h.position.y, self.y_min, self.y_max)
                    && within(h.position.z, self.z_min, self.z_max)
            })
            .collect();
        Catalog::from_halos(halos)
    }
}
