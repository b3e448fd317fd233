//! Coordinate formatting for halo positions
//!
//! Converts a Cartesian position into one of three textual representations,
//! optionally relative to a stored center:
//! - cartesian   `x, y, z`
//! - cylindrical `ρ, φ, z` with φ = atan2(y, x) in radians
//! - spherical   `r, θ, φ` with θ = acos(z / r) measured from +z
//!
//! All values are printed with two decimals.

use serde::{Deserialize, Serialize};

use crate::catalog::halo::NVec3;

/// Which coordinate system labels are shown in
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateSystem {
    #[default]
    #[serde(rename = "cartesian")]
    Cartesian,

    #[serde(rename = "cylindrical")]
    Cylindrical,

    #[serde(rename = "spherical")]
    Spherical,
}

impl CoordinateSystem {
    /// Cycle cartesian -> cylindrical -> spherical -> cartesian
    pub fn next(self) -> Self {
        match self {
            CoordinateSystem::Cartesian => CoordinateSystem::Cylindrical,
            CoordinateSystem::Cylindrical => CoordinateSystem::Spherical,
            CoordinateSystem::Spherical => CoordinateSystem::Cartesian,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CoordinateSystem::Cartesian => "cartesian",
            CoordinateSystem::Cylindrical => "cylindrical",
            CoordinateSystem::Spherical => "spherical",
        }
    }
}

/// Cylindrical components (rho, phi, z)
pub fn to_cylindrical(p: &NVec3) -> (f64, f64, f64) {
    let rho = (p.x * p.x + p.y * p.y).sqrt();
    let phi = p.y.atan2(p.x);
    (rho, phi, p.z)
}

/// Spherical components (r, theta, phi)
///
/// At the origin theta is 0 instead of acos(0/0).
pub fn to_spherical(p: &NVec3) -> (f64, f64, f64) {
    let r = p.norm();
    let theta = if r > 0.0 {
        (p.z / r).clamp(-1.0, 1.0).acos()
    } else {
        0.0
    };
    let phi = p.y.atan2(p.x);
    (r, theta, phi)
}

/// Format a position in the requested system, two decimals per component
pub fn format_coordinates(p: &NVec3, system: CoordinateSystem) -> String {
    match system {
        CoordinateSystem::Cartesian => format!("{:.2}, {:.2}, {:.2}", p.x, p.y, p.z),
        CoordinateSystem::Cylindrical => {
            let (rho, phi, z) = to_cylindrical(p);
            format!("ρ: {rho:.2}, φ: {phi:.2}, z: {z:.2}")
        }
        CoordinateSystem::Spherical => {
            let (r, theta, phi) = to_spherical(p);
            format!("r: {r:.2}, θ: {theta:.2}, φ: {phi:.2}")
        }
    }
}

/// Toggle state shared by every coordinate label in the viewer
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSettings {
    pub system: CoordinateSystem,
    pub relative_origin: bool, // subtract `center` before converting
    pub center: NVec3,         // stored center of the current catalog
}

impl Default for CoordinateSettings {
    fn default() -> Self {
        Self {
            system: CoordinateSystem::Cartesian,
            relative_origin: false,
            center: NVec3::zeros(),
        }
    }
}

impl CoordinateSettings {
    /// Position after applying the relative-origin offset, if enabled
    pub fn offset(&self, p: &NVec3) -> NVec3 {
        if self.relative_origin {
            p - self.center
        } else {
            *p
        }
    }

    pub fn format(&self, p: &NVec3) -> String {
        format_coordinates(&self.offset(p), self.system)
    }
}
