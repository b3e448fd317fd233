//! Offline demo catalog
//!
//! A "string of pearls" filament: host groups strung along a sine curve
//! through a 100-unit box, each with a shell of satellites, plus a sparse
//! background of field halos. Everything is deterministic (hash of the row
//! index), no rand needed, so the same catalog comes out every run.

use std::f64::consts::PI;

use crate::catalog::halo::{Catalog, Halo, NVec3};
use crate::error::Result;

pub const DEMO_GROUPS: usize = 25;
pub const DEMO_FIELD_HALOS: usize = 500;

/// Deterministic value in [0, 1) from a seed pair
fn unit(i: usize, salt: f64) -> f64 {
    let v = ((i as f64) * 12.9898 + salt * 78.233).sin() * 43758.5453;
    v - v.floor()
}

fn uniform(i: usize, salt: f64, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * unit(i, salt)
}

/// Build the demo catalog. `groups` hosts, `field` background halos.
pub fn string_of_pearls(groups: usize, field: usize) -> Result<Catalog> {
    let mut halos = Vec::new();
    let mut next_id: i64 = 1;

    for g in 0..groups {
        let t = if groups > 1 { g as f64 / (groups - 1) as f64 } else { 0.5 };
        let x = 10.0 + 80.0 * t;
        let y = 50.0 + 20.0 * ((x / 100.0) * 2.0 * PI).sin();
        let z = 50.0 + uniform(g, 1.0, -5.0, 5.0);
        let host_pos = NVec3::new(x, y, z);

        let host_mass = 10f64.powf(uniform(g, 2.0, 13.0, 14.5));
        let host_rvir = (host_mass / 1e15).powf(1.0 / 3.0) * 8.0 * 2.5;

        let host_id = next_id;
        halos.push(Halo {
            id: host_id,
            mass: host_mass,
            position: host_pos,
            radius: Some(host_rvir),
            parent_id: None,
        });
        next_id += 1;

        // 15..=30 satellites in a shell between 0.3 and 1.0 r_vir
        let n_sats = 15 + (unit(g, 3.0) * 16.0) as usize;
        for s in 0..n_sats {
            let k = g * 64 + s;
            let theta = uniform(k, 4.0, 0.0, 2.0 * PI);
            let phi = uniform(k, 5.0, 0.0, PI);
            let r = uniform(k, 6.0, 0.3 * host_rvir, host_rvir);
            let offset = NVec3::new(
                r * phi.sin() * theta.cos(),
                r * phi.sin() * theta.sin(),
                r * phi.cos(),
            );

            let mass = 10f64.powf(uniform(k, 7.0, 11.0, 12.0));
            halos.push(Halo {
                id: next_id,
                mass,
                position: host_pos + offset,
                radius: Some((mass / 1e15).powf(1.0 / 3.0) * 5.0),
                parent_id: Some(host_id),
            });
            next_id += 1;
        }
    }

    for f in 0..field {
        let position = NVec3::new(
            uniform(f, 8.0, 0.0, 100.0),
            uniform(f, 9.0, 0.0, 100.0),
            uniform(f, 10.0, 0.0, 100.0),
        );
        let mass = 10f64.powf(uniform(f, 11.0, 10.0, 12.0));
        halos.push(Halo {
            id: next_id,
            mass,
            position,
            radius: Some((mass / 1e15).powf(1.0 / 3.0) * 5.0),
            parent_id: None,
        });
        next_id += 1;
    }

    Catalog::from_halos(halos)
}

/// The default demo: 25 groups and 500 field halos
pub fn demo_catalog() -> Result<Catalog> {
    string_of_pearls(DEMO_GROUPS, DEMO_FIELD_HALOS)
}
