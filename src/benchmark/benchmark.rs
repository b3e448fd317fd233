use std::time::Instant;

use crate::catalog::halo::{Catalog, Halo, NVec3};
use crate::catalog::index::SpatialIndex;
use crate::selection::connections::{connection_segments, connection_segments_by_scan};

/// Helper to build a two-level catalog of size `n`: every 20th halo is a
/// host, the rest are its satellites
fn make_catalog(n: usize) -> Catalog {
    let mut halos = Vec::with_capacity(n);
    let mut host = 0;

    for i in 0..n {
        let i_f = i as f64;
        // deterministic positions, no rand needed
        let position = NVec3::new(
            (i_f * 0.37).sin() * 50.0,
            (i_f * 0.13).cos() * 50.0,
            (i_f * 0.07).sin() * 50.0,
        );
        let parent_id = if i % 20 == 0 {
            host = i as i64;
            None
        } else {
            Some(host)
        };

        halos.push(Halo {
            id: i as i64,
            mass: 1e10 + i_f,
            position,
            radius: None,
            parent_id,
        });
    }

    Catalog::from_halos(halos).expect("benchmark ids are unique")
}

pub fn bench_index_build() {
    let ns = [1_000, 10_000, 100_000, 1_000_000];

    for n in ns {
        let catalog = make_catalog(n);

        // Warm up
        let _ = SpatialIndex::build(&catalog.ids);

        let t0 = Instant::now();
        let index = SpatialIndex::build(&catalog.ids);
        let dt_build = t0.elapsed().as_secs_f64();

        let t1 = Instant::now();
        let mut found = 0;
        for id in &catalog.ids {
            if index.lookup(*id).is_some() {
                found += 1;
            }
        }
        let dt_lookup = t1.elapsed().as_secs_f64() / n as f64;

        println!("N = {n:8}, build = {dt_build:8.6} s, lookup = {:8.3} ns ({found} found)", dt_lookup * 1e9);
    }
}

/// Related-set geometry per selection: children index vs full column scan
/// Paste output directly into a spreadsheet to graph
pub fn bench_related_curve() {
    println!("N,index_us,scan_us");

    for n in (10_000..=1_000_000).step_by(90_000) {
        let catalog = make_catalog(n);
        // a host in the middle of the catalog
        let selected = (n / 2) / 20 * 20;
        let reps = if n <= 100_000 { 20 } else { 3 };

        let t0 = Instant::now();
        for _ in 0..reps {
            let _ = connection_segments(&catalog, selected);
        }
        let us_index = t0.elapsed().as_secs_f64() * 1e6 / reps as f64;

        let t1 = Instant::now();
        for _ in 0..reps {
            let _ = connection_segments_by_scan(&catalog, selected);
        }
        let us_scan = t1.elapsed().as_secs_f64() * 1e6 / reps as f64;

        println!("{},{:.3},{:.3}", n, us_index, us_scan);
    }
}
