use std::cell::Cell;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

use haloview::app::backend::load_offline;
use haloview::catalog::demo::{demo_catalog, string_of_pearls};
use haloview::catalog::halo::{Catalog, DataResponse, Halo, NVec3};
use haloview::catalog::index::{children_by_scan, ChildIndex, SpatialIndex};
use haloview::catalog::schema::{detect_schema, DatasetInfo, ScanResponse, SchemaMapping};
use haloview::catalog::stats::{Chart, ChartSet, Histogram, StatsResponse, SCATTER_LIMIT};
use haloview::client::api::{check_extension, is_hierarchical, LoadedCatalog};
use haloview::client::filters::Filters;
use haloview::client::requests::{drain_finished, PendingRequest, RequestTracker};
use haloview::coords::format::{format_coordinates, to_cylindrical, to_spherical, CoordinateSettings, CoordinateSystem};
use haloview::hierarchy::tree::{format_mass, ExpandRequest, HierarchyNode, HierarchyProvider, HierarchyTree};
use haloview::selection::connections::{connection_segments, connection_segments_by_scan, ConnectionView};
use haloview::selection::controller::{Emphasis, SelectionChange, SelectionController, SelectionState};
use haloview::selection::picking::{pick_nearest, PickRay};
use haloview::visualization::viewer3d::{mass_tier, MASS_TIERS};
use haloview::{AppState, Command, Result, SourceConfig, Task, ViewerConfig, ViewerError};

/// Build a halo row
pub fn halo(id: i64, parent: Option<i64>, mass: f64, pos: [f64; 3]) -> Halo {
    Halo {
        id,
        mass,
        position: NVec3::new(pos[0], pos[1], pos[2]),
        radius: None,
        parent_id: parent,
    }
}

/// Host 1 at the origin with one satellite 2 at x = 10
pub fn two_halo_catalog() -> Catalog {
    Catalog::from_halos(vec![
        halo(1, None, 1e10, [0.0, 0.0, 0.0]),
        halo(2, Some(1), 1e9, [10.0, 0.0, 0.0]),
    ])
    .unwrap()
}

/// Two hosts (10, 20), each with two satellites, plus a lone field halo 30
pub fn two_family_catalog() -> Catalog {
    Catalog::from_halos(vec![
        halo(10, None, 5e12, [0.0, 0.0, 0.0]),
        halo(11, Some(10), 1e11, [1.0, 0.0, 0.0]),
        halo(12, Some(10), 2e11, [0.0, 1.0, 0.0]),
        halo(20, None, 4e12, [50.0, 0.0, 0.0]),
        halo(21, Some(20), 1e11, [51.0, 0.0, 0.0]),
        halo(22, Some(20), 3e11, [50.0, 1.0, 0.0]),
        halo(30, None, 1e10, [-40.0, -40.0, -40.0]),
    ])
    .unwrap()
}

/// Hierarchy provider that counts how often it is asked
pub struct CountingProvider {
    pub catalog: Catalog,
    pub calls: Cell<usize>,
}

impl HierarchyProvider for CountingProvider {
    fn fetch_children(&self, root: Option<i64>) -> Result<Vec<HierarchyNode>> {
        self.calls.set(self.calls.get() + 1);
        self.catalog.fetch_children(root)
    }
}

/// Wait for a background request, failing the test after a few seconds
pub fn wait_for<T: Send + 'static>(req: &PendingRequest<T>) -> T {
    let start = Instant::now();
    loop {
        if let Some(v) = req.try_take() {
            return v;
        }
        assert!(start.elapsed() < Duration::from_secs(5), "background request never finished");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn unordered_endpoints(a: (NVec3, NVec3), b: (NVec3, NVec3)) -> bool {
    (a.0 == b.0 && a.1 == b.1) || (a.0 == b.1 && a.1 == b.0)
}

// ==================================================================================
// Coordinate formatter tests
// ==================================================================================

#[test]
fn cartesian_reproduces_components_to_two_decimals() {
    let p = NVec3::new(1.234, -5.678, 9.0);
    assert_eq!(format_coordinates(&p, CoordinateSystem::Cartesian), "1.23, -5.68, 9.00");

    for h in &demo_catalog().unwrap().positions {
        let text = format_coordinates(h, CoordinateSystem::Cartesian);
        let parts: Vec<f64> = text.split(", ").map(|s| s.parse().unwrap()).collect();
        assert!((parts[0] - h.x).abs() <= 0.005 + 1e-9);
        assert!((parts[1] - h.y).abs() <= 0.005 + 1e-9);
        assert!((parts[2] - h.z).abs() <= 0.005 + 1e-9);
    }
}

#[test]
fn cylindrical_round_trips_x_and_y() {
    let points = [
        NVec3::new(3.0, 4.0, 1.0),
        NVec3::new(-2.5, 0.5, 0.0),
        NVec3::new(-1.0, -1.0, -7.0),
        NVec3::new(0.0, -3.0, 2.0),
        NVec3::new(-4.0, 0.0, 0.0), // phi = pi
    ];
    for p in points {
        let (rho, phi, z) = to_cylindrical(&p);
        assert!(phi > -PI && phi <= PI, "phi {phi} outside (-pi, pi]");
        assert!((rho * phi.cos() - p.x).abs() < 1e-9);
        assert!((rho * phi.sin() - p.y).abs() < 1e-9);
        assert_eq!(z, p.z);
    }
}

#[test]
fn spherical_formats_known_point() {
    let p = NVec3::new(0.0, 0.0, 2.0);
    assert_eq!(format_coordinates(&p, CoordinateSystem::Spherical), "r: 2.00, θ: 0.00, φ: 0.00");

    let (r, theta, phi) = to_spherical(&NVec3::new(1.0, 1.0, 0.0));
    assert!((r - 2f64.sqrt()).abs() < 1e-12);
    assert!((theta - PI / 2.0).abs() < 1e-12);
    assert!((phi - PI / 4.0).abs() < 1e-12);
}

#[test]
fn spherical_at_origin_is_finite() {
    let (r, theta, phi) = to_spherical(&NVec3::zeros());
    assert_eq!((r, theta, phi), (0.0, 0.0, 0.0));
    let text = format_coordinates(&NVec3::zeros(), CoordinateSystem::Spherical);
    assert!(!text.contains("NaN"), "got {text}");
}

#[test]
fn relative_origin_subtracts_center() {
    let mut settings = CoordinateSettings {
        center: NVec3::new(5.0, 5.0, 5.0),
        ..Default::default()
    };
    let p = NVec3::new(6.0, 7.0, 8.0);
    assert_eq!(settings.format(&p), "6.00, 7.00, 8.00");

    settings.relative_origin = true;
    assert_eq!(settings.format(&p), "1.00, 2.00, 3.00");
}

#[test]
fn coordinate_system_cycles_and_parses() {
    let s = CoordinateSystem::Cartesian;
    assert_eq!(s.next(), CoordinateSystem::Cylindrical);
    assert_eq!(s.next().next(), CoordinateSystem::Spherical);
    assert_eq!(s.next().next().next(), CoordinateSystem::Cartesian);

    let parsed: CoordinateSystem = serde_yaml::from_str("\"spherical\"").unwrap();
    assert_eq!(parsed, CoordinateSystem::Spherical);
}

// ==================================================================================
// Catalog and index tests
// ==================================================================================

#[test]
fn spatial_index_finds_every_id() {
    let catalog = demo_catalog().unwrap();
    let index = SpatialIndex::build(&catalog.ids);
    assert_eq!(index.len(), catalog.len());
    for (i, id) in catalog.ids.iter().enumerate() {
        assert_eq!(index.lookup(*id), Some(i));
    }
    assert_eq!(index.lookup(-42), None);
    assert_eq!(index.lookup(1_000_000), None);
}

#[test]
fn spatial_index_rebuild_replaces_mapping() {
    let mut index = SpatialIndex::build(&[7, 8, 9]);
    index.rebuild(&[100, 7]);
    assert_eq!(index.lookup(7), Some(1));
    assert_eq!(index.lookup(8), None);
    assert_eq!(index.len(), 2);
}

#[test]
fn child_index_agrees_with_column_scan() {
    let catalog = demo_catalog().unwrap();
    let parents = catalog.parent_ids.as_ref().unwrap();
    let children = ChildIndex::build(parents);
    for id in &catalog.ids {
        assert_eq!(children.children_of(*id), children_by_scan(parents, *id).as_slice());
    }
}

#[test]
fn catalog_from_response_normalizes_columns() {
    let resp = DataResponse {
        x: vec![0.0, 1.0, 2.0],
        y: vec![0.0, 0.0, 0.0],
        z: vec![0.0, 0.0, 0.0],
        mass: vec![1e12, 1e11, 1e10],
        id: None,
        parent_id: Some(vec![-1, 0, 0]),
        radius: None,
    };
    let catalog = Catalog::from_response(resp).unwrap();
    assert_eq!(catalog.ids, vec![0, 1, 2]);
    assert_eq!(catalog.parent_of(0), None);
    assert_eq!(catalog.parent_of(1), Some(0));
    assert!(catalog.radius.is_none());
    assert_eq!(catalog.children.children_of(0), &[1, 2]);
}

#[test]
fn catalog_rejects_bad_columns() {
    let uneven = DataResponse {
        x: vec![0.0, 1.0],
        y: vec![0.0],
        z: vec![0.0, 1.0],
        mass: vec![1.0, 1.0],
        ..Default::default()
    };
    assert!(matches!(Catalog::from_response(uneven), Err(ViewerError::Decode(_))));

    // an unfiltered load with no rows has nothing to show
    assert!(matches!(
        LoadedCatalog::combine(None, DataResponse::default(), StatsResponse::default(), false),
        Err(ViewerError::DataAbsence(_))
    ));

    let dup = Catalog::from_halos(vec![halo(1, None, 1.0, [0.0; 3]), halo(1, None, 2.0, [1.0; 3])]);
    assert!(matches!(dup, Err(ViewerError::Validation(_))));
}

#[test]
fn mass_range_is_computed_once_per_catalog() {
    let n = 200_000;
    let halos: Vec<Halo> = (0..n)
        .map(|i| halo(i, None, 1e10 + i as f64 * 1e6, [i as f64, 0.0, 0.0]))
        .collect();
    let catalog = Catalog::from_halos(halos).unwrap();
    assert_eq!(catalog.mass_range(), (1e10, 1e10 + (n - 1) as f64 * 1e6));

    // one colour pass over the whole catalog, as the viewer does per selection
    let start = Instant::now();
    let total: f64 = (0..catalog.len()).map(|i| catalog.normalized_mass(i)).sum();
    assert!(start.elapsed() < Duration::from_secs(2), "colour pass took {:?}", start.elapsed());
    assert_eq!(catalog.normalized_mass(0), 0.0);
    assert_eq!(catalog.normalized_mass(catalog.len() - 1), 1.0);
    assert!(total > 0.0);
}

#[test]
fn mass_tiers_cover_the_heat_map() {
    assert_eq!(mass_tier(0.0, MASS_TIERS), 0);
    assert_eq!(mass_tier(1.0, MASS_TIERS), MASS_TIERS - 1);
    assert_eq!(mass_tier(0.5, 3), 1);
    assert_eq!(mass_tier(1.7, MASS_TIERS), MASS_TIERS - 1);
    assert_eq!(mass_tier(-0.2, MASS_TIERS), 0);
}

#[test]
fn data_response_parses_from_json() {
    let json = r#"{"x":[1.0,2.0],"y":[3.0,4.0],"z":[5.0,6.0],"mass":[1e10,2e10],
                   "id":[7,8],"parent_id":[-1,7],"radius":null}"#;
    let resp: DataResponse = serde_json::from_str(json).unwrap();
    let catalog = Catalog::from_response(resp).unwrap();
    assert_eq!(catalog.halo_by_id(8).unwrap().parent_id, Some(7));
    assert_eq!(catalog.halo_by_id(8).unwrap().position, NVec3::new(2.0, 4.0, 6.0));
    assert!(catalog.radius.is_none());
}

#[test]
fn catalog_center_is_bounding_box_midpoint() {
    let catalog = two_halo_catalog();
    assert_eq!(catalog.center(), NVec3::new(5.0, 0.0, 0.0));
    assert!((catalog.bounding_radius() - 5.0).abs() < 1e-12);
    assert_eq!(catalog.normalized_mass(0), 1.0);
    assert_eq!(catalog.normalized_mass(1), 0.0);
}

#[test]
fn demo_catalog_has_hosts_with_satellites() {
    let catalog = string_of_pearls(3, 10).unwrap();
    let hosts: Vec<i64> = (0..catalog.len())
        .filter(|i| catalog.children.has_children(catalog.ids[*i]))
        .map(|i| catalog.ids[i])
        .collect();
    assert_eq!(hosts.len(), 3);
    for host in hosts {
        let n = catalog.children.children_of(host).len();
        assert!((15..=30).contains(&n), "host {host} has {n} satellites");
    }
    assert!(catalog.radius.is_some());
}

// ==================================================================================
// Selection controller tests
// ==================================================================================

#[test]
fn selecting_satellite_relates_its_host() {
    let catalog = two_halo_catalog();
    let mut ctl = SelectionController::new();

    let change = ctl.select_id(&catalog, 2);
    assert!(matches!(change, SelectionChange::Selected(_)));
    assert_eq!(ctl.selected_id(), Some(2));
    assert_eq!(ctl.related_ids(), &[1]);
    assert_eq!(ctl.emphasis(1), Emphasis::Primary);
    assert_eq!(ctl.emphasis(0), Emphasis::Related);

    ctl.select_id(&catalog, 1);
    assert_eq!(ctl.selected_id(), Some(1));
    assert_eq!(ctl.related_ids(), &[2]);
}

#[test]
fn second_selection_replaces_first_relatives() {
    let catalog = two_family_catalog();
    let mut ctl = SelectionController::new();

    ctl.select_id(&catalog, 10);
    assert_eq!(ctl.related_ids(), &[11, 12]);

    ctl.select_id(&catalog, 20);
    assert_eq!(ctl.selected_id(), Some(20));
    assert_eq!(ctl.related_ids(), &[21, 22]);
    for id in [10, 11, 12] {
        let i = catalog.index.lookup(id).unwrap();
        assert_eq!(ctl.emphasis(i), Emphasis::None, "halo {id} still emphasised");
    }
}

#[test]
fn unknown_id_keeps_prior_selection() {
    let catalog = two_halo_catalog();
    let mut ctl = SelectionController::new();
    ctl.select_id(&catalog, 1);

    assert_eq!(ctl.select_id(&catalog, 99), SelectionChange::Unchanged);
    assert_eq!(ctl.selected_id(), Some(1));
    assert_eq!(ctl.related_ids(), &[2]);
}

#[test]
fn empty_space_pick_returns_to_idle() {
    let catalog = two_halo_catalog();
    let mut ctl = SelectionController::new();
    ctl.pick(&catalog, Some(0));

    assert_eq!(ctl.pick(&catalog, None), SelectionChange::Cleared);
    assert_eq!(ctl.state(), &SelectionState::Idle);
    assert!(ctl.related_ids().is_empty());
    assert_eq!(ctl.emphasis(0), Emphasis::None);

    // clearing twice is a no-op
    assert_eq!(ctl.pick(&catalog, None), SelectionChange::Unchanged);
}

#[test]
fn parent_missing_from_catalog_is_not_related() {
    // a filtered subset can keep a satellite whose host was cut
    let catalog = Catalog::from_halos(vec![halo(5, Some(4), 1e10, [0.0; 3])]).unwrap();
    let mut ctl = SelectionController::new();
    ctl.select_id(&catalog, 5);
    assert!(ctl.related_ids().is_empty());
}

// ==================================================================================
// Connection renderer tests
// ==================================================================================

#[test]
fn connections_link_satellite_and_host() {
    let catalog = two_halo_catalog();
    let expected = (NVec3::new(10.0, 0.0, 0.0), NVec3::new(0.0, 0.0, 0.0));

    let from_sat = connection_segments(&catalog, 1);
    assert_eq!(from_sat.len(), 1);
    assert_eq!((from_sat[0].start, from_sat[0].end), expected);

    let from_host = connection_segments(&catalog, 0);
    assert_eq!(from_host.len(), 1);
    assert!(unordered_endpoints((from_host[0].start, from_host[0].end), expected));
}

#[test]
fn isolated_halo_hides_connections() {
    let catalog = two_family_catalog();
    let lone = catalog.index.lookup(30).unwrap();

    let mut view = ConnectionView::default();
    view.update(&catalog, catalog.index.lookup(10).unwrap());
    assert!(view.is_visible());

    view.update(&catalog, lone);
    assert!(view.segments().is_empty());
    assert!(!view.is_visible());
    assert_eq!(view.bounds(), None);
}

#[test]
fn connection_bounds_cover_all_segments() {
    let catalog = two_family_catalog();
    let mut view = ConnectionView::default();
    view.update(&catalog, catalog.index.lookup(10).unwrap());

    assert_eq!(view.segments().len(), 2);
    let (min, max) = view.bounds().unwrap();
    assert_eq!(min, NVec3::new(0.0, 0.0, 0.0));
    assert_eq!(max, NVec3::new(1.0, 1.0, 0.0));

    view.hide();
    assert!(!view.is_visible());
}

#[test]
fn indexed_and_scanned_connections_match() {
    let catalog = demo_catalog().unwrap();
    for i in (0..catalog.len()).step_by(37) {
        assert_eq!(connection_segments(&catalog, i), connection_segments_by_scan(&catalog, i));
    }
}

// ==================================================================================
// Picking tests
// ==================================================================================

#[test]
fn pick_resolves_to_nearest_along_ray() {
    let ray = PickRay::new(NVec3::new(0.0, 0.0, 10.0), NVec3::new(0.0, 0.0, -3.0)).unwrap();
    let far_first = [NVec3::new(0.0, 0.0, -10.0), NVec3::new(0.0, 0.0, 0.0)];
    assert_eq!(pick_nearest(&ray, &far_first, |_| 1.0), Some(1));

    let near_first = [NVec3::new(0.0, 0.0, 0.0), NVec3::new(0.0, 0.0, -10.0)];
    assert_eq!(pick_nearest(&ray, &near_first, |_| 1.0), Some(0));
}

#[test]
fn pick_misses_and_ignores_points_behind() {
    let ray = PickRay::new(NVec3::new(0.0, 5.0, 0.0), NVec3::new(1.0, 0.0, 0.0)).unwrap();
    let points = [NVec3::new(0.0, 0.0, 0.0), NVec3::new(-5.0, 5.0, 0.0)];
    assert_eq!(pick_nearest(&ray, &points, |_| 1.0), None);

    assert!(PickRay::new(NVec3::zeros(), NVec3::zeros()).is_none());
}

// ==================================================================================
// Hierarchy tree tests
// ==================================================================================

#[test]
fn tree_fetches_children_once() {
    let provider = CountingProvider {
        catalog: two_family_catalog(),
        calls: Cell::new(0),
    };
    let settings = CoordinateSettings::default();
    let mut tree = HierarchyTree::new();

    tree.load_roots_with(&provider, &settings).unwrap();
    assert_eq!(provider.calls.get(), 1);
    // roots sorted heaviest first
    let roots: Vec<i64> = tree.visible_nodes().iter().map(|(_, e)| e.node.id).collect();
    assert_eq!(roots, vec![10, 20, 30]);

    assert_eq!(tree.expand_with(&provider, 10, &settings).unwrap(), ExpandRequest::Fetch(10));
    assert_eq!(provider.calls.get(), 2);

    tree.collapse(10);
    assert_eq!(tree.expand_with(&provider, 10, &settings).unwrap(), ExpandRequest::Cached);
    assert_eq!(provider.calls.get(), 2);

    assert_eq!(tree.expand_with(&provider, 30, &settings).unwrap(), ExpandRequest::Leaf);
    assert_eq!(tree.expand(999), ExpandRequest::Unknown);
    assert_eq!(provider.calls.get(), 2);

    let visible: Vec<(usize, i64)> = tree.visible_nodes().iter().map(|(d, e)| (*d, e.node.id)).collect();
    assert_eq!(visible, vec![(0, 10), (1, 12), (1, 11), (0, 20), (0, 30)]);
}

#[test]
fn tree_labels_show_id_mass_and_coordinates() {
    let catalog = two_halo_catalog();
    let mut tree = HierarchyTree::new();
    tree.load_roots_with(&catalog, &CoordinateSettings::default()).unwrap();

    assert_eq!(tree.label(1).unwrap(), "#1 | M = 1.0e+10 | 0.00, 0.00, 0.00");
    assert_eq!(format_mass(1.5e-3), "1.5e-3");
    assert_eq!(format_mass(2.34e12), "2.3e+12");
}

#[test]
fn coordinate_toggle_relabels_expanded_nodes_relative_to_center() {
    let catalog = two_halo_catalog();
    let mut settings = CoordinateSettings {
        center: catalog.center(),
        ..Default::default()
    };
    let mut tree = HierarchyTree::new();
    tree.load_roots_with(&catalog, &settings).unwrap();
    tree.expand_with(&catalog, 1, &settings).unwrap();

    settings.system = CoordinateSystem::Spherical;
    settings.relative_origin = true;
    assert_eq!(tree.refresh_labels(&settings), 2);

    // (0,0,0) - (5,0,0) and (10,0,0) - (5,0,0)
    assert!(tree.label(1).unwrap().ends_with("r: 5.00, θ: 1.57, φ: 3.14"), "{}", tree.label(1).unwrap());
    assert!(tree.label(2).unwrap().ends_with("r: 5.00, θ: 1.57, φ: 0.00"), "{}", tree.label(2).unwrap());
}

#[test]
fn hidden_nodes_are_not_relabelled() {
    let catalog = two_halo_catalog();
    let mut settings = CoordinateSettings::default();
    let mut tree = HierarchyTree::new();
    tree.load_roots_with(&catalog, &settings).unwrap();
    tree.expand_with(&catalog, 1, &settings).unwrap();
    tree.collapse(1);

    settings.system = CoordinateSystem::Cylindrical;
    assert_eq!(tree.refresh_labels(&settings), 1);
    assert!(tree.label(2).unwrap().ends_with("10.00, 0.00, 0.00"));

    tree.expand(1);
    tree.refresh_subtree(1, &settings);
    assert!(tree.label(2).unwrap().ends_with("ρ: 10.00, φ: 0.00, z: 0.00"));
}

#[test]
fn hierarchy_rows_parse_from_json() {
    let json = r#"[{"id":4,"mass":2.5e12,"x":1.0,"y":2.0,"z":3.0,"has_children":true},
                  {"id":9,"mass":1e11,"has_children":false}]"#;
    let nodes: Vec<HierarchyNode> = serde_json::from_str(json).unwrap();
    assert_eq!(nodes[0].position(), NVec3::new(1.0, 2.0, 3.0));
    assert_eq!(nodes[1].position(), NVec3::zeros());
    assert!(!nodes[1].has_children);
}

// ==================================================================================
// Statistics and chart tests
// ==================================================================================

#[test]
fn computed_stats_account_for_every_halo() {
    let catalog = demo_catalog().unwrap();
    let stats = StatsResponse::compute(&catalog);
    let n = catalog.len() as f64;

    assert_eq!(stats.total_particles, catalog.len() as u64);
    let mf = stats.mass_function.as_ref().unwrap();
    assert_eq!(mf.bin_centers.len(), 24);
    assert_eq!(mf.counts.iter().sum::<f64>(), n);

    let cmf = stats.cumulative_mass_function.as_ref().unwrap();
    assert_eq!(cmf.counts[0], n);
    assert!(cmf.counts.windows(2).all(|w| w[0] >= w[1]));

    let rh = stats.radius_histogram.as_ref().unwrap();
    assert_eq!(rh.counts.len(), 19);
    assert_eq!(rh.counts.iter().sum::<f64>(), n);
}

#[test]
fn missing_optional_inputs_become_placeholders() {
    let catalog = two_halo_catalog(); // no radius column
    let stats = StatsResponse {
        mass_function: Some(Histogram {
            bin_centers: vec![1e10, 1e11],
            counts: vec![9.0, 0.0],
        }),
        cumulative_mass_function: None,
        radius_histogram: Some(Histogram::default()),
        total_particles: 2,
        total_mass: 1.1e10,
    };
    let charts = ChartSet::build(&stats, &catalog);

    match &charts.mass_function {
        Chart::Ready(series) => {
            assert!((series.x[0] - 10.0).abs() < 1e-12 && (series.x[1] - 11.0).abs() < 1e-12);
            assert!((series.y[0] - 1.0).abs() < 1e-12 && series.y[1] == 0.0);
        }
        other => panic!("expected mass function, got {other:?}"),
    }
    assert_eq!(charts.cumulative_mass_function, Chart::Placeholder("No Data"));
    assert_eq!(charts.radius_histogram, Chart::Placeholder("No Data"));
    assert_eq!(charts.mass_radius, Chart::Placeholder("No Radius Data"));
}

#[test]
fn mass_radius_scatter_is_downsampled() {
    let halos: Vec<Halo> = (0..5000)
        .map(|i| Halo {
            radius: Some(1.0 + i as f64),
            ..halo(i, None, 1e10, [i as f64, 0.0, 0.0])
        })
        .collect();
    let catalog = Catalog::from_halos(halos).unwrap();
    let charts = ChartSet::build(&StatsResponse::default(), &catalog);

    let Chart::Ready(series) = &charts.mass_radius else {
        panic!("scatter missing");
    };
    assert!(series.len() < catalog.len());
    assert!(series.len() <= 2 * SCATTER_LIMIT);
    assert_eq!(series.x[0], 1.0);
}

#[test]
fn filtered_stats_report_subset_totals() {
    let full = two_family_catalog();
    let filters = Filters {
        x_max: Some(10.0),
        ..Default::default()
    };
    let loaded = load_offline(&full, &filters).unwrap();

    assert_eq!(loaded.catalog.len(), 4); // family 10 plus the field halo
    assert_eq!(loaded.stats.total_particles, 4);
    let expected_mass: f64 = 5e12 + 1e11 + 2e11 + 1e10;
    assert!((loaded.stats.total_mass - expected_mass).abs() < 1.0);
}

#[test]
fn stats_response_parses_with_null_cumulative() {
    let json = r#"{"mass_function":{"bin_centers":[1e10],"counts":[3],"bin_edges":[0,1]},
                   "cumulative_mass_function":null,"total_particles":3,"total_mass":3e10}"#;
    let stats: StatsResponse = serde_json::from_str(json).unwrap();
    assert!(stats.cumulative_mass_function.is_none());
    assert!(stats.radius_histogram.is_none());
    assert_eq!(stats.total_particles, 3);
}

// ==================================================================================
// Filters, schema and upload tests
// ==================================================================================

#[test]
fn filters_send_linear_mass_and_skip_unset_bounds() {
    let filters = Filters {
        log_min_mass: Some(10.0),
        log_max_mass: Some(12.5),
        y_min: Some(-3.0),
        ..Default::default()
    };
    let pairs = filters.query_pairs();
    let names: Vec<&str> = pairs.iter().map(|(n, _)| *n).collect();
    assert_eq!(names, vec!["min_mass", "max_mass", "y_min"]);

    let min: f64 = pairs[0].1.parse().unwrap();
    let max: f64 = pairs[1].1.parse().unwrap();
    assert!((min / 1e10 - 1.0).abs() < 1e-12);
    assert!((max / 10f64.powf(12.5) - 1.0).abs() < 1e-12);
    assert_eq!(pairs[2].1, "-3");

    assert!(Filters::default().is_empty());
}

#[test]
fn local_filters_are_inclusive() {
    let catalog = two_family_catalog();
    let filters = Filters {
        log_min_mass: Some(10.5),
        log_max_mass: Some(12.0),
        x_max: Some(1.0), // halo 11 sits exactly on the bound
        ..Default::default()
    };
    let subset = filters.apply(&catalog).unwrap();
    let mut ids = subset.ids.clone();
    ids.sort();
    assert_eq!(ids, vec![11, 12]);

    // host 10 was cut, so 11 is an orphan in the subset
    assert_eq!(subset.halo_by_id(11).unwrap().parent_id, Some(10));
    assert!(subset.index.lookup(10).is_none());
}

#[test]
fn filter_matching_nothing_gives_empty_catalog_on_both_backends() {
    let full = two_family_catalog();
    let filters = Filters {
        x_min: Some(100.0),
        ..Default::default()
    };

    let offline = load_offline(&full, &filters).unwrap();
    assert!(offline.catalog.is_empty());
    assert_eq!(offline.stats.total_particles, 0);

    // what the server sends back for the same filter
    let json = r#"{"x":[],"y":[],"z":[],"mass":[]}"#;
    let data: DataResponse = serde_json::from_str(json).unwrap();
    let remote = LoadedCatalog::combine(Some("f1".into()), data, StatsResponse::compute(&full), true).unwrap();
    assert!(remote.catalog.is_empty());
    assert_eq!(remote.stats.total_particles, 0);
    assert_eq!(remote.stats.total_mass, 0.0);
}

#[test]
fn state_installs_empty_filter_result() {
    let full = two_family_catalog();
    let mut state = state_with(&full);
    let filters = Filters {
        x_min: Some(100.0),
        ..Default::default()
    };
    let generation = match state.dispatch(Command::ApplyFilters(filters.clone())).as_slice() {
        [Task::LoadCatalog { generation, .. }] => *generation,
        other => panic!("unexpected tasks {other:?}"),
    };
    state.dispatch(Command::CatalogLoaded {
        generation,
        result: loaded(&full, &filters),
    });

    assert!(state.notification.is_none());
    assert!(state.catalog.as_ref().unwrap().is_empty());
    assert_eq!(state.charts.as_ref().unwrap().total_particles, 0);
}

#[test]
fn combined_load_reports_subset_totals_only_when_filtered() {
    let data = DataResponse {
        x: vec![0.0, 1.0],
        y: vec![0.0, 1.0],
        z: vec![0.0, 1.0],
        mass: vec![2e10, 3e10],
        ..Default::default()
    };
    let full_stats = StatsResponse {
        total_particles: 100,
        total_mass: 1e13,
        ..Default::default()
    };

    let unfiltered = LoadedCatalog::combine(Some("f1".into()), data.clone(), full_stats.clone(), false).unwrap();
    assert_eq!(unfiltered.stats.total_particles, 100);

    let filtered = LoadedCatalog::combine(Some("f1".into()), data, full_stats, true).unwrap();
    assert_eq!(filtered.stats.total_particles, 2);
    assert_eq!(filtered.stats.total_mass, 5e10);
    assert_eq!(filtered.file_id.as_deref(), Some("f1"));
}

fn h5_datasets() -> Vec<DatasetInfo> {
    let ds = |path: &str, shape: &[u64]| DatasetInfo {
        path: path.to_string(),
        shape: shape.to_vec(),
    };
    vec![
        ds("Catalog/Mass", &[800]),
        ds("Catalog/Radius", &[800]),
        ds("Catalog/Position", &[800, 3]),
        ds("Catalog/ParticleIDs", &[800]),
        ds("Catalog/ParentID", &[800]),
    ]
}

#[test]
fn schema_detection_maps_catalog_datasets() {
    let schema = detect_schema(&h5_datasets());
    assert_eq!(schema.id.as_deref(), Some("Catalog/ParticleIDs"));
    assert_eq!(schema.mass.as_deref(), Some("Catalog/Mass"));
    assert_eq!(schema.pos.as_deref(), Some("Catalog/Position"));
    assert_eq!(schema.radius.as_deref(), Some("Catalog/Radius"));
    assert_eq!(schema.parent_id.as_deref(), Some("Catalog/ParentID"));
    assert!(schema.validate().is_ok());
}

#[test]
fn server_schema_gaps_are_filled_locally() {
    let scan = ScanResponse {
        datasets: h5_datasets(),
        schema: SchemaMapping {
            mass: Some("Catalog/Mass".into()),
            ..Default::default()
        },
    };
    let resolved = scan.resolved_schema();
    assert_eq!(resolved.mass.as_deref(), Some("Catalog/Mass"));
    assert_eq!(resolved.id.as_deref(), Some("Catalog/ParticleIDs"));
}

#[test]
fn ingest_requires_id_mass_and_pos() {
    let mapping = SchemaMapping {
        mass: Some("Mass".into()),
        pos: Some(String::new()),
        ..Default::default()
    };
    match mapping.validate() {
        Err(ViewerError::Validation(msg)) => {
            assert!(msg.contains("id"));
            assert!(msg.contains("pos"));
            assert!(!msg.contains("mass"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn upload_extensions_are_checked() {
    use std::path::Path;
    assert!(check_extension(Path::new("halos.H5")).is_ok());
    assert!(check_extension(Path::new("halos.csv")).is_ok());
    assert!(matches!(check_extension(Path::new("halos.txt")), Err(ViewerError::Validation(_))));
    assert!(is_hierarchical(Path::new("a/b/halos.hdf5")));
    assert!(!is_hierarchical(Path::new("halos.csv")));
}

// ==================================================================================
// Request tracking tests
// ==================================================================================

#[test]
fn tracker_marks_older_generations_stale() {
    let mut tracker = RequestTracker::new();
    let first = tracker.next();
    let second = tracker.next();
    assert!(!tracker.is_current(first));
    assert!(tracker.is_current(second));
}

#[test]
fn pending_requests_deliver_results() {
    let req = PendingRequest::spawn(|| 6 * 7);
    assert_eq!(wait_for(&req), 42);
    assert_eq!(req.try_take(), None);

    let mut pending = vec![PendingRequest::ready("done"), PendingRequest::spawn(|| {
        std::thread::sleep(Duration::from_secs(2));
        "slow"
    })];
    assert_eq!(drain_finished(&mut pending), vec!["done"]);
    assert_eq!(pending.len(), 1);
}

// ==================================================================================
// Application state tests
// ==================================================================================

fn loaded(catalog: &Catalog, filters: &Filters) -> Result<LoadedCatalog> {
    load_offline(catalog, filters)
}

/// AppState with `catalog` installed and its roots loaded
fn state_with(catalog: &Catalog) -> AppState {
    let mut state = AppState::new(CoordinateSettings::default(), Filters::default());
    let tasks = state.start();
    let generation = match &tasks[..] {
        [Task::LoadCatalog { generation, .. }] => *generation,
        other => panic!("unexpected start tasks {other:?}"),
    };

    let tasks = state.dispatch(Command::CatalogLoaded {
        generation,
        result: loaded(catalog, &Filters::default()),
    });
    assert_eq!(
        tasks,
        vec![Task::FetchChildren {
            file_id: None,
            parent: None
        }]
    );
    state.dispatch(Command::ChildrenLoaded {
        parent: None,
        result: catalog.fetch_children(None),
    });
    state
}

#[test]
fn state_selection_drives_readout_and_connections() {
    let catalog = two_halo_catalog();
    let mut state = state_with(&catalog);
    assert_eq!(state.coords.center, NVec3::new(5.0, 0.0, 0.0));

    state.dispatch(Command::SelectHalo(2));
    assert!(state.readout.as_deref().unwrap().starts_with("Halo #2"));
    assert!(state.connections.is_visible());
    assert_eq!(state.emphasis(1), Emphasis::Primary);
    assert_eq!(state.emphasis(0), Emphasis::Related);

    state.dispatch(Command::SelectHalo(404));
    assert_eq!(state.selection.selected_id(), Some(2));

    state.dispatch(Command::Pick(None));
    assert!(state.readout.is_none());
    assert!(!state.connections.is_visible());
    assert_eq!(state.emphasis(1), Emphasis::None);
}

#[test]
fn state_readout_follows_coordinate_toggles() {
    let catalog = two_halo_catalog();
    let mut state = state_with(&catalog);
    state.dispatch(Command::ActivateNode(1));
    assert!(state.readout.as_deref().unwrap().contains("0.00, 0.00, 0.00"));

    state.dispatch(Command::ToggleRelativeOrigin);
    assert!(state.readout.as_deref().unwrap().contains("-5.00, 0.00, 0.00"));

    state.dispatch(Command::CycleCoordinateSystem);
    assert!(state.readout.as_deref().unwrap().contains("ρ: 5.00, φ: 3.14, z: 0.00"));
}

#[test]
fn state_discards_stale_catalog_responses() {
    let full = two_family_catalog();
    let mut state = state_with(&full);

    let older = Filters {
        x_max: Some(10.0),
        ..Default::default()
    };
    let newer = Filters {
        x_min: Some(40.0),
        ..Default::default()
    };
    let older_gen = match state.dispatch(Command::ApplyFilters(older.clone())).as_slice() {
        [Task::LoadCatalog { generation, .. }] => *generation,
        other => panic!("unexpected tasks {other:?}"),
    };
    let newer_gen = match state.dispatch(Command::ApplyFilters(newer.clone())).as_slice() {
        [Task::LoadCatalog { generation, .. }] => *generation,
        other => panic!("unexpected tasks {other:?}"),
    };
    assert!(state.loading);

    // newer answer arrives first
    state.dispatch(Command::CatalogLoaded {
        generation: newer_gen,
        result: loaded(&full, &newer),
    });
    let revision = state.scene_revision;
    state.dispatch(Command::CatalogLoaded {
        generation: older_gen,
        result: loaded(&full, &older),
    });

    assert_eq!(state.scene_revision, revision);
    let mut ids = state.catalog.as_ref().unwrap().ids.clone();
    ids.sort();
    assert_eq!(ids, vec![20, 21, 22]);
    assert!(!state.loading);
}

#[test]
fn state_failed_load_keeps_catalog_and_notifies() {
    let catalog = two_halo_catalog();
    let mut state = state_with(&catalog);
    state.dispatch(Command::SelectHalo(1));

    let generation = match state.dispatch(Command::ClearFilters).as_slice() {
        [Task::LoadCatalog { generation, .. }] => *generation,
        other => panic!("unexpected tasks {other:?}"),
    };
    state.dispatch(Command::CatalogLoaded {
        generation,
        result: Err(ViewerError::Network("502 Bad Gateway: upstream".into())),
    });

    assert!(state.notification.as_deref().unwrap().contains("502"));
    assert_eq!(state.catalog.as_ref().unwrap().len(), 2);
    assert_eq!(state.selection.selected_id(), Some(1));

    state.dismiss_notification();
    assert!(state.notification.is_none());
}

#[test]
fn state_new_catalog_resets_selection() {
    let catalog = two_halo_catalog();
    let mut state = state_with(&catalog);
    state.dispatch(Command::SelectHalo(2));

    let generation = match state.dispatch(Command::ClearFilters).as_slice() {
        [Task::LoadCatalog { generation, .. }] => *generation,
        other => panic!("unexpected tasks {other:?}"),
    };
    state.dispatch(Command::CatalogLoaded {
        generation,
        result: loaded(&catalog, &Filters::default()),
    });

    assert_eq!(state.selection.state(), &SelectionState::Idle);
    assert!(!state.connections.is_visible());
    assert!(state.readout.is_none());
}

#[test]
fn state_tree_requests_each_node_once() {
    let catalog = two_family_catalog();
    let mut state = state_with(&catalog);

    let tasks = state.dispatch(Command::ToggleNode(10));
    assert_eq!(
        tasks,
        vec![Task::FetchChildren {
            file_id: None,
            parent: Some(10)
        }]
    );

    // collapse and reopen while the fetch is still in flight
    assert!(state.dispatch(Command::ToggleNode(10)).is_empty());
    assert!(state.dispatch(Command::ToggleNode(10)).is_empty());

    state.dispatch(Command::ChildrenLoaded {
        parent: Some(10),
        result: catalog.fetch_children(Some(10)),
    });
    assert!(state.tree.label(11).is_some());

    // cached from now on
    assert!(state.dispatch(Command::ToggleNode(10)).is_empty());
    assert!(state.dispatch(Command::ToggleNode(10)).is_empty());
    assert!(state.tree.entry(10).unwrap().expanded);
}

#[test]
fn state_filters_wait_for_first_load_to_open_source() {
    let catalog = two_halo_catalog();
    let mut state = AppState::new(CoordinateSettings::default(), Filters::default());
    let first = match state.start().as_slice() {
        [Task::LoadCatalog { generation, file_id: None, .. }] => *generation,
        other => panic!("unexpected start tasks {other:?}"),
    };

    // pressing F before the upload finished must not open the source again
    let filters = Filters {
        x_min: Some(1.0),
        ..Default::default()
    };
    assert!(state.dispatch(Command::ApplyFilters(filters.clone())).is_empty());
    assert_eq!(state.latest_generation(), first);

    let opened = LoadedCatalog {
        file_id: Some("f1".into()),
        ..loaded(&catalog, &Filters::default()).unwrap()
    };
    let tasks = state.dispatch(Command::CatalogLoaded {
        generation: first,
        result: Ok(opened),
    });
    assert!(tasks.contains(&Task::LoadCatalog {
        generation: first + 1,
        file_id: Some("f1".into()),
        filters,
    }));
    assert!(state.loading);
}

#[test]
fn state_failed_open_lets_filters_retry() {
    let mut state = AppState::new(CoordinateSettings::default(), Filters::default());
    let first = match state.start().as_slice() {
        [Task::LoadCatalog { generation, .. }] => *generation,
        other => panic!("unexpected start tasks {other:?}"),
    };
    assert!(state.dispatch(Command::ClearFilters).is_empty());

    let tasks = state.dispatch(Command::CatalogLoaded {
        generation: first,
        result: Err(ViewerError::Network("503 Service Unavailable: down".into())),
    });
    assert!(tasks.is_empty());

    // nothing is in flight any more, so the next reload opens the source
    match state.dispatch(Command::ClearFilters).as_slice() {
        [Task::LoadCatalog { file_id: None, .. }] => {}
        other => panic!("unexpected tasks {other:?}"),
    }
}

#[test]
fn state_keeps_tree_across_offline_filter_reloads() {
    let full = two_family_catalog();
    let mut state = state_with(&full);
    state.dispatch(Command::ToggleNode(10));
    state.dispatch(Command::ChildrenLoaded {
        parent: Some(10),
        result: full.fetch_children(Some(10)),
    });

    let filters = Filters {
        x_min: Some(40.0),
        ..Default::default()
    };
    let generation = match state.dispatch(Command::ApplyFilters(filters.clone())).as_slice() {
        [Task::LoadCatalog { generation, .. }] => *generation,
        other => panic!("unexpected tasks {other:?}"),
    };
    let tasks = state.dispatch(Command::CatalogLoaded {
        generation,
        result: loaded(&full, &filters),
    });

    assert!(tasks.is_empty(), "tree was rebuilt: {tasks:?}");
    assert!(state.tree.entry(10).unwrap().expanded);
    assert!(state.tree.label(11).is_some());
}

#[test]
fn state_tree_relabels_on_spherical_relative_toggle() {
    let catalog = two_halo_catalog();
    let mut state = state_with(&catalog);
    state.dispatch(Command::ToggleNode(1));
    state.dispatch(Command::ChildrenLoaded {
        parent: Some(1),
        result: catalog.fetch_children(Some(1)),
    });

    state.dispatch(Command::SetCoordinateSystem(CoordinateSystem::Spherical));
    state.dispatch(Command::ToggleRelativeOrigin);

    assert!(state.tree.label(1).unwrap().ends_with("r: 5.00, θ: 1.57, φ: 3.14"));
    assert!(state.tree.label(2).unwrap().ends_with("r: 5.00, θ: 1.57, φ: 0.00"));
}

// ==================================================================================
// Configuration tests
// ==================================================================================

#[test]
fn config_parses_full_session() {
    let yaml = r#"
server:
  base_url: "http://localhost:9000"
  timeout_secs: 10
display:
  point_scale: 2.0
  coordinate_system: "cylindrical"
  relative_origin: true
filters:
  log_min_mass: 11.0
source:
  kind: "file"
  path: "catalogs/halos.h5"
"#;
    let cfg = ViewerConfig::from_yaml(yaml).unwrap();
    assert_eq!(cfg.server.base_url, "http://localhost:9000");
    assert_eq!(cfg.server.timeout_secs, Some(10));
    assert_eq!(cfg.display.coordinate_system, CoordinateSystem::Cylindrical);
    assert!(cfg.display.relative_origin);
    assert_eq!(cfg.display.min_point_radius, 0.15);
    assert_eq!(cfg.filters.log_min_mass, Some(11.0));
    assert_eq!(
        cfg.source,
        SourceConfig::File {
            path: "catalogs/halos.h5".into()
        }
    );
}

#[test]
fn config_defaults_and_validation() {
    let cfg = ViewerConfig::from_yaml("{}").unwrap();
    assert_eq!(cfg.source, SourceConfig::OfflineDemo);
    assert_eq!(cfg.server.timeout_secs, None);
    assert!(cfg.filters.is_empty());

    let bad = ViewerConfig::from_yaml("display:\n  point_scale: 0.0\n");
    assert!(matches!(bad, Err(ViewerError::Config(_))));

    let bad_url = ViewerConfig::from_yaml("server:\n  base_url: \"localhost\"\n");
    assert!(matches!(bad_url, Err(ViewerError::Config(_))));
}
