use bevy::input::mouse::{MouseMotion, MouseWheel};
use bevy::math::primitives::{Cuboid, Sphere};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::app::backend::Backend;
use crate::app::commands::{Command, Task};
use crate::app::state::AppState;
use crate::catalog::halo::NVec3;
use crate::catalog::stats::Chart;
use crate::client::filters::Filters;
use crate::client::requests::{drain_finished, PendingRequest};
use crate::selection::controller::Emphasis;
use crate::selection::picking::{pick_nearest, PickRay};

/// Component tagging each sphere with its row offset into the current catalog
#[derive(Component)]
struct HaloIndex(pub usize);

/// Orbit camera state, rotating around `target`
#[derive(Component)]
struct OrbitCamera {
    target: Vec3,
    distance: f32,
    azimuth: f32,
    elevation: f32, // polar angle from +Y
}

#[derive(Component, Clone, Copy, PartialEq, Eq)]
enum OverlayText {
    Status,
    Readout,
    Stats,
    Tree,
}

/// Background work in flight
#[derive(Resource, Default)]
struct PendingTasks(Vec<PendingRequest<Command>>);

/// Catalogue -> world mapping and drawing sizes
#[derive(Resource, Clone)]
pub struct SceneSettings {
    pub point_scale: f32,
    pub min_point_radius: f64,
}

/// Filters toggled with `F`
#[derive(Resource, Clone, Default)]
pub struct FilterPreset(pub Filters);

/// Revisions of `AppState` the scene was last synced to
#[derive(Resource, Default)]
struct SceneSync {
    scene: u64,
    emphasis: u64,
}

/// Highlighted row in the hierarchy panel
#[derive(Resource, Default)]
struct TreeCursor(usize);

/// Materials shared by every halo: one per mass colour tier plus the two
/// emphasis colours
#[derive(Resource)]
struct HaloPalette {
    tiers: Vec<Handle<StandardMaterial>>,
    primary: Handle<StandardMaterial>,
    related: Handle<StandardMaterial>,
}

impl HaloPalette {
    fn for_mass(&self, normalized_mass: f64) -> Handle<StandardMaterial> {
        self.tiers[mass_tier(normalized_mass, self.tiers.len())].clone()
    }
}

/// Pixels the cursor may move between press and release and still count as a click
const CLICK_SLOP: f32 = 5.0;

/// Distinct colours in the mass heat map
pub const MASS_TIERS: usize = 64;

/// Rows of the hierarchy shown at once
const TREE_ROWS: usize = 18;

const ORBIT_SENSITIVITY: f32 = 0.005;
const ZOOM_SENSITIVITY: f32 = 0.1;

const PRIMARY_COLOR: Color = Color::srgb(1.0, 1.0, 0.2);
const RELATED_COLOR: Color = Color::srgb(0.2, 1.0, 1.0);
const CONNECTION_COLOR: Color = Color::srgb(1.0, 1.0, 1.0);

pub fn run_viewer(state: AppState, backend: Backend, settings: SceneSettings, preset: FilterPreset) {
    info!("run_viewer: starting Bevy 3D halo viewer");

    App::new()
        .insert_resource(state)
        .insert_resource(backend)
        .insert_resource(settings)
        .insert_resource(preset)
        .init_resource::<PendingTasks>()
        .init_resource::<SceneSync>()
        .init_resource::<TreeCursor>()
        .add_plugins(DefaultPlugins)
        .add_systems(Startup, (setup_scene, start_loading))
        .add_systems(
            Update,
            (
                keyboard_commands,
                pointer_pick,
                orbit_camera,
                poll_tasks,
                rebuild_scene,
                apply_emphasis,
                draw_connections,
                update_overlay,
            )
                .chain(),
        )
        .run();
}

fn spawn_tasks(backend: &Backend, pending: &mut PendingTasks, tasks: Vec<Task>) {
    for task in tasks {
        pending.0.push(backend.spawn(task));
    }
}

fn dispatch_all(
    state: &mut AppState,
    backend: &Backend,
    pending: &mut PendingTasks,
    commands: impl IntoIterator<Item = Command>,
) {
    for command in commands {
        let tasks = state.dispatch(command);
        spawn_tasks(backend, pending, tasks);
    }
}

/// Startup system: camera, light, axes and the overlay panels
fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let orbit = OrbitCamera {
        target: Vec3::ZERO,
        distance: 500.0,
        azimuth: 0.0,
        elevation: std::f32::consts::FRAC_PI_2,
    };
    commands.spawn((
        Camera3dBundle {
            camera: Camera {
                clear_color: ClearColorConfig::Custom(Color::srgb(0.0, 0.0, 0.0)), // pure black
                ..Default::default()
            },
            transform: orbit_transform(&orbit),
            ..Default::default()
        },
        orbit,
    ));

    commands.spawn(PointLightBundle {
        point_light: PointLight {
            intensity: 1500.0,
            range: 1000.0,
            ..Default::default()
        },
        transform: Transform::from_xyz(100.0, 100.0, 500.0),
        ..Default::default()
    });

    spawn_axes(&mut commands, &mut meshes, &mut materials);

    let mut unlit = |color: Color| {
        materials.add(StandardMaterial {
            base_color: color,
            unlit: true,
            ..Default::default()
        })
    };
    let tiers = (0..MASS_TIERS)
        .map(|t| unlit(mass_color(t as f64 / (MASS_TIERS - 1) as f64)))
        .collect();
    let palette = HaloPalette {
        tiers,
        primary: unlit(PRIMARY_COLOR),
        related: unlit(RELATED_COLOR),
    };
    commands.insert_resource(palette);

    let panels = [
        (OverlayText::Status, Val::Px(8.0), Val::Px(8.0), None),
        (OverlayText::Readout, Val::Px(32.0), Val::Px(8.0), None),
        (OverlayText::Stats, Val::Px(56.0), Val::Px(8.0), None),
        (OverlayText::Tree, Val::Px(8.0), Val::Auto, Some(Val::Px(8.0))),
    ];
    for (kind, top, left, right) in panels {
        commands.spawn((
            TextBundle::from_section(
                "",
                TextStyle {
                    font_size: 15.0,
                    color: Color::WHITE,
                    ..Default::default()
                },
            )
            .with_style(Style {
                position_type: PositionType::Absolute,
                top,
                left,
                right: right.unwrap_or(Val::Auto),
                ..Default::default()
            }),
            kind,
        ));
    }
}

fn start_loading(mut state: ResMut<AppState>, backend: Res<Backend>, mut pending: ResMut<PendingTasks>) {
    let tasks = state.start();
    spawn_tasks(&backend, &mut pending, tasks);
}

/// Apply results of finished background work
fn poll_tasks(mut state: ResMut<AppState>, backend: Res<Backend>, mut pending: ResMut<PendingTasks>) {
    let finished = drain_finished(&mut pending.0);
    if !finished.is_empty() {
        dispatch_all(&mut state, &backend, &mut pending, finished);
    }
}

fn keyboard_commands(
    keys: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<AppState>,
    backend: Res<Backend>,
    preset: Res<FilterPreset>,
    mut pending: ResMut<PendingTasks>,
    mut cursor: ResMut<TreeCursor>,
) {
    let mut out = Vec::new();

    if keys.just_pressed(KeyCode::KeyC) {
        out.push(Command::CycleCoordinateSystem);
    }
    if keys.just_pressed(KeyCode::KeyR) {
        out.push(Command::ToggleRelativeOrigin);
    }
    if keys.just_pressed(KeyCode::Escape) {
        out.push(Command::ClearSelection);
    }
    if keys.just_pressed(KeyCode::KeyN) {
        state.dismiss_notification();
    }
    if keys.just_pressed(KeyCode::KeyF) {
        if state.filters == preset.0 && !preset.0.is_empty() {
            out.push(Command::ClearFilters);
        } else {
            out.push(Command::ApplyFilters(preset.0.clone()));
        }
    }

    // Hierarchy panel navigation
    let visible: Vec<i64> = state.tree.visible_nodes().iter().map(|(_, e)| e.node.id).collect();
    if !visible.is_empty() {
        if keys.just_pressed(KeyCode::ArrowDown) {
            cursor.0 = (cursor.0 + 1).min(visible.len() - 1);
        }
        if keys.just_pressed(KeyCode::ArrowUp) {
            cursor.0 = cursor.0.saturating_sub(1);
        }
        cursor.0 = cursor.0.min(visible.len() - 1);

        let id = visible[cursor.0];
        if keys.just_pressed(KeyCode::ArrowRight) || keys.just_pressed(KeyCode::Enter) {
            out.push(Command::ToggleNode(id));
        }
        if keys.just_pressed(KeyCode::Space) {
            out.push(Command::ActivateNode(id));
        }
    }

    if !out.is_empty() {
        dispatch_all(&mut state, &backend, &mut pending, out);
    }
}

/// Left click without dragging picks the nearest halo under the cursor
fn pointer_pick(
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<OrbitCamera>>,
    settings: Res<SceneSettings>,
    mut state: ResMut<AppState>,
    backend: Res<Backend>,
    mut pending: ResMut<PendingTasks>,
    mut press_at: Local<Option<Vec2>>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };

    if buttons.just_pressed(MouseButton::Left) {
        *press_at = Some(cursor);
    }
    if !buttons.just_released(MouseButton::Left) {
        return;
    }
    let Some(start) = press_at.take() else {
        return;
    };
    if start.distance(cursor) > CLICK_SLOP {
        return; // that was an orbit drag
    }

    let Ok((camera, camera_transform)) = cameras.get_single() else {
        return;
    };
    let Some(ray) = camera.viewport_to_world(camera_transform, cursor) else {
        return;
    };
    let Some(catalog) = &state.catalog else {
        return;
    };

    // Work in catalogue units
    let scale = settings.point_scale as f64;
    let origin = ray.origin.as_dvec3() / scale;
    let direction = ray.direction.as_dvec3();
    let Some(pick_ray) = PickRay::new(
        NVec3::new(origin.x, origin.y, origin.z),
        NVec3::new(direction.x, direction.y, direction.z),
    ) else {
        return;
    };

    let hit = pick_nearest(&pick_ray, &catalog.positions, |i| {
        display_radius(catalog.radius.as_ref().map(|r| r[i]), settings.min_point_radius)
    });
    dispatch_all(&mut state, &backend, &mut pending, [Command::Pick(hit)]);
}

fn orbit_camera(
    buttons: Res<ButtonInput<MouseButton>>,
    mut motion: EventReader<MouseMotion>,
    mut wheel: EventReader<MouseWheel>,
    mut cameras: Query<(&mut OrbitCamera, &mut Transform)>,
) {
    let drag: Vec2 = motion.read().map(|m| m.delta).sum();
    let scroll: f32 = wheel.read().map(|w| w.y).sum();

    for (mut orbit, mut transform) in &mut cameras {
        let mut changed = false;
        if buttons.pressed(MouseButton::Left) && drag != Vec2::ZERO {
            orbit.azimuth -= drag.x * ORBIT_SENSITIVITY;
            orbit.elevation = (orbit.elevation - drag.y * ORBIT_SENSITIVITY).clamp(0.01, std::f32::consts::PI - 0.01);
            changed = true;
        }
        if scroll != 0.0 {
            orbit.distance = (orbit.distance * (1.0 - scroll * ZOOM_SENSITIVITY)).max(1.0);
            changed = true;
        }
        if changed {
            *transform = orbit_transform(&orbit);
        }
    }
}

fn orbit_transform(orbit: &OrbitCamera) -> Transform {
    let offset = Vec3::new(
        orbit.elevation.sin() * orbit.azimuth.sin(),
        orbit.elevation.cos(),
        orbit.elevation.sin() * orbit.azimuth.cos(),
    ) * orbit.distance;
    Transform::from_translation(orbit.target + offset).looking_at(orbit.target, Vec3::Y)
}

/// Respawn every halo sphere when a new catalog arrives
fn rebuild_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    palette: Res<HaloPalette>,
    state: Res<AppState>,
    settings: Res<SceneSettings>,
    mut sync: ResMut<SceneSync>,
    existing: Query<Entity, With<HaloIndex>>,
    mut cameras: Query<(&mut OrbitCamera, &mut Transform)>,
) {
    if sync.scene == state.scene_revision {
        return;
    }
    sync.scene = state.scene_revision;

    for entity in &existing {
        commands.entity(entity).despawn();
    }

    let Some(catalog) = &state.catalog else {
        return;
    };
    info!("rebuild_scene: spawning {} halos", catalog.len());

    // One unit sphere shared by every halo, scaled per halo
    let mesh = meshes.add(Sphere::new(1.0).mesh());
    for i in 0..catalog.len() {
        let radius = display_radius(catalog.radius.as_ref().map(|r| r[i]), settings.min_point_radius);
        commands.spawn((
            PbrBundle {
                mesh: mesh.clone(),
                material: palette.for_mass(catalog.normalized_mass(i)),
                transform: Transform::from_translation(to_world(&catalog.positions[i], settings.point_scale))
                    .with_scale(Vec3::splat(radius as f32 * settings.point_scale)),
                ..Default::default()
            },
            HaloIndex(i),
        ));
    }

    // Center the camera on the catalog, back off twice its bounding radius
    let center = to_world(&catalog.center(), settings.point_scale);
    let distance = (catalog.bounding_radius() as f32 * settings.point_scale * 2.0).max(10.0);
    for (mut orbit, mut transform) in &mut cameras {
        orbit.target = center;
        orbit.distance = distance;
        *transform = orbit_transform(&orbit);
    }
}

/// Recolor and resize halos whenever the selection changes
fn apply_emphasis(
    state: Res<AppState>,
    settings: Res<SceneSettings>,
    palette: Res<HaloPalette>,
    mut sync: ResMut<SceneSync>,
    mut query: Query<(&HaloIndex, &mut Handle<StandardMaterial>, &mut Transform)>,
) {
    if sync.emphasis == state.emphasis_revision {
        return;
    }
    let Some(catalog) = &state.catalog else {
        return;
    };
    // Wait until the spheres for this catalog exist
    if query.is_empty() && !catalog.is_empty() {
        return;
    }
    sync.emphasis = state.emphasis_revision;

    for (HaloIndex(i), mut material, mut transform) in &mut query {
        if *i >= catalog.len() {
            continue;
        }
        let (wanted, grow) = match state.emphasis(*i) {
            Emphasis::Primary => (palette.primary.clone(), 2.0),
            Emphasis::Related => (palette.related.clone(), 1.5),
            Emphasis::None => (palette.for_mass(catalog.normalized_mass(*i)), 1.0),
        };
        let radius = display_radius(catalog.radius.as_ref().map(|r| r[*i]), settings.min_point_radius);
        transform.scale = Vec3::splat(radius as f32 * settings.point_scale * grow);

        if *material != wanted {
            *material = wanted;
        }
    }
}

fn draw_connections(state: Res<AppState>, settings: Res<SceneSettings>, mut gizmos: Gizmos) {
    let view = &state.connections;
    if !view.is_visible() {
        return;
    }
    for segment in view.segments() {
        gizmos.line(
            to_world(&segment.start, settings.point_scale),
            to_world(&segment.end, settings.point_scale),
            CONNECTION_COLOR,
        );
    }
    if let Some((min, max)) = view.bounds() {
        let min = to_world(&min, settings.point_scale);
        let max = to_world(&max, settings.point_scale);
        gizmos.cuboid(
            Transform::from_translation((min + max) * 0.5).with_scale((max - min).max(Vec3::splat(0.01))),
            Color::srgba(1.0, 1.0, 1.0, 0.2),
        );
    }
}

fn update_overlay(state: Res<AppState>, cursor: Res<TreeCursor>, mut texts: Query<(&OverlayText, &mut Text)>) {
    for (kind, mut text) in &mut texts {
        let value = match kind {
            OverlayText::Status => status_line(&state),
            OverlayText::Readout => state
                .readout
                .clone()
                .unwrap_or_else(|| "Click a halo to select it".to_string()),
            OverlayText::Stats => stats_panel(&state),
            OverlayText::Tree => tree_panel(&state, cursor.0),
        };
        if text.sections[0].value != value {
            text.sections[0].value = value;
        }
    }
}

fn status_line(state: &AppState) -> String {
    if let Some(note) = &state.notification {
        return format!("{note}  (N to dismiss)");
    }
    let loading = if state.loading { "loading... " } else { "" };
    let filters = if state.filters.is_empty() { "off" } else { "on" };
    format!(
        "{loading}coords: {} (C) | relative origin: {} (R) | filters: {filters} (F)",
        state.coords.system.name(),
        if state.coords.relative_origin { "on" } else { "off" },
    )
}

fn stats_panel(state: &AppState) -> String {
    let Some(charts) = &state.charts else {
        return String::new();
    };
    let describe = |name: &str, chart: &Chart| match chart {
        Chart::Ready(series) => format!("{name}: {} points", series.len()),
        Chart::Placeholder(msg) => format!("{name}: {msg}"),
    };
    [
        format!("halos: {} | total mass: {:.3e}", charts.total_particles, charts.total_mass),
        describe("mass function", &charts.mass_function),
        describe("N(>M)", &charts.cumulative_mass_function),
        describe("radius histogram", &charts.radius_histogram),
        describe("mass-radius", &charts.mass_radius),
    ]
    .join("\n")
}

fn tree_panel(state: &AppState, cursor: usize) -> String {
    let visible = state.tree.visible_nodes();
    if visible.is_empty() {
        return "hierarchy: none".to_string();
    }
    let first = cursor.saturating_sub(TREE_ROWS / 2).min(visible.len().saturating_sub(TREE_ROWS));

    let mut lines = vec!["hierarchy (arrows, Enter expand, Space select)".to_string()];
    for (row, (depth, entry)) in visible.iter().enumerate().skip(first).take(TREE_ROWS) {
        let marker = if row == cursor { ">" } else { " " };
        let expander = match (entry.node.has_children, entry.expanded) {
            (false, _) => " ",
            (true, true) => "-",
            (true, false) => "+",
        };
        lines.push(format!("{marker}{}{expander} {}", "  ".repeat(*depth), entry.label));
    }
    lines.join("\n")
}

fn to_world(p: &NVec3, scale: f32) -> Vec3 {
    Vec3::new(p.x as f32, p.y as f32, p.z as f32) * scale
}

/// Radius used for drawing and picking, never below `min_radius`
fn display_radius(radius: Option<f64>, min_radius: f64) -> f64 {
    radius.unwrap_or(0.0).max(min_radius)
}

/// Colour tier of a normalized mass in [0, 1], out of `tiers`
pub fn mass_tier(normalized_mass: f64, tiers: usize) -> usize {
    let last = tiers.saturating_sub(1);
    let t = (normalized_mass.clamp(0.0, 1.0) * last as f64).round() as usize;
    t.min(last)
}

/// Mass heat map: light blue for the lightest halos through to red
fn mass_color(normalized_mass: f64) -> Color {
    let hue = (0.6 - normalized_mass * 0.6) as f32 * 360.0;
    Color::hsl(hue, 1.0, 0.5)
}

// =========================================================================================
// Draw 3D axes for visual reference
// =========================================================================================

fn spawn_axes(commands: &mut Commands, meshes: &mut Assets<Mesh>, materials: &mut Assets<StandardMaterial>) {
    let axis_len = 1000.0;
    let axis_thickness = 0.2;

    let axes = [
        (Vec3::new(axis_len, axis_thickness, axis_thickness), Color::srgb(1.0, 0.0, 0.0)), // X, red
        (Vec3::new(axis_thickness, axis_len, axis_thickness), Color::srgb(0.0, 1.0, 0.0)), // Y, green
        (Vec3::new(axis_thickness, axis_thickness, axis_len), Color::srgb(0.0, 0.0, 1.0)), // Z, blue
    ];
    for (size, color) in axes {
        commands.spawn(PbrBundle {
            mesh: meshes.add(Cuboid::new(size.x, size.y, size.z).mesh()),
            material: materials.add(StandardMaterial {
                base_color: color,
                unlit: true,
                ..Default::default()
            }),
            // Cuboid is centered at its transform origin, so this puts it crossing the world origin
            transform: Transform::from_xyz(0.0, 0.0, 0.0),
            ..Default::default()
        });
    }
}
