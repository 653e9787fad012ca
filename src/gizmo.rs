use std::collections::HashMap;

use bevy::prelude::*;

use crate::context::{HandleKind, HighlightKey};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const COLOR_X: Color = Color::srgb(0.9, 0.15, 0.15);
const COLOR_Y: Color = Color::srgb(0.15, 0.8, 0.2);
const COLOR_Z: Color = Color::srgb(0.2, 0.4, 0.95);
const NEGATIVE_AXIS_DIM: f32 = 0.55;

const CENTER_RADIUS: f32 = 0.22;
const SHAFT_RADIUS: f32 = 0.035;
const SHAFT_LENGTH: f32 = 0.32;
const CONE_RADIUS: f32 = 0.09;
const CONE_HEIGHT: f32 = 0.18;
const ARROW_START: f32 = 0.26;

const MIN_OPACITY: f32 = 0.1;

// ---------------------------------------------------------------------------
// Part identity
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GizmoAxis {
    X,
    Y,
    Z,
}

impl GizmoAxis {
    pub fn unit(self) -> Vec3 {
        match self {
            GizmoAxis::X => Vec3::X,
            GizmoAxis::Y => Vec3::Y,
            GizmoAxis::Z => Vec3::Z,
        }
    }
}

/// Identity of a pickable sub-mesh within a handle: the center sphere or one
/// directional arrow.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GizmoPart {
    Center,
    Axis { axis: GizmoAxis, negative: bool },
}

impl GizmoPart {
    /// Local-space direction of an axis part; `None` for the center.
    pub fn direction(self) -> Option<Vec3> {
        match self {
            GizmoPart::Center => None,
            GizmoPart::Axis { axis, negative } => {
                Some(axis.unit() * if negative { -1.0 } else { 1.0 })
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub enum GizmoState {
    #[default]
    Normal,
    Hover,
    Active,
}

// ---------------------------------------------------------------------------
// Construction options
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct GizmoConfig {
    /// Which of x/y/z get arrows.
    pub axes: [bool; 3],
    /// Whether negative-direction arrows are built too.
    pub negative_axes: bool,
    /// Peak opacity of the active state; other states scale down from it.
    /// Clamped to [0.1, 1.0] rather than rejected.
    pub opacity: f32,
    pub center_color: Color,
    /// Fully transparent in the normal state but still pickable. Used for
    /// joint handles that should only appear on interaction.
    pub hide_normal_state: bool,
    /// Bias the handle's depth so it draws over the structure it edits.
    pub overlay: bool,
    /// Unscaled world-space diameter of the built gizmo; the screen-size
    /// normalizer divides by this.
    pub base_diameter: f32,
    /// Target apparent size on screen.
    pub pixel_diameter: f32,
}

impl Default for GizmoConfig {
    fn default() -> Self {
        Self {
            axes: [true, true, true],
            negative_axes: true,
            opacity: 0.9,
            center_color: Color::srgb(1.0, 0.75, 0.2),
            hide_normal_state: false,
            overlay: true,
            base_diameter: 1.6,
            pixel_diameter: 28.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

/// Root component of one spawned manipulation handle.
#[derive(Component)]
pub struct HandleGizmo {
    pub base_diameter: f32,
    pub pixel_diameter: f32,
    states: HashMap<GizmoPart, GizmoState>,
    palette: HashMap<GizmoPart, [Handle<StandardMaterial>; 3]>,
}

impl HandleGizmo {
    pub fn state_of(&self, part: GizmoPart) -> GizmoState {
        self.states.get(&part).copied().unwrap_or_default()
    }

    pub fn parts(&self) -> impl Iterator<Item = GizmoPart> + '_ {
        self.palette.keys().copied()
    }

    fn material_for(&self, part: GizmoPart, state: GizmoState) -> Option<Handle<StandardMaterial>> {
        self.palette.get(&part).map(|set| set[state as usize].clone())
    }
}

/// Binds a handle root to the structure control point it edits.
#[derive(Component, Clone, Copy, Debug)]
pub struct HandleMeta {
    pub node: Entity,
    pub kind: HandleKind,
}

impl HandleMeta {
    pub fn key(&self) -> HighlightKey {
        HighlightKey {
            node: self.node,
            kind: self.kind,
        }
    }
}

/// Typed tag on every pickable sub-entity, replacing stringly userdata.
#[derive(Component, Clone, Copy, Debug)]
pub struct GizmoPartTag {
    pub part: GizmoPart,
}

/// Local-space picking volume for a sub-entity.
#[derive(Component, Clone, Copy, Debug)]
pub enum PickBounds {
    Sphere { radius: f32 },
    Box { half_extents: Vec3, offset: Vec3 },
}

/// Back-pointer from a pickable sub-entity to its handle root.
#[derive(Component, Clone, Copy, Debug)]
pub struct HandleRef(pub Entity);

/// Shared sub-meshes for all spawned handles.
#[derive(Resource)]
pub struct GizmoMeshes {
    sphere: Handle<Mesh>,
    shaft: Handle<Mesh>,
    cone: Handle<Mesh>,
}

// ---------------------------------------------------------------------------
// Materials
// ---------------------------------------------------------------------------

fn part_color(part: GizmoPart, center_color: Color) -> Color {
    match part {
        GizmoPart::Center => center_color,
        GizmoPart::Axis { axis, negative } => {
            let base = match axis {
                GizmoAxis::X => COLOR_X,
                GizmoAxis::Y => COLOR_Y,
                GizmoAxis::Z => COLOR_Z,
            };
            if negative {
                let lin = base.to_linear() * NEGATIVE_AXIS_DIM;
                Color::LinearRgba(lin)
            } else {
                base
            }
        }
    }
}

fn state_material(color: Color, state: GizmoState, config: &GizmoConfig) -> StandardMaterial {
    let opacity = config.opacity.clamp(MIN_OPACITY, 1.0);
    let (alpha_share, emissive_share) = match state {
        GizmoState::Normal if config.hide_normal_state => (0.0, 0.0),
        GizmoState::Normal => (0.55, 0.15),
        GizmoState::Hover => (0.85, 0.6),
        GizmoState::Active => (1.0, 1.2),
    };
    StandardMaterial {
        base_color: color.with_alpha(opacity * alpha_share),
        emissive: color.to_linear() * emissive_share,
        alpha_mode: AlphaMode::Blend,
        depth_bias: if config.overlay { 50.0 } else { 0.0 },
        double_sided: true,
        cull_mode: None,
        ..default()
    }
}

// ---------------------------------------------------------------------------
// Spawning
// ---------------------------------------------------------------------------

fn enabled_parts(config: &GizmoConfig) -> Vec<GizmoPart> {
    let mut parts = vec![GizmoPart::Center];
    for (i, axis) in [GizmoAxis::X, GizmoAxis::Y, GizmoAxis::Z].into_iter().enumerate() {
        if !config.axes[i] {
            continue;
        }
        parts.push(GizmoPart::Axis { axis, negative: false });
        if config.negative_axes {
            parts.push(GizmoPart::Axis { axis, negative: true });
        }
    }
    parts
}

fn ensure_gizmo_meshes(world: &mut World) {
    if world.contains_resource::<GizmoMeshes>() {
        return;
    }
    let mut meshes = world.resource_mut::<Assets<Mesh>>();
    let resource = GizmoMeshes {
        sphere: meshes.add(Sphere::new(CENTER_RADIUS)),
        shaft: meshes.add(Cylinder {
            radius: SHAFT_RADIUS,
            half_height: SHAFT_LENGTH * 0.5,
        }),
        cone: meshes.add(Cone {
            radius: CONE_RADIUS,
            height: CONE_HEIGHT,
        }),
    };
    world.insert_resource(resource);
}

/// Build one manipulation handle under `parent` at a node-local anchor.
/// Returns the handle root entity.
pub fn spawn_handle(
    world: &mut World,
    parent: Entity,
    local_translation: Vec3,
    local_rotation: Quat,
    meta: HandleMeta,
    config: &GizmoConfig,
) -> Entity {
    ensure_gizmo_meshes(world);

    let parts = enabled_parts(config);
    let mut palette = HashMap::new();
    {
        let mut materials = world.resource_mut::<Assets<StandardMaterial>>();
        for &part in &parts {
            let color = part_color(part, config.center_color);
            palette.insert(
                part,
                [
                    materials.add(state_material(color, GizmoState::Normal, config)),
                    materials.add(state_material(color, GizmoState::Hover, config)),
                    materials.add(state_material(color, GizmoState::Active, config)),
                ],
            );
        }
    }

    let gizmo = HandleGizmo {
        base_diameter: config.base_diameter,
        pixel_diameter: config.pixel_diameter,
        states: parts.iter().map(|&p| (p, GizmoState::Normal)).collect(),
        palette,
    };
    let normal_of = |g: &HandleGizmo, part| {
        g.material_for(part, GizmoState::Normal)
            .unwrap_or_default()
    };

    let meshes = world.resource::<GizmoMeshes>();
    let (sphere, shaft, cone) = (
        meshes.sphere.clone(),
        meshes.shaft.clone(),
        meshes.cone.clone(),
    );

    let center_material = normal_of(&gizmo, GizmoPart::Center);
    let root = world
        .spawn((
            meta,
            Transform::from_translation(local_translation).with_rotation(local_rotation),
            Visibility::default(),
            ChildOf(parent),
        ))
        .id();

    world.spawn((
        Mesh3d(sphere),
        MeshMaterial3d(center_material),
        Transform::default(),
        GizmoPartTag { part: GizmoPart::Center },
        PickBounds::Sphere { radius: CENTER_RADIUS * 1.4 },
        HandleRef(root),
        ChildOf(root),
    ));

    for &part in &parts {
        let Some(dir) = part.direction() else { continue };
        let material = normal_of(&gizmo, part);
        let rotation = Quat::from_rotation_arc(Vec3::Y, dir);
        let span = SHAFT_LENGTH + CONE_HEIGHT;
        let arrow = world
            .spawn((
                Transform::from_rotation(rotation),
                Visibility::default(),
                GizmoPartTag { part },
                PickBounds::Box {
                    half_extents: Vec3::new(CONE_RADIUS, span * 0.5, CONE_RADIUS),
                    offset: Vec3::Y * (ARROW_START + span * 0.5),
                },
                HandleRef(root),
                ChildOf(root),
            ))
            .id();
        world.spawn((
            Mesh3d(shaft.clone()),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(Vec3::Y * (ARROW_START + SHAFT_LENGTH * 0.5)),
            GizmoPartTag { part },
            HandleRef(root),
            ChildOf(arrow),
        ));
        world.spawn((
            Mesh3d(cone.clone()),
            MeshMaterial3d(material),
            Transform::from_translation(Vec3::Y * (ARROW_START + SHAFT_LENGTH + CONE_HEIGHT * 0.5)),
            GizmoPartTag { part },
            HandleRef(root),
            ChildOf(arrow),
        ));
    }

    world.entity_mut(root).insert(gizmo);
    root
}

// ---------------------------------------------------------------------------
// State changes
// ---------------------------------------------------------------------------

fn collect_part_meshes(world: &mut World, root: Entity, part: GizmoPart) -> Vec<Entity> {
    let mut found = Vec::new();
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        if let Some(children) = world.get::<Children>(entity) {
            stack.extend(children.iter());
        }
        let tagged = world
            .get::<GizmoPartTag>(entity)
            .is_some_and(|tag| tag.part == part);
        if tagged && world.get::<Mesh3d>(entity).is_some() {
            found.push(entity);
        }
    }
    found
}

/// Restyle exactly the sub-meshes of one part; other parts keep their state.
/// Unknown handles or parts are no-ops.
pub fn set_part_state(world: &mut World, handle: Entity, part: GizmoPart, state: GizmoState) {
    let Some(mut gizmo) = world.get_mut::<HandleGizmo>(handle) else {
        return;
    };
    if gizmo.state_of(part) == state {
        return;
    }
    let Some(material) = gizmo.material_for(part, state) else {
        return;
    };
    gizmo.states.insert(part, state);

    for entity in collect_part_meshes(world, handle, part) {
        if let Some(mut slot) = world.get_mut::<MeshMaterial3d<StandardMaterial>>(entity) {
            slot.0 = material.clone();
        }
    }
}

/// Reset every part of a handle to the normal state.
pub fn clear_states(world: &mut World, handle: Entity) {
    let Some(gizmo) = world.get::<HandleGizmo>(handle) else {
        return;
    };
    let parts: Vec<GizmoPart> = gizmo.parts().collect();
    for part in parts {
        set_part_state(world, handle, part, GizmoState::Normal);
    }
}

/// Despawn a handle and its whole subtree. Safe to call repeatedly.
pub fn despawn_handle(world: &mut World, handle: Entity) {
    if let Ok(entity) = world.get_entity_mut(handle) {
        entity.despawn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HandleKind;

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(Assets::<Mesh>::default());
        world.insert_resource(Assets::<StandardMaterial>::default());
        world
    }

    fn spawn_default(world: &mut World) -> Entity {
        let parent = world.spawn(Transform::default()).id();
        let meta = HandleMeta {
            node: parent,
            kind: HandleKind::FloorCenter,
        };
        spawn_handle(
            world,
            parent,
            Vec3::ZERO,
            Quat::IDENTITY,
            meta,
            &GizmoConfig::default(),
        )
    }

    fn material_of(world: &mut World, root: Entity, part: GizmoPart) -> Handle<StandardMaterial> {
        let entities = collect_part_meshes(world, root, part);
        assert!(!entities.is_empty(), "no sub-mesh tagged {part:?}");
        world
            .get::<MeshMaterial3d<StandardMaterial>>(entities[0])
            .unwrap()
            .0
            .clone()
    }

    #[test]
    fn default_config_builds_center_and_six_arrows() {
        let mut world = test_world();
        let root = spawn_default(&mut world);
        let gizmo = world.get::<HandleGizmo>(root).unwrap();
        assert_eq!(gizmo.parts().count(), 7);
    }

    #[test]
    fn axis_mask_limits_parts() {
        let mut world = test_world();
        let parent = world.spawn(Transform::default()).id();
        let config = GizmoConfig {
            axes: [true, false, false],
            negative_axes: false,
            ..default()
        };
        let root = spawn_handle(
            &mut world,
            parent,
            Vec3::ZERO,
            Quat::IDENTITY,
            HandleMeta {
                node: parent,
                kind: HandleKind::FloorRadius,
            },
            &config,
        );
        let gizmo = world.get::<HandleGizmo>(root).unwrap();
        let mut parts: Vec<GizmoPart> = gizmo.parts().collect();
        parts.sort_by_key(|p| format!("{p:?}"));
        assert_eq!(parts.len(), 2);
        assert!(parts.contains(&GizmoPart::Center));
        assert!(parts.contains(&GizmoPart::Axis {
            axis: GizmoAxis::X,
            negative: false
        }));
    }

    #[test]
    fn set_state_only_touches_the_named_part() {
        let mut world = test_world();
        let root = spawn_default(&mut world);
        let x_part = GizmoPart::Axis {
            axis: GizmoAxis::X,
            negative: false,
        };
        let center_before = material_of(&mut world, root, GizmoPart::Center);
        let x_before = material_of(&mut world, root, x_part);

        set_part_state(&mut world, root, x_part, GizmoState::Hover);

        assert_ne!(material_of(&mut world, root, x_part), x_before);
        assert_eq!(material_of(&mut world, root, GizmoPart::Center), center_before);
        let gizmo = world.get::<HandleGizmo>(root).unwrap();
        assert_eq!(gizmo.state_of(x_part), GizmoState::Hover);
        assert_eq!(gizmo.state_of(GizmoPart::Center), GizmoState::Normal);
    }

    #[test]
    fn clear_states_restores_normal_materials() {
        let mut world = test_world();
        let root = spawn_default(&mut world);
        let normal = material_of(&mut world, root, GizmoPart::Center);
        set_part_state(&mut world, root, GizmoPart::Center, GizmoState::Active);
        clear_states(&mut world, root);
        assert_eq!(material_of(&mut world, root, GizmoPart::Center), normal);
    }

    #[test]
    fn despawn_is_idempotent() {
        let mut world = test_world();
        let root = spawn_default(&mut world);
        despawn_handle(&mut world, root);
        despawn_handle(&mut world, root);
        assert!(world.get_entity(root).is_err());
    }

    #[test]
    fn opacity_is_clamped_not_rejected() {
        let config = GizmoConfig {
            opacity: -3.0,
            ..default()
        };
        let material = state_material(Color::WHITE, GizmoState::Active, &config);
        assert!(material.base_color.alpha() >= MIN_OPACITY);
    }
}
