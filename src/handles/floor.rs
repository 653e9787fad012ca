use bevy::prelude::*;
use magpie_structures::{mesh_build::bounds_centroid, FloorDefinition};

use super::{despawn_set, reclaim_set, HandleSet, HandleSets};
use crate::context::{EditContext, HandleKind};
use crate::gizmo::{self, GizmoConfig, HandleMeta};
use crate::selection::{Locked, Selection};
use crate::signature::floor_signature;

pub(crate) const HANDLE_LIFT: f32 = 0.1;

#[derive(Resource, Default)]
pub struct FloorHandles(pub HandleSets);

fn center_config() -> GizmoConfig {
    // Floors translate on the ground plane; the vertical arrows give the
    // center handle an elevation affordance.
    GizmoConfig {
        axes: [false, true, false],
        negative_axes: true,
        ..default()
    }
}

fn radius_config() -> GizmoConfig {
    GizmoConfig {
        axes: [true, false, false],
        negative_axes: false,
        ..default()
    }
}

/// Centroid and mean XZ radius of the floor ring. `None` for rings with
/// fewer than three usable vertices.
pub fn ring_estimate(def: &FloorDefinition) -> Option<(Vec3, f32)> {
    let finite: Vec<Vec3> = def.ring.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.len() < 3 {
        return None;
    }
    let centroid = bounds_centroid(finite.iter().copied())?;
    let radius = finite
        .iter()
        .map(|v| Vec2::new(v.x - centroid.x, v.z - centroid.z).length())
        .sum::<f32>()
        / finite.len() as f32;
    Some((centroid, radius))
}

pub fn ensure(world: &mut World, handles: &mut HandleSets, node: Entity, force: bool) {
    let Some(def) = world.get::<FloorDefinition>(node).cloned() else {
        clear(world, handles, node);
        return;
    };
    let signature = floor_signature(&def);
    if !force {
        if let Some(set) = handles.get(node) {
            if set.signature == signature && reclaim_set(world, node, set) {
                return;
            }
        }
    }
    clear(world, handles, node);

    let Some((centroid, radius)) = ring_estimate(&def) else {
        return;
    };
    let lift = Vec3::Y * HANDLE_LIFT;
    let center = gizmo::spawn_handle(
        world,
        node,
        centroid + lift,
        Quat::IDENTITY,
        HandleMeta {
            node,
            kind: HandleKind::FloorCenter,
        },
        &center_config(),
    );
    let radius_handle = gizmo::spawn_handle(
        world,
        node,
        centroid + Vec3::X * radius + lift,
        Quat::IDENTITY,
        HandleMeta {
            node,
            kind: HandleKind::FloorRadius,
        },
        &radius_config(),
    );
    debug!("rebuilt floor handles for {node}");
    handles.insert(
        node,
        HandleSet {
            signature,
            handles: vec![center, radius_handle],
        },
    );
}

/// Rebuild unconditionally, ignoring the cached signature.
pub fn force_rebuild(world: &mut World, handles: &mut HandleSets, node: Entity) {
    ensure(world, handles, node, true);
}

pub fn clear(world: &mut World, handles: &mut HandleSets, node: Entity) {
    if let Some(set) = handles.remove(node) {
        despawn_set(world, node, set);
    }
}

pub(super) fn sync(world: &mut World, forced: &[Entity]) {
    let target = world
        .resource::<Selection>()
        .primary()
        .filter(|&node| {
            world.get::<FloorDefinition>(node).is_some() && world.get::<Locked>(node).is_none()
        });
    world.resource_scope(|world, mut res: Mut<FloorHandles>| {
        for node in res.0.nodes() {
            if Some(node) != target {
                clear(world, &mut res.0, node);
            }
        }
        if let Some(node) = target {
            ensure(world, &mut res.0, node, forced.contains(&node));
        }
    });
}

/// Keeps the radius handle on the camera-facing side of the ring so it is
/// never hidden behind the floor being edited. Frozen while its key is
/// active so a drag does not fight the repositioning.
pub fn face_radius_handle_to_camera(
    ctx: Res<EditContext>,
    cameras: Query<(&Camera, &GlobalTransform)>,
    nodes: Query<(&FloorDefinition, &GlobalTransform)>,
    mut radius_handles: Query<(&HandleMeta, &mut Transform)>,
) {
    let Some((_, camera_transform)) = cameras.iter().find(|(camera, _)| camera.is_active) else {
        return;
    };
    let camera_pos = camera_transform.translation();

    for (meta, mut transform) in &mut radius_handles {
        if meta.kind != HandleKind::FloorRadius {
            continue;
        }
        if ctx.is_active_key(meta.key()) {
            continue;
        }
        let Ok((def, node_transform)) = nodes.get(meta.node) else {
            continue;
        };
        let Some((centroid, radius)) = ring_estimate(def) else {
            continue;
        };
        // Camera direction in node-local space, flattened to the ground.
        let local_camera = node_transform
            .affine()
            .inverse()
            .transform_point3(camera_pos);
        let to_camera = Vec3::new(local_camera.x - centroid.x, 0.0, local_camera.z - centroid.z);
        let Ok(dir) = Dir3::new(to_camera) else {
            continue;
        };
        transform.translation = centroid + *dir * radius + Vec3::Y * HANDLE_LIFT;
        transform.rotation = Quat::from_rotation_arc(Vec3::X, *dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_floor() -> FloorDefinition {
        FloorDefinition {
            ring: vec![
                Vec3::new(-2.0, 0.0, -2.0),
                Vec3::new(2.0, 0.0, -2.0),
                Vec3::new(2.0, 0.0, 2.0),
                Vec3::new(-2.0, 0.0, 2.0),
            ],
            ..default()
        }
    }

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(Assets::<Mesh>::default());
        world.insert_resource(Assets::<StandardMaterial>::default());
        world.insert_resource(EditContext::default());
        world
    }

    #[test]
    fn square_ring_estimate_is_centered() {
        let (centroid, radius) = ring_estimate(&square_floor()).unwrap();
        assert!(centroid.distance(Vec3::ZERO) < 1e-6);
        assert!((radius - (2.0 * std::f32::consts::SQRT_2)).abs() < 1e-4);
    }

    #[test]
    fn degenerate_ring_builds_nothing() {
        let mut world = test_world();
        let def = FloorDefinition {
            ring: vec![Vec3::ZERO, Vec3::X],
            ..default()
        };
        let node = world.spawn((def, Transform::default())).id();
        let mut handles = HandleSets::default();

        ensure(&mut world, &mut handles, node, false);
        assert!(handles.get(node).is_none());
    }

    #[test]
    fn floor_gets_center_and_radius_handles() {
        let mut world = test_world();
        let node = world.spawn((square_floor(), Transform::default())).id();
        let mut handles = HandleSets::default();

        ensure(&mut world, &mut handles, node, false);
        let set = handles.get(node).unwrap();
        assert_eq!(set.handles.len(), 2);
        let kinds: Vec<HandleKind> = set
            .handles
            .iter()
            .map(|&h| world.get::<HandleMeta>(h).unwrap().kind)
            .collect();
        assert!(kinds.contains(&HandleKind::FloorCenter));
        assert!(kinds.contains(&HandleKind::FloorRadius));
    }

    #[test]
    fn unchanged_floor_keeps_its_handles() {
        let mut world = test_world();
        let node = world.spawn((square_floor(), Transform::default())).id();
        let mut handles = HandleSets::default();

        ensure(&mut world, &mut handles, node, false);
        let before = handles.get(node).unwrap().handles.clone();
        ensure(&mut world, &mut handles, node, false);
        assert_eq!(handles.get(node).unwrap().handles, before);
    }
}
