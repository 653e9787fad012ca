use std::collections::HashMap;

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::context::{EditContext, HighlightKey};
use crate::gizmo::{
    self, GizmoPart, GizmoPartTag, GizmoState, HandleGizmo, HandleMeta, HandleRef, PickBounds,
};
use crate::screen_size;
use crate::viewport_util;

pub mod floor;
pub mod road;
pub mod wall;

pub struct HandlesPlugin;

impl Plugin for HandlesPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EditContext>()
            .init_resource::<crate::circle_fit::CircleFitParams>()
            .init_resource::<HandleResync>()
            .init_resource::<wall::WallHandles>()
            .init_resource::<road::RoadHandles>()
            .init_resource::<floor::FloorHandles>()
            .add_systems(
                Update,
                (
                    sync_selected_handles,
                    update_hover,
                    floor::face_radius_handle_to_camera,
                    screen_size::update_handle_screen_size,
                )
                    .chain(),
            );
    }
}

// ---------------------------------------------------------------------------
// Per-node handle sets
// ---------------------------------------------------------------------------

/// One node's built handle set, cached against its definition signature.
pub struct HandleSet {
    pub signature: u64,
    pub handles: Vec<Entity>,
}

/// Shared storage shape for the per-renderer state resources.
#[derive(Default)]
pub struct HandleSets {
    map: HashMap<Entity, HandleSet>,
}

impl HandleSets {
    pub fn get(&self, node: Entity) -> Option<&HandleSet> {
        self.map.get(&node)
    }

    pub fn signature(&self, node: Entity) -> Option<u64> {
        self.map.get(&node).map(|set| set.signature)
    }

    pub fn insert(&mut self, node: Entity, set: HandleSet) {
        self.map.insert(node, set);
    }

    pub fn remove(&mut self, node: Entity) -> Option<HandleSet> {
        self.map.remove(&node)
    }

    pub fn nodes(&self) -> Vec<Entity> {
        self.map.keys().copied().collect()
    }
}

/// Tear down a node's handles and forget any highlight keys pointing at it.
pub fn despawn_set(world: &mut World, node: Entity, set: HandleSet) {
    for handle in set.handles {
        gizmo::despawn_handle(world, handle);
    }
    if let Some(mut ctx) = world.get_resource_mut::<EditContext>() {
        ctx.forget_node(node);
    }
}

/// A cached set is reusable when every handle root still exists. Roots that
/// lost their parent (e.g. a scene tool detached them) are re-adopted rather
/// than rebuilt.
pub fn reclaim_set(world: &mut World, node: Entity, set: &HandleSet) -> bool {
    if set
        .handles
        .iter()
        .any(|&handle| world.get_entity(handle).is_err())
    {
        return false;
    }
    for &handle in &set.handles {
        if world.get::<ChildOf>(handle).is_none() {
            world.entity_mut(handle).insert(ChildOf(node));
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Deferred rebuilds
// ---------------------------------------------------------------------------

/// Nodes whose handles must be rebuilt on the next sync pass regardless of
/// signature. Drag commits queue here so the rebuild happens once per frame,
/// after the definition write has landed.
#[derive(Resource, Default)]
pub struct HandleResync {
    queue: Vec<Entity>,
}

impl HandleResync {
    pub fn request(&mut self, node: Entity) {
        if !self.queue.contains(&node) {
            self.queue.push(node);
        }
    }

    fn drain(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.queue)
    }
}

/// Once-per-frame reconciliation of handle sets against selection and
/// definition state, across every renderer.
pub fn sync_selected_handles(world: &mut World) {
    let forced = world.resource_mut::<HandleResync>().drain();
    wall::sync(world, &forced);
    road::sync(world, &forced);
    floor::sync(world, &forced);
}

// ---------------------------------------------------------------------------
// Picking
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct PickHit {
    /// Handle root entity.
    pub handle: Entity,
    pub meta: HandleMeta,
    pub part: GizmoPart,
    pub distance: f32,
    /// World-space point where the ray entered the part's pick volume.
    pub point: Vec3,
}

/// Cast a ray against every pickable handle sub-entity and return the nearest
/// hit. Invisible joint handles are deliberately still pickable.
pub fn pick_handle(world: &mut World, ray: Ray3d) -> Option<PickHit> {
    let mut best: Option<(Entity, GizmoPart, f32)> = None;
    let mut query = world.query::<(&PickBounds, &GlobalTransform, &HandleRef, &GizmoPartTag)>();
    for (bounds, transform, handle_ref, tag) in query.iter(world) {
        let hit = match *bounds {
            PickBounds::Sphere { radius } => {
                let scale = transform.scale();
                let world_radius = radius * scale.x.max(scale.y).max(scale.z);
                viewport_util::ray_sphere(ray, transform.translation(), world_radius)
            }
            PickBounds::Box {
                half_extents,
                offset,
            } => viewport_util::ray_obb(ray, transform, half_extents, offset),
        };
        if let Some(distance) = hit {
            if best.is_none_or(|(_, _, d)| distance < d) {
                best = Some((handle_ref.0, tag.part, distance));
            }
        }
    }
    let (root, part, distance) = best?;
    let meta = *world.get::<HandleMeta>(root)?;
    Some(PickHit {
        handle: root,
        meta,
        part,
        distance,
        point: ray.origin + *ray.direction * distance,
    })
}

/// Picking ray through the cursor, for exclusive systems.
pub fn viewport_ray(world: &mut World) -> Option<Ray3d> {
    let cursor = cursor_position(world)?;
    let mut cameras = world.query::<(&Camera, &GlobalTransform)>();
    let (camera, transform) = cameras
        .iter(world)
        .find(|(camera, _)| camera.is_active)?;
    camera.viewport_to_world(transform, cursor).ok()
}

pub fn cursor_position(world: &mut World) -> Option<Vec2> {
    let mut windows = world.query_filtered::<&Window, With<PrimaryWindow>>();
    windows.single(world).ok()?.cursor_position()
}

// ---------------------------------------------------------------------------
// Highlight propagation
// ---------------------------------------------------------------------------

fn root_for_key(world: &mut World, key: HighlightKey) -> Option<Entity> {
    let mut query = world.query::<(Entity, &HandleMeta)>();
    query
        .iter(world)
        .find(|(_, meta)| meta.key() == key)
        .map(|(entity, _)| entity)
}

/// Recompute every part state of one handle from the shared context. While a
/// key is active all of its parts render at hover emphasis or better, with
/// the grabbed part promoted to active; everything else is normal.
pub fn restyle_handle(world: &mut World, root: Entity) {
    let Some(meta) = world.get::<HandleMeta>(root).copied() else {
        return;
    };
    let key = meta.key();
    let (hovered, active) = {
        let ctx = world.resource::<EditContext>();
        (ctx.hovered(), ctx.active())
    };
    let Some(gizmo) = world.get::<HandleGizmo>(root) else {
        return;
    };
    let parts: Vec<GizmoPart> = gizmo.parts().collect();
    for part in parts {
        let state = match active {
            Some((active_key, active_part)) if active_key == key => {
                if active_part == part {
                    GizmoState::Active
                } else {
                    GizmoState::Hover
                }
            }
            Some(_) => GizmoState::Normal,
            None => match hovered {
                Some((hover_key, hover_part)) if hover_key == key && hover_part == part => {
                    GizmoState::Hover
                }
                _ => GizmoState::Normal,
            },
        };
        gizmo::set_part_state(world, root, part, state);
    }
}

fn restyle_for_key(world: &mut World, key: HighlightKey) {
    if let Some(root) = root_for_key(world, key) {
        restyle_handle(world, root);
    }
}

/// Swap the single global active key and restyle the handles on both sides.
pub fn set_active_handle(world: &mut World, value: Option<(HighlightKey, GizmoPart)>) {
    let previous = world.resource::<EditContext>().active();
    if !world.resource_mut::<EditContext>().set_active(value) {
        return;
    }
    if let Some((key, _)) = previous {
        restyle_for_key(world, key);
    }
    if let Some((key, _)) = value {
        restyle_for_key(world, key);
    }
}

/// Per-frame hover pass. Suppressed entirely while a drag holds an active
/// key, so emphasis cannot flicker mid-drag.
pub fn update_hover(world: &mut World) {
    if world.resource::<EditContext>().active().is_some() {
        return;
    }
    let hit = viewport_ray(world).and_then(|ray| pick_handle(world, ray));
    let value = hit.map(|hit| (hit.meta.key(), hit.part));

    let previous = world.resource::<EditContext>().hovered();
    if !world.resource_mut::<EditContext>().set_hovered(value) {
        return;
    }
    if let Some((key, _)) = previous {
        restyle_for_key(world, key);
    }
    if let Some((key, _)) = value {
        restyle_for_key(world, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HandleKind;
    use crate::gizmo::GizmoConfig;

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(Assets::<Mesh>::default());
        world.insert_resource(Assets::<StandardMaterial>::default());
        world.insert_resource(EditContext::default());
        world
    }

    fn spawn_test_handle(world: &mut World, kind: HandleKind) -> (Entity, Entity) {
        let node = world.spawn(Transform::default()).id();
        let root = gizmo::spawn_handle(
            world,
            node,
            Vec3::ZERO,
            Quat::IDENTITY,
            HandleMeta { node, kind },
            &GizmoConfig::default(),
        );
        (node, root)
    }

    #[test]
    fn active_key_promotes_all_parts() {
        let mut world = test_world();
        let (node, root) = spawn_test_handle(&mut world, HandleKind::FloorCenter);
        let key = HighlightKey {
            node,
            kind: HandleKind::FloorCenter,
        };

        set_active_handle(&mut world, Some((key, GizmoPart::Center)));

        let gizmo = world.get::<HandleGizmo>(root).unwrap();
        assert_eq!(gizmo.state_of(GizmoPart::Center), GizmoState::Active);
        for part in gizmo.parts().collect::<Vec<_>>() {
            let gizmo = world.get::<HandleGizmo>(root).unwrap();
            assert!(gizmo.state_of(part) >= GizmoState::Hover);
        }
    }

    #[test]
    fn activating_one_key_normalizes_the_other() {
        let mut world = test_world();
        let (node_a, root_a) = spawn_test_handle(&mut world, HandleKind::FloorCenter);
        let (node_b, root_b) = spawn_test_handle(&mut world, HandleKind::FloorRadius);
        let key_a = HighlightKey {
            node: node_a,
            kind: HandleKind::FloorCenter,
        };
        let key_b = HighlightKey {
            node: node_b,
            kind: HandleKind::FloorRadius,
        };

        set_active_handle(&mut world, Some((key_a, GizmoPart::Center)));
        set_active_handle(&mut world, Some((key_b, GizmoPart::Center)));

        let a = world.get::<HandleGizmo>(root_a).unwrap();
        assert_eq!(a.state_of(GizmoPart::Center), GizmoState::Normal);
        let b = world.get::<HandleGizmo>(root_b).unwrap();
        assert_eq!(b.state_of(GizmoPart::Center), GizmoState::Active);
    }

    #[test]
    fn clearing_the_active_key_restores_normal() {
        let mut world = test_world();
        let (node, root) = spawn_test_handle(&mut world, HandleKind::FloorCenter);
        let key = HighlightKey {
            node,
            kind: HandleKind::FloorCenter,
        };
        set_active_handle(&mut world, Some((key, GizmoPart::Center)));
        set_active_handle(&mut world, None);

        let gizmo = world.get::<HandleGizmo>(root).unwrap();
        for part in gizmo.parts().collect::<Vec<_>>() {
            let gizmo = world.get::<HandleGizmo>(root).unwrap();
            assert_eq!(gizmo.state_of(part), GizmoState::Normal);
        }
    }

    #[test]
    fn pick_prefers_the_nearest_part() {
        let mut world = test_world();
        let (_, _root) = spawn_test_handle(&mut world, HandleKind::FloorCenter);
        // Transforms have not propagated; spawn a second handle far along -Z
        // by giving its node a translation and manually propagating.
        let ray = Ray3d::new(Vec3::new(0.0, 0.0, 5.0), Dir3::NEG_Z);

        // Without GlobalTransform propagation every part sits at the origin;
        // the center sphere is the closest volume the ray enters.
        let hit = pick_handle(&mut world, ray).expect("ray through origin hits the handle");
        assert_eq!(hit.part, GizmoPart::Center);
    }

    #[test]
    fn pick_reports_the_world_hit_point() {
        let mut world = test_world();
        let (_, _root) = spawn_test_handle(&mut world, HandleKind::FloorCenter);
        let ray = Ray3d::new(Vec3::new(0.0, 0.0, 5.0), Dir3::NEG_Z);

        let hit = pick_handle(&mut world, ray).expect("ray through origin hits the handle");
        let expected = ray.origin + *ray.direction * hit.distance;
        assert!(hit.point.distance(expected) < 1e-5);
        // Entering the center sphere from +Z, the hit lies on the near side.
        assert!(hit.point.z > 0.0 && hit.point.z < 5.0);
        assert!(hit.point.x.abs() < 1e-5 && hit.point.y.abs() < 1e-5);
    }

    #[test]
    fn reclaim_fails_when_a_root_died() {
        let mut world = test_world();
        let (node, root) = spawn_test_handle(&mut world, HandleKind::FloorCenter);
        let set = HandleSet {
            signature: 1,
            handles: vec![root],
        };
        assert!(reclaim_set(&mut world, node, &set));
        world.entity_mut(root).despawn();
        assert!(!reclaim_set(&mut world, node, &set));
    }

    #[test]
    fn reclaim_reparents_detached_roots() {
        let mut world = test_world();
        let (node, root) = spawn_test_handle(&mut world, HandleKind::FloorCenter);
        world.entity_mut(root).remove::<ChildOf>();
        let set = HandleSet {
            signature: 1,
            handles: vec![root],
        };
        assert!(reclaim_set(&mut world, node, &set));
        assert_eq!(world.get::<ChildOf>(root).map(|c| c.0), Some(node));
    }
}
