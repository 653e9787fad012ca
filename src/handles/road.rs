use bevy::prelude::*;
use magpie_structures::RoadDefinition;

use super::{despawn_set, reclaim_set, HandleSet, HandleSets};
use crate::context::HandleKind;
use crate::gizmo::{self, GizmoConfig, HandleMeta};
use crate::selection::{Locked, Selection};
use crate::signature::road_signature;

/// Lift above the road surface so handles never z-fight the ribbon.
pub(crate) const HANDLE_LIFT: f32 = 0.12;

#[derive(Resource, Default)]
pub struct RoadHandles(pub HandleSets);

fn vertex_config(width: f32) -> GizmoConfig {
    GizmoConfig {
        axes: [false, false, false],
        negative_axes: false,
        // Wider roads read better with slightly larger grab targets.
        pixel_diameter: (16.0 + 3.0 * width).clamp(16.0, 40.0),
        ..default()
    }
}

/// One sphere handle per polyline vertex, slightly above the surface.
pub fn handle_positions(def: &RoadDefinition) -> Vec<Vec3> {
    def.points
        .iter()
        .map(|p| *p + Vec3::Y * HANDLE_LIFT)
        .collect()
}

pub fn ensure(world: &mut World, handles: &mut HandleSets, node: Entity, force: bool) {
    let Some(def) = world.get::<RoadDefinition>(node).cloned() else {
        clear(world, handles, node);
        return;
    };
    let signature = road_signature(&def);
    if !force {
        if let Some(set) = handles.get(node) {
            if set.signature == signature && reclaim_set(world, node, set) {
                return;
            }
        }
    }
    clear(world, handles, node);

    let config = vertex_config(def.width);
    let spawned = handle_positions(&def)
        .into_iter()
        .enumerate()
        .map(|(index, position)| {
            gizmo::spawn_handle(
                world,
                node,
                position,
                Quat::IDENTITY,
                HandleMeta {
                    node,
                    kind: HandleKind::RoadVertex {
                        index: index as u32,
                    },
                },
                &config,
            )
        })
        .collect::<Vec<_>>();
    debug!("rebuilt {} road handles for {node}", spawned.len());
    handles.insert(
        node,
        HandleSet {
            signature,
            handles: spawned,
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
            world.get::<RoadDefinition>(node).is_some() && world.get::<Locked>(node).is_none()
        });
    world.resource_scope(|world, mut res: Mut<RoadHandles>| {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EditContext;

    fn road(points: usize) -> RoadDefinition {
        RoadDefinition {
            points: (0..points).map(|i| Vec3::new(i as f32 * 2.0, 0.0, 0.0)).collect(),
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
    fn one_handle_per_vertex() {
        let mut world = test_world();
        let node = world.spawn((road(5), Transform::default())).id();
        let mut handles = HandleSets::default();

        ensure(&mut world, &mut handles, node, false);
        assert_eq!(handles.get(node).unwrap().handles.len(), 5);
    }

    #[test]
    fn handles_sit_above_the_surface() {
        let positions = handle_positions(&road(3));
        assert!(positions.iter().all(|p| p.y > 0.0));
    }

    #[test]
    fn width_change_triggers_a_rebuild() {
        let mut world = test_world();
        let node = world.spawn((road(3), Transform::default())).id();
        let mut handles = HandleSets::default();

        ensure(&mut world, &mut handles, node, false);
        let before = handles.get(node).unwrap().handles.clone();

        let mut def = road(3);
        def.width = 6.0;
        world.entity_mut(node).insert(def);
        ensure(&mut world, &mut handles, node, false);

        assert_ne!(handles.get(node).unwrap().handles, before);
    }
}
