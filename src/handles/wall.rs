use bevy::prelude::*;
use magpie_structures::WallDefinition;

use super::{despawn_set, reclaim_set, HandleSet, HandleSets};
use crate::circle_fit::{chain_vertices, classify_circle, partition_chains, CircleFitParams};
use crate::context::{ChainEnd, HandleKind};
use crate::gizmo::{self, GizmoConfig, HandleMeta};
use crate::selection::{Locked, Selection};
use crate::signature::wall_signature;

#[derive(Resource, Default)]
pub struct WallHandles(pub HandleSets);

/// One handle to build: where, what it edits, how it looks.
pub struct HandleSpec {
    pub kind: HandleKind,
    pub position: Vec3,
    pub config: GizmoConfig,
}

fn endpoint_config() -> GizmoConfig {
    GizmoConfig {
        axes: [true, false, true],
        negative_axes: true,
        ..default()
    }
}

fn joint_config() -> GizmoConfig {
    // Invisible until hovered, but always pickable.
    GizmoConfig {
        axes: [false, false, false],
        negative_axes: false,
        hide_normal_state: true,
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

/// Pure handle layout for a wall definition. Circle-classified chains get
/// exactly a center and a radius handle; every other chain gets endpoint
/// handles at its termini and joint handles at interior vertices. All
/// positions are raised to mid-wall height.
pub fn handle_specs(def: &WallDefinition, params: &CircleFitParams) -> Vec<HandleSpec> {
    let mid = Vec3::Y * (def.height * 0.5);
    let mut specs = Vec::new();
    for span in partition_chains(&def.segments, params.closure_epsilon) {
        let chain_start = span.first as u32;
        let chain_end = span.last as u32;
        if let Some(circle) = classify_circle(&def.segments, span, params) {
            specs.push(HandleSpec {
                kind: HandleKind::WallCircleCenter {
                    chain_start,
                    chain_end,
                },
                position: circle.center + mid,
                config: GizmoConfig::default(),
            });
            specs.push(HandleSpec {
                kind: HandleKind::WallCircleRadius {
                    chain_start,
                    chain_end,
                },
                position: circle.center + Vec3::X * circle.radius + mid,
                config: radius_config(),
            });
            continue;
        }
        specs.push(HandleSpec {
            kind: HandleKind::WallEndpoint {
                chain_start,
                chain_end,
                end: ChainEnd::Start,
            },
            position: def.segments[span.first].start + mid,
            config: endpoint_config(),
        });
        specs.push(HandleSpec {
            kind: HandleKind::WallEndpoint {
                chain_start,
                chain_end,
                end: ChainEnd::End,
            },
            position: def.segments[span.last].end + mid,
            config: endpoint_config(),
        });
        let vertices = chain_vertices(&def.segments, span, params.closure_epsilon);
        for vertex in 1..vertices.len().saturating_sub(1) {
            specs.push(HandleSpec {
                kind: HandleKind::WallJoint {
                    chain_start,
                    chain_end,
                    vertex: vertex as u32,
                },
                position: vertices[vertex] + mid,
                config: joint_config(),
            });
        }
    }
    specs
}

/// Reconcile one node's wall handles against its current definition. A
/// matching signature reuses the existing set wholesale; anything else tears
/// down and rebuilds. Never patches individual handles.
pub fn ensure(world: &mut World, handles: &mut HandleSets, node: Entity, force: bool) {
    let Some(def) = world.get::<WallDefinition>(node).cloned() else {
        clear(world, handles, node);
        return;
    };
    let signature = wall_signature(&def);
    if !force {
        if let Some(set) = handles.get(node) {
            if set.signature == signature && reclaim_set(world, node, set) {
                return;
            }
        }
    }
    clear(world, handles, node);

    let params = *world.resource::<CircleFitParams>();
    let specs = handle_specs(&def, &params);
    let spawned = specs
        .iter()
        .map(|spec| {
            gizmo::spawn_handle(
                world,
                node,
                spec.position,
                Quat::IDENTITY,
                HandleMeta {
                    node,
                    kind: spec.kind,
                },
                &spec.config,
            )
        })
        .collect::<Vec<_>>();
    debug!("rebuilt {} wall handles for {node}", spawned.len());
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

/// Queue-driven and selection-driven reconciliation, called once per frame.
pub(super) fn sync(world: &mut World, forced: &[Entity]) {
    let target = world
        .resource::<Selection>()
        .primary()
        .filter(|&node| {
            world.get::<WallDefinition>(node).is_some() && world.get::<Locked>(node).is_none()
        });
    world.resource_scope(|world, mut res: Mut<WallHandles>| {
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
    use magpie_structures::WallSegment;

    fn open_wall(segments: usize) -> WallDefinition {
        WallDefinition {
            segments: (0..segments)
                .map(|i| {
                    WallSegment::new(
                        Vec3::new(i as f32, 0.0, 0.0),
                        Vec3::new(i as f32 + 1.0, 0.0, 0.0),
                    )
                })
                .collect(),
            ..default()
        }
    }

    fn ring_wall(sides: usize, radius: f32) -> WallDefinition {
        WallDefinition {
            segments: (0..sides)
                .map(|i| {
                    let a = std::f32::consts::TAU * i as f32 / sides as f32;
                    let b = std::f32::consts::TAU * (i + 1) as f32 / sides as f32;
                    WallSegment::new(
                        Vec3::new(radius * a.cos(), 0.0, radius * a.sin()),
                        Vec3::new(radius * b.cos(), 0.0, radius * b.sin()),
                    )
                })
                .collect(),
            ..default()
        }
    }

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(Assets::<Mesh>::default());
        world.insert_resource(Assets::<StandardMaterial>::default());
        world.insert_resource(EditContext::default());
        world.insert_resource(CircleFitParams::default());
        world
    }

    #[test]
    fn open_chain_gets_endpoints_plus_interior_joints() {
        let def = open_wall(4);
        let specs = handle_specs(&def, &CircleFitParams::default());
        let endpoints = specs
            .iter()
            .filter(|s| matches!(s.kind, HandleKind::WallEndpoint { .. }))
            .count();
        let joints = specs
            .iter()
            .filter(|s| matches!(s.kind, HandleKind::WallJoint { .. }))
            .count();
        assert_eq!(endpoints, 2);
        assert_eq!(joints, 3);
    }

    #[test]
    fn circle_chain_gets_exactly_center_and_radius() {
        let def = ring_wall(20, 6.0);
        let specs = handle_specs(&def, &CircleFitParams::default());
        assert_eq!(specs.len(), 2);
        assert!(specs
            .iter()
            .any(|s| matches!(s.kind, HandleKind::WallCircleCenter { .. })));
        assert!(specs
            .iter()
            .any(|s| matches!(s.kind, HandleKind::WallCircleRadius { .. })));
    }

    #[test]
    fn handles_are_raised_to_mid_height() {
        let def = open_wall(1);
        let specs = handle_specs(&def, &CircleFitParams::default());
        assert!(specs.iter().all(|s| (s.position.y - def.height * 0.5).abs() < 1e-6));
    }

    #[test]
    fn two_disjoint_chains_each_get_their_own_handles() {
        let mut def = open_wall(2);
        def.segments.push(WallSegment::new(
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(12.0, 0.0, 10.0),
        ));
        let specs = handle_specs(&def, &CircleFitParams::default());
        let endpoints = specs
            .iter()
            .filter(|s| matches!(s.kind, HandleKind::WallEndpoint { .. }))
            .count();
        assert_eq!(endpoints, 4);
    }

    #[test]
    fn unchanged_signature_reuses_the_same_entities() {
        let mut world = test_world();
        let node = world.spawn((open_wall(3), Transform::default())).id();
        let mut handles = HandleSets::default();

        ensure(&mut world, &mut handles, node, false);
        let before = handles.get(node).unwrap().handles.clone();
        ensure(&mut world, &mut handles, node, false);
        let after = handles.get(node).unwrap().handles.clone();
        assert_eq!(before, after);
    }

    #[test]
    fn changed_definition_rebuilds_from_scratch() {
        let mut world = test_world();
        let node = world.spawn((open_wall(3), Transform::default())).id();
        let mut handles = HandleSets::default();

        ensure(&mut world, &mut handles, node, false);
        let before = handles.get(node).unwrap().handles.clone();

        world.entity_mut(node).insert(open_wall(5));
        ensure(&mut world, &mut handles, node, false);
        let after = handles.get(node).unwrap().handles.clone();

        assert_ne!(before, after);
        for old in &before {
            assert!(world.get_entity(*old).is_err());
        }
    }

    #[test]
    fn missing_definition_clears_the_set() {
        let mut world = test_world();
        let node = world.spawn((open_wall(3), Transform::default())).id();
        let mut handles = HandleSets::default();

        ensure(&mut world, &mut handles, node, false);
        let built = handles.get(node).unwrap().handles.clone();

        world.entity_mut(node).remove::<WallDefinition>();
        ensure(&mut world, &mut handles, node, false);

        assert!(handles.get(node).is_none());
        for handle in built {
            assert!(world.get_entity(handle).is_err());
        }
    }
}
