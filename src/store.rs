use bevy::prelude::*;
use magpie_structures::{StructureDefinition, StructureMesh};

use crate::commands::{CommandHistory, SetStructureDefinition};
use crate::selection::{Locked, Selection};

/// Snapshot of a node's definition component, for use as a drag working copy.
pub fn resolve_definition<T: StructureDefinition>(world: &World, node: Entity) -> Option<T> {
    world.get::<T>(node).cloned()
}

/// The generated mesh child of a structure node, if one has been built.
pub fn resolve_runtime_object(world: &World, node: Entity) -> Option<Entity> {
    let children = world.get::<Children>(node)?;
    children
        .iter()
        .find(|&child| world.get::<StructureMesh>(child).is_some())
}

pub fn is_locked(world: &World, node: Entity) -> bool {
    world.get::<Locked>(node).is_some()
}

/// Whether the primary selection refuses edits.
pub fn is_selection_locked(world: &World) -> bool {
    world
        .resource::<Selection>()
        .primary()
        .is_some_and(|node| is_locked(world, node))
}

/// Commit an edited definition through the undo history. `old` is the
/// pre-drag snapshot; the history replays either side on undo/redo.
pub fn commit_definition<T: StructureDefinition>(
    world: &mut World,
    node: Entity,
    old: T,
    new: T,
) {
    if is_locked(world, node) {
        warn!("refusing to edit locked node {node}");
        return;
    }
    world.resource_scope(|world, mut history: Mut<CommandHistory>| {
        history.execute(
            Box::new(SetStructureDefinition {
                entity: node,
                old,
                new,
            }),
            world,
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpie_structures::{WallDefinition, WallSegment};

    fn wall(x: f32) -> WallDefinition {
        WallDefinition {
            segments: vec![WallSegment::new(Vec3::ZERO, Vec3::new(x, 0.0, 0.0))],
            ..default()
        }
    }

    #[test]
    fn runtime_object_is_the_mesh_child() {
        let mut world = World::new();
        let node = world.spawn(wall(1.0)).id();
        let other = world.spawn(ChildOf(node)).id();
        let mesh = world
            .spawn((StructureMesh { node }, ChildOf(node)))
            .id();

        assert_eq!(resolve_runtime_object(&world, node), Some(mesh));
        assert_ne!(resolve_runtime_object(&world, node), Some(other));
    }

    #[test]
    fn commit_is_undoable() {
        let mut world = World::new();
        world.insert_resource(CommandHistory::default());
        let node = world.spawn(wall(1.0)).id();

        commit_definition(&mut world, node, wall(1.0), wall(4.0));
        assert_eq!(world.get::<WallDefinition>(node).unwrap(), &wall(4.0));

        world.resource_scope(|world, mut history: Mut<CommandHistory>| {
            history.undo(world);
        });
        assert_eq!(world.get::<WallDefinition>(node).unwrap(), &wall(1.0));
    }

    #[test]
    fn selection_lock_reflects_the_primary() {
        let mut world = World::new();
        world.insert_resource(Selection::default());
        let node = world.spawn((wall(1.0), Locked)).id();
        assert!(!is_selection_locked(&world));
        world.resource_mut::<Selection>().entities.push(node);
        assert!(is_selection_locked(&world));
    }

    #[test]
    fn locked_nodes_reject_commits() {
        let mut world = World::new();
        world.insert_resource(CommandHistory::default());
        let node = world.spawn((wall(1.0), Locked)).id();

        commit_definition(&mut world, node, wall(1.0), wall(4.0));
        assert_eq!(world.get::<WallDefinition>(node).unwrap(), &wall(1.0));
        assert!(
            world
                .resource::<CommandHistory>()
                .undo_stack
                .is_empty()
        );
    }
}
