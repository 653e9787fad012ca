use bevy::prelude::*;
use magpie_structures::{FloorDefinition, RoadDefinition, StructureDefinition, WallDefinition};

pub struct CommandHistoryPlugin;

impl Plugin for CommandHistoryPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(CommandHistory::default())
            .add_systems(Update, handle_undo_redo_keys);
    }
}

// ---------------------------------------------------------------------------
// EditorCommand trait
// ---------------------------------------------------------------------------

pub trait EditorCommand: Send + Sync + 'static {
    fn execute(&self, world: &mut World);
    fn undo(&self, world: &mut World);
    fn description(&self) -> &str;
}

// ---------------------------------------------------------------------------
// CommandHistory resource
// ---------------------------------------------------------------------------

#[derive(Resource, Default)]
pub struct CommandHistory {
    pub undo_stack: Vec<Box<dyn EditorCommand>>,
    pub redo_stack: Vec<Box<dyn EditorCommand>>,
}

impl CommandHistory {
    pub fn execute(&mut self, command: Box<dyn EditorCommand>, world: &mut World) {
        command.execute(world);
        self.undo_stack.push(command);
        self.redo_stack.clear();
    }

    pub fn undo(&mut self, world: &mut World) {
        if let Some(command) = self.undo_stack.pop() {
            command.undo(world);
            self.redo_stack.push(command);
        }
    }

    pub fn redo(&mut self, world: &mut World) {
        if let Some(command) = self.redo_stack.pop() {
            command.execute(world);
            self.undo_stack.push(command);
        }
    }
}

// ---------------------------------------------------------------------------
// SetStructureDefinition — replace a whole definition component
// ---------------------------------------------------------------------------

/// Swaps a structure node's definition component between two full snapshots.
/// Drag commits record the pre-drag definition as `old` so undo restores the
/// exact original, not an inverse delta.
pub struct SetStructureDefinition<T: StructureDefinition> {
    pub entity: Entity,
    pub old: T,
    pub new: T,
}

impl<T: StructureDefinition> EditorCommand for SetStructureDefinition<T> {
    fn execute(&self, world: &mut World) {
        if let Ok(mut entity) = world.get_entity_mut(self.entity) {
            entity.insert(self.new.clone());
        }
    }

    fn undo(&self, world: &mut World) {
        if let Ok(mut entity) = world.get_entity_mut(self.entity) {
            entity.insert(self.old.clone());
        }
    }

    fn description(&self) -> &str {
        T::LABEL
    }
}

pub type SetWallDefinition = SetStructureDefinition<WallDefinition>;
pub type SetRoadDefinition = SetStructureDefinition<RoadDefinition>;
pub type SetFloorDefinition = SetStructureDefinition<FloorDefinition>;

// ---------------------------------------------------------------------------
// Keyboard shortcuts
// ---------------------------------------------------------------------------

fn handle_undo_redo_keys(world: &mut World) {
    let keyboard = world.resource::<ButtonInput<KeyCode>>();
    let ctrl = keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]);
    let shift = keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]);
    let z_pressed = keyboard.just_pressed(KeyCode::KeyZ);

    if !ctrl || !z_pressed {
        return;
    }

    let mut history = world.resource_mut::<CommandHistory>();
    // Take ownership to avoid borrow conflict with world
    let command = if shift {
        history.redo_stack.pop()
    } else {
        history.undo_stack.pop()
    };

    if let Some(command) = command {
        if shift {
            command.execute(world);
            world
                .resource_mut::<CommandHistory>()
                .undo_stack
                .push(command);
        } else {
            command.undo(world);
            world
                .resource_mut::<CommandHistory>()
                .redo_stack
                .push(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpie_structures::WallSegment;

    fn wall(x: f32) -> WallDefinition {
        WallDefinition {
            segments: vec![WallSegment::new(Vec3::ZERO, Vec3::new(x, 0.0, 0.0))],
            ..default()
        }
    }

    #[test]
    fn execute_then_undo_restores_the_old_definition() {
        let mut world = World::new();
        let entity = world.spawn(wall(1.0)).id();
        let mut history = CommandHistory::default();

        history.execute(
            Box::new(SetWallDefinition {
                entity,
                old: wall(1.0),
                new: wall(5.0),
            }),
            &mut world,
        );
        assert_eq!(world.get::<WallDefinition>(entity).unwrap(), &wall(5.0));

        history.undo(&mut world);
        assert_eq!(world.get::<WallDefinition>(entity).unwrap(), &wall(1.0));

        history.redo(&mut world);
        assert_eq!(world.get::<WallDefinition>(entity).unwrap(), &wall(5.0));
    }

    #[test]
    fn new_command_clears_the_redo_stack() {
        let mut world = World::new();
        let entity = world.spawn(wall(1.0)).id();
        let mut history = CommandHistory::default();

        history.execute(
            Box::new(SetWallDefinition {
                entity,
                old: wall(1.0),
                new: wall(2.0),
            }),
            &mut world,
        );
        history.undo(&mut world);
        assert_eq!(history.redo_stack.len(), 1);

        history.execute(
            Box::new(SetWallDefinition {
                entity,
                old: wall(1.0),
                new: wall(3.0),
            }),
            &mut world,
        );
        assert!(history.redo_stack.is_empty());
    }

    #[test]
    fn commands_against_despawned_entities_are_harmless() {
        let mut world = World::new();
        let entity = world.spawn(wall(1.0)).id();
        world.despawn(entity);

        let command = SetWallDefinition {
            entity,
            old: wall(1.0),
            new: wall(2.0),
        };
        command.execute(&mut world);
        command.undo(&mut world);
    }
}
