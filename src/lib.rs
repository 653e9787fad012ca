pub mod circle_fit;
pub mod commands;
pub mod context;
pub mod drag;
pub mod gizmo;
pub mod handles;
pub mod pointer;
pub mod screen_size;
pub mod selection;
pub mod signature;
pub mod snapping;
pub mod store;
pub mod viewport_util;

use bevy::prelude::*;

/// Everything needed to edit procedurally generated structures in place:
/// definition components and mesh regeneration from `magpie_structures`,
/// manipulation handles over the selected node, and the drag pipeline that
/// commits edits through the undo history.
pub struct StructureEditPlugin;

impl Plugin for StructureEditPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            magpie_structures::StructuresPlugin,
            selection::SelectionPlugin,
            commands::CommandHistoryPlugin,
            snapping::SnappingPlugin,
            handles::HandlesPlugin,
            drag::DragPlugin,
        ));
    }
}
