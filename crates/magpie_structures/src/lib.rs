pub mod format;
pub mod mesh_build;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

pub use format::StructureSet;

// ---------------------------------------------------------------------------
// Definition components
// ---------------------------------------------------------------------------

/// One straight wall run between two node-local points. Walls are authored on
/// the ground plane; `start.y`/`end.y` carry the base elevation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Reflect, Serialize, Deserialize)]
pub struct WallSegment {
    pub start: Vec3,
    pub end: Vec3,
}

impl WallSegment {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }
}

/// Canonical wall data. Serialized. The render mesh is derived from this.
#[derive(Component, Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[reflect(Component, Default)]
pub struct WallDefinition {
    pub segments: Vec<WallSegment>,
    pub height: f32,
    pub thickness: f32,
}

impl Default for WallDefinition {
    fn default() -> Self {
        Self {
            segments: Vec::new(),
            height: 2.4,
            thickness: 0.3,
        }
    }
}

/// Canonical road data: an open polyline swept to a flat ribbon.
#[derive(Component, Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[reflect(Component, Default)]
pub struct RoadDefinition {
    pub points: Vec<Vec3>,
    pub width: f32,
}

impl Default for RoadDefinition {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            width: 3.0,
        }
    }
}

/// Canonical floor data: a closed vertex ring extruded downward.
#[derive(Component, Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[reflect(Component, Default)]
pub struct FloorDefinition {
    pub ring: Vec<Vec3>,
    pub thickness: f32,
}

impl Default for FloorDefinition {
    fn default() -> Self {
        Self {
            ring: Vec::new(),
            thickness: 0.15,
        }
    }
}

// ---------------------------------------------------------------------------
// Generated-mesh plumbing
// ---------------------------------------------------------------------------

/// Marker on the child entity that carries a structure's generated render mesh.
/// This child is the "runtime object" of the owning definition node.
#[derive(Component)]
pub struct StructureMesh {
    pub node: Entity,
}

/// Common surface for the three definition kinds so mesh regeneration can be
/// written once.
pub trait StructureDefinition: Component + Clone {
    const LABEL: &'static str;

    /// Build the render mesh, or `None` when the definition has no renderable
    /// geometry (empty, or only degenerate/non-finite elements).
    fn build_mesh(&self) -> Option<Mesh>;
}

impl StructureDefinition for WallDefinition {
    const LABEL: &'static str = "wall";

    fn build_mesh(&self) -> Option<Mesh> {
        mesh_build::build_wall_mesh(self)
    }
}

impl StructureDefinition for RoadDefinition {
    const LABEL: &'static str = "road";

    fn build_mesh(&self) -> Option<Mesh> {
        mesh_build::build_road_mesh(self)
    }
}

impl StructureDefinition for FloorDefinition {
    const LABEL: &'static str = "floor";

    fn build_mesh(&self) -> Option<Mesh> {
        mesh_build::build_floor_mesh(self)
    }
}

/// Shared materials for generated structure meshes.
#[derive(Resource, Default)]
pub struct StructureMaterials {
    pub surface: Handle<StandardMaterial>,
}

fn setup_structure_materials(
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut shared: ResMut<StructureMaterials>,
) {
    shared.surface = materials.add(StandardMaterial {
        base_color: Color::srgb(0.65, 0.63, 0.58),
        perceptual_roughness: 0.9,
        ..default()
    });
}

/// Replace the generated mesh child whenever a definition changes. The old
/// child is despawned rather than patched; partial updates are not worth the
/// bookkeeping at these mesh sizes.
fn regenerate_structure_meshes<T: StructureDefinition>(
    mut commands: Commands,
    changed: Query<(Entity, &T, Option<&Children>), Changed<T>>,
    generated: Query<(), With<StructureMesh>>,
    mut meshes: ResMut<Assets<Mesh>>,
    shared: Res<StructureMaterials>,
) {
    for (entity, definition, children) in &changed {
        if let Some(children) = children {
            for child in children.iter() {
                if generated.get(child).is_ok() {
                    if let Ok(mut ec) = commands.get_entity(child) {
                        ec.despawn();
                    }
                }
            }
        }

        let Some(mesh) = definition.build_mesh() else {
            debug!("{} definition on {entity} has no renderable geometry", T::LABEL);
            continue;
        };

        commands.spawn((
            StructureMesh { node: entity },
            Mesh3d(meshes.add(mesh)),
            MeshMaterial3d(shared.surface.clone()),
            Transform::default(),
            ChildOf(entity),
        ));
    }
}

// ---------------------------------------------------------------------------
// Plugin
// ---------------------------------------------------------------------------

pub struct StructuresPlugin;

impl Plugin for StructuresPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<WallSegment>()
            .register_type::<WallDefinition>()
            .register_type::<RoadDefinition>()
            .register_type::<FloorDefinition>()
            .init_resource::<StructureMaterials>()
            .add_systems(Startup, setup_structure_materials)
            .add_systems(
                Update,
                (
                    regenerate_structure_meshes::<WallDefinition>,
                    regenerate_structure_meshes::<RoadDefinition>,
                    regenerate_structure_meshes::<FloorDefinition>,
                ),
            );
    }
}
