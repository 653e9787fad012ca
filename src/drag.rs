use bevy::picking::pointer::PointerId;
use bevy::prelude::*;
use magpie_structures::{
    FloorDefinition, RoadDefinition, StructureDefinition, WallDefinition,
};

use crate::context::{ChainEnd, HandleKind, HighlightKey};
use crate::gizmo::GizmoPart;
use crate::handles::{self, HandleResync, PickHit};
use crate::pointer::{PointerSessions, SessionKind};
use crate::selection::Locked;
use crate::signature::{floor_signature, road_signature, wall_signature};
use crate::snapping::SnapSettings;
use crate::store;
use crate::viewport_util::ray_plane_y;

pub struct DragPlugin;

impl Plugin for DragPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PointerSessions>()
            .init_resource::<ActiveDrag>()
            .add_message::<HandleClicked>()
            .add_systems(Update, (drive_drag, draw_drag_guides).chain());
    }
}

/// Emitted when a press on a handle releases without ever qualifying as a
/// drag. The host decides what a click means.
#[derive(Message, Clone, Copy, Debug)]
pub struct HandleClicked {
    pub key: HighlightKey,
    pub part: GizmoPart,
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct DragCommon {
    pub node: Entity,
    pub key: HighlightKey,
    pub part: GizmoPart,
    /// Handle root entity, repositioned to follow the working geometry.
    pub handle: Entity,
    /// Elevation of the raycast plane, frozen at drag start.
    pub plane_y: f32,
    /// Anchor minus first plane hit, so the geometry does not jump to the
    /// cursor on the first move.
    pub grab_offset: Vec3,
}

/// One live drag. The `original` snapshot is what revert restores and what
/// the undo command records; `working` is mutated on every qualifying move.
pub enum DragSession {
    Wall {
        common: DragCommon,
        original: WallDefinition,
        working: WallDefinition,
    },
    Road {
        common: DragCommon,
        original: RoadDefinition,
        working: RoadDefinition,
    },
    Floor {
        common: DragCommon,
        original: FloorDefinition,
        working: FloorDefinition,
    },
}

impl DragSession {
    pub fn common(&self) -> &DragCommon {
        match self {
            DragSession::Wall { common, .. }
            | DragSession::Road { common, .. }
            | DragSession::Floor { common, .. } => common,
        }
    }

    fn session_kind(&self) -> SessionKind {
        match self {
            DragSession::Wall { .. } => SessionKind::WallEndpointDrag,
            DragSession::Road { .. } => SessionKind::RoadVertexDrag,
            DragSession::Floor { .. } => SessionKind::FloorEdgeDrag,
        }
    }
}

struct PreviewState {
    entity: Entity,
    signature: u64,
}

#[derive(Resource, Default)]
pub struct ActiveDrag {
    session: Option<DragSession>,
    preview: Option<PreviewState>,
}

impl ActiveDrag {
    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Anchors
// ---------------------------------------------------------------------------

fn dist_xz(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).length()
}

/// The definition-space point a wall handle grabs.
pub fn wall_anchor(def: &WallDefinition, kind: HandleKind) -> Option<Vec3> {
    match kind {
        HandleKind::WallEndpoint {
            chain_start,
            chain_end,
            end,
        } => {
            let segments = &def.segments;
            match end {
                ChainEnd::Start => segments.get(chain_start as usize).map(|s| s.start),
                ChainEnd::End => segments.get(chain_end as usize).map(|s| s.end),
            }
        }
        HandleKind::WallJoint {
            chain_start,
            vertex,
            ..
        } => def
            .segments
            .get(chain_start as usize + vertex as usize)
            .map(|s| s.start),
        HandleKind::WallCircleCenter {
            chain_start,
            chain_end,
        }
        | HandleKind::WallCircleRadius {
            chain_start,
            chain_end,
        } => {
            let chain = def
                .segments
                .get(chain_start as usize..=chain_end as usize)?;
            let center =
                chain.iter().map(|s| s.start).sum::<Vec3>() / chain.len().max(1) as f32;
            if matches!(kind, HandleKind::WallCircleCenter { .. }) {
                Some(center)
            } else {
                let radius = chain
                    .iter()
                    .map(|s| dist_xz(s.start, center))
                    .sum::<f32>()
                    / chain.len().max(1) as f32;
                Some(center + Vec3::X * radius)
            }
        }
        _ => None,
    }
}

pub fn road_anchor(def: &RoadDefinition, index: u32) -> Option<Vec3> {
    def.points.get(index as usize).copied()
}

pub fn floor_anchor(def: &FloorDefinition, kind: HandleKind) -> Option<Vec3> {
    let (centroid, radius) = crate::handles::floor::ring_estimate(def)?;
    match kind {
        HandleKind::FloorCenter => Some(centroid),
        HandleKind::FloorRadius => Some(centroid + Vec3::X * radius),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Pure mutation, one per structure kind
// ---------------------------------------------------------------------------

/// Move the grabbed wall control point to `target`, always starting from the
/// original snapshot so repeated moves never accumulate error. Endpoints get
/// the soft axis/diagonal snap relative to their neighbor vertex.
pub fn apply_wall_drag(
    original: &WallDefinition,
    kind: HandleKind,
    target: Vec3,
    snap: &SnapSettings,
    ctrl: bool,
) -> Option<WallDefinition> {
    let mut working = original.clone();
    let segments = &mut working.segments;
    match kind {
        HandleKind::WallEndpoint {
            chain_start,
            chain_end,
            end,
        } => {
            let target = snap.snap_point_if(target, ctrl);
            match end {
                ChainEnd::Start => {
                    let segment = segments.get_mut(chain_start as usize)?;
                    let snapped = snap.soft_snap_from(segment.end, target);
                    segment.start = Vec3::new(snapped.x, segment.start.y, snapped.z);
                }
                ChainEnd::End => {
                    let segment = segments.get_mut(chain_end as usize)?;
                    let snapped = snap.soft_snap_from(segment.start, target);
                    segment.end = Vec3::new(snapped.x, segment.end.y, snapped.z);
                }
            }
        }
        HandleKind::WallJoint {
            chain_start,
            vertex,
            ..
        } => {
            let i = chain_start as usize + vertex as usize;
            let target = snap.snap_point_if(target, ctrl);
            let outgoing = segments.get_mut(i)?;
            outgoing.start = Vec3::new(target.x, outgoing.start.y, target.z);
            let incoming = segments.get_mut(i.checked_sub(1)?)?;
            incoming.end = Vec3::new(target.x, incoming.end.y, target.z);
        }
        HandleKind::WallCircleCenter {
            chain_start,
            chain_end,
        } => {
            let center = wall_anchor(original, kind)?;
            let target = snap.snap_point_if(target, ctrl);
            let delta = Vec3::new(target.x - center.x, 0.0, target.z - center.z);
            for segment in segments.get_mut(chain_start as usize..=chain_end as usize)? {
                segment.start += delta;
                segment.end += delta;
            }
        }
        HandleKind::WallCircleRadius {
            chain_start,
            chain_end,
        } => {
            let center = wall_anchor(
                original,
                HandleKind::WallCircleCenter {
                    chain_start,
                    chain_end,
                },
            )?;
            let old_radius = dist_xz(
                wall_anchor(original, kind)?,
                center,
            );
            let new_radius = dist_xz(snap.snap_point_if(target, ctrl), center);
            if old_radius <= 1e-4 || new_radius <= 1e-4 {
                return None;
            }
            let ratio = new_radius / old_radius;
            let scale = |v: Vec3| {
                Vec3::new(
                    center.x + (v.x - center.x) * ratio,
                    v.y,
                    center.z + (v.z - center.z) * ratio,
                )
            };
            for segment in segments.get_mut(chain_start as usize..=chain_end as usize)? {
                segment.start = scale(segment.start);
                segment.end = scale(segment.end);
            }
        }
        _ => return None,
    }
    Some(working)
}

pub fn apply_road_drag(
    original: &RoadDefinition,
    index: u32,
    target: Vec3,
    snap: &SnapSettings,
    ctrl: bool,
) -> Option<RoadDefinition> {
    let mut working = original.clone();
    let point = working.points.get_mut(index as usize)?;
    let target = snap.snap_point_if(target, ctrl);
    *point = Vec3::new(target.x, point.y, target.z);
    Some(working)
}

pub fn apply_floor_drag(
    original: &FloorDefinition,
    kind: HandleKind,
    target: Vec3,
    snap: &SnapSettings,
    ctrl: bool,
) -> Option<FloorDefinition> {
    let (centroid, radius) = crate::handles::floor::ring_estimate(original)?;
    let mut working = original.clone();
    match kind {
        HandleKind::FloorCenter => {
            let target = snap.snap_point_if(target, ctrl);
            let delta = Vec3::new(target.x - centroid.x, 0.0, target.z - centroid.z);
            for vertex in &mut working.ring {
                *vertex += delta;
            }
        }
        HandleKind::FloorRadius => {
            let new_radius = dist_xz(snap.snap_point_if(target, ctrl), centroid);
            if radius <= 1e-4 || new_radius <= 1e-4 {
                return None;
            }
            let ratio = new_radius / radius;
            for vertex in &mut working.ring {
                vertex.x = centroid.x + (vertex.x - centroid.x) * ratio;
                vertex.z = centroid.z + (vertex.z - centroid.z) * ratio;
            }
        }
        _ => return None,
    }
    Some(working)
}

// ---------------------------------------------------------------------------
// Preview mesh
// ---------------------------------------------------------------------------

#[derive(Resource)]
struct PreviewMaterial(Handle<StandardMaterial>);

fn preview_material(world: &mut World) -> Handle<StandardMaterial> {
    if let Some(res) = world.get_resource::<PreviewMaterial>() {
        return res.0.clone();
    }
    let handle = world
        .resource_mut::<Assets<StandardMaterial>>()
        .add(StandardMaterial {
            base_color: Color::srgba(0.35, 0.8, 1.0, 0.4),
            alpha_mode: AlphaMode::Blend,
            unlit: true,
            depth_bias: 10.0,
            ..default()
        });
    world.insert_resource(PreviewMaterial(handle.clone()));
    handle
}

/// Spawn or refresh the translucent preview child of `node`. Called only
/// when the working signature actually changed.
fn update_preview(world: &mut World, node: Entity, mesh: Option<Mesh>, signature: u64) {
    let Some(mesh) = mesh else {
        despawn_preview(world);
        return;
    };
    let mesh_handle = world.resource_mut::<Assets<Mesh>>().add(mesh);
    let existing = world
        .resource::<ActiveDrag>()
        .preview
        .as_ref()
        .map(|p| p.entity)
        .filter(|&e| world.get_entity(e).is_ok());
    let entity = match existing {
        Some(entity) => {
            if let Some(mut slot) = world.get_mut::<Mesh3d>(entity) {
                slot.0 = mesh_handle;
            }
            entity
        }
        None => {
            let material = preview_material(world);
            world
                .spawn((
                    Mesh3d(mesh_handle),
                    MeshMaterial3d(material),
                    Transform::default(),
                    ChildOf(node),
                ))
                .id()
        }
    };
    world.resource_mut::<ActiveDrag>().preview = Some(PreviewState { entity, signature });
}

fn despawn_preview(world: &mut World) {
    if let Some(preview) = world.resource_mut::<ActiveDrag>().preview.take() {
        if let Ok(entity) = world.get_entity_mut(preview.entity) {
            entity.despawn();
        }
    }
}

// ---------------------------------------------------------------------------
// Drive
// ---------------------------------------------------------------------------

const POINTER: PointerId = PointerId::Mouse;

fn begin_drag(world: &mut World, hit: PickHit, cursor: Vec2) {
    let node = hit.meta.node;
    if world.get::<Locked>(node).is_some() {
        return;
    }
    let kind = hit.meta.kind;

    let (anchor, session) = match kind {
        HandleKind::RoadVertex { index } => {
            let Some(def) = store::resolve_definition::<RoadDefinition>(world, node) else {
                return;
            };
            let Some(anchor) = road_anchor(&def, index) else {
                return;
            };
            (
                anchor,
                DragSession::Road {
                    common: DragCommon {
                        node,
                        key: hit.meta.key(),
                        part: hit.part,
                        handle: hit.handle,
                        plane_y: anchor.y,
                        grab_offset: Vec3::ZERO,
                    },
                    original: def.clone(),
                    working: def,
                },
            )
        }
        HandleKind::FloorCenter | HandleKind::FloorRadius => {
            let Some(def) = store::resolve_definition::<FloorDefinition>(world, node) else {
                return;
            };
            let Some(anchor) = floor_anchor(&def, kind) else {
                return;
            };
            (
                anchor,
                DragSession::Floor {
                    common: DragCommon {
                        node,
                        key: hit.meta.key(),
                        part: hit.part,
                        handle: hit.handle,
                        plane_y: anchor.y,
                        grab_offset: Vec3::ZERO,
                    },
                    original: def.clone(),
                    working: def,
                },
            )
        }
        _ => {
            let Some(def) = store::resolve_definition::<WallDefinition>(world, node) else {
                return;
            };
            let Some(anchor) = wall_anchor(&def, kind) else {
                return;
            };
            (
                anchor,
                DragSession::Wall {
                    common: DragCommon {
                        node,
                        key: hit.meta.key(),
                        part: hit.part,
                        handle: hit.handle,
                        plane_y: anchor.y,
                        grab_offset: Vec3::ZERO,
                    },
                    original: def.clone(),
                    working: def,
                },
            )
        }
    };

    let mut session = session;
    // First plane hit under the cursor anchors the grab offset.
    if let Some(ray) = handles::viewport_ray(world) {
        if let Some(hit_point) = ray_plane_y(ray, session.common().plane_y) {
            let offset = anchor - hit_point;
            match &mut session {
                DragSession::Wall { common, .. }
                | DragSession::Road { common, .. }
                | DragSession::Floor { common, .. } => {
                    common.grab_offset = Vec3::new(offset.x, 0.0, offset.z);
                }
            }
        }
    }

    let key = session.common().key;
    let part = session.common().part;
    world.resource_scope(|_, mut sessions: Mut<PointerSessions>| {
        sessions.begin(POINTER, SessionKind::RepairClick, cursor);
        sessions.capture(POINTER);
    });
    handles::set_active_handle(world, Some((key, part)));
    world.resource_mut::<ActiveDrag>().session = Some(session);
    debug!("drag candidate on {node} ({kind:?})");
}

/// Apply one qualifying pointer move to the working copy: raycast, snap,
/// mutate, and refresh the preview when the content signature changed. The
/// single exhaustive dispatch over session kinds lives here.
fn update_drag(world: &mut World) {
    let Some(ray) = handles::viewport_ray(world) else {
        return;
    };
    let Some(mut session) = world.resource_mut::<ActiveDrag>().session.take() else {
        return;
    };
    let Some(plane_hit) = ray_plane_y(ray, session.common().plane_y) else {
        world.resource_mut::<ActiveDrag>().session = Some(session);
        return;
    };
    let target = plane_hit + session.common().grab_offset;

    let keyboard = world.resource::<ButtonInput<KeyCode>>();
    let ctrl = keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]);
    let snap = world.resource::<SnapSettings>().clone();

    let previous_signature = world.resource::<ActiveDrag>().preview.as_ref().map(|p| p.signature);
    let (node, handle) = (session.common().node, session.common().handle);

    let changed = match &mut session {
        DragSession::Wall {
            common,
            original,
            working,
        } => {
            if let Some(next) = apply_wall_drag(original, common.key.kind, target, &snap, ctrl) {
                *working = next;
                let signature = wall_signature(working);
                if previous_signature != Some(signature) {
                    update_preview(world, node, working.build_mesh(), signature);
                }
                wall_anchor(working, common.key.kind)
                    .map(|anchor| anchor + Vec3::Y * (working.height * 0.5))
            } else {
                None
            }
        }
        DragSession::Road {
            common,
            original,
            working,
        } => {
            if let HandleKind::RoadVertex { index } = common.key.kind {
                if let Some(next) = apply_road_drag(original, index, target, &snap, ctrl) {
                    *working = next;
                    let signature = road_signature(working);
                    if previous_signature != Some(signature) {
                        update_preview(world, node, working.build_mesh(), signature);
                    }
                    road_anchor(working, index)
                        .map(|anchor| anchor + Vec3::Y * crate::handles::road::HANDLE_LIFT)
                } else {
                    None
                }
            } else {
                None
            }
        }
        DragSession::Floor {
            common,
            original,
            working,
        } => {
            if let Some(next) = apply_floor_drag(original, common.key.kind, target, &snap, ctrl) {
                *working = next;
                let signature = floor_signature(working);
                if previous_signature != Some(signature) {
                    update_preview(world, node, working.build_mesh(), signature);
                }
                floor_anchor(working, common.key.kind)
                    .map(|anchor| anchor + Vec3::Y * crate::handles::floor::HANDLE_LIFT)
            } else {
                None
            }
        }
    };

    // The dragged handle follows the working geometry.
    if let Some(position) = changed {
        if let Some(mut transform) = world.get_mut::<Transform>(handle) {
            transform.translation = position;
        }
    }

    world.resource_mut::<ActiveDrag>().session = Some(session);
}

/// End the session: commit through the store when it qualified as a drag and
/// actually changed something, otherwise revert and (for plain clicks) emit
/// the click message.
fn finish_drag(world: &mut World, moved: bool, commit: bool) {
    despawn_preview(world);
    let Some(session) = world.resource_mut::<ActiveDrag>().session.take() else {
        return;
    };
    let common = *session.common();

    if moved && commit {
        match session {
            DragSession::Wall {
                original, working, ..
            } => {
                if wall_signature(&original) != wall_signature(&working) {
                    info!("committing wall edit on {}", common.node);
                    store::commit_definition(world, common.node, original, working);
                }
            }
            DragSession::Road {
                original, working, ..
            } => {
                if road_signature(&original) != road_signature(&working) {
                    info!("committing road edit on {}", common.node);
                    store::commit_definition(world, common.node, original, working);
                }
            }
            DragSession::Floor {
                original, working, ..
            } => {
                if floor_signature(&original) != floor_signature(&working) {
                    info!("committing floor edit on {}", common.node);
                    store::commit_definition(world, common.node, original, working);
                }
            }
        }
    } else {
        debug!("discarding drag on {}", common.node);
        if !moved && commit {
            world.write_message(HandleClicked {
                key: common.key,
                part: common.part,
            });
        }
    }

    // Rebuild once, next sync pass, whether we committed or reverted; the
    // handle was repositioned while dragging either way.
    world.resource_mut::<HandleResync>().request(common.node);
    handles::set_active_handle(world, None);
    world.resource_scope(|_, mut sessions: Mut<PointerSessions>| {
        sessions.clear(POINTER);
    });
}

pub fn drive_drag(world: &mut World) {
    let (left_pressed, left_released, right_pressed) = {
        let mouse = world.resource::<ButtonInput<MouseButton>>();
        (
            mouse.just_pressed(MouseButton::Left),
            mouse.just_released(MouseButton::Left),
            mouse.just_pressed(MouseButton::Right),
        )
    };
    let (escape, alt) = {
        let keyboard = world.resource::<ButtonInput<KeyCode>>();
        (
            keyboard.just_pressed(KeyCode::Escape),
            keyboard.any_pressed([KeyCode::AltLeft, KeyCode::AltRight]),
        )
    };

    if world.resource::<ActiveDrag>().is_dragging() {
        if escape || right_pressed {
            finish_drag(world, true, false);
            return;
        }
        if left_released {
            let moved = world
                .resource::<PointerSessions>()
                .get(POINTER)
                .is_some_and(|s| s.moved);
            finish_drag(world, moved, true);
            return;
        }
        // Alt defers to camera navigation without ending the session.
        if alt {
            return;
        }
        let Some(cursor) = handles::cursor_position(world) else {
            return;
        };
        let moved = world
            .resource_mut::<PointerSessions>()
            .update_moved(POINTER, cursor)
            .unwrap_or(false);
        if !moved {
            return;
        }
        // Promote the pending click to its structure-specific drag session.
        let drag_kind = world
            .resource::<ActiveDrag>()
            .session()
            .map(|s| s.session_kind());
        if let Some(kind) = drag_kind {
            world.resource_scope(|_, mut sessions: Mut<PointerSessions>| {
                if sessions.get(POINTER).is_some_and(|s| s.kind == SessionKind::RepairClick) {
                    let start = sessions.get(POINTER).map(|s| s.start).unwrap_or(cursor);
                    sessions.begin(POINTER, kind, start);
                    sessions.capture(POINTER);
                    sessions.ensure_moved(POINTER);
                }
            });
        }
        update_drag(world);
        return;
    }

    if alt {
        return;
    }
    if right_pressed {
        // Reserve the pointer so a tool overlay can consume the release.
        if let Some(cursor) = handles::cursor_position(world) {
            world
                .resource_mut::<PointerSessions>()
                .begin(POINTER, SessionKind::BuildRightClick, cursor);
        }
        return;
    }
    if left_pressed {
        world
            .resource_mut::<PointerSessions>()
            .clear_kind(SessionKind::BuildRightClick);
        let Some(cursor) = handles::cursor_position(world) else {
            return;
        };
        let hit = handles::viewport_ray(world).and_then(|ray| handles::pick_handle(world, ray));
        if let Some(hit) = hit {
            begin_drag(world, hit, cursor);
        }
    }
}

// ---------------------------------------------------------------------------
// Guides
// ---------------------------------------------------------------------------

/// Immediate-mode line from the dragged wall vertex to its snap anchor,
/// tinted by which direction the soft snap locked to.
pub fn draw_drag_guides(
    drag: Res<ActiveDrag>,
    transforms: Query<&GlobalTransform>,
    mut gizmos: Gizmos,
) {
    let Some(DragSession::Wall {
        common, working, ..
    }) = drag.session()
    else {
        return;
    };
    let HandleKind::WallEndpoint {
        chain_start,
        chain_end,
        end,
    } = common.key.kind
    else {
        return;
    };
    let (vertex, neighbor) = match end {
        ChainEnd::Start => {
            let Some(segment) = working.segments.get(chain_start as usize) else {
                return;
            };
            (segment.start, segment.end)
        }
        ChainEnd::End => {
            let Some(segment) = working.segments.get(chain_end as usize) else {
                return;
            };
            (segment.end, segment.start)
        }
    };

    let delta = Vec2::new(vertex.x - neighbor.x, vertex.z - neighbor.z);
    let abs = delta.abs();
    let color = if (abs.x - abs.y).abs() < 1e-3 {
        Color::srgb(1.0, 0.9, 0.2)
    } else if abs.y < 1e-3 {
        Color::srgb(0.9, 0.3, 0.3)
    } else if abs.x < 1e-3 {
        Color::srgb(0.3, 0.5, 0.95)
    } else {
        Color::srgb(0.6, 0.6, 0.6)
    };

    let to_world = transforms
        .get(common.node)
        .map(|t| t.affine())
        .unwrap_or_default();
    let lift = Vec3::Y * (working.height * 0.5);
    gizmos.line(
        to_world.transform_point3(neighbor + lift),
        to_world.transform_point3(vertex + lift),
        color,
    );
}
