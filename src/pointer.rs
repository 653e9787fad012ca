use bevy::picking::pointer::PointerId;
use bevy::prelude::*;

/// Cursor travel (logical pixels) below which a press-release counts as a
/// click rather than a drag.
pub const DRAG_THRESHOLD_PX: f32 = 5.0;

/// What a live pointer session is doing. Exactly one session per pointer;
/// beginning a new session replaces whatever that pointer was doing.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SessionKind {
    /// Left press on a structure handle, pending click-vs-drag resolution.
    RepairClick,
    /// Right press while a build tool is up; never turns into a drag.
    BuildRightClick,
    WallEndpointDrag,
    RoadVertexDrag,
    FloorEdgeDrag,
}

#[derive(Clone, Copy, Debug)]
pub struct PointerSession {
    pub kind: SessionKind,
    pub start: Vec2,
    /// Set once the cursor has strayed past [`DRAG_THRESHOLD_PX`] from
    /// `start`. Never reset within a session.
    pub moved: bool,
}

/// Tracks in-flight press sessions per pointer. Sessions begin on press over
/// a handle and end on release or cancellation.
#[derive(Resource, Default)]
pub struct PointerSessions {
    sessions: Vec<(PointerId, PointerSession)>,
    captured: Option<PointerId>,
}

impl PointerSessions {
    pub fn begin(&mut self, pointer: PointerId, kind: SessionKind, start: Vec2) {
        self.clear(pointer);
        self.sessions.push((
            pointer,
            PointerSession {
                kind,
                start,
                moved: false,
            },
        ));
    }

    pub fn get(&self, pointer: PointerId) -> Option<&PointerSession> {
        self.sessions
            .iter()
            .find(|(id, _)| *id == pointer)
            .map(|(_, s)| s)
    }

    /// Update the moved flag from the current cursor position. Returns the
    /// session's moved state, or `None` when no session is live.
    pub fn update_moved(&mut self, pointer: PointerId, cursor: Vec2) -> Option<bool> {
        let session = self
            .sessions
            .iter_mut()
            .find(|(id, _)| *id == pointer)
            .map(|(_, s)| s)?;
        if !session.moved && cursor.distance(session.start) >= DRAG_THRESHOLD_PX {
            session.moved = true;
        }
        Some(session.moved)
    }

    /// Force the session into the moved state, e.g. when a drag is started
    /// programmatically.
    pub fn ensure_moved(&mut self, pointer: PointerId) {
        if let Some((_, session)) = self.sessions.iter_mut().find(|(id, _)| *id == pointer) {
            session.moved = true;
        }
    }

    /// Best-effort capture: while held, hover picking treats this pointer as
    /// owned by the session. Always released when the session ends.
    pub fn capture(&mut self, pointer: PointerId) {
        self.captured = Some(pointer);
    }

    pub fn release(&mut self, pointer: PointerId) {
        if self.captured == Some(pointer) {
            self.captured = None;
        }
    }

    pub fn is_captured(&self, pointer: PointerId) -> bool {
        self.captured == Some(pointer)
    }

    pub fn clear(&mut self, pointer: PointerId) {
        self.sessions.retain(|(id, _)| *id != pointer);
        self.release(pointer);
    }

    pub fn clear_kind(&mut self, kind: SessionKind) {
        let mut released = Vec::new();
        self.sessions.retain(|(id, s)| {
            if s.kind == kind {
                released.push(*id);
                false
            } else {
                true
            }
        });
        for pointer in released {
            self.release(pointer);
        }
    }
}
