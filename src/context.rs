use bevy::prelude::*;

use crate::gizmo::GizmoPart;

// ---------------------------------------------------------------------------
// Handle identity
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ChainEnd {
    Start,
    End,
}

/// Which logical control point of a structure a handle edits. Wall variants
/// carry the segment-index span of their chain so keys stay stable while
/// other chains on the same node change.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HandleKind {
    WallEndpoint {
        chain_start: u32,
        chain_end: u32,
        end: ChainEnd,
    },
    WallJoint {
        chain_start: u32,
        chain_end: u32,
        /// Interior vertex index within the chain, counted from its start.
        vertex: u32,
    },
    WallCircleCenter {
        chain_start: u32,
        chain_end: u32,
    },
    WallCircleRadius {
        chain_start: u32,
        chain_end: u32,
    },
    RoadVertex {
        index: u32,
    },
    FloorCenter,
    FloorRadius,
}

/// Identifies one logical handle across all renderers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct HighlightKey {
    pub node: Entity,
    pub kind: HandleKind,
}

// ---------------------------------------------------------------------------
// Shared interaction context
// ---------------------------------------------------------------------------

/// Injected highlight state shared by every handle renderer: at most one
/// hovered key and one active key exist globally, so two structures can never
/// show conflicting emphasis.
#[derive(Resource, Default, Debug)]
pub struct EditContext {
    hovered: Option<(HighlightKey, GizmoPart)>,
    active: Option<(HighlightKey, GizmoPart)>,
}

impl EditContext {
    pub fn hovered(&self) -> Option<(HighlightKey, GizmoPart)> {
        self.hovered
    }

    pub fn active(&self) -> Option<(HighlightKey, GizmoPart)> {
        self.active
    }

    /// Returns `false` when the value is unchanged (redundant updates are
    /// no-ops so material churn stays bounded).
    pub fn set_hovered(&mut self, value: Option<(HighlightKey, GizmoPart)>) -> bool {
        if self.hovered == value {
            return false;
        }
        self.hovered = value;
        true
    }

    pub fn set_active(&mut self, value: Option<(HighlightKey, GizmoPart)>) -> bool {
        if self.active == value {
            return false;
        }
        self.active = value;
        true
    }

    pub fn is_active_key(&self, key: HighlightKey) -> bool {
        self.active.is_some_and(|(active, _)| active == key)
    }

    /// Drop any highlight state referring to a node whose handles are being
    /// destroyed.
    pub fn forget_node(&mut self, node: Entity) {
        if self.hovered.is_some_and(|(key, _)| key.node == node) {
            self.hovered = None;
        }
        if self.active.is_some_and(|(key, _)| key.node == node) {
            self.active = None;
        }
    }
}
