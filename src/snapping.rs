use bevy::prelude::*;
use bevy_infinite_grid::{InfiniteGrid, InfiniteGridSettings};

pub struct SnappingPlugin;

impl Plugin for SnappingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SnapSettings>()
            .init_resource::<GridSettings>()
            .add_systems(Update, sync_grid_settings);
    }
}

// ---------------------------------------------------------------------------
// Grid settings
// ---------------------------------------------------------------------------

#[derive(Resource)]
pub struct GridSettings {
    pub visible: bool,
    pub scale: f32,
    pub major_line_color: Color,
    pub minor_line_color: Color,
    pub fadeout_distance: f32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            visible: true,
            scale: 1.0,
            major_line_color: Color::srgb(0.25, 0.25, 0.25),
            minor_line_color: Color::srgb(0.1, 0.1, 0.1),
            fadeout_distance: 100.0,
        }
    }
}

fn sync_grid_settings(
    grid: Res<GridSettings>,
    mut grids: Query<(&mut InfiniteGridSettings, &mut Visibility), With<InfiniteGrid>>,
) {
    if !grid.is_changed() {
        return;
    }
    for (mut settings, mut visibility) in &mut grids {
        settings.scale = grid.scale;
        settings.major_line_color = grid.major_line_color;
        settings.minor_line_color = grid.minor_line_color;
        settings.fadeout_distance = grid.fadeout_distance;
        *visibility = if grid.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
    }
}

// ---------------------------------------------------------------------------
// Snap settings
// ---------------------------------------------------------------------------

#[derive(Resource, Clone)]
pub struct SnapSettings {
    pub grid_snap: bool,
    pub grid_increment: f32,
    /// Soft-snap endpoint drags toward axis-aligned and 45-degree directions
    /// relative to the neighboring vertex.
    pub soft_snap: bool,
    /// How close (as a ratio of the shorter delta component over the longer)
    /// a direction must be to a diagonal before it snaps to 45 degrees.
    pub diagonal_ratio: f32,
    /// Below this ratio the shorter component collapses to zero, locking the
    /// dragged point to the axis through its neighbor.
    pub axis_lock_ratio: f32,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            grid_snap: false,
            grid_increment: 0.25,
            soft_snap: true,
            diagonal_ratio: 0.85,
            axis_lock_ratio: 0.35,
        }
    }
}

impl SnapSettings {
    /// Conditionally grid-snap a point on the ground plane (Ctrl toggles).
    pub fn snap_point_if(&self, point: Vec3, ctrl_held: bool) -> Vec3 {
        if (self.grid_snap ^ ctrl_held) && self.grid_increment > 0.0 {
            Vec3::new(
                (point.x / self.grid_increment).round() * self.grid_increment,
                point.y,
                (point.z / self.grid_increment).round() * self.grid_increment,
            )
        } else {
            point
        }
    }

    /// Nudge a dragged vertex toward the nearest cardinal or 45-degree
    /// direction from `anchor`, keeping the distance to the anchor intact.
    /// Returns `point` unchanged when soft snapping is off or the direction
    /// is nowhere near a snap target.
    pub fn soft_snap_from(&self, anchor: Vec3, point: Vec3) -> Vec3 {
        if !self.soft_snap {
            return point;
        }
        let delta = Vec2::new(point.x - anchor.x, point.z - anchor.z);
        let abs = delta.abs();
        let (long, short) = if abs.x >= abs.y {
            (abs.x, abs.y)
        } else {
            (abs.y, abs.x)
        };
        if long <= f32::EPSILON {
            return point;
        }
        let ratio = short / long;

        let snapped = if ratio >= self.diagonal_ratio {
            // Equalize components, preserving signs and total length.
            let side = delta.length() / std::f32::consts::SQRT_2;
            Vec2::new(side * delta.x.signum(), side * delta.y.signum())
        } else if ratio <= self.axis_lock_ratio {
            let length = delta.length();
            if abs.x >= abs.y {
                Vec2::new(length * delta.x.signum(), 0.0)
            } else {
                Vec2::new(0.0, length * delta.y.signum())
            }
        } else {
            return point;
        };

        Vec3::new(anchor.x + snapped.x, point.y, anchor.z + snapped.y)
    }
}
