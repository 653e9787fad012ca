use bevy::prelude::*;

use crate::gizmo::HandleGizmo;

/// How far a handle can be before the near-field amplification stops.
const NEAR_DISTANCE: f32 = 2.5;
/// Maximum amplification applied to handles closer than `NEAR_DISTANCE`.
const NEAR_BOOST_MAX: f32 = 2.0;

const MIN_SCALE: f32 = 1e-3;
const MAX_SCALE: f32 = 1e4;

/// The projection parameters that matter for apparent-size math.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ScreenProjection {
    Perspective { fov_y: f32 },
    Orthographic { view_height: f32 },
}

pub fn projection_from_camera(projection: &Projection) -> Option<ScreenProjection> {
    match projection {
        Projection::Perspective(p) => Some(ScreenProjection::Perspective { fov_y: p.fov }),
        Projection::Orthographic(o) => Some(ScreenProjection::Orthographic {
            view_height: o.area.height(),
        }),
        _ => None,
    }
}

/// World units covered by one vertical pixel at `distance` from the camera.
pub fn world_units_per_pixel(
    projection: ScreenProjection,
    distance: f32,
    viewport_height_px: f32,
) -> f32 {
    if viewport_height_px <= 0.0 {
        return 0.0;
    }
    match projection {
        ScreenProjection::Perspective { fov_y } => {
            2.0 * distance.max(0.0) * (fov_y * 0.5).tan() / viewport_height_px
        }
        ScreenProjection::Orthographic { view_height } => view_height / viewport_height_px,
    }
}

/// Local scale that keeps a handle of `base_diameter` world units rendering at
/// `pixel_diameter` pixels, compensating for the parent's world scale.
pub fn handle_scale(
    projection: ScreenProjection,
    distance: f32,
    viewport_height_px: f32,
    base_diameter: f32,
    pixel_diameter: f32,
    parent_world_scale: f32,
) -> f32 {
    let per_pixel = world_units_per_pixel(projection, distance, viewport_height_px);
    if per_pixel <= 0.0 || base_diameter <= 0.0 || parent_world_scale <= 0.0 {
        return 1.0;
    }
    let mut world_diameter = pixel_diameter * per_pixel;
    // Very close handles shrink to near-invisibility under pure screen-space
    // sizing; ramp them back up linearly inside the near band.
    if matches!(projection, ScreenProjection::Perspective { .. }) && distance < NEAR_DISTANCE {
        let t = 1.0 - (distance.max(0.0) / NEAR_DISTANCE);
        world_diameter *= 1.0 + t * (NEAR_BOOST_MAX - 1.0);
    }
    (world_diameter / base_diameter / parent_world_scale).clamp(MIN_SCALE, MAX_SCALE)
}

fn max_world_scale(transform: &GlobalTransform) -> f32 {
    let scale = transform.scale();
    scale.x.abs().max(scale.y.abs()).max(scale.z.abs()).max(f32::EPSILON)
}

/// Rescales every handle root each frame so its apparent size stays constant.
pub fn update_handle_screen_size(
    cameras: Query<(&Camera, &GlobalTransform, &Projection)>,
    parents: Query<&GlobalTransform, Without<HandleGizmo>>,
    mut handles: Query<(&HandleGizmo, &ChildOf, &GlobalTransform, &mut Transform)>,
) {
    let Some((camera, camera_transform, projection)) = cameras
        .iter()
        .find(|(camera, _, _)| camera.is_active)
    else {
        return;
    };
    let Some(viewport) = camera.logical_viewport_size() else {
        return;
    };
    let Some(projection) = projection_from_camera(projection) else {
        return;
    };

    for (gizmo, child_of, global, mut transform) in &mut handles {
        let distance = camera_transform.translation().distance(global.translation());
        let parent_scale = parents
            .get(child_of.0)
            .map(max_world_scale)
            .unwrap_or(1.0);
        let scale = handle_scale(
            projection,
            distance,
            viewport.y,
            gizmo.base_diameter,
            gizmo.pixel_diameter,
            parent_scale,
        );
        if (transform.scale.x - scale).abs() > f32::EPSILON {
            transform.scale = Vec3::splat(scale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOV: f32 = std::f32::consts::FRAC_PI_4;

    #[test]
    fn perspective_scale_grows_linearly_with_distance() {
        let near = handle_scale(
            ScreenProjection::Perspective { fov_y: FOV },
            10.0,
            1080.0,
            1.6,
            28.0,
            1.0,
        );
        let far = handle_scale(
            ScreenProjection::Perspective { fov_y: FOV },
            20.0,
            1080.0,
            1.6,
            28.0,
            1.0,
        );
        assert!((far / near - 2.0).abs() < 1e-4);
    }

    #[test]
    fn orthographic_scale_ignores_distance() {
        let proj = ScreenProjection::Orthographic { view_height: 12.0 };
        let a = handle_scale(proj, 5.0, 1080.0, 1.6, 28.0, 1.0);
        let b = handle_scale(proj, 500.0, 1080.0, 1.6, 28.0, 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn parent_scale_is_compensated() {
        let proj = ScreenProjection::Perspective { fov_y: FOV };
        let unit = handle_scale(proj, 10.0, 1080.0, 1.6, 28.0, 1.0);
        let doubled = handle_scale(proj, 10.0, 1080.0, 1.6, 28.0, 2.0);
        assert!((unit / doubled - 2.0).abs() < 1e-4);
    }

    #[test]
    fn near_handles_are_amplified() {
        let proj = ScreenProjection::Perspective { fov_y: FOV };
        // Without the near boost, scale at d=1.25 would be exactly half of
        // scale at d=2.5. The boost at the midpoint is 1.5x.
        let at_band_edge = handle_scale(proj, NEAR_DISTANCE, 1080.0, 1.6, 28.0, 1.0);
        let inside = handle_scale(proj, NEAR_DISTANCE * 0.5, 1080.0, 1.6, 28.0, 1.0);
        assert!((inside / at_band_edge - 0.75).abs() < 1e-3);
    }

    #[test]
    fn degenerate_inputs_fall_back_to_unit_scale() {
        let proj = ScreenProjection::Perspective { fov_y: FOV };
        assert_eq!(handle_scale(proj, 10.0, 0.0, 1.6, 28.0, 1.0), 1.0);
        assert_eq!(handle_scale(proj, 10.0, 1080.0, 0.0, 28.0, 1.0), 1.0);
        assert_eq!(handle_scale(proj, 10.0, 1080.0, 1.6, 28.0, 0.0), 1.0);
    }

    #[test]
    fn scale_is_clamped() {
        let proj = ScreenProjection::Perspective { fov_y: FOV };
        let huge = handle_scale(proj, 1e9, 1080.0, 1.6, 28.0, 1.0);
        assert_eq!(huge, MAX_SCALE);
    }
}
