use bevy::prelude::*;

/// Intersect a ray with the horizontal plane `y = height`.
pub fn ray_plane_y(ray: Ray3d, height: f32) -> Option<Vec3> {
    let dir = *ray.direction;
    if dir.y.abs() < 1e-6 {
        return None;
    }
    let t = (height - ray.origin.y) / dir.y;
    (t >= 0.0).then(|| ray.origin + dir * t)
}

/// Ray/sphere intersection, returning the nearest non-negative hit distance.
pub fn ray_sphere(ray: Ray3d, center: Vec3, radius: f32) -> Option<f32> {
    let dir = *ray.direction;
    let oc = ray.origin - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let near = -b - sqrt_d;
    if near >= 0.0 {
        return Some(near);
    }
    let far = -b + sqrt_d;
    (far >= 0.0).then_some(far)
}

/// Ray vs oriented box, via a slab test in the box's local frame. `transform`
/// places the box in the world; `half_extents` and `offset` are local.
pub fn ray_obb(
    ray: Ray3d,
    transform: &GlobalTransform,
    half_extents: Vec3,
    offset: Vec3,
) -> Option<f32> {
    let inverse = transform.affine().inverse();
    let local_origin = inverse.transform_point3(ray.origin) - offset;
    let local_dir = inverse.transform_vector3(*ray.direction);

    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;
    for axis in 0..3 {
        let origin = local_origin[axis];
        let dir = local_dir[axis];
        let extent = half_extents[axis];
        if dir.abs() < 1e-9 {
            if origin.abs() > extent {
                return None;
            }
            continue;
        }
        let t1 = (-extent - origin) / dir;
        let t2 = (extent - origin) / dir;
        t_min = t_min.max(t1.min(t2));
        t_max = t_max.min(t1.max(t2));
        if t_min > t_max {
            return None;
        }
    }
    if t_max < 0.0 {
        return None;
    }
    let local_t = t_min.max(0.0);
    // Convert the local-space hit back to a world-space distance; the local
    // frame may carry scale.
    let world_hit = transform
        .affine()
        .transform_point3(local_origin + offset + local_dir * local_t);
    Some(ray.origin.distance(world_hit))
}
