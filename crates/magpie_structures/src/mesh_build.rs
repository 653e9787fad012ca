use bevy::{
    mesh::{Indices, PrimitiveTopology},
    prelude::*,
};

use crate::{FloorDefinition, RoadDefinition, WallDefinition};

const MIN_SEGMENT_LENGTH: f32 = 1e-4;

// ---------------------------------------------------------------------------
// Mesh accumulation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MeshData {
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
}

impl MeshData {
    /// Push a quad as two triangles. Corners in counter-clockwise order when
    /// viewed from the normal side.
    fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3) {
        let base = self.positions.len() as u32;
        for (i, corner) in corners.iter().enumerate() {
            self.positions.push(corner.to_array());
            self.normals.push(normal.to_array());
            self.uvs.push(match i {
                0 => [0.0, 0.0],
                1 => [1.0, 0.0],
                2 => [1.0, 1.0],
                _ => [0.0, 1.0],
            });
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// Push a flat polygon as a triangle fan from its first vertex.
    fn push_polygon(&mut self, ring: &[Vec3], normal: Vec3, reverse: bool) {
        if ring.len() < 3 {
            return;
        }
        let base = self.positions.len() as u32;
        for v in ring {
            self.positions.push(v.to_array());
            self.normals.push(normal.to_array());
            self.uvs.push([v.x, v.z]);
        }
        for i in 1..ring.len() as u32 - 1 {
            if reverse {
                self.indices.extend_from_slice(&[base, base + i + 1, base + i]);
            } else {
                self.indices.extend_from_slice(&[base, base + i, base + i + 1]);
            }
        }
    }

    fn into_mesh(self) -> Option<Mesh> {
        if self.positions.is_empty() {
            return None;
        }
        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals);
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, self.uvs);
        mesh.insert_indices(Indices::U32(self.indices));
        Some(mesh)
    }
}

fn finite(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

// ---------------------------------------------------------------------------
// Wall
// ---------------------------------------------------------------------------

/// Build a wall mesh: one oriented box per non-degenerate segment. Positions
/// are node-local, matching the definition's coordinate space.
pub fn build_wall_mesh(def: &WallDefinition) -> Option<Mesh> {
    let mut data = MeshData::default();
    let half_t = (def.thickness * 0.5).max(MIN_SEGMENT_LENGTH);
    let height = def.height.max(MIN_SEGMENT_LENGTH);

    for segment in &def.segments {
        if !finite(segment.start) || !finite(segment.end) {
            continue;
        }
        let run = segment.end - segment.start;
        let flat = Vec3::new(run.x, 0.0, run.z);
        if flat.length() < MIN_SEGMENT_LENGTH {
            continue;
        }
        let dir = flat.normalize();
        let right = dir.cross(Vec3::Y) * half_t;
        let up = Vec3::Y * height;

        let a0 = segment.start - right;
        let a1 = segment.start + right;
        let b0 = segment.end - right;
        let b1 = segment.end + right;

        // Side faces
        data.push_quad([a0, b0, b0 + up, a0 + up], -right.normalize());
        data.push_quad([b1, a1, a1 + up, b1 + up], right.normalize());
        // Caps
        data.push_quad([a1, a0, a0 + up, a1 + up], -dir);
        data.push_quad([b0, b1, b1 + up, b0 + up], dir);
        // Top and bottom
        data.push_quad([a0 + up, b0 + up, b1 + up, a1 + up], Vec3::Y);
        data.push_quad([a1, b1, b0, a0], Vec3::NEG_Y);
    }

    data.into_mesh()
}

// ---------------------------------------------------------------------------
// Road
// ---------------------------------------------------------------------------

/// Build a road mesh: one flat quad per polyline segment, lifted a hair above
/// the vertex elevation to avoid z-fighting with the ground.
pub fn build_road_mesh(def: &RoadDefinition) -> Option<Mesh> {
    let mut data = MeshData::default();
    let half_w = (def.width * 0.5).max(MIN_SEGMENT_LENGTH);
    let lift = Vec3::Y * 0.02;

    for pair in def.points.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if !finite(start) || !finite(end) {
            continue;
        }
        let run = end - start;
        let flat = Vec3::new(run.x, 0.0, run.z);
        if flat.length() < MIN_SEGMENT_LENGTH {
            continue;
        }
        let right = flat.normalize().cross(Vec3::Y) * half_w;
        data.push_quad(
            [
                start - right + lift,
                start + right + lift,
                end + right + lift,
                end - right + lift,
            ],
            Vec3::Y,
        );
    }

    data.into_mesh()
}

// ---------------------------------------------------------------------------
// Floor
// ---------------------------------------------------------------------------

/// Build a floor slab: the ring as the top surface, extruded down by
/// `thickness`, with a perimeter skirt.
pub fn build_floor_mesh(def: &FloorDefinition) -> Option<Mesh> {
    let ring: Vec<Vec3> = def.ring.iter().copied().filter(|v| finite(*v)).collect();
    if ring.len() < 3 {
        return None;
    }

    let mut data = MeshData::default();
    let drop = Vec3::Y * def.thickness.max(MIN_SEGMENT_LENGTH);
    let bottom: Vec<Vec3> = ring.iter().map(|v| *v - drop).collect();

    data.push_polygon(&ring, Vec3::Y, false);
    data.push_polygon(&bottom, Vec3::NEG_Y, true);

    for i in 0..ring.len() {
        let j = (i + 1) % ring.len();
        let edge = ring[j] - ring[i];
        let flat = Vec3::new(edge.x, 0.0, edge.z);
        if flat.length() < MIN_SEGMENT_LENGTH {
            continue;
        }
        let normal = flat.normalize().cross(Vec3::NEG_Y);
        data.push_quad([bottom[i], bottom[j], ring[j], ring[i]], normal);
    }

    data.into_mesh()
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Axis-aligned bounding-box centroid of a point set; `None` when the set has
/// no finite points. Floor handles use this as the ring's reference point.
pub fn bounds_centroid<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Vec3> {
    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    let mut any = false;
    for p in points {
        if !finite(p) {
            continue;
        }
        min = min.min(p);
        max = max.max(p);
        any = true;
    }
    any.then(|| (min + max) * 0.5)
}
