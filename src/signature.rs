use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use bevy::prelude::*;
use magpie_structures::{FloorDefinition, RoadDefinition, WallDefinition};

/// Coordinates and dimensions are quantized to millimeters before hashing so
/// that a signature is insensitive to float noise but changes for any edit a
/// user can actually see.
const QUANT: f32 = 1000.0;

fn quantize(value: f32) -> i64 {
    if value.is_finite() {
        (value as f64 * QUANT as f64).round() as i64
    } else {
        i64::MIN
    }
}

fn hash_vec3(hasher: &mut DefaultHasher, v: Vec3) {
    quantize(v.x).hash(hasher);
    quantize(v.y).hash(hasher);
    quantize(v.z).hash(hasher);
}

/// Content signature of a wall definition. Equal definitions always hash
/// equal; any single coordinate or dimension change changes the result.
pub fn wall_signature(def: &WallDefinition) -> u64 {
    let mut hasher = DefaultHasher::new();
    def.segments.len().hash(&mut hasher);
    for segment in &def.segments {
        hash_vec3(&mut hasher, segment.start);
        hash_vec3(&mut hasher, segment.end);
    }
    quantize(def.height).hash(&mut hasher);
    quantize(def.thickness).hash(&mut hasher);
    hasher.finish()
}

pub fn road_signature(def: &RoadDefinition) -> u64 {
    let mut hasher = DefaultHasher::new();
    def.points.len().hash(&mut hasher);
    for point in &def.points {
        hash_vec3(&mut hasher, *point);
    }
    quantize(def.width).hash(&mut hasher);
    hasher.finish()
}

pub fn floor_signature(def: &FloorDefinition) -> u64 {
    let mut hasher = DefaultHasher::new();
    def.ring.len().hash(&mut hasher);
    for point in &def.ring {
        hash_vec3(&mut hasher, *point);
    }
    quantize(def.thickness).hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpie_structures::WallSegment;

    fn wall() -> WallDefinition {
        WallDefinition {
            segments: vec![
                WallSegment::new(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0)),
                WallSegment::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 3.0)),
            ],
            height: 2.4,
            thickness: 0.3,
        }
    }

    #[test]
    fn signatures_are_deterministic() {
        assert_eq!(wall_signature(&wall()), wall_signature(&wall()));
    }

    #[test]
    fn any_coordinate_change_is_visible() {
        let base = wall_signature(&wall());

        let mut moved = wall();
        moved.segments[1].end.z += 0.01;
        assert_ne!(wall_signature(&moved), base);

        let mut taller = wall();
        taller.height += 0.01;
        assert_ne!(wall_signature(&taller), base);

        let mut thicker = wall();
        thicker.thickness += 0.01;
        assert_ne!(wall_signature(&thicker), base);
    }

    #[test]
    fn sub_quantum_noise_is_invisible() {
        let mut noisy = wall();
        noisy.segments[0].end.x += 1e-5;
        assert_eq!(wall_signature(&noisy), wall_signature(&wall()));
    }

    #[test]
    fn road_and_floor_signatures_track_their_dimensions() {
        let road = RoadDefinition {
            points: vec![Vec3::ZERO, Vec3::X],
            width: 3.0,
        };
        let mut wider = road.clone();
        wider.width = 4.0;
        assert_ne!(road_signature(&road), road_signature(&wider));

        let floor = FloorDefinition {
            ring: vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            thickness: 0.15,
        };
        let mut thicker = floor.clone();
        thicker.thickness = 0.2;
        assert_ne!(floor_signature(&floor), floor_signature(&thicker));
    }
}
