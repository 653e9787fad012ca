use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{FloorDefinition, RoadDefinition, WallDefinition};

pub const FORMAT_VERSION: u32 = 1;

/// A named structure entry inside a [`StructureSet`] document.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StructureEntry<T> {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    pub definition: T,
}

/// JSON interchange document for structure definitions. This is how an
/// external store hands definitions across a process boundary; scene
/// persistence itself is not our concern.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StructureSet {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub walls: Vec<StructureEntry<WallDefinition>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roads: Vec<StructureEntry<RoadDefinition>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub floors: Vec<StructureEntry<FloorDefinition>>,
}

impl Default for StructureSet {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            walls: Vec::new(),
            roads: Vec::new(),
            floors: Vec::new(),
        }
    }
}

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("failed to parse structure set: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported structure set version {0} (expected {FORMAT_VERSION})")]
    UnsupportedVersion(u32),
}

pub fn from_json(input: &str) -> Result<StructureSet, FormatError> {
    let set: StructureSet = serde_json::from_str(input)?;
    if set.version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(set.version));
    }
    Ok(set)
}

pub fn to_json(set: &StructureSet) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(set)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WallSegment;
    use bevy::prelude::*;

    #[test]
    fn round_trips_a_structure_set() {
        let mut set = StructureSet::default();
        set.walls.push(StructureEntry {
            name: Some("perimeter".into()),
            definition: WallDefinition {
                segments: vec![WallSegment::new(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0))],
                height: 2.0,
                thickness: 0.25,
            },
        });
        set.roads.push(StructureEntry {
            name: None,
            definition: RoadDefinition {
                points: vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)],
                width: 4.0,
            },
        });

        let json = to_json(&set).unwrap();
        let parsed = from_json(&json).unwrap();
        assert_eq!(parsed.walls.len(), 1);
        assert_eq!(parsed.walls[0].definition, set.walls[0].definition);
        assert_eq!(parsed.roads[0].definition, set.roads[0].definition);
        assert!(parsed.floors.is_empty());
    }

    #[test]
    fn rejects_unknown_version() {
        let json = r#"{ "version": 99 }"#;
        match from_json(json) {
            Err(FormatError::UnsupportedVersion(99)) => {}
            other => panic!("expected version error, got {other:?}"),
        }
    }
}
