//! # Celestial Parameters
//!
//! The generated payload of one coordinate. World instantiation reads the
//! `visitable` descriptor, presentation reads `imagery`; both are consumers
//! of this shape, so fields are only ever added.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coordinate::CelestialCoordinate;

/// Loosely typed value in the parameter field bag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Number(f64),
    /// Boolean value.
    Flag(bool),
}

impl FieldValue {
    /// Returns the text if this is a `Text` value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the number for `Integer` and `Number` values.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Where a body sits around its parent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitGeometry {
    /// Orbit slot (1-based).
    pub orbit_number: i32,
    /// Distance from the parent, in display units.
    pub radius: f32,
    /// Initial phase angle in radians, `[0, 2π)`.
    pub phase: f32,
}

/// Descriptor for a body that can be entered as a playable world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisitableParameters {
    /// World template name.
    pub world_type: String,
    /// Difficulty of the world.
    pub threat_level: f32,
    /// World width and height in tiles.
    pub world_size: [u32; 2],
    /// Surface gravity.
    pub gravity: f32,
    /// Dominant biome.
    pub primary_biome: String,
}

/// Generated (or overridden) data for one celestial coordinate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CelestialParameters {
    /// The coordinate these parameters describe.
    pub coordinate: CelestialCoordinate,
    /// Seed derived from the coordinate, for downstream generators.
    pub seed: u64,
    /// Display name.
    pub name: String,
    /// Table type name (system type, planetary type or satellite type).
    pub body_type: String,
    /// Imagery keys for presentation.
    pub imagery: Vec<String>,
    /// Orbit slot, `None` for system centers.
    pub orbit: Option<OrbitGeometry>,
    /// Extra typed fields copied from the generation tables.
    pub fields: BTreeMap<String, FieldValue>,
    /// Present when the body can be visited.
    pub visitable: Option<VisitableParameters>,
}

impl CelestialParameters {
    /// Creates parameters with no imagery, orbit, fields or world.
    #[must_use]
    pub fn new(
        coordinate: CelestialCoordinate,
        seed: u64,
        name: impl Into<String>,
        body_type: impl Into<String>,
    ) -> Self {
        Self {
            coordinate,
            seed,
            name: name.into(),
            body_type: body_type.into(),
            imagery: Vec::new(),
            orbit: None,
            fields: BTreeMap::new(),
            visitable: None,
        }
    }

    /// Returns true if the body can be entered.
    #[inline]
    #[must_use]
    pub fn is_visitable(&self) -> bool {
        self.visitable.is_some()
    }

    /// Looks up a field bag entry.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}
