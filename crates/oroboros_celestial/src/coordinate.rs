//! # Celestial Coordinates
//!
//! Every body in the universe is addressed by a three level coordinate:
//!
//! ```text
//! x:y:z          system (center star)
//! x:y:z:p        planet in orbit p of that system
//! x:y:z:p:s      satellite in orbit s of planet p
//! ```
//!
//! Orbit numbers start at 1; 0 means "the parent itself". The all-zero
//! coordinate is the null sentinel and renders as `null`. The generator never
//! places a system at location `(0, 0, 0)`, so null never names a real system.
//!
//! ## Encodings
//!
//! - Text id (`x:y:z:p:s`), used in logs, commands and save files
//! - Filename id (`x_y_z_p_s`), safe on every filesystem
//! - 20 byte binary: five little-endian `i32` (`x, y, z, planet, satellite`)
//!
//! All three are part of the save format and must not change.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CelestialError, CelestialResult};

/// Integer location of a star system.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SystemLocation {
    /// X axis (chunked).
    pub x: i32,
    /// Y axis (chunked).
    pub y: i32,
    /// Z axis (depth, rolled per system).
    pub z: i32,
}

impl SystemLocation {
    /// Creates a new system location.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the position on the chunked plane.
    #[inline]
    #[must_use]
    pub const fn xy(self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Returns true for the origin, which is reserved for the null coordinate.
    #[inline]
    #[must_use]
    pub const fn is_origin(self) -> bool {
        self.x == 0 && self.y == 0 && self.z == 0
    }
}

impl fmt::Display for SystemLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.x, self.y, self.z)
    }
}

/// Integer rectangle on the system plane (`min` inclusive, `max` exclusive).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CelestialRegion {
    /// Inclusive minimum X.
    pub min_x: i32,
    /// Inclusive minimum Y.
    pub min_y: i32,
    /// Exclusive maximum X.
    pub max_x: i32,
    /// Exclusive maximum Y.
    pub max_y: i32,
}

impl CelestialRegion {
    /// Creates a region from its corners.
    #[inline]
    #[must_use]
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Square region of side `2 * radius` centered on `(x, y)`.
    #[must_use]
    pub const fn around(x: i32, y: i32, radius: i32) -> Self {
        Self {
            min_x: x.saturating_sub(radius),
            min_y: y.saturating_sub(radius),
            max_x: x.saturating_add(radius),
            max_y: y.saturating_add(radius),
        }
    }

    /// Returns true if the region covers no cells.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }

    /// Returns true if `(x, y)` lies inside the region.
    #[inline]
    #[must_use]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }
}

/// Address of a system, planet or satellite.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CelestialCoordinate {
    location: SystemLocation,
    planet: i32,
    satellite: i32,
}

/// Size of the binary coordinate encoding.
pub const COORDINATE_BYTES: usize = 20;

impl CelestialCoordinate {
    /// The null sentinel.
    pub const NULL: Self = Self {
        location: SystemLocation::new(0, 0, 0),
        planet: 0,
        satellite: 0,
    };

    /// Coordinate of a system center.
    #[inline]
    #[must_use]
    pub const fn system_at(location: SystemLocation) -> Self {
        Self { location, planet: 0, satellite: 0 }
    }

    /// Builds a coordinate, checking the orbit invariants.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` for negative orbits or a satellite without
    /// a planet.
    pub fn new(location: SystemLocation, planet: i32, satellite: i32) -> CelestialResult<Self> {
        if planet < 0 || satellite < 0 {
            return Err(CelestialError::InvalidCoordinate(format!(
                "negative orbit number in {location}:{planet}:{satellite}"
            )));
        }
        if satellite > 0 && planet == 0 {
            return Err(CelestialError::InvalidCoordinate(format!(
                "satellite orbit {satellite} without a planet in system {location}"
            )));
        }
        Ok(Self { location, planet, satellite })
    }

    /// System location shared by every level of the hierarchy.
    #[inline]
    #[must_use]
    pub const fn location(&self) -> SystemLocation {
        self.location
    }

    /// Planetary orbit number (0 for a system).
    #[inline]
    #[must_use]
    pub const fn planet_orbit(&self) -> i32 {
        self.planet
    }

    /// Satellite orbit number (0 unless this is a satellite).
    #[inline]
    #[must_use]
    pub const fn satellite_orbit(&self) -> i32 {
        self.satellite
    }

    /// Returns true for the null sentinel.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.location.is_origin() && self.planet == 0 && self.satellite == 0
    }

    /// Returns true for a system center.
    #[inline]
    #[must_use]
    pub const fn is_system(&self) -> bool {
        !self.is_null() && self.planet == 0
    }

    /// Returns true for a planet (not a satellite).
    #[inline]
    #[must_use]
    pub const fn is_planetary_body(&self) -> bool {
        self.planet > 0 && self.satellite == 0
    }

    /// Returns true for a satellite.
    #[inline]
    #[must_use]
    pub const fn is_satellite_body(&self) -> bool {
        self.satellite > 0
    }

    /// Returns the system this coordinate belongs to.
    #[inline]
    #[must_use]
    pub const fn system(&self) -> Self {
        Self::system_at(self.location)
    }

    /// Returns the planet this coordinate is, or orbits.
    ///
    /// # Errors
    ///
    /// Systems and null have no planet.
    pub fn planet(&self) -> CelestialResult<Self> {
        if self.planet == 0 {
            return Err(CelestialError::InvalidCoordinate(format!(
                "{self} is not a planet or satellite"
            )));
        }
        Ok(Self { location: self.location, planet: self.planet, satellite: 0 })
    }

    /// Returns the next level up the hierarchy.
    ///
    /// # Errors
    ///
    /// Systems and null have no parent.
    pub fn parent(&self) -> CelestialResult<Self> {
        if self.satellite > 0 {
            Ok(Self { location: self.location, planet: self.planet, satellite: 0 })
        } else if self.planet > 0 {
            Ok(self.system())
        } else {
            Err(CelestialError::InvalidCoordinate(format!("{self} has no parent")))
        }
    }

    /// Returns the body in orbit `orbit` around this one. `child(0)` is `self`.
    ///
    /// # Errors
    ///
    /// Satellites have no children, null has no children, and orbit numbers
    /// are never negative.
    pub fn child(&self, orbit: i32) -> CelestialResult<Self> {
        if orbit == 0 {
            return Ok(*self);
        }
        if orbit < 0 {
            return Err(CelestialError::InvalidCoordinate(format!(
                "negative child orbit {orbit} of {self}"
            )));
        }
        if self.is_null() {
            return Err(CelestialError::InvalidCoordinate("null has no children".into()));
        }
        if self.satellite > 0 {
            return Err(CelestialError::InvalidCoordinate(format!(
                "satellite {self} has no children"
            )));
        }
        if self.planet > 0 {
            Ok(Self { location: self.location, planet: self.planet, satellite: orbit })
        } else {
            Ok(Self { location: self.location, planet: orbit, satellite: 0 })
        }
    }

    /// Orbit number of this body around its parent (0 for a system).
    #[inline]
    #[must_use]
    pub const fn orbit_number(&self) -> i32 {
        if self.satellite > 0 {
            self.satellite
        } else {
            self.planet
        }
    }

    /// Returns true if `self` is `ancestor` or lies below it.
    #[must_use]
    pub fn is_descendant_of(&self, ancestor: &Self) -> bool {
        if self.location != ancestor.location {
            return false;
        }
        match (ancestor.planet, ancestor.satellite) {
            (0, _) => true,
            (p, 0) => self.planet == p,
            (p, s) => self.planet == p && self.satellite == s,
        }
    }

    /// Canonical text id (`x:y:z[:p[:s]]`, or `null`).
    #[must_use]
    pub fn id(&self) -> String {
        self.join(':')
    }

    /// Filename-safe id (`x_y_z[_p[_s]]`, or `null`).
    #[must_use]
    pub fn filename(&self) -> String {
        self.join('_')
    }

    /// Parses a filename-safe id.
    ///
    /// # Errors
    ///
    /// Returns `ParseCoordinate` on malformed input.
    pub fn from_filename(name: &str) -> CelestialResult<Self> {
        Self::parse_with(name, '_')
    }

    /// Fixed 20 byte little-endian encoding.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; COORDINATE_BYTES] {
        let fields = [
            self.location.x.to_le(),
            self.location.y.to_le(),
            self.location.z.to_le(),
            self.planet.to_le(),
            self.satellite.to_le(),
        ];
        bytemuck::cast(fields)
    }

    /// Decodes the 20 byte encoding.
    ///
    /// # Errors
    ///
    /// Returns `ParseCoordinate` for a wrong length or broken invariant.
    pub fn from_bytes(bytes: &[u8]) -> CelestialResult<Self> {
        if bytes.len() != COORDINATE_BYTES {
            return Err(CelestialError::ParseCoordinate {
                input: format!("{} bytes", bytes.len()),
                reason: format!("expected {COORDINATE_BYTES} bytes"),
            });
        }
        let fields: [i32; 5] = bytemuck::pod_read_unaligned(bytes);
        let [x, y, z, planet, satellite] = fields.map(i32::from_le);
        Self::new(SystemLocation::new(x, y, z), planet, satellite).map_err(|e| {
            CelestialError::ParseCoordinate {
                input: format!("{x}:{y}:{z}:{planet}:{satellite}"),
                reason: e.to_string(),
            }
        })
    }

    fn join(&self, separator: char) -> String {
        if self.is_null() {
            return "null".to_string();
        }
        let SystemLocation { x, y, z } = self.location;
        let mut id = format!("{x}{separator}{y}{separator}{z}");
        if self.planet > 0 {
            id.push(separator);
            id.push_str(&self.planet.to_string());
            if self.satellite > 0 {
                id.push(separator);
                id.push_str(&self.satellite.to_string());
            }
        }
        id
    }

    fn parse_with(input: &str, separator: char) -> CelestialResult<Self> {
        let reject = |reason: &str| CelestialError::ParseCoordinate {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("null") {
            return Ok(Self::NULL);
        }

        let parts: Vec<&str> = trimmed.split(separator).collect();
        if !(3..=5).contains(&parts.len()) {
            return Err(reject("expected 3 to 5 fields"));
        }

        let mut numbers = [0i32; 5];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = part.parse::<i32>().map_err(|_| reject("field is not an integer"))?;
        }
        let [x, y, z, planet, satellite] = numbers;

        if parts.len() >= 4 && planet <= 0 {
            return Err(reject("planet orbit must be positive"));
        }
        if parts.len() == 5 && satellite <= 0 {
            return Err(reject("satellite orbit must be positive"));
        }

        Self::new(SystemLocation::new(x, y, z), planet, satellite)
            .map_err(|e| reject(&e.to_string()))
    }
}

impl fmt::Display for CelestialCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for CelestialCoordinate {
    type Err = CelestialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with(s, ':')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn satellite() -> CelestialCoordinate {
        CelestialCoordinate::new(SystemLocation::new(-12, 40, 7), 3, 2).unwrap()
    }

    #[test]
    fn test_text_id_roundtrip() {
        let samples = [
            CelestialCoordinate::NULL,
            CelestialCoordinate::system_at(SystemLocation::new(5, -6, 7)),
            CelestialCoordinate::new(SystemLocation::new(0, 0, 1), 4, 0).unwrap(),
            satellite(),
        ];
        for coord in samples {
            let parsed: CelestialCoordinate = coord.id().parse().unwrap();
            assert_eq!(parsed, coord, "text id {}", coord.id());
            assert_eq!(CelestialCoordinate::from_filename(&coord.filename()).unwrap(), coord);
            assert_eq!(CelestialCoordinate::from_bytes(&coord.to_bytes()).unwrap(), coord);
        }
    }

    #[test]
    fn test_text_formats() {
        assert_eq!(satellite().id(), "-12:40:7:3:2");
        assert_eq!(satellite().filename(), "-12_40_7_3_2");
        assert_eq!(CelestialCoordinate::NULL.id(), "null");
        assert_eq!(satellite().system().id(), "-12:40:7");
    }

    #[test]
    fn test_binary_layout_is_little_endian() {
        let coord = CelestialCoordinate::new(SystemLocation::new(1, -1, 2), 3, 4).unwrap();
        let bytes = coord.to_bytes();
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-1i32).to_le_bytes());
        assert_eq!(&bytes[16..20], &4i32.to_le_bytes());
    }

    #[test]
    fn test_malformed_text_rejected() {
        for bad in ["", "1:2", "1:2:3:4:5:6", "a:b:c", "1:2:3:0", "1:2:3:1:0", "1:2:3:-1"] {
            let result = bad.parse::<CelestialCoordinate>();
            assert!(
                matches!(result, Err(CelestialError::ParseCoordinate { .. })),
                "{bad:?} should not parse"
            );
        }
    }

    #[test]
    fn test_bad_bytes_rejected() {
        assert!(CelestialCoordinate::from_bytes(&[0u8; 19]).is_err());

        let mut bytes = [0u8; COORDINATE_BYTES];
        bytes[0..4].copy_from_slice(&9i32.to_le_bytes());
        bytes[16..20].copy_from_slice(&1i32.to_le_bytes()); // satellite without planet
        assert!(CelestialCoordinate::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_hierarchy_navigation() {
        let sat = satellite();
        let planet = sat.parent().unwrap();
        assert!(planet.is_planetary_body());
        assert!(planet.parent().unwrap().is_system());
        assert_eq!(sat.planet().unwrap(), planet);
        assert_eq!(planet.planet().unwrap(), planet);
        assert_eq!(planet.child(2).unwrap(), sat);
        assert_eq!(sat.orbit_number(), 2);
        assert_eq!(planet.orbit_number(), 3);
        assert_eq!(sat.system().orbit_number(), 0);
    }

    #[test]
    fn test_child_zero_is_identity() {
        for coord in [satellite(), satellite().parent().unwrap(), satellite().system()] {
            assert_eq!(coord.child(0).unwrap(), coord);
        }
    }

    #[test]
    fn test_impossible_navigation_fails() {
        let system = satellite().system();
        assert!(matches!(system.parent(), Err(CelestialError::InvalidCoordinate(_))));
        assert!(matches!(system.planet(), Err(CelestialError::InvalidCoordinate(_))));
        assert!(matches!(satellite().child(1), Err(CelestialError::InvalidCoordinate(_))));
        assert!(CelestialCoordinate::NULL.child(1).is_err());
        assert!(system.child(-1).is_err());
    }

    #[test]
    fn test_null_is_not_a_system() {
        assert!(CelestialCoordinate::NULL.is_null());
        assert!(!CelestialCoordinate::NULL.is_system());
        let origin_planet = CelestialCoordinate::new(SystemLocation::default(), 1, 0).unwrap();
        assert!(!origin_planet.is_null());
    }

    #[test]
    fn test_ordering_follows_hierarchy() {
        let system = satellite().system();
        let planet = satellite().parent().unwrap();
        assert!(system < planet);
        assert!(planet < satellite());
        assert!(satellite().is_descendant_of(&system));
        assert!(satellite().is_descendant_of(&planet));
        assert!(!planet.is_descendant_of(&satellite()));
    }

    #[test]
    fn test_region_contains() {
        let region = CelestialRegion::around(0, 0, 10);
        assert!(region.contains(-10, 9));
        assert!(!region.contains(10, 0));
        assert!(CelestialRegion::new(5, 5, 5, 9).is_empty());
    }
}
