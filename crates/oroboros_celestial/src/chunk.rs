//! # Celestial Chunks
//!
//! The universe plane is cut into square chunks of `chunk_size` cells. A
//! chunk is the unit of generation, caching, persistence and (for system
//! centers and constellations) replication.
//!
//! A chunk is never mutated after generation except through an explicit
//! parameter override, which swaps one `CelestialParameters` value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::coordinate::{CelestialCoordinate, CelestialRegion, SystemLocation};
use crate::error::{CelestialError, CelestialResult};
use crate::parameters::CelestialParameters;

/// Index of a chunk on the system plane.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ChunkIndex {
    /// X index (in chunks, not cells).
    pub x: i32,
    /// Y index (in chunks, not cells).
    pub y: i32,
}

impl ChunkIndex {
    /// Creates a new chunk index.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing the cell `(x, y)`.
    #[inline]
    #[must_use]
    pub const fn for_cell(x: i32, y: i32, chunk_size: i32) -> Self {
        Self {
            x: x.div_euclid(chunk_size),
            y: y.div_euclid(chunk_size),
        }
    }

    /// Chunk containing a system.
    #[inline]
    #[must_use]
    pub const fn for_location(location: SystemLocation, chunk_size: i32) -> Self {
        Self::for_cell(location.x, location.y, chunk_size)
    }

    /// Cells covered by this chunk.
    #[must_use]
    pub const fn region(self, chunk_size: i32) -> CelestialRegion {
        let min_x = self.x.saturating_mul(chunk_size);
        let min_y = self.y.saturating_mul(chunk_size);
        CelestialRegion::new(
            min_x,
            min_y,
            min_x.saturating_add(chunk_size),
            min_y.saturating_add(chunk_size),
        )
    }

    /// Every chunk overlapping `region`, row by row.
    #[must_use]
    pub fn covering(region: CelestialRegion, chunk_size: i32) -> Vec<Self> {
        if region.is_empty() {
            return Vec::new();
        }
        let first = Self::for_cell(region.min_x, region.min_y, chunk_size);
        let last = Self::for_cell(region.max_x - 1, region.max_y - 1, chunk_size);
        let mut chunks = Vec::new();
        for y in first.y..=last.y {
            for x in first.x..=last.x {
                chunks.push(Self::new(x, y));
            }
        }
        chunks
    }
}

/// A constellation segment between two system positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstellationLine {
    /// First endpoint `(x, y)`.
    pub start: (i32, i32),
    /// Second endpoint `(x, y)`.
    pub end: (i32, i32),
}

impl ConstellationLine {
    /// Returns true if either endpoint lies inside `region`.
    #[must_use]
    pub const fn touches(&self, region: &CelestialRegion) -> bool {
        region.contains(self.start.0, self.start.1) || region.contains(self.end.0, self.end.1)
    }

    /// Returns true if both lines join the same two points.
    #[must_use]
    pub fn same_segment(&self, other: &Self) -> bool {
        (self.start == other.start && self.end == other.end)
            || (self.start == other.end && self.end == other.start)
    }
}

/// A planet and its satellites.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CelestialPlanet {
    /// The planet itself.
    pub parameters: CelestialParameters,
    /// Satellites by orbit number.
    pub satellites: BTreeMap<i32, CelestialParameters>,
}

/// A system center and its planets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CelestialSystem {
    /// The system center.
    pub parameters: CelestialParameters,
    /// Planets by orbit number.
    pub planets: BTreeMap<i32, CelestialPlanet>,
}

/// Everything generated for one chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CelestialChunk {
    /// Which chunk this is.
    pub index: ChunkIndex,
    /// Systems by location.
    pub systems: BTreeMap<SystemLocation, CelestialSystem>,
    /// Constellation segments.
    pub constellations: Vec<ConstellationLine>,
}

impl CelestialChunk {
    /// Creates an empty chunk.
    #[must_use]
    pub fn new(index: ChunkIndex) -> Self {
        Self {
            index,
            systems: BTreeMap::new(),
            constellations: Vec::new(),
        }
    }

    /// Looks up a system.
    #[must_use]
    pub fn system(&self, location: SystemLocation) -> Option<&CelestialSystem> {
        self.systems.get(&location)
    }

    /// Copy of this chunk with every planet tree removed.
    ///
    /// This is what slaves receive for chunk requests; planets travel in
    /// per-system responses.
    #[must_use]
    pub fn without_planets(&self) -> Self {
        Self {
            index: self.index,
            systems: self
                .systems
                .iter()
                .map(|(loc, system)| {
                    (
                        *loc,
                        CelestialSystem {
                            parameters: system.parameters.clone(),
                            planets: BTreeMap::new(),
                        },
                    )
                })
                .collect(),
            constellations: self.constellations.clone(),
        }
    }

    /// Systems inside `region` whose type is in `include_types` (all types
    /// when `None`).
    pub fn systems_in<'a>(
        &'a self,
        region: &'a CelestialRegion,
        include_types: Option<&'a BTreeSet<String>>,
    ) -> impl Iterator<Item = CelestialCoordinate> + 'a {
        self.systems
            .iter()
            .filter(move |(loc, system)| {
                region.contains(loc.x, loc.y)
                    && include_types
                        .map_or(true, |types| types.contains(&system.parameters.body_type))
            })
            .map(|(_, system)| system.parameters.coordinate)
    }

    /// Constellation lines with an endpoint inside `region`.
    pub fn lines_touching<'a>(
        &'a self,
        region: &'a CelestialRegion,
    ) -> impl Iterator<Item = ConstellationLine> + 'a {
        self.constellations.iter().filter(move |line| line.touches(region)).copied()
    }

    /// Total number of bodies (systems, planets and satellites).
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.systems
            .values()
            .map(|s| 1 + s.planets.values().map(|p| 1 + p.satellites.len()).sum::<usize>())
            .sum()
    }

    /// Resolves any coordinate inside this chunk.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` if the system, planet or satellite does
    /// not exist.
    pub fn parameters(
        &self,
        coordinate: &CelestialCoordinate,
    ) -> CelestialResult<&CelestialParameters> {
        let system = self.systems.get(&coordinate.location()).ok_or_else(|| missing(coordinate))?;
        lookup_in_planets(&system.parameters, &system.planets, coordinate)
    }

    /// Mutable variant of [`Self::parameters`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` if the body does not exist.
    pub fn parameters_mut(
        &mut self,
        coordinate: &CelestialCoordinate,
    ) -> CelestialResult<&mut CelestialParameters> {
        let system = self
            .systems
            .get_mut(&coordinate.location())
            .ok_or_else(|| missing(coordinate))?;
        if coordinate.is_system() {
            return Ok(&mut system.parameters);
        }
        let planet = system
            .planets
            .get_mut(&coordinate.planet_orbit())
            .ok_or_else(|| missing(coordinate))?;
        if coordinate.is_planetary_body() {
            return Ok(&mut planet.parameters);
        }
        planet
            .satellites
            .get_mut(&coordinate.satellite_orbit())
            .ok_or_else(|| missing(coordinate))
    }
}

/// Resolves `coordinate` against a system center and its planet tree.
///
/// # Errors
///
/// Returns `InvalidCoordinate` if the body does not exist.
pub fn lookup_in_planets<'a>(
    system: &'a CelestialParameters,
    planets: &'a BTreeMap<i32, CelestialPlanet>,
    coordinate: &CelestialCoordinate,
) -> CelestialResult<&'a CelestialParameters> {
    if coordinate.is_null() {
        return Err(missing(coordinate));
    }
    if coordinate.is_system() {
        return Ok(system);
    }
    let planet = planets.get(&coordinate.planet_orbit()).ok_or_else(|| missing(coordinate))?;
    if coordinate.is_planetary_body() {
        return Ok(&planet.parameters);
    }
    planet
        .satellites
        .get(&coordinate.satellite_orbit())
        .ok_or_else(|| missing(coordinate))
}

/// Orbit numbers of the direct children of `coordinate`.
///
/// Satellites have no children and yield an empty list.
///
/// # Errors
///
/// Returns `InvalidCoordinate` if the body does not exist.
pub fn child_orbits_in(
    system: &CelestialParameters,
    planets: &BTreeMap<i32, CelestialPlanet>,
    coordinate: &CelestialCoordinate,
) -> CelestialResult<Vec<i32>> {
    lookup_in_planets(system, planets, coordinate)?;
    if coordinate.is_system() {
        return Ok(planets.keys().copied().collect());
    }
    if coordinate.is_planetary_body() {
        return Ok(planets
            .get(&coordinate.planet_orbit())
            .map(|planet| planet.satellites.keys().copied().collect())
            .unwrap_or_default());
    }
    Ok(Vec::new())
}

pub(crate) fn missing(coordinate: &CelestialCoordinate) -> CelestialError {
    CelestialError::InvalidCoordinate(format!("no celestial body at {coordinate}"))
}
