//! # Celestial Database Contract
//!
//! Read accessors shared by the master and the slave.
//!
//! `Ok(None)` means "not known here yet": the slave returns it on a cache
//! miss, the master never does. `Err` is reserved for impossible
//! coordinates and storage faults.

use std::collections::BTreeSet;

use crate::chunk::ConstellationLine;
use crate::coordinate::{CelestialCoordinate, CelestialRegion};
use crate::error::CelestialResult;
use crate::parameters::CelestialParameters;

/// Read access to a celestial catalog.
pub trait CelestialDatabase {
    /// Parameters of a body.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` for null or for a body that does not exist.
    fn parameters(
        &self,
        coordinate: &CelestialCoordinate,
    ) -> CelestialResult<Option<CelestialParameters>>;

    /// Orbit numbers of the direct children of a body, ascending.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` for null or for a body that does not exist.
    fn child_orbits(&self, coordinate: &CelestialCoordinate) -> CelestialResult<Option<Vec<i32>>>;

    /// Systems inside `region`, optionally restricted to some system types.
    ///
    /// # Errors
    ///
    /// Returns a storage error if chunks cannot be loaded.
    fn scan_systems(
        &self,
        region: CelestialRegion,
        include_types: Option<&BTreeSet<String>>,
    ) -> CelestialResult<Vec<CelestialCoordinate>>;

    /// Constellation lines with at least one endpoint inside `region`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if chunks cannot be loaded.
    fn scan_constellation_lines(
        &self,
        region: CelestialRegion,
    ) -> CelestialResult<Vec<ConstellationLine>>;

    /// Returns true if every chunk overlapping `region` is held in memory.
    fn scan_region_fully_loaded(&self, region: CelestialRegion) -> bool;

    /// Display name of a body.
    ///
    /// # Errors
    ///
    /// Same as [`Self::parameters`].
    fn name(&self, coordinate: &CelestialCoordinate) -> CelestialResult<Option<String>> {
        Ok(self.parameters(coordinate)?.map(|p| p.name))
    }

    /// Returns true if the body has at least one child.
    ///
    /// # Errors
    ///
    /// Same as [`Self::child_orbits`].
    fn has_children(&self, coordinate: &CelestialCoordinate) -> CelestialResult<Option<bool>> {
        Ok(self.child_orbits(coordinate)?.map(|orbits| !orbits.is_empty()))
    }

    /// Coordinates of the direct children of a body.
    ///
    /// # Errors
    ///
    /// Same as [`Self::child_orbits`].
    fn children(
        &self,
        coordinate: &CelestialCoordinate,
    ) -> CelestialResult<Option<Vec<CelestialCoordinate>>> {
        let Some(orbits) = self.child_orbits(coordinate)? else {
            return Ok(None);
        };
        orbits
            .into_iter()
            .map(|orbit| coordinate.child(orbit))
            .collect::<CelestialResult<Vec<_>>>()
            .map(Some)
    }
}
