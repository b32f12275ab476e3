//! # Slave Celestial Database
//!
//! A replica cache that never generates and never blocks. Every accessor
//! answers from memory; a miss is `Ok(None)` and the caller tries again
//! next frame.
//!
//! ## Frame loop
//!
//! ```text
//! signal_region / signal_system   record what the player looks at
//! pull_requests                   hand new requests to the transport
//! push_responses                  merge whatever arrived
//! cleanup                         expire idle entries
//! ```
//!
//! Chunks arrive without planets; each system's planet tree is its own
//! request, so a star map costs one message per chunk.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::cache::TtlCache;
use crate::chunk::{
    child_orbits_in, lookup_in_planets, missing, CelestialChunk, CelestialPlanet, ChunkIndex,
    ConstellationLine,
};
use crate::config::SlaveConfig;
use crate::coordinate::{CelestialCoordinate, CelestialRegion, SystemLocation};
use crate::database::CelestialDatabase;
use crate::error::CelestialResult;
use crate::parameters::CelestialParameters;
use crate::protocol::{CelestialBaseInformation, CelestialRequest, CelestialResponse};
use crate::sync::{SyncLedger, SyncState};

/// Jitter stream seed; slaves do not know the universe seed.
const SLAVE_JITTER_SEED: u64 = 0x534c_4156_455f_4a49;

type PlanetTree = Arc<BTreeMap<i32, CelestialPlanet>>;

struct SlaveState {
    chunks: TtlCache<ChunkIndex, Arc<CelestialChunk>>,
    systems: TtlCache<SystemLocation, PlanetTree>,
    ledger: SyncLedger,
    interest: BTreeSet<CelestialRequest>,
}

impl SlaveState {
    /// True if the answer to `key` is already held. A cached chunk without a
    /// system at a location answers that location's planet request too.
    fn is_answered(&self, key: &CelestialRequest, chunk_size: i32) -> bool {
        match key {
            CelestialRequest::Chunk(index) => self.chunks.contains(index),
            CelestialRequest::System(location) => {
                self.systems.contains(location)
                    || self
                        .chunks
                        .peek(&ChunkIndex::for_location(*location, chunk_size))
                        .is_some_and(|chunk| chunk.system(*location).is_none())
            }
        }
    }
}

/// Non-generating replica of a master.
pub struct CelestialSlaveDatabase {
    base: CelestialBaseInformation,
    state: Mutex<SlaveState>,
}

impl CelestialSlaveDatabase {
    /// Creates an empty replica for a master with layout `base`.
    #[must_use]
    pub fn new(base: CelestialBaseInformation, config: &SlaveConfig) -> Self {
        Self {
            base,
            state: Mutex::new(SlaveState {
                chunks: TtlCache::new(
                    config.cache_ttl(),
                    config.cache_jitter(),
                    config.max_cached_chunks,
                    SLAVE_JITTER_SEED,
                ),
                systems: TtlCache::new(
                    config.cache_ttl(),
                    config.cache_jitter(),
                    config.max_cached_systems,
                    SLAVE_JITTER_SEED.rotate_left(17),
                ),
                ledger: SyncLedger::new(config.request_timeout()),
                interest: BTreeSet::new(),
            }),
        }
    }

    /// Layout this replica was built for.
    #[must_use]
    pub const fn base_information(&self) -> CelestialBaseInformation {
        self.base
    }

    /// Records interest in every chunk overlapping `region`.
    pub fn signal_region(&self, region: CelestialRegion) {
        let chunks = ChunkIndex::covering(region, self.base.chunk_size);
        let mut state = self.state.lock();
        state.interest.extend(chunks.into_iter().map(CelestialRequest::Chunk));
    }

    /// Records interest in one system and its planet tree.
    pub fn signal_system(&self, location: SystemLocation) {
        let mut state = self.state.lock();
        state.interest.insert(CelestialRequest::Chunk(self.base.chunk_for(location)));
        state.interest.insert(CelestialRequest::System(location));
    }

    /// Drains recorded interest into requests for data that is neither
    /// cached nor already in flight.
    pub fn pull_requests(&self) -> Vec<CelestialRequest> {
        let now = Instant::now();
        let mut state = self.state.lock();
        let expired = state.ledger.expire_pending(now);
        if expired > 0 {
            tracing::debug!("{} celestial requests timed out", expired);
        }

        let interest = std::mem::take(&mut state.interest);
        let mut requests = Vec::new();
        for key in interest {
            if state.is_answered(&key, self.base.chunk_size) {
                continue;
            }
            if state.ledger.mark_pending(key, now) {
                requests.push(key);
            }
        }
        requests
    }

    /// Merges responses from the master into the cache.
    pub fn push_responses(&self, responses: Vec<CelestialResponse>) {
        let mut state = self.state.lock();
        for response in responses {
            let key = response.answers();
            let solicited = matches!(state.ledger.state(&key), SyncState::Pending { .. });
            if !solicited {
                tracing::debug!("Unsolicited celestial response {:?}", key);
            }

            match response {
                CelestialResponse::Chunk(chunk) => {
                    let chunk = if chunk.systems.values().any(|s| !s.planets.is_empty()) {
                        tracing::warn!(
                            "Chunk ({}, {}) arrived with planets; stripping",
                            chunk.index.x,
                            chunk.index.y
                        );
                        chunk.without_planets()
                    } else {
                        chunk
                    };
                    state.chunks.insert(chunk.index, Arc::new(chunk));
                    state.ledger.mark_known(key);
                }
                CelestialResponse::System { location, planets: Some(planets) } => {
                    state.systems.insert(location, Arc::new(planets));
                    state.ledger.mark_known(key);
                }
                CelestialResponse::System { location, planets: None } => {
                    // The cached chunk records the absence; nothing to store.
                    tracing::debug!("Master reports no system at {}", location);
                    state.ledger.forget(&key);
                }
            }
        }
    }

    /// Forcibly evicts the cached data behind one coordinate.
    ///
    /// A system coordinate drops its chunk and planet tree; a planet or
    /// satellite drops only the planet tree.
    pub fn invalidate_cache_for(&self, coordinate: &CelestialCoordinate) {
        if coordinate.is_null() {
            return;
        }
        let location = coordinate.location();
        let mut state = self.state.lock();

        let system_key = CelestialRequest::System(location);
        state.systems.remove(&location);
        state.ledger.forget(&system_key);

        if coordinate.is_system() {
            let index = self.base.chunk_for(location);
            state.chunks.remove(&index);
            state.ledger.forget(&CelestialRequest::Chunk(index));
        }
    }

    /// Expires idle cache entries and lapsed requests. Returns how many
    /// cache entries were dropped.
    pub fn cleanup(&self) -> usize {
        let mut state = self.state.lock();
        let chunks = state.chunks.cleanup();
        let systems = state.systems.cleanup();
        for index in &chunks {
            state.ledger.forget(&CelestialRequest::Chunk(*index));
        }
        for location in &systems {
            state.ledger.forget(&CelestialRequest::System(*location));
        }
        state.ledger.expire_pending(Instant::now());
        chunks.len() + systems.len()
    }

    /// Number of requests in flight.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.state.lock().ledger.pending_count()
    }

    /// Number of cached chunks.
    #[must_use]
    pub fn cached_chunks(&self) -> usize {
        self.state.lock().chunks.len()
    }

    /// Number of cached planet trees.
    #[must_use]
    pub fn cached_systems(&self) -> usize {
        self.state.lock().systems.len()
    }

    fn cached_chunk(&self, location: SystemLocation) -> Option<Arc<CelestialChunk>> {
        self.state.lock().chunks.get(&self.base.chunk_for(location)).cloned()
    }

    fn cached_planets(&self, location: SystemLocation) -> Option<PlanetTree> {
        self.state.lock().systems.get(&location).cloned()
    }
}

impl CelestialDatabase for CelestialSlaveDatabase {
    fn parameters(
        &self,
        coordinate: &CelestialCoordinate,
    ) -> CelestialResult<Option<CelestialParameters>> {
        if coordinate.is_null() {
            return Err(missing(coordinate));
        }
        let location = coordinate.location();
        let Some(chunk) = self.cached_chunk(location) else {
            return Ok(None);
        };
        let system = chunk.system(location).ok_or_else(|| missing(coordinate))?;
        if coordinate.is_system() {
            return Ok(Some(system.parameters.clone()));
        }
        let Some(planets) = self.cached_planets(location) else {
            return Ok(None);
        };
        lookup_in_planets(&system.parameters, &planets, coordinate).map(|p| Some(p.clone()))
    }

    fn child_orbits(&self, coordinate: &CelestialCoordinate) -> CelestialResult<Option<Vec<i32>>> {
        if coordinate.is_null() {
            return Err(missing(coordinate));
        }
        let location = coordinate.location();
        let Some(chunk) = self.cached_chunk(location) else {
            return Ok(None);
        };
        let system = chunk.system(location).ok_or_else(|| missing(coordinate))?;
        let Some(planets) = self.cached_planets(location) else {
            return Ok(None);
        };
        child_orbits_in(&system.parameters, &planets, coordinate).map(Some)
    }

    fn scan_systems(
        &self,
        region: CelestialRegion,
        include_types: Option<&BTreeSet<String>>,
    ) -> CelestialResult<Vec<CelestialCoordinate>> {
        let mut state = self.state.lock();
        let mut found = Vec::new();
        for index in ChunkIndex::covering(region, self.base.chunk_size) {
            let Some(chunk) = state.chunks.get(&index) else {
                continue;
            };
            found.extend(chunk.systems_in(&region, include_types));
        }
        Ok(found)
    }

    fn scan_constellation_lines(
        &self,
        region: CelestialRegion,
    ) -> CelestialResult<Vec<ConstellationLine>> {
        let mut state = self.state.lock();
        let mut lines = Vec::new();
        for index in ChunkIndex::covering(region, self.base.chunk_size) {
            if let Some(chunk) = state.chunks.get(&index) {
                lines.extend(chunk.lines_touching(&region));
            }
        }
        Ok(lines)
    }

    fn scan_region_fully_loaded(&self, region: CelestialRegion) -> bool {
        let state = self.state.lock();
        ChunkIndex::covering(region, self.base.chunk_size)
            .iter()
            .all(|index| state.chunks.contains(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::CelestialSystem;
    use std::time::Duration;

    fn base() -> CelestialBaseInformation {
        CelestialBaseInformation {
            chunk_size: 16,
            planet_orbit_count: 4,
            satellite_orbit_count: 2,
            xy_coord_range: [-1_000, 1_000],
            z_coord_range: [-10, 10],
        }
    }

    fn one_system_chunk(
        location: SystemLocation,
    ) -> (CelestialChunk, BTreeMap<i32, CelestialPlanet>) {
        let system = CelestialCoordinate::system_at(location);
        let planet = system.child(2).unwrap();
        let mut planets = BTreeMap::new();
        planets.insert(
            2,
            CelestialPlanet {
                parameters: CelestialParameters::new(planet, 2, "Vey II", "desert"),
                satellites: BTreeMap::new(),
            },
        );
        let mut chunk = CelestialChunk::new(base().chunk_for(location));
        chunk.systems.insert(
            location,
            CelestialSystem {
                parameters: CelestialParameters::new(system, 1, "Vey", "red"),
                planets: BTreeMap::new(),
            },
        );
        (chunk, planets)
    }

    #[test]
    fn test_miss_is_not_yet_known() {
        let slave = CelestialSlaveDatabase::new(base(), &SlaveConfig::default());
        let system = CelestialCoordinate::system_at(SystemLocation::new(3, 3, 3));
        assert_eq!(slave.parameters(&system).unwrap(), None);
        assert_eq!(slave.children(&system).unwrap(), None);
        assert!(slave.parameters(&CelestialCoordinate::NULL).is_err());
        assert!(!slave.scan_region_fully_loaded(CelestialRegion::new(0, 0, 1, 1)));
    }

    #[test]
    fn test_signal_pull_push_cycle() {
        let slave = CelestialSlaveDatabase::new(base(), &SlaveConfig::default());
        let location = SystemLocation::new(5, 6, 1);
        let (chunk, planets) = one_system_chunk(location);

        slave.signal_system(location);
        let requests = slave.pull_requests();
        assert_eq!(
            requests,
            vec![CelestialRequest::Chunk(chunk.index), CelestialRequest::System(location)]
        );

        slave.signal_system(location);
        assert!(slave.pull_requests().is_empty(), "in-flight requests are not repeated");
        assert_eq!(slave.pending_requests(), 2);

        slave.push_responses(vec![
            CelestialResponse::Chunk(chunk),
            CelestialResponse::System { location, planets: Some(planets) },
        ]);
        assert_eq!(slave.pending_requests(), 0);

        let planet = CelestialCoordinate::system_at(location).child(2).unwrap();
        assert_eq!(slave.name(&planet).unwrap().as_deref(), Some("Vey II"));
        assert_eq!(slave.child_orbits(&planet.system()).unwrap(), Some(vec![2]));
        assert!(slave.parameters(&planet.child(1).unwrap()).is_err());

        slave.signal_system(location);
        assert!(slave.pull_requests().is_empty(), "cached data is not re-requested");
    }

    #[test]
    fn test_timeout_allows_rerequest() {
        let config = SlaveConfig { request_timeout_ms: 0, ..SlaveConfig::default() };
        let slave = CelestialSlaveDatabase::new(base(), &config);
        slave.signal_region(CelestialRegion::new(0, 0, 16, 16));
        assert_eq!(slave.pull_requests().len(), 1);

        slave.signal_region(CelestialRegion::new(0, 0, 16, 16));
        assert_eq!(slave.pull_requests(), vec![CelestialRequest::Chunk(ChunkIndex::new(0, 0))]);
    }

    #[test]
    fn test_invalidate_and_cleanup() {
        let config = SlaveConfig { cache_ttl_ms: 0, cache_jitter_ms: 0, ..SlaveConfig::default() };
        let slave = CelestialSlaveDatabase::new(base(), &config);
        let location = SystemLocation::new(-3, 20, 0);
        let (chunk, planets) = one_system_chunk(location);
        slave.push_responses(vec![
            CelestialResponse::Chunk(chunk),
            CelestialResponse::System { location, planets: Some(planets) },
        ]);
        assert_eq!((slave.cached_chunks(), slave.cached_systems()), (1, 1));

        slave.invalidate_cache_for(&CelestialCoordinate::system_at(location).child(2).unwrap());
        assert_eq!((slave.cached_chunks(), slave.cached_systems()), (1, 0));

        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(slave.cleanup(), 1);
        assert_eq!(slave.cached_chunks(), 0);

        slave.signal_system(location);
        assert_eq!(slave.pull_requests().len(), 2);
    }

    #[test]
    fn test_empty_location_is_asked_once() {
        let slave = CelestialSlaveDatabase::new(base(), &SlaveConfig::default());
        let occupied = SystemLocation::new(5, 6, 1);
        let empty = SystemLocation::new(1, 1, 1);
        let (chunk, _) = one_system_chunk(occupied);

        let mut system_requests = 0;
        for frame in 0..5 {
            slave.signal_system(empty);
            let requests = slave.pull_requests();
            system_requests +=
                requests.iter().filter(|r| matches!(r, CelestialRequest::System(_))).count();
            if frame == 0 {
                slave.push_responses(vec![
                    CelestialResponse::Chunk(chunk.clone()),
                    CelestialResponse::System { location: empty, planets: None },
                ]);
            }
        }
        assert_eq!(system_requests, 1);
        assert_eq!(slave.pending_requests(), 0);
        let coordinate = CelestialCoordinate::system_at(empty);
        assert!(slave.parameters(&coordinate).is_err());
    }

    #[test]
    fn test_chunk_with_planets_is_stripped() {
        let slave = CelestialSlaveDatabase::new(base(), &SlaveConfig::default());
        let location = SystemLocation::new(1, 1, 1);
        let (mut chunk, planets) = one_system_chunk(location);
        chunk.systems.get_mut(&location).unwrap().planets = planets;
        slave.push_responses(vec![CelestialResponse::Chunk(chunk)]);

        let system = CelestialCoordinate::system_at(location);
        assert!(slave.parameters(&system).unwrap().is_some());
        assert_eq!(slave.child_orbits(&system).unwrap(), None);
    }
}
