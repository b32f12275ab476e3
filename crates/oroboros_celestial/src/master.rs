//! # Master Celestial Database
//!
//! The authoritative catalog. Every lookup resolves a chunk through
//!
//! 1. the TTL chunk cache,
//! 2. the durable chunk store,
//! 3. the generator, writing the result through to store and cache.
//!
//! One mutex guards cache and store together. Generation runs with the lock
//! released; the generator is pure, so two threads racing on the same chunk
//! produce the same bytes. Before a generated chunk is staged the cache and
//! the store are consulted again, so it never replaces a stored override.
//! Overrides resolve, edit, stage and commit inside one critical section.
//!
//! ## Storage faults
//!
//! A failing store call returns its error to the caller and leaves the cache
//! untouched. The store is then wrapped in an [`OverlayChunkStore`]: reads
//! still reach the durable store, writes stay in memory until restart.

use std::collections::BTreeSet;
use std::iter;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::cache::TtlCache;
use crate::chunk::{child_orbits_in, missing, CelestialChunk, ChunkIndex, ConstellationLine};
use crate::config::MasterConfig;
use crate::coordinate::{CelestialCoordinate, CelestialRegion, SystemLocation};
use crate::database::CelestialDatabase;
use crate::error::{CelestialError, CelestialResult};
use crate::generator::CelestialChunkGenerator;
use crate::noise::UniverseSeed;
use crate::parameters::CelestialParameters;
use crate::protocol::{CelestialBaseInformation, CelestialRequest, CelestialResponse};
use crate::store::{ChunkStore, FileChunkStore, MemoryChunkStore, OverlayChunkStore};
use crate::tables::GenerationTables;

/// Sub-seed for the cache jitter stream.
const CACHE_JITTER_STREAM: u64 = 0x4a49_5454;

/// Counters describing master activity since startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MasterStats {
    /// Chunks produced by the generator.
    pub chunks_generated: u64,
    /// Chunks read back from the store.
    pub chunks_loaded: u64,
    /// Lookups served from the cache.
    pub cache_hits: u64,
    /// Lookups that missed the cache.
    pub cache_misses: u64,
    /// Chunks dropped from the cache.
    pub evictions: u64,
    /// Successful store commits.
    pub commits: u64,
    /// Chunks written by those commits.
    pub chunks_committed: u64,
    /// Chunks currently cached.
    pub cached_chunks: usize,
    /// Chunks staged but not yet committed.
    pub pending_writes: usize,
    /// True once a storage fault forced in-memory operation.
    pub degraded: bool,
}

struct MasterState {
    cache: TtlCache<ChunkIndex, Arc<CelestialChunk>>,
    store: Box<dyn ChunkStore>,
    last_commit: Instant,
    stats: MasterStats,
}

impl MasterState {
    fn degrade(&mut self, error: &CelestialError) {
        if self.stats.degraded {
            tracing::error!("In-memory chunk store failed: {}", error);
            return;
        }
        tracing::error!(
            "Chunk store failed, keeping new writes in memory for this session: {}",
            error
        );
        let failed = std::mem::replace(&mut self.store, Box::new(MemoryChunkStore::new()));
        self.store = Box::new(OverlayChunkStore::new(failed));
        self.stats.degraded = true;
    }

    /// Store lookup that fills the cache on a hit.
    fn load_cached(&mut self, index: ChunkIndex) -> CelestialResult<Option<Arc<CelestialChunk>>> {
        let Some(stored) = self.load(index)? else {
            return Ok(None);
        };
        let chunk = Arc::new(stored);
        self.cache.insert(index, Arc::clone(&chunk));
        self.stats.chunks_loaded += 1;
        Ok(Some(chunk))
    }

    /// Cache, then store.
    fn resolve(&mut self, index: ChunkIndex) -> CelestialResult<Option<Arc<CelestialChunk>>> {
        let cached = self.cache.get(&index).cloned();
        if let Some(chunk) = cached {
            self.stats.cache_hits += 1;
            return Ok(Some(chunk));
        }
        self.stats.cache_misses += 1;
        self.load_cached(index)
    }

    /// Stages and caches a freshly generated chunk.
    fn insert_generated(&mut self, chunk: CelestialChunk) -> CelestialResult<Arc<CelestialChunk>> {
        self.save(&chunk)?;
        let chunk = Arc::new(chunk);
        self.cache.insert(chunk.index, Arc::clone(&chunk));
        self.stats.chunks_generated += 1;
        Ok(chunk)
    }

    fn load(&mut self, index: ChunkIndex) -> CelestialResult<Option<CelestialChunk>> {
        self.store.load(index).map_err(|e| {
            self.degrade(&e);
            e
        })
    }

    fn save(&mut self, chunk: &CelestialChunk) -> CelestialResult<()> {
        self.store.save(chunk).map_err(|e| {
            self.degrade(&e);
            e
        })
    }

    fn commit(&mut self) -> CelestialResult<usize> {
        match self.store.commit() {
            Ok(written) => {
                self.last_commit = Instant::now();
                self.stats.commits += 1;
                self.stats.chunks_committed += written as u64;
                Ok(written)
            }
            Err(e) => {
                self.degrade(&e);
                Err(e)
            }
        }
    }
}

/// Authoritative, generating celestial database.
pub struct CelestialMasterDatabase {
    generator: CelestialChunkGenerator,
    config: MasterConfig,
    state: Mutex<MasterState>,
}

impl CelestialMasterDatabase {
    /// Creates a master over an explicit store.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the tables fail validation.
    pub fn new(
        tables: Arc<GenerationTables>,
        seed: UniverseSeed,
        config: MasterConfig,
        store: Box<dyn ChunkStore>,
    ) -> CelestialResult<Self> {
        tables.validate()?;
        tracing::info!(
            "Celestial master ready: seed {:#018x}, chunk size {}, cache TTL {}ms",
            seed.value(),
            tables.chunk_size,
            config.cache_ttl_ms
        );

        let cache = TtlCache::new(
            config.cache_ttl(),
            config.cache_jitter(),
            config.max_cached_chunks,
            seed.derive(CACHE_JITTER_STREAM).value(),
        );

        Ok(Self {
            generator: CelestialChunkGenerator::new(tables, seed),
            config,
            state: Mutex::new(MasterState {
                cache,
                store,
                last_commit: Instant::now(),
                stats: MasterStats::default(),
            }),
        })
    }

    /// Creates a master whose store follows `config.store_dir`: a
    /// [`FileChunkStore`] when set, memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the store directory cannot be opened, or
    /// `InvalidConfig` for bad tables.
    pub fn open(
        tables: Arc<GenerationTables>,
        seed: UniverseSeed,
        config: MasterConfig,
    ) -> CelestialResult<Self> {
        let store: Box<dyn ChunkStore> = match &config.store_dir {
            Some(dir) => Box::new(FileChunkStore::open(dir)?),
            None => Box::new(MemoryChunkStore::new()),
        };
        Self::new(tables, seed, config, store)
    }

    /// Generation tables in use.
    #[must_use]
    pub fn tables(&self) -> &GenerationTables {
        self.generator.tables()
    }

    /// Universe seed.
    #[must_use]
    pub fn seed(&self) -> UniverseSeed {
        self.generator.seed()
    }

    /// Layout handshake for slaves.
    #[must_use]
    pub fn base_information(&self) -> CelestialBaseInformation {
        CelestialBaseInformation::from_tables(self.tables())
    }

    /// Snapshot of the activity counters.
    #[must_use]
    pub fn stats(&self) -> MasterStats {
        let state = self.state.lock();
        MasterStats {
            cached_chunks: state.cache.len(),
            pending_writes: state.store.pending(),
            ..state.stats
        }
    }

    fn chunk_index(&self, location: SystemLocation) -> ChunkIndex {
        ChunkIndex::for_location(location, self.tables().chunk_size)
    }

    /// Resolves a chunk through cache, store and generator.
    ///
    /// # Errors
    ///
    /// Returns the store error if loading or staging fails.
    pub fn chunk(&self, index: ChunkIndex) -> CelestialResult<Arc<CelestialChunk>> {
        if let Some(chunk) = self.state.lock().resolve(index)? {
            return Ok(chunk);
        }

        let generated = self.generator.generate(index);

        let mut state = self.state.lock();
        // Another thread may have generated, overridden or evicted it meanwhile.
        if let Some(raced) = state.cache.peek(&index).cloned() {
            return Ok(raced);
        }
        if let Some(stored) = state.load_cached(index)? {
            return Ok(stored);
        }
        state.insert_generated(generated)
    }

    /// Drops a chunk from the cache. The store keeps it.
    pub fn evict_chunk(&self, index: ChunkIndex) -> bool {
        let mut state = self.state.lock();
        let evicted = state.cache.remove(&index).is_some();
        if evicted {
            state.stats.evictions += 1;
        }
        evicted
    }

    /// Returns true if the body exists.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the chunk cannot be loaded.
    pub fn coordinate_valid(&self, coordinate: &CelestialCoordinate) -> CelestialResult<bool> {
        if coordinate.is_null() {
            return Ok(false);
        }
        let chunk = self.chunk(self.chunk_index(coordinate.location()))?;
        Ok(chunk.parameters(coordinate).is_ok())
    }

    /// Rejection-samples a planet or satellite inside `spatial_range` that
    /// passes `filter`. `Ok(None)` after `tries` misses.
    ///
    /// The same `seed` replays the same sequence of candidates.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a chunk cannot be loaded.
    pub fn find_random_world<F>(
        &self,
        tries: u32,
        spatial_range: CelestialRegion,
        seed: u64,
        filter: F,
    ) -> CelestialResult<Option<CelestialCoordinate>>
    where
        F: Fn(&CelestialParameters) -> bool,
    {
        if spatial_range.is_empty() {
            return Ok(None);
        }
        let chunk_size = self.tables().chunk_size;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        for _ in 0..tries {
            let x = rng.gen_range(spatial_range.min_x..spatial_range.max_x);
            let y = rng.gen_range(spatial_range.min_y..spatial_range.max_y);
            let chunk = self.chunk(ChunkIndex::for_cell(x, y, chunk_size))?;

            let systems: Vec<_> = chunk
                .systems
                .iter()
                .filter(|(loc, _)| spatial_range.contains(loc.x, loc.y))
                .map(|(_, system)| system)
                .collect();
            if systems.is_empty() {
                continue;
            }
            let system = systems[rng.gen_range(0..systems.len())];

            let bodies: Vec<&CelestialParameters> = system
                .planets
                .values()
                .flat_map(|planet| iter::once(&planet.parameters).chain(planet.satellites.values()))
                .collect();
            if bodies.is_empty() {
                continue;
            }
            let body = bodies[rng.gen_range(0..bodies.len())];
            if filter(body) {
                return Ok(Some(body.coordinate));
            }
        }

        tracing::debug!("No world matched after {} tries", tries);
        Ok(None)
    }

    /// Replaces the parameters of one body and commits at once.
    ///
    /// # Errors
    ///
    /// Returns `InvalidCoordinate` if the body does not exist or
    /// `parameters.coordinate` differs from `coordinate`, and the store
    /// error if the commit fails.
    pub fn update_parameters(
        &self,
        coordinate: &CelestialCoordinate,
        parameters: CelestialParameters,
    ) -> CelestialResult<()> {
        if parameters.coordinate != *coordinate {
            return Err(CelestialError::InvalidCoordinate(format!(
                "parameters for {} cannot be stored at {coordinate}",
                parameters.coordinate
            )));
        }
        let index = self.chunk_index(coordinate.location());

        let mut state = self.state.lock();
        let current = match state.resolve(index)? {
            Some(chunk) => chunk,
            None => state.insert_generated(self.generator.generate(index))?,
        };
        let mut chunk = CelestialChunk::clone(&current);
        *chunk.parameters_mut(coordinate)? = parameters;

        state.save(&chunk)?;
        state.commit()?;
        state.cache.insert(index, Arc::new(chunk));
        tracing::info!("Overrode parameters of {}", coordinate);
        Ok(())
    }

    /// Evicts idle chunks, then commits if the commit interval has passed.
    /// Returns the number of evicted chunks.
    ///
    /// # Errors
    ///
    /// Returns the store error if the commit fails.
    pub fn cleanup_and_commit(&self) -> CelestialResult<usize> {
        let mut state = self.state.lock();
        let evicted = state.cache.cleanup();
        if !evicted.is_empty() {
            state.stats.evictions += evicted.len() as u64;
            tracing::debug!("Evicted {} idle celestial chunks", evicted.len());
        }

        if state.last_commit.elapsed() >= self.config.commit_interval() {
            if state.store.pending() > 0 {
                let written = state.commit()?;
                tracing::info!("Committed {} celestial chunks", written);
            } else {
                state.last_commit = Instant::now();
            }
        }
        Ok(evicted.len())
    }

    /// Commits every staged chunk now.
    ///
    /// # Errors
    ///
    /// Returns the store error if the commit fails.
    pub fn commit(&self) -> CelestialResult<usize> {
        self.state.lock().commit()
    }

    /// Answers a batch of slave requests.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a chunk cannot be loaded.
    pub fn respond_to_requests(
        &self,
        requests: &[CelestialRequest],
    ) -> CelestialResult<Vec<CelestialResponse>> {
        requests
            .iter()
            .map(|request| match *request {
                CelestialRequest::Chunk(index) => {
                    Ok(CelestialResponse::Chunk(self.chunk(index)?.without_planets()))
                }
                CelestialRequest::System(location) => {
                    let chunk = self.chunk(self.chunk_index(location))?;
                    Ok(CelestialResponse::System {
                        location,
                        planets: chunk.system(location).map(|system| system.planets.clone()),
                    })
                }
            })
            .collect()
    }
}

impl CelestialDatabase for CelestialMasterDatabase {
    fn parameters(
        &self,
        coordinate: &CelestialCoordinate,
    ) -> CelestialResult<Option<CelestialParameters>> {
        if coordinate.is_null() {
            return Err(missing(coordinate));
        }
        let chunk = self.chunk(self.chunk_index(coordinate.location()))?;
        chunk.parameters(coordinate).map(|p| Some(p.clone()))
    }

    fn child_orbits(&self, coordinate: &CelestialCoordinate) -> CelestialResult<Option<Vec<i32>>> {
        if coordinate.is_null() {
            return Err(missing(coordinate));
        }
        let chunk = self.chunk(self.chunk_index(coordinate.location()))?;
        let system = chunk.system(coordinate.location()).ok_or_else(|| missing(coordinate))?;
        child_orbits_in(&system.parameters, &system.planets, coordinate).map(Some)
    }

    fn scan_systems(
        &self,
        region: CelestialRegion,
        include_types: Option<&BTreeSet<String>>,
    ) -> CelestialResult<Vec<CelestialCoordinate>> {
        let mut found = Vec::new();
        for index in ChunkIndex::covering(region, self.tables().chunk_size) {
            let chunk = self.chunk(index)?;
            found.extend(chunk.systems_in(&region, include_types));
        }
        Ok(found)
    }

    fn scan_constellation_lines(
        &self,
        region: CelestialRegion,
    ) -> CelestialResult<Vec<ConstellationLine>> {
        let mut lines = Vec::new();
        for index in ChunkIndex::covering(region, self.tables().chunk_size) {
            let chunk = self.chunk(index)?;
            lines.extend(chunk.lines_touching(&region));
        }
        Ok(lines)
    }

    fn scan_region_fully_loaded(&self, region: CelestialRegion) -> bool {
        let state = self.state.lock();
        ChunkIndex::covering(region, self.tables().chunk_size)
            .iter()
            .all(|index| state.cache.contains(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn master(seed: u64) -> CelestialMasterDatabase {
        CelestialMasterDatabase::open(
            Arc::new(GenerationTables::default()),
            UniverseSeed::new(seed),
            MasterConfig::default(),
        )
        .unwrap()
    }

    /// A store whose every call fails.
    struct BrokenStore;

    impl ChunkStore for BrokenStore {
        fn load(&mut self, _index: ChunkIndex) -> CelestialResult<Option<CelestialChunk>> {
            Err(CelestialError::Storage("disk unplugged".into()))
        }
        fn save(&mut self, _chunk: &CelestialChunk) -> CelestialResult<()> {
            Err(CelestialError::Storage("disk unplugged".into()))
        }
        fn commit(&mut self) -> CelestialResult<usize> {
            Err(CelestialError::Storage("disk unplugged".into()))
        }
        fn pending(&self) -> usize {
            0
        }
        fn take_staged(&mut self) -> Vec<CelestialChunk> {
            Vec::new()
        }
    }

    /// A memory store that cannot read one chunk.
    struct UnreadableChunkStore {
        inner: MemoryChunkStore,
        unreadable: ChunkIndex,
    }

    impl ChunkStore for UnreadableChunkStore {
        fn load(&mut self, index: ChunkIndex) -> CelestialResult<Option<CelestialChunk>> {
            if index == self.unreadable {
                let reason = "bad sector".to_string();
                return Err(CelestialError::CorruptChunk { x: index.x, y: index.y, reason });
            }
            self.inner.load(index)
        }
        fn save(&mut self, chunk: &CelestialChunk) -> CelestialResult<()> {
            self.inner.save(chunk)
        }
        fn commit(&mut self) -> CelestialResult<usize> {
            self.inner.commit()
        }
        fn pending(&self) -> usize {
            self.inner.pending()
        }
        fn take_staged(&mut self) -> Vec<CelestialChunk> {
            self.inner.take_staged()
        }
    }

    fn bodies_of(chunk: &CelestialChunk) -> Vec<CelestialCoordinate> {
        let mut bodies = Vec::new();
        for system in chunk.systems.values() {
            bodies.push(system.parameters.coordinate);
            for planet in system.planets.values() {
                bodies.push(planet.parameters.coordinate);
                bodies.extend(planet.satellites.values().map(|satellite| satellite.coordinate));
            }
        }
        bodies
    }

    fn rename(db: &CelestialMasterDatabase, body: &CelestialCoordinate, name: &str) {
        let mut params = db.parameters(body).unwrap().unwrap();
        params.name = name.to_string();
        db.update_parameters(body, params).unwrap();
    }

    fn first_planet(db: &CelestialMasterDatabase) -> CelestialCoordinate {
        let systems = db.scan_systems(CelestialRegion::new(0, 0, 256, 256), None).unwrap();
        systems
            .iter()
            .find_map(|system| db.children(system).unwrap().and_then(|c| c.first().copied()))
            .expect("a 4x4 chunk area has at least one planet")
    }

    #[test]
    fn test_lookup_hits_cache_after_generation() {
        let db = master(42);
        let first = db.chunk(ChunkIndex::new(0, 0)).unwrap();
        let second = db.chunk(ChunkIndex::new(0, 0)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = db.stats();
        assert_eq!(stats.chunks_generated, 1);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cached_chunks, 1);
        assert_eq!(stats.pending_writes, 1);
    }

    #[test]
    fn test_evicted_chunk_comes_back_from_store() {
        let db = master(42);
        let index = ChunkIndex::new(1, -1);
        let original = db.chunk(index).unwrap();
        assert!(db.evict_chunk(index));
        let reloaded = db.chunk(index).unwrap();
        assert_eq!(*original, *reloaded);
        assert_eq!(db.stats().chunks_loaded, 1);
        assert_eq!(db.stats().chunks_generated, 1);
    }

    #[test]
    fn test_hierarchy_accessors() {
        let db = master(7);
        let planet = first_planet(&db);
        let system = planet.system();

        assert_eq!(db.has_children(&system).unwrap(), Some(true));
        assert!(db.child_orbits(&system).unwrap().unwrap().contains(&planet.planet_orbit()));
        let name = db.name(&planet).unwrap().unwrap();
        assert!(name.starts_with(&db.name(&system).unwrap().unwrap()));
        assert!(db.coordinate_valid(&planet).unwrap());
        assert!(!db.coordinate_valid(&CelestialCoordinate::NULL).unwrap());
        assert!(db.parameters(&CelestialCoordinate::NULL).is_err());
    }

    #[test]
    fn test_missing_satellite_is_invalid() {
        let db = master(42);
        let planet = first_planet(&db);
        let taken = db.child_orbits(&planet).unwrap().unwrap();
        let orbits = db.tables().satellite_orbit_count;
        let free = (1..=orbits + 1).find(|o| !taken.contains(o)).unwrap();
        let satellite = planet.child(free).unwrap();

        assert!(matches!(db.parameters(&satellite), Err(CelestialError::InvalidCoordinate(_))));
        assert!(!db.coordinate_valid(&satellite).unwrap());
    }

    #[test]
    fn test_scan_type_filter() {
        let db = master(3);
        let region = CelestialRegion::new(-128, -128, 128, 128);
        let all = db.scan_systems(region, None).unwrap();
        assert!(!all.is_empty());
        assert!(db.scan_region_fully_loaded(region));

        let yellow: BTreeSet<String> = ["yellow".to_string()].into_iter().collect();
        let filtered = db.scan_systems(region, Some(&yellow)).unwrap();
        assert!(filtered.len() <= all.len());
        for coordinate in &filtered {
            assert_eq!(db.parameters(coordinate).unwrap().unwrap().body_type, "yellow");
        }
    }

    #[test]
    fn test_find_random_world() {
        let db = master(42);
        let range = CelestialRegion::around(0, 0, 500);
        let found = db.find_random_world(200, range, 1, |p| p.is_visitable()).unwrap().unwrap();
        assert!(db.parameters(&found).unwrap().unwrap().is_visitable());
        assert!(range.contains(found.location().x, found.location().y));

        // Same seed, same answer.
        assert_eq!(db.find_random_world(200, range, 1, |p| p.is_visitable()).unwrap(), Some(found));
        assert_eq!(db.find_random_world(50, range, 1, |_| false).unwrap(), None);
    }

    #[test]
    fn test_update_parameters_rejects_mismatch() {
        let db = master(42);
        let planet = first_planet(&db);
        let mut params = db.parameters(&planet).unwrap().unwrap();
        params.coordinate = planet.system();
        assert!(db.update_parameters(&planet, params).is_err());
    }

    #[test]
    fn test_respond_to_requests() {
        let db = master(42);
        let planet = first_planet(&db);
        let location = planet.location();
        let responses = db
            .respond_to_requests(&[
                CelestialRequest::Chunk(ChunkIndex::for_location(location, 64)),
                CelestialRequest::System(location),
                CelestialRequest::System(SystemLocation::new(0, 0, 0)),
            ])
            .unwrap();

        match &responses[0] {
            CelestialResponse::Chunk(chunk) => {
                assert!(chunk.systems.values().all(|s| s.planets.is_empty()));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &responses[1] {
            CelestialResponse::System { planets: Some(planets), .. } => {
                assert!(planets.contains_key(&planet.planet_orbit()));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(responses[2], CelestialResponse::System { planets: None, .. }));
    }

    #[test]
    fn test_storage_fault_degrades_writes() {
        let db = CelestialMasterDatabase::new(
            Arc::new(GenerationTables::default()),
            UniverseSeed::new(42),
            MasterConfig::default(),
            Box::new(BrokenStore),
        )
        .unwrap();

        let index = ChunkIndex::new(0, 0);
        let err = db.chunk(index).unwrap_err();
        assert!(err.is_storage_fault());
        assert!(db.stats().degraded);
        assert_eq!(db.stats().cached_chunks, 0);

        // An unreadable store is never papered over with fresh chunks.
        assert!(db.chunk(index).unwrap_err().is_storage_fault());
        assert_eq!(db.stats().chunks_generated, 0);
    }

    #[test]
    fn test_storage_fault_keeps_committed_overrides() {
        let unreadable = ChunkIndex::new(9, 9);
        let db = CelestialMasterDatabase::new(
            Arc::new(GenerationTables::default()),
            UniverseSeed::new(42),
            MasterConfig::default(),
            Box::new(UnreadableChunkStore { inner: MemoryChunkStore::new(), unreadable }),
        )
        .unwrap();

        let system = first_planet(&db).system();
        let index = ChunkIndex::for_location(system.location(), db.tables().chunk_size);
        rename(&db, &system, "Haven");
        db.chunk(ChunkIndex::new(5, 5)).unwrap();

        assert!(db.chunk(unreadable).unwrap_err().is_storage_fault());
        assert!(db.stats().degraded);
        // Staged before the fault, carried into the overlay.
        assert_eq!(db.stats().pending_writes, 1);

        assert!(db.evict_chunk(index));
        assert_eq!(db.name(&system).unwrap().as_deref(), Some("Haven"));

        // New overrides still work, in memory.
        rename(&db, &system, "Refuge");
        assert!(db.evict_chunk(index));
        assert_eq!(db.name(&system).unwrap().as_deref(), Some("Refuge"));
    }

    #[test]
    fn test_concurrent_overrides_in_one_chunk() {
        let db = master(42);
        let planet = first_planet(&db);
        let index = ChunkIndex::for_location(planet.location(), db.tables().chunk_size);
        let bodies = bodies_of(&db.chunk(index).unwrap());
        assert!(bodies.len() > 1);

        for round in 0..3 {
            let name = format!("override-{round}");
            std::thread::scope(|scope| {
                for body in &bodies {
                    let (db, name) = (&db, &name);
                    scope.spawn(move || rename(db, body, name));
                }
                // Lookups and evictions racing the overrides.
                let db = &db;
                scope.spawn(move || {
                    for _ in 0..50 {
                        db.evict_chunk(index);
                        db.chunk(index).unwrap();
                    }
                });
            });

            db.evict_chunk(index);
            for body in &bodies {
                assert_eq!(db.name(body).unwrap().as_deref(), Some(name.as_str()), "{body}");
            }
        }
    }

    #[test]
    fn test_cleanup_evicts_with_zero_ttl() {
        let config = MasterConfig {
            cache_ttl_ms: 0,
            cache_jitter_ms: 0,
            commit_interval_ms: 0,
            ..MasterConfig::default()
        };
        let tables = Arc::new(GenerationTables::default());
        let db = CelestialMasterDatabase::open(tables, UniverseSeed::new(1), config).unwrap();
        db.chunk(ChunkIndex::new(0, 0)).unwrap();
        db.chunk(ChunkIndex::new(0, 1)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));

        assert_eq!(db.cleanup_and_commit().unwrap(), 2);
        let stats = db.stats();
        assert_eq!(stats.cached_chunks, 0);
        assert_eq!(stats.pending_writes, 0);
        assert_eq!(stats.chunks_committed, 2);
    }

    #[test]
    fn test_override_survives_ttl_eviction() {
        let config = MasterConfig {
            cache_ttl_ms: 0,
            cache_jitter_ms: 0,
            commit_interval_ms: 0,
            ..MasterConfig::default()
        };
        let tables = Arc::new(GenerationTables::default());
        let db = CelestialMasterDatabase::open(tables, UniverseSeed::new(5), config).unwrap();
        let planet = first_planet(&db);
        rename(&db, &planet, "Landfall");
        std::thread::sleep(std::time::Duration::from_millis(2));

        assert!(db.cleanup_and_commit().unwrap() > 0);
        assert_eq!(db.stats().cached_chunks, 0);
        let loaded = db.stats().chunks_loaded;

        assert_eq!(db.name(&planet).unwrap().as_deref(), Some("Landfall"));
        assert_eq!(db.stats().chunks_loaded, loaded + 1);
    }
}
