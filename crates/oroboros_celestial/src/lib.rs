//! # OROBOROS Celestial Database
//!
//! A procedurally generated catalog of star systems, planets and satellites.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed and tables always produce the same universe
//! 2. **Chunked**: The system plane is generated, cached and stored per chunk
//! 3. **Authoritative master**: Only the master generates and persists
//! 4. **Non-blocking slaves**: Replicas answer from memory or say "not yet"
//!
//! ## Core Components
//!
//! - `CelestialCoordinate`: System / planet / satellite addressing
//! - `GenerationTables`: Immutable generation configuration
//! - `CelestialChunkGenerator`: Pure chunk generation
//! - `CelestialMasterDatabase`: Cache, store, generator
//! - `CelestialSlaveDatabase`: Replica cache with a request ledger
//! - `CelestialRequest` / `CelestialResponse`: Sync messages
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use oroboros_celestial::*;
//!
//! let master = CelestialMasterDatabase::open(
//!     Arc::new(GenerationTables::default()),
//!     UniverseSeed::new(42),
//!     MasterConfig::default(),
//! )?;
//! let slave = CelestialSlaveDatabase::new(master.base_information(), &SlaveConfig::default());
//!
//! slave.signal_region(CelestialRegion::around(0, 0, 100));
//! let requests = slave.pull_requests();
//! slave.push_responses(master.respond_to_requests(&requests)?);
//!
//! let systems = slave.scan_systems(CelestialRegion::around(0, 0, 100), None)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod cache;
pub mod chunk;
pub mod config;
pub mod coordinate;
pub mod database;
pub mod error;
pub mod generator;
pub mod master;
pub mod noise;
pub mod parameters;
pub mod protocol;
pub mod slave;
pub mod store;
pub mod sync;
pub mod tables;

pub use cache::TtlCache;
pub use chunk::{CelestialChunk, CelestialPlanet, CelestialSystem, ChunkIndex, ConstellationLine};
pub use config::{MasterConfig, SlaveConfig};
pub use coordinate::{CelestialCoordinate, CelestialRegion, SystemLocation, COORDINATE_BYTES};
pub use database::CelestialDatabase;
pub use error::{CelestialError, CelestialResult};
pub use generator::CelestialChunkGenerator;
pub use master::{CelestialMasterDatabase, MasterStats};
pub use noise::{NoiseField, UniverseSeed};
pub use parameters::{CelestialParameters, FieldValue, OrbitGeometry, VisitableParameters};
pub use protocol::{CelestialBaseInformation, CelestialRequest, CelestialResponse};
pub use slave::CelestialSlaveDatabase;
pub use store::{ChunkStore, FileChunkStore, MemoryChunkStore, OverlayChunkStore};
pub use sync::{SyncLedger, SyncState};
pub use tables::GenerationTables;
