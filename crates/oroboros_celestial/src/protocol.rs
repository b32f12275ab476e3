//! # Sync Protocol Messages
//!
//! Payloads exchanged between a master and its slaves. Framing, routing and
//! retransmission belong to the host transport; this module only turns
//! messages into opaque bytes and back.
//!
//! ```text
//!   Slave                                     Master
//!     │  CelestialRequest::Chunk(index)          │
//!     │ ───────────────────────────────────────► │
//!     │  CelestialResponse::Chunk(no planets)    │
//!     │ ◄─────────────────────────────────────── │
//!     │  CelestialRequest::System(location)      │
//!     │ ───────────────────────────────────────► │
//!     │  CelestialResponse::System { planets }   │
//!     │ ◄─────────────────────────────────────── │
//! ```
//!
//! There is no negative acknowledgement. A lost request simply times out on
//! the slave and becomes eligible for re-request.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::chunk::{CelestialChunk, CelestialPlanet, ChunkIndex};
use crate::coordinate::SystemLocation;
use crate::error::{CelestialError, CelestialResult};
use crate::tables::GenerationTables;

fn encode<T: Serialize>(message: &T) -> CelestialResult<Vec<u8>> {
    bincode::serialize(message).map_err(|e| CelestialError::Codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CelestialResult<T> {
    bincode::deserialize(bytes).map_err(|e| CelestialError::Codec(e.to_string()))
}

/// A slave asking for data it does not hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CelestialRequest {
    /// System centers and constellations of one chunk.
    Chunk(ChunkIndex),
    /// Planet and satellite tree of one system.
    System(SystemLocation),
}

impl CelestialRequest {
    /// Encodes the request.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if serialization fails.
    pub fn encode(&self) -> CelestialResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes a request.
    ///
    /// # Errors
    ///
    /// Returns `Codec` on malformed bytes.
    pub fn decode(bytes: &[u8]) -> CelestialResult<Self> {
        decode(bytes)
    }

    /// Encodes a batch of requests as one message.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if serialization fails.
    pub fn encode_batch(requests: &[Self]) -> CelestialResult<Vec<u8>> {
        encode(&requests)
    }

    /// Decodes a batch produced by [`Self::encode_batch`].
    ///
    /// # Errors
    ///
    /// Returns `Codec` on malformed bytes.
    pub fn decode_batch(bytes: &[u8]) -> CelestialResult<Vec<Self>> {
        decode(bytes)
    }
}

/// The master answering a request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CelestialResponse {
    /// A chunk with every planet tree stripped.
    Chunk(CelestialChunk),
    /// Planets of one system; `None` when no system exists there.
    System {
        /// The system asked about.
        location: SystemLocation,
        /// Its planets and satellites.
        planets: Option<BTreeMap<i32, CelestialPlanet>>,
    },
}

impl CelestialResponse {
    /// The request this response answers.
    #[must_use]
    pub fn answers(&self) -> CelestialRequest {
        match self {
            Self::Chunk(chunk) => CelestialRequest::Chunk(chunk.index),
            Self::System { location, .. } => CelestialRequest::System(*location),
        }
    }

    /// Encodes the response.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if serialization fails.
    pub fn encode(&self) -> CelestialResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes a response.
    ///
    /// # Errors
    ///
    /// Returns `Codec` on malformed bytes.
    pub fn decode(bytes: &[u8]) -> CelestialResult<Self> {
        decode(bytes)
    }

    /// Encodes a batch of responses as one message.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if serialization fails.
    pub fn encode_batch(responses: &[Self]) -> CelestialResult<Vec<u8>> {
        encode(&responses)
    }

    /// Decodes a batch produced by [`Self::encode_batch`].
    ///
    /// # Errors
    ///
    /// Returns `Codec` on malformed bytes.
    pub fn decode_batch(bytes: &[u8]) -> CelestialResult<Vec<Self>> {
        decode(bytes)
    }
}

/// Layout facts a slave needs before it can ask for anything.
///
/// Sent once when a slave connects, so clients never need the generation
/// tables themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CelestialBaseInformation {
    /// Cells per chunk side.
    pub chunk_size: i32,
    /// Planet orbit slots per system.
    pub planet_orbit_count: i32,
    /// Satellite orbit slots per planet.
    pub satellite_orbit_count: i32,
    /// Inclusive system X/Y range.
    pub xy_coord_range: [i32; 2],
    /// Inclusive system Z range.
    pub z_coord_range: [i32; 2],
}

impl CelestialBaseInformation {
    /// Extracts the layout from generation tables.
    #[must_use]
    pub fn from_tables(tables: &GenerationTables) -> Self {
        Self {
            chunk_size: tables.chunk_size,
            planet_orbit_count: tables.planet_orbit_count,
            satellite_orbit_count: tables.satellite_orbit_count,
            xy_coord_range: tables.xy_coord_range,
            z_coord_range: tables.z_coord_range,
        }
    }

    /// Chunk holding a system.
    #[inline]
    #[must_use]
    pub const fn chunk_for(&self, location: SystemLocation) -> ChunkIndex {
        ChunkIndex::for_location(location, self.chunk_size)
    }

    /// Encodes the handshake.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if serialization fails.
    pub fn encode(&self) -> CelestialResult<Vec<u8>> {
        encode(self)
    }

    /// Decodes the handshake and checks it is usable.
    ///
    /// # Errors
    ///
    /// Returns `Codec` on malformed bytes or a non-positive chunk size.
    pub fn decode(bytes: &[u8]) -> CelestialResult<Self> {
        let info: Self = decode(bytes)?;
        if info.chunk_size <= 0 {
            return Err(CelestialError::Codec(format!(
                "chunk size {} in base information",
                info.chunk_size
            )));
        }
        Ok(info)
    }
}
