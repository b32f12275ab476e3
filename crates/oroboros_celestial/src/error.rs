//! # Celestial Error Types
//!
//! Only conditions the caller must react to are errors. "Not loaded yet" and
//! "nothing found" are ordinary `None` results and never show up here.

use thiserror::Error;

/// Errors that can occur in the celestial database.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CelestialError {
    /// Hierarchy navigation or lookup on a coordinate that cannot exist.
    #[error("invalid celestial coordinate: {0}")]
    InvalidCoordinate(String),

    /// A coordinate id string or byte encoding could not be parsed.
    #[error("cannot parse celestial coordinate {input:?}: {reason}")]
    ParseCoordinate {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Generation tables or runtime configuration are unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The durable chunk store failed to read or write.
    #[error("chunk store failure: {0}")]
    Storage(String),

    /// A stored chunk failed its integrity check.
    #[error("corrupt chunk ({x}, {y}): {reason}")]
    CorruptChunk {
        /// Chunk X index.
        x: i32,
        /// Chunk Y index.
        y: i32,
        /// What was wrong with it.
        reason: String,
    },

    /// A network message could not be encoded or decoded.
    #[error("celestial message codec error: {0}")]
    Codec(String),
}

impl CelestialError {
    /// Returns true for faults of the durable store.
    #[must_use]
    pub const fn is_storage_fault(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::CorruptChunk { .. })
    }
}

/// Result type for celestial operations.
pub type CelestialResult<T> = Result<T, CelestialError>;
