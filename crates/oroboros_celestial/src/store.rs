//! # Chunk Store
//!
//! Durable storage for generated (and overridden) chunks.
//!
//! Writes are staged by `save` and made durable by `commit`. A staged chunk
//! is visible to `load` immediately, so callers never observe a chunk
//! going backwards between save and commit.
//!
//! ## File Format
//!
//! One file per chunk, `chunk_<x>_<y>.bin`:
//!
//! ```text
//! ┌───────┬─────────┬─────────┬──────────────────────────────┐
//! │ OCCH  │ version │ crc32   │ lz4(bincode(CelestialChunk)) │
//! │ 4 B   │ u32 LE  │ u32 LE  │ size-prepended               │
//! └───────┴─────────┴─────────┴──────────────────────────────┘
//! ```
//!
//! Commit writes `chunk_<x>_<y>.tmp`, syncs it, then renames it over the
//! final name. A crash leaves either the old file or the new one, never a
//! torn write. Orphaned `.tmp` files are removed on open.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::chunk::{CelestialChunk, ChunkIndex};
use crate::error::{CelestialError, CelestialResult};

/// Magic bytes at the start of every chunk file.
const CHUNK_MAGIC: &[u8; 4] = b"OCCH";

/// Current chunk file version.
const CHUNK_VERSION: u32 = 1;

/// Header size: magic + version + crc.
const HEADER_LEN: usize = 12;

/// Durable chunk storage with staged writes.
pub trait ChunkStore: Send {
    /// Loads a chunk, staged or committed. `Ok(None)` if never saved.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on I/O failure and `CorruptChunk` on a bad file.
    fn load(&mut self, index: ChunkIndex) -> CelestialResult<Option<CelestialChunk>>;

    /// Stages a chunk for the next commit.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the chunk cannot be staged.
    fn save(&mut self, chunk: &CelestialChunk) -> CelestialResult<()>;

    /// Makes every staged chunk durable. Returns how many were written.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on the first failed write; chunks not yet written
    /// stay staged.
    fn commit(&mut self) -> CelestialResult<usize>;

    /// Number of staged, uncommitted chunks.
    fn pending(&self) -> usize;

    /// Removes and returns every staged, uncommitted chunk.
    fn take_staged(&mut self) -> Vec<CelestialChunk>;
}

/// Encodes a chunk into the on-disk format.
///
/// # Errors
///
/// Returns `Storage` if serialization fails.
pub fn encode_chunk(chunk: &CelestialChunk) -> CelestialResult<Vec<u8>> {
    let payload = bincode::serialize(chunk)
        .map_err(|e| CelestialError::Storage(format!("cannot serialize chunk: {e}")))?;
    let compressed = compress_prepend_size(&payload);

    let mut bytes = Vec::with_capacity(HEADER_LEN + compressed.len());
    bytes.extend_from_slice(CHUNK_MAGIC);
    bytes.extend_from_slice(&CHUNK_VERSION.to_le_bytes());
    bytes.extend_from_slice(&crc32fast::hash(&compressed).to_le_bytes());
    bytes.extend_from_slice(&compressed);
    Ok(bytes)
}

/// Decodes the on-disk format, checking it belongs to `index`.
///
/// # Errors
///
/// Returns `CorruptChunk` on any header, checksum or payload mismatch.
pub fn decode_chunk(index: ChunkIndex, bytes: &[u8]) -> CelestialResult<CelestialChunk> {
    let corrupt = |reason: String| CelestialError::CorruptChunk { x: index.x, y: index.y, reason };

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("truncated header ({} bytes)", bytes.len())));
    }
    if &bytes[0..4] != CHUNK_MAGIC {
        return Err(corrupt("bad magic".into()));
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != CHUNK_VERSION {
        return Err(corrupt(format!("unsupported version {version}")));
    }
    let stored_crc = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let compressed = &bytes[HEADER_LEN..];
    let computed_crc = crc32fast::hash(compressed);
    if stored_crc != computed_crc {
        return Err(corrupt(format!(
            "CRC mismatch: stored {stored_crc:08x}, computed {computed_crc:08x}"
        )));
    }

    let payload = decompress_size_prepended(compressed).map_err(|e| corrupt(format!("lz4: {e}")))?;
    let chunk: CelestialChunk =
        bincode::deserialize(&payload).map_err(|e| corrupt(format!("bincode: {e}")))?;
    if chunk.index != index {
        return Err(corrupt(format!("file holds chunk ({}, {})", chunk.index.x, chunk.index.y)));
    }
    Ok(chunk)
}

/// One-file-per-chunk store in a directory.
pub struct FileChunkStore {
    dir: PathBuf,
    staged: BTreeMap<ChunkIndex, CelestialChunk>,
}

impl FileChunkStore {
    /// Opens (creating if needed) a store directory and removes orphaned
    /// temporary files.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the directory cannot be created or listed.
    pub fn open(dir: impl AsRef<Path>) -> CelestialResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| CelestialError::Storage(format!("cannot create {}: {e}", dir.display())))?;

        let entries = fs::read_dir(&dir)
            .map_err(|e| CelestialError::Storage(format!("cannot list {}: {e}", dir.display())))?;
        let mut removed = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "tmp") {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!("Could not remove stale {}: {}", path.display(), e),
                }
            }
        }
        if removed > 0 {
            tracing::info!("Removed {} interrupted chunk writes from {}", removed, dir.display());
        }

        Ok(Self { dir, staged: BTreeMap::new() })
    }

    /// Directory this store writes into.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the committed file for a chunk.
    #[must_use]
    pub fn chunk_path(&self, index: ChunkIndex) -> PathBuf {
        self.dir.join(format!("chunk_{}_{}.bin", index.x, index.y))
    }

    fn write_atomic(&self, chunk: &CelestialChunk) -> CelestialResult<()> {
        let bytes = encode_chunk(chunk)?;
        let final_path = self.chunk_path(chunk.index);
        let tmp_path = final_path.with_extension("tmp");
        let fail = |what: &str, e: std::io::Error| {
            CelestialError::Storage(format!("{what} {}: {e}", tmp_path.display()))
        };

        let mut file = File::create(&tmp_path).map_err(|e| fail("cannot create", e))?;
        file.write_all(&bytes).map_err(|e| fail("cannot write", e))?;
        file.sync_all().map_err(|e| fail("cannot sync", e))?;
        drop(file);

        fs::rename(&tmp_path, &final_path).map_err(|e| fail("cannot rename", e))
    }
}

impl ChunkStore for FileChunkStore {
    fn load(&mut self, index: ChunkIndex) -> CelestialResult<Option<CelestialChunk>> {
        if let Some(chunk) = self.staged.get(&index) {
            return Ok(Some(chunk.clone()));
        }
        let path = self.chunk_path(index);
        match fs::read(&path) {
            Ok(bytes) => decode_chunk(index, &bytes).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CelestialError::Storage(format!("cannot read {}: {e}", path.display()))),
        }
    }

    fn save(&mut self, chunk: &CelestialChunk) -> CelestialResult<()> {
        self.staged.insert(chunk.index, chunk.clone());
        Ok(())
    }

    fn commit(&mut self) -> CelestialResult<usize> {
        let mut written = 0;
        while let Some((index, chunk)) = self.staged.pop_first() {
            if let Err(e) = self.write_atomic(&chunk) {
                self.staged.insert(index, chunk);
                return Err(e);
            }
            written += 1;
        }
        if written > 0 {
            tracing::debug!("Committed {} chunks to {}", written, self.dir.display());
        }
        Ok(written)
    }

    fn pending(&self) -> usize {
        self.staged.len()
    }

    fn take_staged(&mut self) -> Vec<CelestialChunk> {
        std::mem::take(&mut self.staged).into_values().collect()
    }
}

/// In-process store; used when no directory is configured and in tests.
///
/// Committed chunks are kept in encoded form so they go through the same
/// codec as the file store.
#[derive(Default)]
pub struct MemoryChunkStore {
    committed: BTreeMap<ChunkIndex, Vec<u8>>,
    staged: BTreeMap<ChunkIndex, CelestialChunk>,
}

impl MemoryChunkStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed chunks.
    #[must_use]
    pub fn committed(&self) -> usize {
        self.committed.len()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn load(&mut self, index: ChunkIndex) -> CelestialResult<Option<CelestialChunk>> {
        if let Some(chunk) = self.staged.get(&index) {
            return Ok(Some(chunk.clone()));
        }
        self.committed
            .get(&index)
            .map(|bytes| decode_chunk(index, bytes))
            .transpose()
    }

    fn save(&mut self, chunk: &CelestialChunk) -> CelestialResult<()> {
        self.staged.insert(chunk.index, chunk.clone());
        Ok(())
    }

    fn commit(&mut self) -> CelestialResult<usize> {
        let staged = std::mem::take(&mut self.staged);
        let written = staged.len();
        for (index, chunk) in staged {
            self.committed.insert(index, encode_chunk(&chunk)?);
        }
        Ok(written)
    }

    fn pending(&self) -> usize {
        self.staged.len()
    }

    fn take_staged(&mut self) -> Vec<CelestialChunk> {
        std::mem::take(&mut self.staged).into_values().collect()
    }
}

/// Write-isolating wrapper used after a storage fault.
///
/// Writes stay in memory; reads fall through to the wrapped store, so
/// chunks committed before the fault remain visible.
pub struct OverlayChunkStore {
    overlay: MemoryChunkStore,
    fallback: Box<dyn ChunkStore>,
}

impl OverlayChunkStore {
    /// Wraps `fallback`, moving its staged chunks into the overlay.
    #[must_use]
    pub fn new(mut fallback: Box<dyn ChunkStore>) -> Self {
        let mut overlay = MemoryChunkStore::new();
        for chunk in fallback.take_staged() {
            overlay.staged.insert(chunk.index, chunk);
        }
        Self { overlay, fallback }
    }
}

impl ChunkStore for OverlayChunkStore {
    fn load(&mut self, index: ChunkIndex) -> CelestialResult<Option<CelestialChunk>> {
        match self.overlay.load(index)? {
            Some(chunk) => Ok(Some(chunk)),
            None => self.fallback.load(index),
        }
    }

    fn save(&mut self, chunk: &CelestialChunk) -> CelestialResult<()> {
        self.overlay.save(chunk)
    }

    fn commit(&mut self) -> CelestialResult<usize> {
        self.overlay.commit()
    }

    fn pending(&self) -> usize {
        self.overlay.pending()
    }

    fn take_staged(&mut self) -> Vec<CelestialChunk> {
        self.overlay.take_staged()
    }
}
