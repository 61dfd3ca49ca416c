//! Persistent embedding cache.
//!
//! Wraps any [`Embedder`] with a SQLite key-value store consulted before the
//! backend is invoked. Keys are derived from the exact text content (plus
//! the embedder id, so switching models never serves stale vectors). Writes
//! use `INSERT OR REPLACE`: concurrent misses for the same key race
//! harmlessly to an idempotent last-writer-wins outcome, since identical
//! text always yields an identical vector.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::embedder::{Embedder, EmbedderError};

/// An [`Embedder`] with a persistent cache in front of it.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    conn: Mutex<Connection>,
}

impl CachedEmbedder {
    /// Open (or create) the cache database at `path`.
    pub fn open(inner: Arc<dyn Embedder>, path: &Path) -> Result<Self, EmbedderError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| EmbedderError::Backend(format!("create cache dir: {e}")))?;
        }
        let conn = Connection::open(path)?;
        Self::from_connection(inner, conn)
    }

    /// In-memory cache, useful for tests and cache-less runs.
    pub fn in_memory(inner: Arc<dyn Embedder>) -> Result<Self, EmbedderError> {
        Self::from_connection(inner, Connection::open_in_memory()?)
    }

    fn from_connection(
        inner: Arc<dyn Embedder>,
        conn: Connection,
    ) -> Result<Self, EmbedderError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS embeddings (
                key TEXT PRIMARY KEY,
                embedder_id TEXT NOT NULL,
                dimension INTEGER NOT NULL,
                vector BLOB NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            inner,
            conn: Mutex::new(conn),
        })
    }

    /// Cache key: SHA-256 over the embedder id and the exact text.
    fn key(&self, text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.inner.id().as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<f32>>, rusqlite::Error> {
        let conn = self.conn.lock();
        let blob: Option<Vec<u8>> = conn
            .query_row(
                "SELECT vector FROM embeddings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.map(|b| decode_vector(&b)))
    }

    fn put(&self, key: &str, vector: &[f32]) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO embeddings (key, embedder_id, dimension, vector)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key,
                self.inner.id(),
                self.inner.dimension() as i64,
                encode_vector(vector)
            ],
        )?;
        Ok(())
    }

    /// Number of cached vectors, for diagnostics.
    pub fn len(&self) -> Result<usize, rusqlite::Error> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, rusqlite::Error> {
        Ok(self.len()? == 0)
    }
}

impl Embedder for CachedEmbedder {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        let key = self.key(text);
        if let Some(vector) = self.get(&key)? {
            if vector.len() == self.inner.dimension() {
                return Ok(vector);
            }
            // Dimension drift means the row predates a config change;
            // recompute and overwrite below.
            debug!(key = %key, "discarding cached vector with stale dimension");
        }
        let vector = self.inner.embed(text)?;
        self.put(&key, &vector)?;
        Ok(vector)
    }
}

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
