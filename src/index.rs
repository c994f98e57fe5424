//! Persisted vector index: create, load, and nearest-neighbor query.
//!
//! The index is one logical unit owning both the embedding function and the
//! storage, since every operation needs both. Storage is a single SQLite file
//! inside the configured directory; the directory's contents are opaque to
//! everything outside this module, and vectors never leave it: queries
//! return [`Chunk`]s.
//!
//! [`VectorIndex`] is the factory bound to a location; [`IndexHandle`] is a
//! queryable, already-opened index. Querying without creating or loading
//! first is therefore impossible by construction.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::error::RagError;
use crate::models::{Chunk, Metadata};

const STORE_FILE: &str = "index.sqlite";

/// A vector index bound to a storage location and an embedding provider.
pub struct VectorIndex {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
}

/// An opened index, ready for similarity queries.
pub struct IndexHandle {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    pub fn new(path: impl Into<PathBuf>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            path: path.into(),
            embedder,
        }
    }

    /// The configured storage location.
    pub fn location(&self) -> &Path {
        &self.path
    }

    /// Whether a persisted index exists at the configured location. This is
    /// the sole signal the pipeline uses to decide reuse vs. rebuild.
    pub fn exists(&self) -> bool {
        self.store_file().exists()
    }

    fn store_file(&self) -> PathBuf {
        self.path.join(STORE_FILE)
    }

    /// Embed every chunk and persist a fresh index.
    ///
    /// All embeddings are computed before anything is written, so an
    /// embedding failure leaves no index behind; a failure during writing
    /// removes the partial store file and its WAL sidecars so the location
    /// never holds a queryable half-index.
    pub async fn create(&self, chunks: &[Chunk]) -> Result<IndexHandle, RagError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "provider returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        match self.write_store(chunks, &vectors).await {
            Ok(handle) => Ok(handle),
            Err(e) => {
                let _ = std::fs::remove_file(self.store_file());
                self.remove_sidecar_files();
                Err(e)
            }
        }
    }

    /// Remove the `-wal` and `-shm` files SQLite keeps next to the store
    /// in WAL mode. Best effort; missing files are fine.
    fn remove_sidecar_files(&self) {
        for suffix in ["-wal", "-shm"] {
            let mut name = self.store_file().into_os_string();
            name.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(name));
        }
    }

    /// Open a previously persisted index.
    pub async fn load_existing(&self) -> Result<IndexHandle, RagError> {
        if !self.exists() {
            return Err(RagError::NotFound(format!(
                "no index found at {}",
                self.path.display()
            )));
        }

        let pool = self.connect(false).await?;

        // Sanity-check the store and flag model drift early.
        let stored_model: Option<String> =
            sqlx::query_scalar("SELECT value FROM index_meta WHERE key = 'model'")
                .fetch_optional(&pool)
                .await?;
        if let Some(model) = stored_model {
            if model != self.embedder.model_name() {
                eprintln!(
                    "Warning: index was built with model '{}' but '{}' is configured; \
                     re-ingest with --force to rebuild",
                    model,
                    self.embedder.model_name()
                );
            }
        }

        Ok(IndexHandle {
            pool,
            embedder: Arc::clone(&self.embedder),
        })
    }

    async fn write_store(
        &self,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<IndexHandle, RagError> {
        std::fs::create_dir_all(&self.path).map_err(|e| {
            RagError::Persistence(format!(
                "cannot create index location {}: {}",
                self.path.display(),
                e
            ))
        })?;
        // A fresh create never appends to leftovers, including the WAL
        // sidecars a previous connection may have left behind.
        if self.store_file().exists() {
            std::fs::remove_file(self.store_file())?;
        }
        self.remove_sidecar_files();

        let pool = self.connect(true).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                metadata_json TEXT NOT NULL DEFAULT '{}',
                start_index INTEGER NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS index_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let mut tx = pool.begin().await?;

        for (key, value) in [
            ("model", self.embedder.model_name().to_string()),
            ("dims", self.embedder.dims().to_string()),
            ("created_at", chrono::Utc::now().timestamp().to_string()),
            ("records", chunks.len().to_string()),
        ] {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            let metadata_json = serde_json::to_string(&chunk.metadata)
                .map_err(|e| RagError::Persistence(e.to_string()))?;
            sqlx::query(
                "INSERT INTO records (id, content, metadata_json, start_index, embedding) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&chunk.content)
            .bind(metadata_json)
            .bind(chunk.start_index as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(IndexHandle {
            pool,
            embedder: Arc::clone(&self.embedder),
        })
    }

    async fn connect(&self, create: bool) -> Result<SqlitePool, RagError> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}", self.store_file().display()))?
                .create_if_missing(create)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(pool)
    }
}

impl IndexHandle {
    /// The `k` most similar chunks to `text`, most-similar-first.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<Chunk>, RagError> {
        if k == 0 {
            return Err(RagError::Configuration("k must be >= 1".to_string()));
        }

        let query_vec = self.embedder.embed_one(text).await?;

        let rows =
            sqlx::query("SELECT content, metadata_json, start_index, embedding FROM records")
                .fetch_all(&self.pool)
                .await?;

        let mut scored: Vec<(f32, Chunk)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                let metadata_json: String = row.get("metadata_json");
                let metadata: Metadata =
                    serde_json::from_str(&metadata_json).unwrap_or_default();
                let start_index: i64 = row.get("start_index");
                (
                    similarity,
                    Chunk {
                        content: row.get("content"),
                        start_index: start_index as usize,
                        metadata,
                    },
                )
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, chunk)| chunk).collect())
    }

    /// Number of records in the store.
    pub async fn record_count(&self) -> Result<u64, RagError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use tempfile::TempDir;

    fn chunk(content: &str, start: usize) -> Chunk {
        Chunk {
            content: content.to_string(),
            start_index: start,
            metadata: Metadata::new(),
        }
    }

    fn index_at(dir: &Path) -> VectorIndex {
        VectorIndex::new(dir.join("index"), Arc::new(HashEmbedder::new(32)))
    }

    #[tokio::test]
    async fn create_then_query_returns_most_similar_first() {
        let tmp = TempDir::new().unwrap();
        let index = index_at(tmp.path());

        let chunks = vec![
            chunk("the quick brown fox", 0),
            chunk("a slow green turtle", 20),
            chunk("an unrelated sentence", 40),
        ];
        let handle = index.create(&chunks).await.unwrap();

        // The exact text of a stored chunk is its own nearest neighbor
        // under the deterministic embedder.
        let results = handle.query("the quick brown fox", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "the quick brown fox");
    }

    #[tokio::test]
    async fn load_existing_without_store_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let index = index_at(tmp.path());
        assert!(!index.exists());
        let err = index.load_existing().await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[tokio::test]
    async fn created_index_is_reloadable() {
        let tmp = TempDir::new().unwrap();
        let index = index_at(tmp.path());
        index.create(&[chunk("persisted text", 0)]).await.unwrap();
        assert!(index.exists());

        let handle = index.load_existing().await.unwrap();
        assert_eq!(handle.record_count().await.unwrap(), 1);
        let results = handle.query("persisted text", 1).await.unwrap();
        assert_eq!(results[0].content, "persisted text");
        assert_eq!(results[0].start_index, 0);
    }

    #[tokio::test]
    async fn query_with_zero_k_is_a_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let index = index_at(tmp.path());
        let handle = index.create(&[chunk("text", 0)]).await.unwrap();
        let err = handle.query("text", 0).await.unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[tokio::test]
    async fn create_clears_stale_store_and_sidecar_files() {
        let tmp = TempDir::new().unwrap();
        let location = tmp.path().join("index");
        std::fs::create_dir_all(&location).unwrap();
        // Leftovers from an earlier, interrupted run.
        std::fs::write(location.join("index.sqlite"), "garbage").unwrap();
        std::fs::write(location.join("index.sqlite-wal"), "stale wal").unwrap();
        std::fs::write(location.join("index.sqlite-shm"), "stale shm").unwrap();

        let index = VectorIndex::new(location, Arc::new(HashEmbedder::new(32)));
        let handle = index.create(&[chunk("fresh record", 0)]).await.unwrap();
        assert_eq!(handle.record_count().await.unwrap(), 1);
        let results = handle.query("fresh record", 1).await.unwrap();
        assert_eq!(results[0].content, "fresh record");
    }

    #[tokio::test]
    async fn failed_create_leaves_no_store_behind() {
        let tmp = TempDir::new().unwrap();
        // The location path is occupied by a plain file, so the store
        // directory cannot be created.
        let location = tmp.path().join("index");
        std::fs::write(&location, "occupied").unwrap();

        let index = VectorIndex::new(location, Arc::new(HashEmbedder::new(32)));
        let err = index.create(&[chunk("text", 0)]).await.unwrap_err();
        assert!(matches!(err, RagError::Persistence(_)));
        assert!(!index.exists());
    }

    #[tokio::test]
    async fn metadata_survives_the_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let index = index_at(tmp.path());

        let mut metadata = Metadata::new();
        metadata.insert("source".into(), serde_json::Value::from("doc.txt"));
        metadata.insert("page".into(), serde_json::Value::from(7));
        let chunks = vec![Chunk {
            content: "metadata bearer".to_string(),
            start_index: 12,
            metadata,
        }];

        let handle = index.create(&chunks).await.unwrap();
        let results = handle.query("metadata bearer", 1).await.unwrap();
        assert_eq!(results[0].metadata["source"], "doc.txt");
        assert_eq!(results[0].metadata["page"], 7);
        assert_eq!(results[0].start_index, 12);
    }
}
