//! SQLite-backed [`FrameIndex`] implementation.
//!
//! Each record is one row in `frames`. When an embedding provider is
//! configured, the description is embedded on `add` and stored as a BLOB;
//! `query` embeds the query text and ranks every embedded row for the
//! active model by cosine similarity.
//!
//! With embeddings disabled both `add` and `query` fail: a row without a
//! vector could never be ranked. The indexer reports such frames as
//! skipped and the retriever treats the query error like any other
//! unavailable index.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use veloindex_core::models::{FrameRecord, IndexedRecord};
use veloindex_core::store::FrameIndex;

use crate::config::{Config, EmbeddingConfig};
use crate::db;
use crate::embedding::{
    self, blob_to_vec, cosine_similarity, create_provider, vec_to_blob, EmbeddingProvider,
};
use crate::migrate;

const EMBEDDINGS_DISABLED: &str =
    "semantic index requires an embedding provider (embedding.provider is disabled)";

/// SQLite implementation of the [`FrameIndex`] trait.
pub struct SqliteIndex {
    pool: SqlitePool,
    embedding: EmbeddingConfig,
    provider: Box<dyn EmbeddingProvider>,
}

impl SqliteIndex {
    /// # Errors
    ///
    /// Fails when the embedding provider cannot be created (unknown name,
    /// missing model/dims, missing API key).
    pub fn new(pool: SqlitePool, embedding: EmbeddingConfig) -> Result<Self> {
        let provider = create_provider(&embedding)?;
        Ok(Self {
            pool,
            embedding,
            provider,
        })
    }

    /// Connect to `[index].path` and make sure the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;
        Self::new(pool, config.embedding.clone())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of stored records.
    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM frames")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    fn model(&self) -> Option<&str> {
        self.embedding
            .is_enabled()
            .then(|| self.provider.model_name())
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl FrameIndex for SqliteIndex {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn add(&self, record: &FrameRecord) -> Result<()> {
        let Some(model) = self.model() else {
            bail!(EMBEDDINGS_DISABLED);
        };
        let vector = embedding::embed_query(&self.embedding, &record.description).await?;
        if vector.len() != self.provider.dims() {
            bail!(
                "embedding has {} dims, expected {} for model {}",
                vector.len(),
                self.provider.dims(),
                model
            );
        }

        let metadata_json = serde_json::to_string(&record.metadata())?;
        let timestamp = i64::try_from(record.timestamp_seconds).unwrap_or(i64::MAX);

        sqlx::query(
            r#"
            INSERT INTO frames (id, description, timestamp_secs, source_label, video,
                                metadata_json, content_hash, model, dims, embedding, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.description)
        .bind(timestamp)
        .bind(&record.source_label)
        .bind(&record.video)
        .bind(&metadata_json)
        .bind(hash_text(&record.description))
        .bind(model)
        .bind(vector.len() as i64)
        .bind(vec_to_blob(&vector))
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> Result<Vec<IndexedRecord>> {
        let Some(model) = self.model() else {
            bail!(EMBEDDINGS_DISABLED);
        };
        let query_vec = embedding::embed_query(&self.embedding, text).await?;

        let rows = sqlx::query(
            r#"
            SELECT description, metadata_json, embedding
            FROM frames
            WHERE embedding IS NOT NULL AND model = ?
            "#,
        )
        .bind(model)
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(f32, IndexedRecord)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                let metadata_json: String = row.get("metadata_json");
                let metadata = serde_json::from_str(&metadata_json)
                    .unwrap_or(serde_json::Value::Null);
                (similarity, IndexedRecord::new(row.get::<String, _>("description"), metadata))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored.into_iter().map(|(_, record)| record).collect())
    }
}
