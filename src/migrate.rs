use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the index schema on a fresh connection (`velo init`).
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation on an existing pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // One row per described frame. `embedding` is NULL when the record was
    // added with embeddings disabled; such rows are never ranked.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS frames (
            id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            timestamp_secs INTEGER NOT NULL,
            source_label TEXT NOT NULL,
            video TEXT,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            content_hash TEXT NOT NULL,
            model TEXT,
            dims INTEGER,
            embedding BLOB,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_frames_video ON frames(video)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_frames_model ON frames(model)")
        .execute(pool)
        .await?;

    Ok(())
}
