//! Application state for the PDF signing API

use crate::config::Config;
use crate::store::SqliteStore;
use anyhow::Result;
use pdfsign_core::{DocumentStore, HttpFetcher, SigningPipeline};
use sigmatte_core::MatteWorker;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub pipeline: SigningPipeline,
    pub matte: MatteWorker,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self> {
        tracing::info!("Connecting to database: {}", config.database_url);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;

        Self::with_pool(config, pool).await
    }

    /// Build state on an existing pool, running migrations first
    pub async fn with_pool(config: Config, pool: SqlitePool) -> Result<Self> {
        run_migrations(&pool).await?;

        let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::new(pool));
        let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout)?);
        let pipeline = SigningPipeline::new(Arc::clone(&store), fetcher);
        let matte = MatteWorker::spawn(config.matte_queue_depth)?;

        Ok(Self {
            config,
            store,
            pipeline,
            matte,
        })
    }

    /// Public URL for a file stored under the upload root
    pub fn public_url(&self, storage_path: &str) -> String {
        let root = self.config.upload_root.to_string_lossy();
        let relative = storage_path
            .strip_prefix(root.as_ref())
            .unwrap_or(storage_path)
            .replace('\\', "/");
        format!(
            "{}/{}",
            self.config.public_upload_prefix.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            original_file_name TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            original_hash TEXT NOT NULL,
            page_count INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'uploaded',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pdf_audits (
            id TEXT PRIMARY KEY,
            pdf_id TEXT NOT NULL REFERENCES documents(id),
            user_id TEXT NOT NULL,
            original_hash TEXT NOT NULL,
            signed_hash TEXT NOT NULL,
            fields_meta TEXT NOT NULL,
            signed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Index for fast lookups
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_pdf_audits_pdf_id ON pdf_audits(pdf_id)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Migrations complete");
    Ok(())
}
