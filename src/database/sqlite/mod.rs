use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::QaError;
use crate::answer::{DocumentLookup, DocumentRef};


pub mod models;
pub mod queries;

pub use models::*;
pub use queries::*;

pub type DbPool = Pool<Sqlite>;

pub const DATABASE_FILE: &str = "documents.db";

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(config_dir.join(DATABASE_FILE)).await
    }

    #[inline]
    pub async fn insert_document(&self, document: &NewDocument) -> Result<Document> {
        DocumentQueries::create(&self.pool, document.clone()).await
    }

    #[inline]
    pub async fn get_document(&self, id: i64) -> Result<Option<Document>> {
        DocumentQueries::get_by_id(&self.pool, id).await
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        DocumentQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn delete_document(&self, id: i64) -> Result<bool> {
        DocumentQueries::delete(&self.pool, id).await
    }

    #[inline]
    pub async fn delete_all_documents(&self) -> Result<u64> {
        DocumentQueries::delete_all(&self.pool).await
    }

    #[inline]
    pub async fn count_documents(&self) -> Result<i64> {
        DocumentQueries::count(&self.pool).await
    }

    #[inline]
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl DocumentLookup for Database {
    async fn lookup(&self, document_id: i64) -> crate::Result<Option<DocumentRef>> {
        let document = self
            .get_document(document_id)
            .await
            .map_err(|e| QaError::Database(format!("{:#}", e)))?;

        Ok(document.map(|d| DocumentRef {
            id: d.id,
            filename: d.filename,
        }))
    }
}
