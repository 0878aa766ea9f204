//! Database connection management
//!
//! Builds the connection pool and implements [`ChangeStore`] on top of it.

pub mod queries;

use crate::config::DatabaseConfig;
use crate::error::AppError;
use crate::report::Cutoff;
use crate::store::{ChangeStore, ChangedRow};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use queries::{SqlBuilder, COLUMN_EXISTS, LIST_TABLES};
use serde_json::Value;
use tokio_postgres::NoTls;
use tracing::{debug, info};

/// Create a connection pool, with TLS when the configuration asks for it
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool, AppError> {
    let mut cfg = Config::new();
    cfg.host = Some(config.host.clone());
    cfg.port = Some(config.port);
    cfg.user = Some(config.user.clone());
    cfg.password = Some(config.password.clone());
    cfg.dbname = Some(config.database.clone());
    cfg.pool = Some(PoolConfig::new(config.max_pool_size));
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    if config.require_tls {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        cfg.create_pool(Some(Runtime::Tokio1), tls)
            .map_err(|e| AppError::Config(format!("Failed to create TLS pool: {}", e)))
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| AppError::Config(format!("Failed to create pool: {}", e)))
    }
}

/// PostgreSQL-backed change store
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: Pool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    /// Check the pool hands out working connections
    pub async fn verify(&self) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        client.query_one("SELECT 1", &[]).await?;
        info!("Database connection verified (schema: {})", self.schema);
        Ok(())
    }
}

impl ChangeStore for PgStore {
    async fn list_tables(&self) -> Result<Vec<String>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(LIST_TABLES, &[&self.schema]).await?;
        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    async fn column_exists(&self, table: &str, column: &str) -> Result<bool, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(COLUMN_EXISTS, &[&self.schema, &table, &column])
            .await?;
        Ok(row.get("present"))
    }

    async fn rows_changed_since(
        &self,
        table: &str,
        column: &str,
        cutoff: &Cutoff,
    ) -> Result<Vec<ChangedRow>, AppError> {
        let client = self.pool.get().await?;
        let query = SqlBuilder::changed_since(&self.schema, table, column);
        let instant = cutoff.instant();
        debug!("Querying {} for {} > {}", table, column, cutoff);

        let rows = client.query(query.as_str(), &[&instant]).await?;
        Ok(rows
            .iter()
            .map(|row| {
                let record: Value = row.get("record");
                ChangedRow {
                    fields: match record {
                        Value::Object(map) => map,
                        _ => Default::default(),
                    },
                    last_edited: row.get("last_edited"),
                }
            })
            .collect())
    }
}
