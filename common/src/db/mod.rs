mod mysql;
mod sqlite;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::mysql::MySqlConnectOptions;
use thiserror::Error;

use crate::schema::{Donation, DonationStats, DonationStatus, DonorEntry, NewDonation};

pub use mysql::MySqlDonationStore;
pub use sqlite::SqliteDonationStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Donation with payment id `{0}` already exists")]
    DuplicateKey(String),
    #[error("Donation with payment id `{0}` not found")]
    NotFound(String),
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Invalid donation row for payment id `{payment_id}`: {reason}")]
    InvalidRow { payment_id: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for donations, shared by every storage engine.
///
/// Implementations must make `update_status` a single conditional write so
/// that concurrent transitions on one payment id are safe.
#[async_trait]
pub trait DonationStore: Send + Sync {
    /// Engine name reported by the health endpoint.
    fn engine(&self) -> &'static str;

    /// Creates or upgrades the schema. Must run once before serving.
    async fn init(&self) -> StoreResult<()>;

    async fn insert(&self, donation: &NewDonation) -> StoreResult<Donation>;

    /// Moves a donation to `status`, leaving rows that are already paid
    /// untouched.
    ///
    /// Returns `Ok(true)` when the row changed and `Ok(false)` when it was
    /// already paid. A `Paid` update without `paid_at` is stamped with the
    /// current time.
    async fn update_status(
        &self,
        payment_id: &str,
        status: DonationStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool>;

    async fn get_by_payment_id(&self, payment_id: &str) -> StoreResult<Option<Donation>>;

    /// Paid donations by amount descending, earlier payment first on ties.
    async fn get_ranking(&self, limit: i64) -> StoreResult<Vec<DonorEntry>>;

    /// Paid donations, most recently paid first.
    async fn get_recent(&self, limit: i64) -> StoreResult<Vec<DonorEntry>>;

    async fn get_stats(&self) -> StoreResult<DonationStats>;

    async fn close(&self);
}

/// Which engine to open, decided once at startup.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Sqlite { path: String },
    MySql { options: MySqlConnectOptions },
}

impl StorageConfig {
    /// MySQL is used only in production and only when its connection
    /// variables are present; everything else runs on a local SQLite file.
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let mysql_url = std::env::var("MYSQL_URL").ok();
        let mysql_host = std::env::var("MYSQLHOST").ok();

        if environment == "production" {
            if let Some(url) = mysql_url {
                let options =
                    MySqlConnectOptions::from_str(&url).context("MYSQL_URL is not a valid URL")?;
                return Ok(StorageConfig::MySql { options });
            }
            if let Some(host) = mysql_host {
                let port = match std::env::var("MYSQLPORT") {
                    Ok(port) => port
                        .parse::<u16>()
                        .context("MYSQLPORT must be a valid port number")?,
                    Err(_) => 3306,
                };
                let options = mysql_options(
                    &host,
                    port,
                    &std::env::var("MYSQLUSER").unwrap_or_else(|_| "root".to_string()),
                    &std::env::var("MYSQLPASSWORD").unwrap_or_default(),
                    &std::env::var("MYSQLDATABASE").unwrap_or_else(|_| "donations".to_string()),
                );
                return Ok(StorageConfig::MySql { options });
            }
        }

        let path = std::env::var("SQLITE_PATH").unwrap_or_else(|_| "donations.db".to_string());
        Ok(StorageConfig::Sqlite { path })
    }

    pub fn engine(&self) -> &'static str {
        match self {
            StorageConfig::Sqlite { .. } => "sqlite",
            StorageConfig::MySql { .. } => "mysql",
        }
    }
}

/// Opens the configured store. The caller owns the returned handle and is
/// expected to call `init` before use and `close` at shutdown.
pub async fn connect_store(config: &StorageConfig) -> anyhow::Result<Arc<dyn DonationStore>> {
    let store: Arc<dyn DonationStore> = match config {
        StorageConfig::Sqlite { path } => Arc::new(
            SqliteDonationStore::connect(path)
                .await
                .with_context(|| format!("Failed to open SQLite database `{}`", path))?,
        ),
        StorageConfig::MySql { options } => Arc::new(
            MySqlDonationStore::connect_with(options.clone())
                .await
                .context("Failed to connect to MySQL")?,
        ),
    };
    log::info!("Using {} storage", store.engine());
    Ok(store)
}

/// Discrete MySQL settings. Credentials are passed as-is, so reserved URL
/// characters in a password need no escaping.
fn mysql_options(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    database: &str,
) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(host)
        .port(port)
        .username(user)
        .password(password)
        .database(database)
}

/// Maps unique-constraint violations to `DuplicateKey`.
pub(crate) fn map_insert_error(err: sqlx::Error, payment_id: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::DuplicateKey(payment_id.to_string())
        }
        _ => StoreError::Storage(err),
    }
}

/// Current time at the microsecond precision every engine can store.
pub(crate) fn storage_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
