use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use super::{DonationStore, StoreError, StoreResult, map_insert_error, storage_now};
use crate::helpers::round_currency;
use crate::schema::{Donation, DonationStats, DonationStatus, DonorEntry, NewDonation};

/// File-backed store for development and single-node deployments.
///
/// Amounts are kept as integer cents so that ordering and sums stay exact.
pub struct SqliteDonationStore {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct DonationRow {
    payment_id: String,
    amount_cents: i64,
    donor_name: Option<String>,
    donor_email: Option<String>,
    status: String,
    qr_code: String,
    qr_code_base64: String,
    pix_code: String,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DonationRow> for Donation {
    type Error = StoreError;

    fn try_from(row: DonationRow) -> Result<Self, Self::Error> {
        let status =
            DonationStatus::from_str(&row.status).map_err(|e| StoreError::InvalidRow {
                payment_id: row.payment_id.clone(),
                reason: e.to_string(),
            })?;
        Ok(Donation {
            payment_id: row.payment_id,
            amount: Decimal::new(row.amount_cents, 2),
            donor_name: row.donor_name,
            donor_email: row.donor_email,
            status,
            qr_code: row.qr_code,
            qr_code_base64: row.qr_code_base64,
            pix_code: row.pix_code,
            created_at: row.created_at,
            paid_at: row.paid_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DonorRow {
    donor_name: Option<String>,
    amount_cents: i64,
    paid_at: Option<DateTime<Utc>>,
}

impl From<DonorRow> for DonorEntry {
    fn from(row: DonorRow) -> Self {
        DonorEntry {
            donor_name: row.donor_name,
            amount: Decimal::new(row.amount_cents, 2),
            paid_at: row.paid_at,
        }
    }
}

fn to_cents(payment_id: &str, amount: Decimal) -> StoreResult<i64> {
    round_currency(amount)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.to_i64())
        .ok_or_else(|| StoreError::InvalidRow {
            payment_id: payment_id.to_string(),
            reason: format!("amount {} does not fit in cents", amount),
        })
}

impl SqliteDonationStore {
    /// Opens (and creates if missing) the database file at `path`.
    pub async fn connect(path: &str) -> StoreResult<Self> {
        if let Some(parent) = Path::new(path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(sqlx::Error::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// A private in-memory database; lives as long as the store.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    async fn fetch_entries(&self, sql: &str, limit: i64) -> StoreResult<Vec<DonorEntry>> {
        let rows = sqlx::query_as::<_, DonorRow>(sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(DonorEntry::from).collect())
    }
}

#[async_trait]
impl DonationStore for SqliteDonationStore {
    fn engine(&self) -> &'static str {
        "sqlite"
    }

    async fn init(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations/sqlite").run(&self.pool).await?;
        log::info!("SQLite schema is up to date");
        Ok(())
    }

    async fn insert(&self, donation: &NewDonation) -> StoreResult<Donation> {
        let amount_cents = to_cents(&donation.payment_id, donation.amount)?;
        let now = storage_now();

        sqlx::query(
            r#"
            INSERT INTO donations (
                payment_id, amount_cents, donor_name, donor_email, status,
                qr_code, qr_code_base64, pix_code, created_at, paid_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)
            "#,
        )
        .bind(&donation.payment_id)
        .bind(amount_cents)
        .bind(&donation.donor_name)
        .bind(&donation.donor_email)
        .bind(DonationStatus::Pending.as_str())
        .bind(&donation.qr_code)
        .bind(&donation.qr_code_base64)
        .bind(&donation.pix_code)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, &donation.payment_id))?;

        log::debug!("Saved donation {} to SQLite", donation.payment_id);
        Ok(donation.clone().into_donation(now))
    }

    async fn update_status(
        &self,
        payment_id: &str,
        status: DonationStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        let now = storage_now();
        let result = match status {
            DonationStatus::Paid => {
                let paid_at = paid_at.map(|t| t.trunc_subsecs(6)).unwrap_or(now);
                sqlx::query(
                    r#"
                    UPDATE donations
                    SET status = 'paid', paid_at = MAX(?, created_at), updated_at = ?
                    WHERE payment_id = ? AND status <> 'paid'
                    "#,
                )
                .bind(paid_at)
                .bind(now)
                .bind(payment_id)
                .execute(&self.pool)
                .await?
            }
            DonationStatus::Pending => {
                sqlx::query(
                    r#"
                    UPDATE donations
                    SET status = 'pending', updated_at = ?
                    WHERE payment_id = ? AND status <> 'paid'
                    "#,
                )
                .bind(now)
                .bind(payment_id)
                .execute(&self.pool)
                .await?
            }
        };

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<(String,)> =
            sqlx::query_as("SELECT status FROM donations WHERE payment_id = ?")
                .bind(payment_id)
                .fetch_optional(&self.pool)
                .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(payment_id.to_string())),
        }
    }

    async fn get_by_payment_id(&self, payment_id: &str) -> StoreResult<Option<Donation>> {
        let row = sqlx::query_as::<_, DonationRow>(
            r#"
            SELECT payment_id, amount_cents, donor_name, donor_email, status,
                   qr_code, qr_code_base64, pix_code, created_at, paid_at, updated_at
            FROM donations
            WHERE payment_id = ?
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Donation::try_from).transpose()
    }

    async fn get_ranking(&self, limit: i64) -> StoreResult<Vec<DonorEntry>> {
        self.fetch_entries(
            r#"
            SELECT donor_name, amount_cents, paid_at
            FROM donations
            WHERE status = 'paid'
            ORDER BY amount_cents DESC, paid_at ASC
            LIMIT ?
            "#,
            limit,
        )
        .await
    }

    async fn get_recent(&self, limit: i64) -> StoreResult<Vec<DonorEntry>> {
        self.fetch_entries(
            r#"
            SELECT donor_name, amount_cents, paid_at
            FROM donations
            WHERE status = 'paid'
            ORDER BY paid_at DESC
            LIMIT ?
            "#,
            limit,
        )
        .await
    }

    async fn get_stats(&self) -> StoreResult<DonationStats> {
        let (total_cents, count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount_cents), 0), COUNT(*)
            FROM donations
            WHERE status = 'paid'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DonationStats {
            total_amount: Decimal::new(total_cents, 2),
            count,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        log::info!("SQLite pool closed");
    }
}
