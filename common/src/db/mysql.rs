use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{FromRow, MySqlPool};

use super::{DonationStore, StoreError, StoreResult, map_insert_error, storage_now};
use crate::schema::{Donation, DonationStats, DonationStatus, DonorEntry, NewDonation};

/// Networked store used in production.
pub struct MySqlDonationStore {
    pool: MySqlPool,
}

#[derive(FromRow)]
struct DonationRow {
    payment_id: String,
    amount: Decimal,
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
            amount: row.amount,
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
    amount: Decimal,
    paid_at: Option<DateTime<Utc>>,
}

impl From<DonorRow> for DonorEntry {
    fn from(row: DonorRow) -> Self {
        DonorEntry {
            donor_name: row.donor_name,
            amount: row.amount,
            paid_at: row.paid_at,
        }
    }
}

impl MySqlDonationStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        Self::connect_with(MySqlConnectOptions::from_str(database_url)?).await
    }

    pub async fn connect_with(options: MySqlConnectOptions) -> StoreResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(60))
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
impl DonationStore for MySqlDonationStore {
    fn engine(&self) -> &'static str {
        "mysql"
    }

    async fn init(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations/mysql").run(&self.pool).await?;
        log::info!("MySQL schema is up to date");
        Ok(())
    }

    async fn insert(&self, donation: &NewDonation) -> StoreResult<Donation> {
        let now = storage_now();

        sqlx::query(
            r#"
            INSERT INTO donations (
                payment_id, amount, donor_name, donor_email, status,
                qr_code, qr_code_base64, pix_code, created_at, paid_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?)
            "#,
        )
        .bind(&donation.payment_id)
        .bind(donation.amount)
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

        log::debug!("Saved donation {} to MySQL", donation.payment_id);
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
                    SET status = 'paid', paid_at = GREATEST(?, created_at), updated_at = ?
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
            SELECT payment_id, amount, donor_name, donor_email, status,
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
            SELECT donor_name, amount, paid_at
            FROM donations
            WHERE status = 'paid'
            ORDER BY amount DESC, paid_at ASC
            LIMIT ?
            "#,
            limit,
        )
        .await
    }

    async fn get_recent(&self, limit: i64) -> StoreResult<Vec<DonorEntry>> {
        self.fetch_entries(
            r#"
            SELECT donor_name, amount, paid_at
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
        let (total_amount, count): (Option<Decimal>, i64) = sqlx::query_as(
            r#"
            SELECT SUM(amount), COUNT(*)
            FROM donations
            WHERE status = 'paid'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DonationStats {
            total_amount: total_amount.unwrap_or_default(),
            count,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
        log::info!("MySQL pool closed");
    }
}
