use actix_web::{Error, HttpResponse, error::InternalError, get, http::StatusCode, web};
use chrono::{DateTime, Utc};
use common::{ANONYMOUS_SUPPORTER, DonorEntry, format_brl};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<i64>,
}

impl LimitQuery {
    fn or_default(&self, default: i64) -> i64 {
        self.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
struct RankingEntry {
    name: String,
    amount: String,
    position: usize,
}

#[derive(Debug, Serialize)]
struct RecentEntry {
    name: String,
    amount: String,
    position: usize,
    paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    #[serde(with = "rust_decimal::serde::float")]
    total_amount: Decimal,
    total_donations: i64,
    formatted_total: String,
}

fn display_name(entry: &DonorEntry) -> String {
    entry
        .donor_name
        .clone()
        .unwrap_or_else(|| ANONYMOUS_SUPPORTER.to_string())
}

#[get("/ranking")]
pub async fn get_ranking(
    query: web::Query<LimitQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let ranking = app_state
        .db
        .get_ranking(query.or_default(10))
        .await
        .map_err(|e| {
            log::error!("Failed to fetch ranking: {}", e);
            InternalError::new(
                "Failed to get ranking. Please try again later.",
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        })?;

    let entries: Vec<RankingEntry> = ranking
        .iter()
        .enumerate()
        .map(|(index, entry)| RankingEntry {
            name: display_name(entry),
            amount: format_brl(entry.amount),
            position: index + 1,
        })
        .collect();

    Ok(HttpResponse::Ok().json(entries))
}

async fn recent_donations(app_state: &AppState, limit: i64) -> Result<HttpResponse, Error> {
    let recent = app_state.db.get_recent(limit).await.map_err(|e| {
        log::error!("Failed to fetch recent donations: {}", e);
        InternalError::new(
            "Failed to get donations. Please try again later.",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    })?;

    let entries: Vec<RecentEntry> = recent
        .iter()
        .enumerate()
        .map(|(index, entry)| RecentEntry {
            name: display_name(entry),
            amount: format_brl(entry.amount),
            position: index + 1,
            paid_at: entry.paid_at,
        })
        .collect();

    Ok(HttpResponse::Ok().json(entries))
}

#[get("/donations")]
pub async fn get_donations(
    query: web::Query<LimitQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    recent_donations(&app_state, query.or_default(50)).await
}

/// Shorter feed consumed by the livestream overlay.
#[get("/slot-donations")]
pub async fn get_slot_donations(
    query: web::Query<LimitQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    recent_donations(&app_state, query.or_default(20)).await
}

#[get("/stats")]
pub async fn get_stats(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let stats = app_state.db.get_stats().await.map_err(|e| {
        log::error!("Failed to fetch stats: {}", e);
        InternalError::new(
            "Failed to get stats. Please try again later.",
            StatusCode::INTERNAL_SERVER_ERROR,
        )
    })?;

    Ok(HttpResponse::Ok().json(StatsResponse {
        total_amount: stats.total_amount,
        total_donations: stats.count,
        formatted_total: format_brl(stats.total_amount),
    }))
}
