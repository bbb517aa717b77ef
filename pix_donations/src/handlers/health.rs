use actix_web::{HttpResponse, Responder, get, web};
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

#[get("/health")]
pub async fn health(app_state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": app_state.environment,
        "database": app_state.db.engine(),
    }))
}
