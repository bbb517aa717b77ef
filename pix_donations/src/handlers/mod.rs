mod feeds;
mod health;
mod payments;
mod webhook;

use actix_web::{HttpResponse, error::InternalError, web};
use serde_json::json;

pub use feeds::*;
pub use health::*;
pub use payments::*;
pub use webhook::*;

/// Rejected JSON bodies answer with the same `{"error": ...}` shape as the
/// handlers themselves.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        log::warn!("Rejected request body: {}", err);
        let response = HttpResponse::BadRequest().json(json!({ "error": err.to_string() }));
        InternalError::from_response(err, response).into()
    })
}
