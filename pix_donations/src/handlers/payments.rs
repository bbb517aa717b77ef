use actix_web::{Error, HttpResponse, get, post, web};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::payments::{self, CreatePaymentInput, PaymentError, SimulationOutcome};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct CreatePaymentResponse {
    success: bool,
    payment_id: String,
    qr_code: String,
    qr_code_base64: String,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    status: String,
    is_test: bool,
    is_demo: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct PaymentStatusResponse {
    status: String,
    payment_id: String,
    is_demo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[post("/create-pix-payment")]
pub async fn create_pix_payment(
    input: web::Json<CreatePaymentInput>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    match payments::create_payment(&app_state, input.into_inner()).await {
        Ok(created) => Ok(HttpResponse::Ok().json(CreatePaymentResponse {
            success: true,
            payment_id: created.payment_id,
            qr_code: created.qr_code,
            qr_code_base64: created.qr_code_base64,
            amount: created.amount,
            status: created.status,
            is_test: created.is_test,
            is_demo: created.used_fallback,
            message: created.message,
        })),
        Err(PaymentError::InvalidAmount) => Ok(HttpResponse::BadRequest()
            .json(json!({ "error": PaymentError::InvalidAmount.to_string() }))),
        Err(e) => {
            log::error!("Failed to create PIX payment: {}", e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "success": false,
                "error": "Internal server error",
            })))
        }
    }
}

#[get("/payment-status/{payment_id}")]
pub async fn payment_status(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let payment_id = path.into_inner();

    match payments::resolve_status(&app_state, &payment_id).await {
        Ok(resolution) => Ok(HttpResponse::Ok().json(PaymentStatusResponse {
            status: resolution.status,
            payment_id,
            is_demo: resolution.is_demo,
            error: resolution.verification_error,
        })),
        Err(e) => {
            log::error!("Failed to resolve status of payment {}: {}", payment_id, e);
            Ok(HttpResponse::InternalServerError().json(json!({
                "error": "Failed to check payment status",
                "payment_id": payment_id,
            })))
        }
    }
}

#[post("/simulate-payment/{payment_id}")]
pub async fn simulate_payment(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let payment_id = path.into_inner();

    match payments::simulate_approval(&app_state, &payment_id).await {
        Ok(SimulationOutcome::Approved { paid_at }) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Payment approved by simulation",
            "payment_id": payment_id,
            "timestamp": paid_at.to_rfc3339(),
        }))),
        Ok(SimulationOutcome::AlreadyPaid) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Payment was already approved",
            "payment_id": payment_id,
        }))),
        Err(PaymentError::NotFound(_)) => {
            log::warn!("Simulation requested for unknown payment {}", payment_id);
            Ok(HttpResponse::NotFound().json(json!({ "error": "Payment not found" })))
        }
        Err(e) => {
            log::error!("Failed to simulate payment {}: {}", payment_id, e);
            Ok(HttpResponse::InternalServerError()
                .json(json!({ "error": "Failed to simulate payment" })))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::json_config;
    use crate::test_support::{idle_gateway, provider_payment, state_with};
    use actix_web::{App, http::StatusCode, test};
    use common::ProviderError;

    #[actix_web::test]
    async fn create_returns_demo_payment_when_provider_fails() {
        let mut gateway = idle_gateway();
        gateway
            .expect_create_pix_payment()
            .returning(|_| Err(ProviderError::NotConfigured));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(gateway).await))
                .app_data(json_config())
                .service(create_pix_payment),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/create-pix-payment")
            .set_json(json!({ "amount": "35.5", "donorName": "Ana" }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["success"], true);
        assert_eq!(body["is_demo"], true);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["amount"], 35.5);
        assert!(body["payment_id"].as_str().unwrap().starts_with("DEMO_"));
    }

    #[actix_web::test]
    async fn create_rejects_invalid_amounts() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(idle_gateway()).await))
                .app_data(json_config())
                .service(create_pix_payment),
        )
        .await;

        for body in [json!({ "amount": 0 }), json!({ "amount": -3 }), json!({})] {
            let req = test::TestRequest::post()
                .uri("/create-pix-payment")
                .set_json(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert!(body["error"].is_string());
        }

        let req = test::TestRequest::post()
            .uri("/create-pix-payment")
            .set_json(json!({ "amount": "lots" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn status_reports_provider_result() {
        let mut gateway = idle_gateway();
        gateway
            .expect_get_payment()
            .returning(|id| Ok(provider_payment(id, "in_process")));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(gateway).await))
                .service(payment_status),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/payment-status/123456")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(
            body,
            json!({ "status": "in_process", "payment_id": "123456", "is_demo": false })
        );
    }

    #[actix_web::test]
    async fn status_flags_unverified_results() {
        let mut gateway = idle_gateway();
        gateway
            .expect_get_payment()
            .returning(|_| Err(ProviderError::Timeout));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(gateway).await))
                .service(payment_status),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/payment-status/123456")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "pending");
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn simulate_approves_then_reports_already_paid() {
        let mut gateway = idle_gateway();
        gateway
            .expect_create_pix_payment()
            .returning(|_| Ok(provider_payment("555", "pending")));
        let state = web::Data::new(state_with(gateway).await);
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .app_data(json_config())
                .service(create_pix_payment)
                .service(simulate_payment),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/create-pix-payment")
            .set_json(json!({ "amount": 10 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let req = test::TestRequest::post()
            .uri("/simulate-payment/555")
            .to_request();
        let first: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(first["success"], true);
        assert!(first["timestamp"].is_string());

        let req = test::TestRequest::post()
            .uri("/simulate-payment/555")
            .to_request();
        let second: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(second["success"], true);
        assert!(second.get("timestamp").is_none());
    }

    #[actix_web::test]
    async fn status_storage_failure_is_500() {
        let state = web::Data::new(state_with(idle_gateway()).await);
        state.db.close().await;
        let app = test::init_service(App::new().app_data(state.clone()).service(payment_status))
            .await;

        let req = test::TestRequest::get()
            .uri("/payment-status/123456")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string());
        assert_eq!(body["payment_id"], "123456");
    }

    #[actix_web::test]
    async fn create_rejects_amounts_too_large_to_store() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(idle_gateway()).await))
                .app_data(json_config())
                .service(create_pix_payment),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/create-pix-payment")
            .insert_header(("content-type", "application/json"))
            .set_payload(r#"{"amount": 1e27}"#)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn simulate_unknown_payment_is_404() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(idle_gateway()).await))
                .service(simulate_payment),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/simulate-payment/nope")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
