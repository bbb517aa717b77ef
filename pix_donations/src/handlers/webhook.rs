use actix_web::{HttpResponse, post, web};
use serde_json::json;

use crate::payments::{self, WebhookNotification};
use crate::state::AppState;

/// Always answers 200 so the provider stops retrying, whatever happened
/// while processing the notification.
#[post("/webhook")]
pub async fn webhook(body: web::Bytes, app_state: web::Data<AppState>) -> HttpResponse {
    match serde_json::from_slice::<WebhookNotification>(&body) {
        Ok(notification) => {
            let outcome = payments::handle_webhook(&app_state, &notification).await;
            log::debug!("Webhook processed: {:?}", outcome);
        }
        Err(e) => log::warn!("Ignoring malformed webhook body: {}", e),
    }

    HttpResponse::Ok().json(json!({ "received": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{idle_gateway, provider_payment, state_with};
    use actix_web::{App, http::StatusCode, test};
    use common::{DonationStatus, NewDonation, ProviderError};
    use rust_decimal_macros::dec;

    #[actix_web::test]
    async fn approved_webhook_marks_donation_paid() {
        let mut gateway = idle_gateway();
        gateway
            .expect_get_payment()
            .withf(|id| id == "777")
            .times(2)
            .returning(|id| Ok(provider_payment(id, "approved")));
        let state = web::Data::new(state_with(gateway).await);
        state
            .db
            .insert(&NewDonation::new("777", dec!(50)))
            .await
            .unwrap();
        let app = test::init_service(App::new().app_data(state.clone()).service(webhook)).await;

        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/webhook")
                .set_json(json!({ "type": "payment", "data": { "id": 777 } }))
                .to_request();
            let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body, json!({ "received": true }));
        }

        let stored = state.db.get_by_payment_id("777").await.unwrap().unwrap();
        assert_eq!(stored.status, DonationStatus::Paid);
    }

    #[actix_web::test]
    async fn failures_and_garbage_are_still_acknowledged() {
        let mut gateway = idle_gateway();
        gateway
            .expect_get_payment()
            .returning(|_| Err(ProviderError::Timeout));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(gateway).await))
                .service(webhook),
        )
        .await;

        for payload in [
            r#"{"type":"payment","data":{"id":"1"}}"#,
            r#"{"type":"payment"}"#,
            r#"not json"#,
            "",
        ] {
            let req = test::TestRequest::post()
                .uri("/webhook")
                .insert_header(("content-type", "application/json"))
                .set_payload(payload)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }
}
