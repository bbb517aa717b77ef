use std::time::Duration;

use common::{GatewayConfig, MercadoPagoGateway, PaymentGateway, PixPaymentRequest, ProviderError};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer, token: &str, timeout: Duration) -> MercadoPagoGateway {
    MercadoPagoGateway::new(&GatewayConfig {
        access_token: Some(token.to_string()),
        api_url: server.uri(),
        timeout,
    })
    .unwrap()
}

fn request() -> PixPaymentRequest {
    PixPaymentRequest {
        amount: dec!(25.50),
        donor_name: Some("Ana".to_string()),
        donor_email: Some("ana@example.com".to_string()),
    }
}

#[tokio::test]
async fn creates_pix_payment_and_reads_qr_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments"))
        .and(header("authorization", "Bearer TEST-abc"))
        .and(header_exists("x-idempotency-key"))
        .and(body_partial_json(json!({
            "transaction_amount": 25.5,
            "payment_method_id": "pix",
            "description": "Donation from Ana",
            "payer": { "email": "ana@example.com", "first_name": "Ana" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 1319827381u64,
            "status": "pending",
            "point_of_interaction": {
                "transaction_data": {
                    "qr_code": "00020126580014br.gov.bcb.pix",
                    "qr_code_base64": "iVBORw0KGgo="
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server, "TEST-abc", Duration::from_secs(5));
    let payment = gateway.create_pix_payment(&request()).await.unwrap();

    assert!(gateway.is_test_mode());
    assert_eq!(payment.id, "1319827381");
    assert_eq!(payment.status, "pending");
    assert_eq!(payment.qr_code, "00020126580014br.gov.bcb.pix");
    assert_eq!(payment.qr_code_base64, "iVBORw0KGgo=");
}

#[tokio::test]
async fn anonymous_donor_gets_generated_payer_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments"))
        .and(body_partial_json(json!({
            "description": "Donation from Anonymous donor",
            "payer": { "first_name": "Donor", "last_name": "Anonymous" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 42,
            "status": "pending"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway(&server, "APP_USR-live", Duration::from_secs(5));
    let payment = gateway
        .create_pix_payment(&PixPaymentRequest {
            amount: dec!(10),
            donor_name: None,
            donor_email: None,
        })
        .await
        .unwrap();

    assert!(!gateway.is_test_mode());
    assert_eq!(payment.id, "42");
    assert_eq!(payment.qr_code, "");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = received[0].body_json().unwrap();
    let email = body["payer"]["email"].as_str().unwrap();
    assert!(email.starts_with("donor") && email.ends_with("@gmail.com"));
}

#[tokio::test]
async fn fetches_payment_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/555"))
        .and(header("authorization", "Bearer TEST-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 555,
            "status": "approved"
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server, "TEST-abc", Duration::from_secs(5));
    let payment = gateway.get_payment("555").await.unwrap();

    assert_eq!(payment.id, "555");
    assert!(payment.is_approved());
}

#[tokio::test]
async fn provider_rejection_carries_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/payments"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "invalid access token",
            "error": "unauthorized",
            "status": 401
        })))
        .mount(&server)
        .await;

    let gateway = gateway(&server, "TEST-bad", Duration::from_secs(5));
    let err = gateway.create_pix_payment(&request()).await.unwrap_err();

    match err {
        ProviderError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid access token");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_provider_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/777"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "id": 777, "status": "approved" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let gateway = gateway(&server, "TEST-abc", Duration::from_millis(200));
    let err = gateway.get_payment("777").await.unwrap_err();

    assert!(matches!(err, ProviderError::Timeout));
}

#[tokio::test]
async fn malformed_payment_ids_never_reach_the_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = gateway(&server, "TEST-abc", Duration::from_secs(5));
    let err = gateway.get_payment("../v1/users").await.unwrap_err();

    assert!(matches!(err, ProviderError::Rejected { status: 400, .. }));
}
