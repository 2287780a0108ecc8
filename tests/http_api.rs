//! HTTP-level tests: the real router on an ephemeral port, driven with
//! `reqwest`.

mod common;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};

use gallery_orders::api;
use gallery_orders::domain::{OrderId, UserId};

use common::{Harness, success_callback};

struct TestApp {
    base: String,
    client: Client,
    harness: Harness,
}

impl TestApp {
    async fn spawn() -> Self {
        let harness = Harness::new();
        let app = api::build_app(harness.state.clone(), Duration::from_secs(10));
        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("failed to bind an ephemeral port");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("listener has no address");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self {
            base: format!("http://{addr}"),
            client: Client::new(),
            harness,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

async fn body(response: reqwest::Response) -> Value {
    let Ok(value) = response.json::<Value>().await else {
        panic!("response body is not JSON");
    };
    value
}

fn decimal(value: &Value) -> Option<Decimal> {
    value.as_str().and_then(|s| s.parse().ok())
}

fn shipping_json() -> Value {
    json!({
        "recipient_name": "Mina Park",
        "email": "mina@example.com",
        "phone": "010-0000-0000",
        "address_line1": "12 Gallery Road",
        "city": "Seoul",
        "postal_code": "04524",
        "country": "KR"
    })
}

#[tokio::test]
async fn health_and_openapi_are_served() {
    let app = TestApp::spawn().await;

    let Ok(response) = app.client.get(app.url("/health")).send().await else {
        panic!("health request failed");
    };
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["status"], "healthy");

    let Ok(response) = app.client.get(app.url("/api-docs/openapi.json")).send().await else {
        panic!("openapi request failed");
    };
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body(response).await["paths"]["/api/v1/orders"].is_object());
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let app = TestApp::spawn().await;
    let Ok(response) = app.client.get(app.url("/api/v1/cart")).send().await else {
        panic!("request failed");
    };
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body(response).await["error"]["code"], 5001);
}

#[tokio::test]
async fn guest_checkout_and_signed_payment() {
    let app = TestApp::spawn().await;
    let artwork = app.harness.artwork("Harbour at Dusk", dec!(10000), None).await;
    let guest = ("x-guest-session", "sess-http");

    let Ok(response) = app
        .client
        .post(app.url("/api/v1/cart/items"))
        .header(guest.0, guest.1)
        .json(&json!({"artwork_id": artwork.id, "item_type": "ORIGINAL"}))
        .send()
        .await
    else {
        panic!("add to cart failed");
    };
    assert_eq!(response.status(), StatusCode::CREATED);

    let Ok(response) = app
        .client
        .post(app.url("/api/v1/orders"))
        .header(guest.0, guest.1)
        .json(&json!({"shipping": shipping_json(), "payment_method": "card"}))
        .send()
        .await
    else {
        panic!("checkout failed");
    };
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = body(response).await;
    assert_eq!(order["status"], "PENDING");
    assert_eq!(decimal(&order["total_amount"]), Some(dec!(10000)));
    assert_eq!(decimal(&order["amount_due"]), Some(dec!(10000)));
    let Some(order_id) = order["id"].as_str().and_then(|id| id.parse::<OrderId>().ok()) else {
        panic!("order id missing");
    };

    // A forged signature is rejected before anything is parsed.
    let (payload, header) = success_callback(order_id, 10_000);
    let Ok(response) = app
        .client
        .post(app.url("/api/v1/payments/webhook"))
        .header("payment-signature", "t=1,v1=deadbeef")
        .body(payload.clone())
        .send()
        .await
    else {
        panic!("webhook request failed");
    };
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(response).await["error"]["code"], 6001);

    let Ok(response) = app
        .client
        .post(app.url("/api/v1/payments/webhook"))
        .header("payment-signature", header.as_str())
        .body(payload)
        .send()
        .await
    else {
        panic!("webhook request failed");
    };
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["outcome"], "applied");

    let Ok(response) = app
        .client
        .get(app.url(&format!("/api/v1/orders/{order_id}")))
        .header(guest.0, guest.1)
        .send()
        .await
    else {
        panic!("order lookup failed");
    };
    assert_eq!(response.status(), StatusCode::OK);
    let paid = body(response).await;
    assert_eq!(paid["status"], "PAID");
    assert_eq!(paid["payment_channel"], "gateway");
}

#[tokio::test]
async fn lifecycle_actions_require_admin() {
    let app = TestApp::spawn().await;
    let artwork = app.harness.artwork("Harbour at Dusk", dec!(10000), None).await;
    let customer = UserId::new().to_string();
    let admin = UserId::new().to_string();

    let Ok(response) = app
        .client
        .post(app.url("/api/v1/orders"))
        .header("x-user-id", customer.as_str())
        .json(&json!({
            "items": [{"artwork_id": artwork.id, "item_type": "ORIGINAL"}],
            "shipping": shipping_json(),
            "payment_method": "bank_transfer"
        }))
        .send()
        .await
    else {
        panic!("checkout failed");
    };
    assert_eq!(response.status(), StatusCode::CREATED);
    let Some(order_id) = body(response).await["id"].as_str().map(str::to_string) else {
        panic!("order id missing");
    };

    let confirm_payment = app.url(&format!("/api/v1/orders/{order_id}/confirm-payment"));
    let Ok(response) = app
        .client
        .post(&confirm_payment)
        .header("x-user-id", customer.as_str())
        .json(&json!({}))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let Ok(response) = app
        .client
        .post(&confirm_payment)
        .header("x-user-id", admin.as_str())
        .header("x-user-role", "admin")
        .json(&json!({"reference": "BANK-42"}))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(response).await["status"], "PAID");

    // Shipping straight from PAID skips confirmation and is refused.
    let Ok(response) = app
        .client
        .post(app.url(&format!("/api/v1/orders/{order_id}/ship")))
        .header("x-user-id", admin.as_str())
        .header("x-user-role", "admin")
        .json(&json!({"tracking_number": "TRK123"}))
        .send()
        .await
    else {
        panic!("request failed");
    };
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body(response).await["error"]["code"], 2002);
}
