mod common;

use common::TestApp;
use reqwest::{Client, StatusCode};
use serde_json::json;

#[tokio::test]
async fn wallet_charge_completes_on_a_quiet_gateway() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .post(&format!("{}/payments/wallet", app.address))
        .json(&json!({
            "order_id": "55",
            "amount": 1000,
            "gateway": "jazzcash",
            "phone_number": "03001234567"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["order_id"], "55");
    assert_eq!(body["payment_method"], "jazzcash");
    assert_eq!(body["amount"], "1000");
    assert_eq!(body["retry_count"], 0);
    let gateway_txn = body["gateway_response"]["gateway_transaction_id"]
        .as_str()
        .expect("missing gateway transaction id");
    assert!(gateway_txn.starts_with("JC"));
    assert!(body["transaction_id"].as_str().unwrap().starts_with("TXN"));

    // The attempt is queryable by transaction id and by order.
    let transaction_id = body["transaction_id"].as_str().unwrap();
    let fetched: serde_json::Value = client
        .get(&format!("{}/payments/{}", app.address, transaction_id))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(fetched["transaction_id"], transaction_id);

    let by_order: serde_json::Value = client
        .get(&format!("{}/orders/55/payments", app.address))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert_eq!(by_order.as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn carrier_outside_the_allow_list_is_rejected_without_a_record() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    // 0321 is Warid, which SadaPay does not support.
    let response = client
        .post(&format!("{}/payments/wallet", app.address))
        .json(&json!({
            "order_id": "77",
            "amount": 500,
            "gateway": "sadapay",
            "phone_number": "03211234567"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("UNSUPPORTED_NETWORK_SADAPAY"), "{message}");

    // Input rejections never touch the ledger.
    let by_order: serde_json::Value = client
        .get(&format!("{}/orders/77/payments", app.address))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse JSON");
    assert!(by_order.as_array().unwrap().is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn unknown_gateway_and_zero_amount_are_bad_requests() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .post(&format!("{}/payments/wallet", app.address))
        .json(&json!({
            "order_id": "1",
            "amount": 500,
            "gateway": "paypal",
            "phone_number": "03001234567"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("UNKNOWN_GATEWAY"));

    let response = client
        .post(&format!("{}/payments/wallet", app.address))
        .json(&json!({
            "order_id": "1",
            "amount": 0,
            "gateway": "jazzcash",
            "phone_number": "03001234567"
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Amount must be greater than zero");

    app.cleanup().await;
}

#[tokio::test]
async fn card_charge_returns_a_masked_receipt() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let response = client
        .post(&format!("{}/payments/card", app.address))
        .json(&json!({
            "order_id": "card-1",
            "amount": 2500,
            "card_number": "4111 1111 1111 1111",
            "expiry": "12/30",
            "cvv": "123",
            "holder_name": "Ayesha Khan"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["payment_method"], "card");
    assert_eq!(
        body["gateway_response"]["masked_card"],
        "**** **** **** 1111"
    );
    assert!(body["gateway_response"]["reference"]
        .as_str()
        .unwrap()
        .starts_with("AUTH-"));

    app.cleanup().await;
}

#[tokio::test]
async fn malformed_cards_are_rejected_before_the_ledger() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let cases = [
        (json!("1234"), "12/30", "Card number must be 13 to 19 digits"),
        (
            json!("4111 1111 1111 1112"),
            "12/30",
            "Card number is invalid",
        ),
        (json!("4111 1111 1111 1111"), "01/20", "Card has expired"),
        (
            json!("4111 1111 1111 1111"),
            "13/30",
            "Card expiry must be in MM/YY format",
        ),
    ];
    for (card_number, expiry, expected) in cases {
        let response = client
            .post(&format!("{}/payments/card", app.address))
            .json(&json!({
                "order_id": "card-2",
                "amount": 100,
                "card_number": card_number,
                "expiry": expiry,
                "cvv": "123",
                "holder_name": "Ayesha Khan"
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], expected);
    }

    let by_order: serde_json::Value = client
        .get(&format!("{}/orders/card-2/payments", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(by_order.as_array().unwrap().is_empty());

    app.cleanup().await;
}

#[tokio::test]
async fn verification_is_idempotent_once_completed() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let charge: serde_json::Value = client
        .post(&format!("{}/payments/wallet", app.address))
        .json(&json!({
            "order_id": "verify-1",
            "amount": 750,
            "gateway": "easypaisa",
            "phone_number": "03451234567"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let transaction_id = charge["transaction_id"].as_str().unwrap();

    // Declining a completed transaction must not rewrite history.
    let outcome: serde_json::Value = client
        .post(&format!(
            "{}/payments/{}/verify",
            app.address, transaction_id
        ))
        .json(&json!({ "approved": false }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["verified"], true);
    assert_eq!(outcome["transaction"]["status"], "completed");

    let outcome: serde_json::Value = client
        .post(&format!(
            "{}/payments/{}/verify",
            app.address, transaction_id
        ))
        .json(&json!({ "approved": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["verified"], true);

    let response = client
        .post(&format!("{}/payments/TXN-unknown/verify", app.address))
        .json(&json!({ "approved": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    app.cleanup().await;
}

#[tokio::test]
async fn payment_list_paginates() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    for order in ["p1", "p2", "p3"] {
        let response = client
            .post(&format!("{}/payments/wallet", app.address))
            .json(&json!({
                "order_id": order,
                "amount": 100,
                "gateway": "wallet",
                "phone_number": "03551234567"
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let page: serde_json::Value = client
        .get(&format!("{}/payments?page=1&page_size=2", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 3);
    assert_eq!(page["payments"].as_array().unwrap().len(), 2);
    assert_eq!(page["page"], 1);
    assert_eq!(page["page_size"], 2);

    let page: serde_json::Value = client
        .get(&format!("{}/payments?page=2&page_size=2", app.address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["payments"].as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn phone_validation_reports_carrier() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let body: serde_json::Value = client
        .get(&format!("{}/phone/validate", app.address))
        .query(&[("number", "+92 300 1234567")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["valid"], true);
    assert_eq!(body["normalized"], "03001234567");
    assert_eq!(body["network"], "jazz");

    let body: serde_json::Value = client
        .get(&format!("{}/phone/validate", app.address))
        .query(&[("number", "0399 1234567")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // Valid shape, but 0399 maps to no carrier.
    assert_eq!(body["valid"], false);
    assert_eq!(body["normalized"], "03991234567");
    assert!(body["network"].is_null());

    let body: serde_json::Value = client
        .get(&format!("{}/phone/validate", app.address))
        .query(&[("number", "12345")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["valid"], false);
    assert!(body["normalized"].is_null());

    app.cleanup().await;
}
