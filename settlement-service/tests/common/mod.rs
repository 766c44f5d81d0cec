//! Shared helpers for settlement-service integration tests.

#![allow(dead_code)]

use reqwest::multipart;
use settlement_service::config::SettlementConfig;
use settlement_service::startup::Application;
use std::io::Cursor;
use uuid::Uuid;

pub const TEST_USER_ID: &str = "user_42";
pub const TEST_SIGNING_SECRET: &str = "test-signing-secret";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub storage_path: String,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    /// Spawn with deterministic gateway behavior, then apply test-specific
    /// configuration tweaks on top.
    pub async fn spawn_with(mutate: impl FnOnce(&mut SettlementConfig)) -> Self {
        let mut config = SettlementConfig::load().expect("Failed to load configuration");
        config.common.port = 0; // Random port for testing
        config.storage.local_path = format!("target/test-storage-{}", Uuid::new_v4());
        config.signing.secret = secrecy::Secret::new(TEST_SIGNING_SECRET.to_string());
        config.scheduler.enabled = false;
        config.gateway.simulate_failures = false;
        config.gateway.latency_ms = 0;
        config.gateway.retry_backoff_ms = 1;
        config.gateway.card_decline_rate = 0.0;
        mutate(&mut config);

        let storage_path = config.storage.local_path.clone();
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            storage_path,
        }
    }

    /// Cleanup test resources (local storage directory).
    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.storage_path).await;
    }
}

/// A valid PNG filled with noise, so it never compresses below the 1KB floor.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |_, _| {
        image::Rgb([rand::random(), rand::random(), rand::random()])
    });
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageOutputFormat::Png)
        .expect("Failed to encode test image");
    out
}

/// A decodable PNG with the EICAR test string appended after the image data.
/// Passes structural validation, fails the signature scan.
pub fn eicar_png() -> Vec<u8> {
    let mut data = png_bytes(200, 200);
    data.extend_from_slice(b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*");
    data
}

pub fn proof_form(
    file_name: &str,
    bytes: Vec<u8>,
    mime_type: &str,
    order_id: &str,
) -> multipart::Form {
    multipart::Form::new()
        .part(
            "file",
            multipart::Part::bytes(bytes)
                .file_name(file_name.to_string())
                .mime_str(mime_type)
                .expect("invalid test mime type"),
        )
        .text("order_id", order_id.to_string())
}

/// Upload a proof and return the parsed response body alongside the status.
pub async fn upload_proof(
    app: &TestApp,
    form: multipart::Form,
) -> (reqwest::StatusCode, serde_json::Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/proofs", app.address))
        .header("X-User-ID", TEST_USER_ID)
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request");
    let status = response.status();
    let body = response.json().await.expect("Failed to parse JSON");
    (status, body)
}
