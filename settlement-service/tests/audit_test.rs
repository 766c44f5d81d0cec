mod common;

use common::{png_bytes, proof_form, upload_proof, TestApp, TEST_USER_ID};
use reqwest::{Client, StatusCode};

#[tokio::test]
async fn audit_trail_records_uploads_and_access_attempts() {
    let app = TestApp::spawn().await;
    let client = Client::new();

    let (_, proof) =
        upload_proof(&app, proof_form("slip.png", png_bytes(200, 200), "image/png", "55")).await;
    let file_name = proof["file_name"].as_str().unwrap();

    // One granted fetch and one denied fetch, both of which must be logged.
    client
        .get(&format!("{}/admin/proofs/{}", app.address, file_name))
        .header("X-Admin-Role", "admin")
        .header("X-Session-Token", "session-1")
        .send()
        .await
        .expect("Failed to execute request");
    client
        .get(&format!("{}/admin/proofs/{}", app.address, file_name))
        .header("X-Admin-Role", "customer")
        .header("X-Session-Token", "session-1")
        .send()
        .await
        .expect("Failed to execute request");

    let response = client
        .get(&format!("{}/admin/audit", app.address))
        .header("X-Admin-Role", "finance_manager")
        .header("X-Session-Token", "session-1")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);
    let entries: serde_json::Value = response.json().await.unwrap();
    let entries = entries.as_array().unwrap();

    let uploads: Vec<_> = entries
        .iter()
        .filter(|e| e["action"] == "proof_uploaded")
        .collect();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0]["actor"], TEST_USER_ID);
    assert_eq!(uploads[0]["outcome"], "accepted");
    assert_eq!(uploads[0]["order_id"], "55");

    let accesses: Vec<_> = entries
        .iter()
        .filter(|e| e["action"] == "proof_access")
        .collect();
    assert_eq!(accesses.len(), 2);
    assert_eq!(accesses[0]["actor"], "admin");
    assert_eq!(accesses[0]["outcome"], "granted");
    assert_eq!(accesses[1]["actor"], "customer");
    assert!(accesses[1]["outcome"]
        .as_str()
        .unwrap()
        .starts_with("denied:"));

    // Filters narrow to a single action.
    let filtered: serde_json::Value = client
        .get(&format!(
            "{}/admin/audit?action=proof_uploaded",
            app.address
        ))
        .header("X-Admin-Role", "admin")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(filtered.as_array().unwrap().len(), 1);

    app.cleanup().await;
}

#[tokio::test]
async fn csv_export_streams_the_compliance_format() {
    let app = TestApp::spawn().await;

    upload_proof(&app, proof_form("slip.png", png_bytes(200, 200), "image/png", "55")).await;

    let response = Client::new()
        .get(&format!("{}/admin/audit/export?format=csv", app.address))
        .header("X-Admin-Role", "admin")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        &"text/csv"
    );
    let body = response.text().await.unwrap();
    let mut lines = body.lines();
    assert_eq!(
        lines.next().unwrap(),
        "id,timestamp,action,actor,subject_id,outcome,file_name,order_id"
    );
    assert!(lines.next().unwrap().contains("proof_uploaded"));

    app.cleanup().await;
}

#[tokio::test]
async fn json_export_wraps_entries_with_metadata() {
    let app = TestApp::spawn().await;

    upload_proof(&app, proof_form("slip.png", png_bytes(200, 200), "image/png", "55")).await;

    let response = Client::new()
        .get(&format!("{}/admin/audit/export", app.address))
        .header("X-Admin-Role", "finance_manager")
        .header("X-Session-Token", "session-1")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::OK);
    let bundle: serde_json::Value = response.json().await.unwrap();
    assert_eq!(bundle["total"], 1);
    assert!(bundle["exported_at"].is_string());
    assert_eq!(bundle["entries"][0]["action"], "proof_uploaded");

    app.cleanup().await;
}

#[tokio::test]
async fn audit_surface_is_closed_to_support_admins() {
    let app = TestApp::spawn().await;

    let response = Client::new()
        .get(&format!("{}/admin/audit/export", app.address))
        .header("X-Admin-Role", "support_admin")
        .header("X-Session-Token", "session-1")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        body["error"],
        "Role 'support_admin' is not permitted to export audit logs"
    );

    let response = Client::new()
        .get(&format!("{}/admin/audit/export?format=xml", app.address))
        .header("X-Admin-Role", "admin")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "format must be json or csv");

    app.cleanup().await;
}
