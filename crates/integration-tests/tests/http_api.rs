//! The HTTP API, driven through the full router.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tower::ServiceExt;

use printdrop_integration_tests::{MultipartForm, TEST_TTL, TestContext, body_json, json_request};

async fn send(
    ctx: &TestContext,
    request: axum::http::Request<axum::body::Body>,
) -> (StatusCode, Value) {
    let response = ctx.app().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Register a store over HTTP; returns `(storeId, token)`.
async fn register(ctx: &TestContext, name: &str, email: &str) -> (String, String) {
    let (status, body) = send(
        ctx,
        json_request(
            "POST",
            "/api/store/register",
            None,
            Some(&json!({
                "storeName": name,
                "ownerName": "Owner",
                "email": email,
                "password": "secret1",
                "address": "1 Main St",
                "phone": "555-0100",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["store"]["storeId"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn upload_pdfs(ctx: &TestContext, store_id: &str, names: &[&str]) -> Value {
    let mut form = MultipartForm::new()
        .text("storeId", store_id)
        .text("customerName", "Ada");
    for name in names {
        form = form.file("files", name, "application/pdf", b"%PDF-1.7 \x00\xff body");
    }
    let (status, body) = send(ctx, form.into_request()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn health_endpoints() {
    let ctx = TestContext::new();
    let response = ctx
        .app()
        .oneshot(json_request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let (status, _) = send(&ctx, json_request("GET", "/health/ready", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn register_returns_token_and_qr_payload() {
    let ctx = TestContext::new();
    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            "/api/store/register",
            None,
            Some(&json!({
                "storeName": "Corner Print",
                "ownerName": "Sam",
                "email": "sam@corner.example",
                "password": "secret1",
                "address": "1 Main St",
                "phone": "555-0100",
            })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let store_id = body["store"]["storeId"].as_str().unwrap();
    assert!(store_id.starts_with("CORNE"));
    assert_eq!(body["qr"]["storeId"], store_id);
    assert_eq!(
        body["qr"]["uploadUrl"],
        format!("http://localhost:3000/customer/upload/{store_id}")
    );
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["store"].get("passwordHash").is_none());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let ctx = TestContext::new();
    register(&ctx, "Corner Print", "sam@corner.example").await;

    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            "/api/store/register",
            None,
            Some(&json!({
                "storeName": "Other",
                "ownerName": "Sam",
                "email": "SAM@corner.example",
                "password": "secret1",
                "address": "2 Main St",
                "phone": "555-0101",
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn login_checks_credentials() {
    let ctx = TestContext::new();
    let (store_id, _) = register(&ctx, "Corner Print", "sam@corner.example").await;

    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            "/api/store/login",
            None,
            Some(&json!({"email": "sam@corner.example", "password": "secret1"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"]["storeId"], store_id.as_str());

    let (status, body) = send(
        &ctx,
        json_request(
            "POST",
            "/api/store/login",
            None,
            Some(&json!({"email": "sam@corner.example", "password": "wrong!"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn public_store_lookups() {
    let ctx = TestContext::new();
    let (store_id, _) = register(&ctx, "Corner Print", "sam@corner.example").await;

    let (status, body) = send(
        &ctx,
        json_request("GET", &format!("/api/store/{store_id}"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"]["storeName"], "Corner Print");

    let (status, body) = send(
        &ctx,
        json_request(
            "GET",
            &format!("/api/store/validate/{}", store_id.to_lowercase()),
            None,
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"]["storeId"], store_id.as_str());

    let (status, body) = send(
        &ctx,
        json_request("GET", &format!("/api/store/{store_id}/qr"), None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["uploadUrl"].as_str().unwrap().ends_with(&store_id));

    let (status, body) = send(&ctx, json_request("GET", "/api/store/NOPE999", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn upload_then_list_then_print() {
    let ctx = TestContext::new();
    let (store_id, token) = register(&ctx, "Corner Print", "sam@corner.example").await;

    let receipt = upload_pdfs(&ctx, &store_id, &["one.pdf", "two.pdf"]).await;
    assert_eq!(receipt["expirationTime"], TEST_TTL.as_secs());
    assert_eq!(receipt["files"].as_array().unwrap().len(), 2);
    assert_eq!(receipt["files"][0]["originalName"], "one.pdf");
    let order_id = receipt["orderId"].as_str().unwrap().to_string();

    let (status, body) = send(
        &ctx,
        json_request("GET", "/api/store/orders", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = &body["orders"][0];
    assert_eq!(listed["id"], order_id.as_str());
    assert_eq!(listed["status"], "pending");
    assert_eq!(listed["timeRemaining"], TEST_TTL.as_secs());
    assert_eq!(listed["customerName"], "Ada");

    let (status, body) = send(
        &ctx,
        json_request(
            "GET",
            &format!("/api/store/orders/print/{order_id}"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let files = body["order"]["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["type"], "application/pdf");
    let content = STANDARD
        .decode(files[0]["content"].as_str().unwrap())
        .unwrap();
    assert_eq!(content, b"%PDF-1.7 \x00\xff body");
    assert_eq!(files[0]["printSettings"]["copies"], 1);
}

#[tokio::test]
async fn upload_validation_errors() {
    let ctx = TestContext::new();
    let (store_id, _) = register(&ctx, "Corner Print", "sam@corner.example").await;

    let oversized = MultipartForm::new()
        .text("storeId", &store_id)
        .file("files", "big.pdf", "application/pdf", &[0u8; 1025]);
    let (status, body) = send(&ctx, oversized.into_request()).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let wrong_type = MultipartForm::new()
        .text("storeId", &store_id)
        .file("files", "tool.exe", "application/x-msdownload", b"MZ");
    let (status, _) = send(&ctx, wrong_type.into_request()).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let no_files = MultipartForm::new().text("storeId", &store_id);
    let (status, _) = send(&ctx, no_files.into_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let no_store = MultipartForm::new().file("files", "a.pdf", "application/pdf", b"%PDF");
    let (status, _) = send(&ctx, no_store.into_request()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(ctx.content.is_empty());
    assert!(ctx.orders.is_empty());
}

#[tokio::test]
async fn part_far_over_the_limit_is_counted_not_kept() {
    let ctx = TestContext::new();
    let (store_id, _) = register(&ctx, "Corner Print", "sam@corner.example").await;
    let big = vec![0x25u8; 256 * 1024];

    let form = MultipartForm::new()
        .text("storeId", &store_id)
        .file("files", "ok.pdf", "application/pdf", b"%PDF")
        .file("files", "huge.pdf", "application/pdf", &big)
        .text("customerName", "Ada");
    let (status, body) = send(&ctx, form.into_request()).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "VALIDATION_FAILED");
    assert!(
        body["error"].as_str().unwrap().contains("262144 bytes"),
        "{body}"
    );
    assert!(ctx.content.is_empty());
    assert!(ctx.orders.is_empty());

    // The store is still resolved before sizes are looked at
    let unknown = MultipartForm::new()
        .text("storeId", "NOPE123")
        .file("files", "huge.pdf", "application/pdf", &big);
    let (status, _) = send(&ctx, unknown.into_request()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_requires_a_valid_token() {
    let ctx = TestContext::new();
    register(&ctx, "Corner Print", "sam@corner.example").await;

    for token in [None, Some("not-a-jwt")] {
        let (status, body) = send(
            &ctx,
            json_request("GET", "/api/store/orders", token, None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn path_store_must_match_token() {
    let ctx = TestContext::new();
    let (store_a, _) = register(&ctx, "Alpha Copies", "a@alpha.example").await;
    let (_, token_b) = register(&ctx, "Beta Prints", "b@beta.example").await;

    let (status, body) = send(
        &ctx,
        json_request(
            "GET",
            &format!("/api/store/orders/{store_a}"),
            Some(&token_b),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn cross_store_print_is_forbidden_and_changes_nothing() {
    let ctx = TestContext::new();
    let (store_a, token_a) = register(&ctx, "Alpha Copies", "a@alpha.example").await;
    let (store_b, token_b) = register(&ctx, "Beta Prints", "b@beta.example").await;
    let receipt = upload_pdfs(&ctx, &store_a, &["a.pdf"]).await;
    let order_id = receipt["orderId"].as_str().unwrap();

    let (status, _) = send(
        &ctx,
        json_request(
            "PUT",
            &format!("/api/store/orders/{store_b}"),
            Some(&token_b),
            Some(&json!({"orderId": order_id, "action": "print"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &ctx,
        json_request(
            "GET",
            &format!("/api/store/orders/print/{order_id}"),
            Some(&token_b),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = send(
        &ctx,
        json_request(
            "GET",
            &format!("/api/store/orders/{store_a}"),
            Some(&token_a),
            None,
        ),
    )
    .await;
    assert_eq!(body["orders"][0]["status"], "pending");
}

#[tokio::test]
async fn status_updates_over_http() {
    let ctx = TestContext::new();
    let (store_id, token) = register(&ctx, "Corner Print", "sam@corner.example").await;
    let receipt = upload_pdfs(&ctx, &store_id, &["a.pdf"]).await;
    let order_id = receipt["orderId"].as_str().unwrap();

    let (status, body) = send(
        &ctx,
        json_request(
            "PUT",
            &format!("/api/store/orders/{store_id}"),
            Some(&token),
            Some(&json!({"orderId": order_id, "action": "print"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "processing");

    let (status, body) = send(
        &ctx,
        json_request(
            "PUT",
            "/api/store/orders",
            Some(&token),
            Some(&json!({"orderId": order_id, "action": "print"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = send(
        &ctx,
        json_request(
            "PUT",
            "/api/store/orders",
            Some(&token),
            Some(&json!({"orderId": order_id, "action": "refund"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn print_after_expiry_is_not_found() {
    let ctx = TestContext::new();
    let (store_id, token) = register(&ctx, "Corner Print", "sam@corner.example").await;
    let receipt = upload_pdfs(&ctx, &store_id, &["a.pdf"]).await;
    let order_id = receipt["orderId"].as_str().unwrap();

    ctx.advance(TEST_TTL.as_secs());

    let (status, body) = send(
        &ctx,
        json_request(
            "GET",
            &format!("/api/store/orders/print/{order_id}"),
            Some(&token),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    // Listing reaps it
    let (_, body) = send(&ctx, json_request("GET", "/api/store/orders", Some(&token), None)).await;
    assert!(body["orders"].as_array().unwrap().is_empty());
    assert!(ctx.orders.is_empty());
    assert!(ctx.content.is_empty());
}
