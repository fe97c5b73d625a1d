//! End-to-end tests of the JSON API through the full router.
//!
//! Require a `PostgreSQL` server reachable through `DATABASE_URL`.
//!
//! Run with: cargo test -p atelier-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;

use atelier_core::UserRole;
use atelier_integration_tests::{category, customer, product, seller, staff, state};

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register(app: &Router, email: &str) -> (i64, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({ "email": email })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["user"]["id"].as_i64().unwrap(),
        body["token"].as_str().unwrap().to_owned(),
    )
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_register_then_read_profile(pool: PgPool) {
    let app = atelier_api::app(state(pool));
    let (user_id, token) = register(&app, "mira@atelier.test").await;

    let (status, profile) = call(&app, Method::GET, "/api/me/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["user_id"], user_id);
    assert_eq!(profile["details"]["role"], "customer");
    assert_eq!(profile["is_verified"], false);

    let (status, _) = call(
        &app,
        Method::GET,
        "/api/me/profile",
        Some("not-a-real-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({ "email": "mira@ATELIER.test" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_admin_routes_require_staff(pool: PgPool) {
    let app = atelier_api::app(state(pool));
    let (_, token) = register(&app, "buyer@atelier.test").await;

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/admin/seller-applications",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_marketplace_flow(pool: PgPool) {
    let state = state(pool);
    let admin = staff(&state, "admin@atelier.test").await;
    let admin_token = state
        .accounts()
        .issue_token(admin.id, "tests")
        .await
        .unwrap()
        .secret;
    let app = atelier_api::app(state);
    let admin_token = Some(admin_token.as_str());

    // Apply and get approved as an artist
    let (seller_id, seller_token) = register(&app, "mira@atelier.test").await;
    let seller_token = Some(seller_token.as_str());
    let (status, application) = call(
        &app,
        Method::POST,
        "/api/seller-applications",
        seller_token,
        Some(json!({
            "requested_role": "artist",
            "details": { "role": "artist", "specialty": "ceramics" },
            "terms_accepted": true,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{application}");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/admin/seller-applications/{}/decision", application["id"]),
        admin_token,
        Some(json!({ "decision": "approved", "notes": "Welcome" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, status_body) = call(
        &app,
        Method::GET,
        "/api/seller-applications/status",
        seller_token,
        None,
    )
    .await;
    assert_eq!(status_body["status"], "approved");

    // List a product
    let (status, category) = call(
        &app,
        Method::POST,
        "/api/admin/categories",
        admin_token,
        Some(json!({ "name": "Ceramics" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, product) = call(
        &app,
        Method::POST,
        "/api/products",
        seller_token,
        Some(json!({
            "category_id": category["id"],
            "name": "Speckled vase",
            "description": "Stoneware",
            "price": "100.00",
            "stock": 3,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{product}");

    // Buyer funds their wallet and checks out
    let (buyer_id, buyer_token) = register(&app, "buyer@atelier.test").await;
    let buyer_token = Some(buyer_token.as_str());
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/admin/wallets/{buyer_id}/deposit"),
        admin_token,
        Some(json!({ "amount": "250.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, order) = call(
        &app,
        Method::POST,
        "/api/orders",
        buyer_token,
        Some(json!({
            "items": [{ "product_id": product["id"], "quantity": 2 }],
            "shipping_address": "12 Harbour Road, Porto",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["total_amount"], "200.00");
    assert_eq!(order["items"][0]["commission_amount"], "20.00");

    let order_uri = format!("/api/orders/{}", order["id"]);
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("{order_uri}/pay"),
        buyer_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, wallet) = call(&app, Method::GET, "/api/wallet", buyer_token, None).await;
    assert_eq!(wallet["balance"], "50.00");

    // Another buyer cannot see the order
    let (_, other_token) = register(&app, "other@atelier.test").await;
    let (status, _) = call(&app, Method::GET, &order_uri, Some(&other_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Settle and check the seller's credit
    let (status, settlement) = call(
        &app,
        Method::POST,
        &format!("/api/admin/orders/{}/settle", order["id"]),
        admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{settlement}");
    assert_eq!(settlement["commission"], "20.00");

    let (_, wallet) = call(&app, Method::GET, "/api/wallet", seller_token, None).await;
    assert_eq!(wallet["balance"], "180.00");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/admin/orders/{}/settle", order["id"]),
        admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Overdraw through the admin surface
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/admin/wallets/{seller_id}/withdraw"),
        admin_token,
        Some(json!({ "amount": "500.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "insufficient_funds");

    let (_, audits) = call(&app, Method::GET, "/api/admin/wallets/audit", admin_token, None).await;
    assert!(!audits.as_array().unwrap().is_empty());

    let (_, inbox) = call(&app, Method::GET, "/api/notifications", seller_token, None).await;
    assert!(inbox["unread_count"].as_i64().unwrap() >= 2);
}

#[sqlx::test(migrations = "../api/migrations")]
#[ignore = "Requires PostgreSQL (DATABASE_URL)"]
async fn test_cart_reviews_and_activity(pool: PgPool) {
    let state = state(pool);
    let admin = staff(&state, "admin@atelier.test").await;
    let artist = seller(&state, &admin, "mira@atelier.test", UserRole::Artist).await;
    let buyer = customer(&state, "buyer@atelier.test").await;
    let cat = category(&state, "Ceramics").await;
    let bowl = product(&state, &artist, cat, "30.00", 3).await;
    let mut tokens = Vec::new();
    for user in [&admin, &buyer] {
        tokens.push(
            state
                .accounts()
                .issue_token(user.id, "tests")
                .await
                .unwrap()
                .secret,
        );
    }
    let app = atelier_api::app(state);
    let admin_token = Some(tokens[0].as_str());
    let buyer_token = Some(tokens[1].as_str());

    let (status, cart) = call(
        &app,
        Method::POST,
        "/api/cart/items",
        buyer_token,
        Some(json!({ "product_id": bowl.id, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{cart}");
    assert_eq!(cart["subtotal"], "60.00");

    let (status, body) = call(
        &app,
        Method::PUT,
        &format!("/api/cart/items/{}", bowl.id),
        buyer_token,
        Some(json!({ "quantity": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    let (status, order) = call(
        &app,
        Method::POST,
        "/api/cart/checkout",
        buyer_token,
        Some(json!({ "shipping_address": "12 Harbour Road, Porto" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["total_amount"], "60.00");
    let (_, cart) = call(&app, Method::GET, "/api/cart", buyer_token, None).await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 0);

    let reviews_uri = format!("/api/products/{}/reviews", bowl.id);
    let (status, review) = call(
        &app,
        Method::POST,
        &reviews_uri,
        buyer_token,
        Some(json!({ "rating": 4, "comment": "Even glaze" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{review}");
    let (status, _) = call(
        &app,
        Method::POST,
        &reviews_uri,
        buyer_token,
        Some(json!({ "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, listed) = call(&app, Method::GET, &reviews_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["count"], 1);
    assert_eq!(listed["average_rating"], "4.00");

    let (status, log) = call(
        &app,
        Method::GET,
        "/api/admin/activity?action=approve",
        admin_token,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{log}");
    assert_eq!(log["count"], 1);
    assert_eq!(log["results"][0]["target"]["kind"], "seller_application");

    let (status, _) = call(&app, Method::GET, "/api/admin/activity", buyer_token, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
