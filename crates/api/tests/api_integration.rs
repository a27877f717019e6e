//! Integration tests for the API server: full request/response cycles
//! over an in-memory store.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use event_store::InMemoryEventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> Router {
    let store = InMemoryEventStore::new();
    let state = api::create_default_state(store);
    api::create_app(state, get_metrics_handle())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }

    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
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

async fn register(app: &Router, role: &str) -> String {
    let (status, body) = send(app, "POST", &format!("/users/{role}"), None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["user_id"].as_str().unwrap().to_string()
}

async fn list_product(app: &Router, seller: &str, name: &str, cents: i64, stock: u32) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/products",
        Some(seller),
        Some(json!({
            "name": name,
            "price_cents": cents,
            "initial_stock": stock,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["product_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_check() {
    let app = setup();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let app = setup();
    let (status, _) = send(&app, "GET", "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn seller_cannot_shop() {
    let app = setup();
    let seller = register(&app, "sellers").await;

    let (status, _) = send(&app, "GET", "/cart", Some(&seller), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn listed_product_appears_in_catalog() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let product_id = list_product(&app, &seller, "Sweet potatoes 1kg", 700, 12).await;

    let (status, body) = send(&app, "GET", "/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["product_id"], product_id.as_str());
    assert_eq!(listed[0]["price_cents"], 700);
    assert_eq!(listed[0]["stock"], 12);
    assert_eq!(listed[0]["available"], true);
}

#[tokio::test]
async fn oversized_stock_adjustment_is_a_bad_request() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let product_id = list_product(&app, &seller, "Maize 50kg", 9000, 10).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("/products/{product_id}/stock"),
        Some(&seller),
        Some(json!({ "delta": i64::MAX })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("out of range"));

    // The ledger is untouched.
    let (status, body) = send(&app, "GET", &format!("/products/{product_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 10);
}

#[tokio::test]
async fn buyer_cannot_list_products() {
    let app = setup();
    let buyer = register(&app, "buyers").await;

    let (status, _) = send(
        &app,
        "POST",
        "/products",
        Some(&buyer),
        Some(json!({"name": "Nope", "price_cents": 100, "initial_stock": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn delisted_product_leaves_the_catalog() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let product_id = list_product(&app, &seller, "Cabbages", 300, 5).await;

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/products/{product_id}"),
        Some(&seller),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&app, "GET", "/products", None, None).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cart_merges_repeat_adds() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let buyer = register(&app, "buyers").await;
    let product_id = list_product(&app, &seller, "Carrots 500g", 250, 10).await;

    let add = json!({"product_id": product_id, "quantity": 2});
    send(&app, "POST", "/cart/items", Some(&buyer), Some(add.clone())).await;
    let (status, body) = send(&app, "POST", "/cart/items", Some(&buyer), Some(add)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["item_count"], 4);
    assert_eq!(body["total_cents"], 1000);
    // One line, one seller group.
    let sellers = body["sellers"].as_array().unwrap();
    assert_eq!(sellers.len(), 1);
    assert_eq!(sellers[0]["lines"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn add_beyond_stock_conflicts() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let buyer = register(&app, "buyers").await;
    let product_id = list_product(&app, &seller, "Avocados", 150, 3).await;

    let (status, body) = send(
        &app,
        "POST",
        "/cart/items",
        Some(&buyer),
        Some(json!({"product_id": product_id, "quantity": 4})),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("stock"));
}

#[tokio::test]
async fn set_quantity_to_zero_removes_the_line() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let buyer = register(&app, "buyers").await;
    let product_id = list_product(&app, &seller, "Spinach bunch", 120, 8).await;

    send(
        &app,
        "POST",
        "/cart/items",
        Some(&buyer),
        Some(json!({"product_id": product_id, "quantity": 3})),
    )
    .await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/cart/items/{product_id}"),
        Some(&buyer),
        Some(json!({"quantity": 0})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item_count"], 0);
    assert_eq!(body["total_cents"], 0);
}

#[tokio::test]
async fn clearing_an_empty_cart_is_fine() {
    let app = setup();
    let buyer = register(&app, "buyers").await;

    let (status, body) = send(&app, "DELETE", "/cart", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item_count"], 0);
}

#[tokio::test]
async fn empty_cart_cannot_check_out() {
    let app = setup();
    let buyer = register(&app, "buyers").await;

    let (status, _) = send(&app, "POST", "/cart/checkout", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn checkout_places_the_order_and_takes_stock() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let buyer = register(&app, "buyers").await;
    let product_id = list_product(&app, &seller, "Paw paw", 500, 6).await;

    send(
        &app,
        "POST",
        "/cart/items",
        Some(&buyer),
        Some(json!({"product_id": product_id, "quantity": 2})),
    )
    .await;

    let (status, body) = send(&app, "POST", "/cart/checkout", Some(&buyer), None).await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = body["order_id"].as_str().unwrap().to_string();
    let run_id = body["run_id"].as_str().unwrap().to_string();

    // The run is placed and the catalog shows the commitment.
    let (status, run) = send(&app, "GET", &format!("/checkout/runs/{run_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["state"], "Placed");

    let (_, product) = send(&app, "GET", &format!("/products/{product_id}"), None, None).await;
    assert_eq!(product["stock"], 4);

    // The order is pending with the frozen total.
    let (status, order) = send(
        &app,
        "GET",
        &format!("/orders/{order_id}"),
        Some(&buyer),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Pending");
    assert_eq!(order["total_cents"], 1000);

    // And shows up in the buyer's history.
    let (_, history) = send(&app, "GET", "/orders", Some(&buyer), None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn racing_carts_get_one_success() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let first = register(&app, "buyers").await;
    let second = register(&app, "buyers").await;
    let product_id = list_product(&app, &seller, "Duck eggs", 800, 3).await;

    for buyer in [&first, &second] {
        send(
            &app,
            "POST",
            "/cart/items",
            Some(buyer),
            Some(json!({"product_id": product_id, "quantity": 2})),
        )
        .await;
    }

    let (won, _) = send(&app, "POST", "/cart/checkout", Some(&first), None).await;
    let (lost, body) = send(&app, "POST", "/cart/checkout", Some(&second), None).await;

    assert_eq!(won, StatusCode::CREATED);
    assert_eq!(lost, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("stock"));
}

#[tokio::test]
async fn seller_fulfills_a_paid_order() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let buyer = register(&app, "buyers").await;
    let product_id = list_product(&app, &seller, "Goat cheese 200g", 1500, 4).await;

    send(
        &app,
        "POST",
        "/cart/items",
        Some(&buyer),
        Some(json!({"product_id": product_id, "quantity": 1})),
    )
    .await;
    let (_, placed) = send(&app, "POST", "/cart/checkout", Some(&buyer), None).await;
    let order_id = placed["order_id"].as_str().unwrap().to_string();

    let (status, paid) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/payment"),
        Some(&buyer),
        Some(json!({"reference": "MM-4711", "method": "mobile_money"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "Paid");
    assert_eq!(paid["payment_reference"], "MM-4711");

    for target in ["shipped", "delivered"] {
        let (status, body) = send(
            &app,
            "POST",
            &format!("/orders/{order_id}/transition"),
            Some(&seller),
            Some(json!({"target": target})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "transition to {target}");
        assert_eq!(
            body["status"].as_str().unwrap().to_ascii_lowercase(),
            target
        );
    }
}

#[tokio::test]
async fn skipping_payment_conflicts() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let buyer = register(&app, "buyers").await;
    let product_id = list_product(&app, &seller, "Basil pot", 350, 5).await;

    send(
        &app,
        "POST",
        "/cart/items",
        Some(&buyer),
        Some(json!({"product_id": product_id, "quantity": 1})),
    )
    .await;
    let (_, placed) = send(&app, "POST", "/cart/checkout", Some(&buyer), None).await;
    let order_id = placed["order_id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/transition"),
        Some(&seller),
        Some(json!({"target": "shipped"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn foreign_seller_sees_nothing_and_touches_nothing() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let other = register(&app, "sellers").await;
    let buyer = register(&app, "buyers").await;
    let product_id = list_product(&app, &seller, "Honeycomb", 2200, 2).await;

    send(
        &app,
        "POST",
        "/cart/items",
        Some(&buyer),
        Some(json!({"product_id": product_id, "quantity": 1})),
    )
    .await;
    let (_, placed) = send(&app, "POST", "/cart/checkout", Some(&buyer), None).await;
    let order_id = placed["order_id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/transition"),
        Some(&other),
        Some(json!({"target": "paid"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "GET", "/seller/orders", Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (_, body) = send(&app, "GET", "/seller/orders", Some(&seller), None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cancellation_restores_catalog_stock() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let buyer = register(&app, "buyers").await;
    let product_id = list_product(&app, &seller, "Millet 2kg", 950, 7).await;

    send(
        &app,
        "POST",
        "/cart/items",
        Some(&buyer),
        Some(json!({"product_id": product_id, "quantity": 3})),
    )
    .await;
    let (_, placed) = send(&app, "POST", "/cart/checkout", Some(&buyer), None).await;
    let order_id = placed["order_id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/orders/{order_id}/transition"),
        Some(&seller),
        Some(json!({"target": "cancelled", "reason": "out of season"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Cancelled");

    let (_, product) = send(&app, "GET", &format!("/products/{product_id}"), None, None).await;
    assert_eq!(product["stock"], 7);
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = setup();
    let buyer = register(&app, "buyers").await;
    let fake = uuid::Uuid::new_v4();

    let (status, _) = send(&app, "GET", &format!("/orders/{fake}"), Some(&buyer), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_event_stream_is_exposed() {
    let app = setup();
    let seller = register(&app, "sellers").await;
    let buyer = register(&app, "buyers").await;
    let product_id = list_product(&app, &seller, "Chillies 100g", 180, 9).await;

    send(
        &app,
        "POST",
        "/cart/items",
        Some(&buyer),
        Some(json!({"product_id": product_id, "quantity": 2})),
    )
    .await;
    let (_, placed) = send(&app, "POST", "/cart/checkout", Some(&buyer), None).await;
    let order_id = placed["order_id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        "GET",
        &format!("/orders/{order_id}/events"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let events: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(events, ["CartOpened", "LineAdded", "CheckedOut"]);
}

#[tokio::test]
async fn metrics_endpoint_renders() {
    let app = setup();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
