use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dispatch_hub::api::rest::router;
use dispatch_hub::config::Config;
use dispatch_hub::models::event::{DeliveryAccept, OrderRef};
use dispatch_hub::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(&Config::default()));
    (router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn seed_profiles(app: &axum::Router) {
    let requests = [
        json_request(
            "POST",
            "/restaurants",
            json!({ "id": 42, "name": "Pizza Nord", "location": { "lat": 0.0, "lng": 0.0 } }),
        ),
        json_request("POST", "/users", json!({ "id": 1, "name": "Ada" })),
        json_request(
            "POST",
            "/couriers",
            json!({ "id": 5, "name": "Bo", "is_available": true }),
        ),
    ];

    for request in requests {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

fn place_order_request() -> Request<Body> {
    json_request(
        "POST",
        "/orders",
        json!({
            "user_id": 1,
            "restaurant_id": 42,
            "delivery_address": { "lat": 0.02, "lng": 0.0 },
            "total_amount": 25.0
        }),
    )
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["open_rooms"], 0);
    assert_eq!(body["active_couriers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("connected_clients"));
}

#[tokio::test]
async fn place_order_returns_pending_order() {
    let (app, _state) = setup();
    let response = app.oneshot(place_order_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["delivery_status"], "pending");
    assert!(body["delivery_partner_id"].is_null());
    assert!(body["id"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn place_order_without_user_is_rejected() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "user_id": 0,
                "restaurant_id": 42,
                "delivery_address": { "lat": 0.02, "lng": 0.0 },
                "total_amount": 25.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["reason"], "validation");
}

#[tokio::test]
async fn pending_queue_is_most_recent_first() {
    let (app, state) = setup();

    let mut ids = Vec::new();
    for _ in 0..3 {
        let response = app.clone().oneshot(place_order_request()).await.unwrap();
        ids.push(body_json(response).await["id"].as_i64().unwrap());
    }

    let response = app
        .clone()
        .oneshot(get_request("/restaurants/42/pending"))
        .await
        .unwrap();
    let queue = body_json(response).await;
    let queued_ids: Vec<i64> = queue
        .as_array()
        .unwrap()
        .iter()
        .map(|order| order["id"].as_i64().unwrap())
        .collect();
    assert_eq!(queued_ids, vec![ids[2], ids[1], ids[0]]);

    // Restaurant accepts the middle order; the queue keeps its order.
    seed_profiles(&app).await;
    state
        .engine
        .restaurant_accept(&OrderRef {
            id: ids[1],
            restaurant_id: 42,
            user_id: 1,
        })
        .unwrap();

    let response = app
        .oneshot(get_request("/restaurants/42/pending"))
        .await
        .unwrap();
    let queue = body_json(response).await;
    let queued_ids: Vec<i64> = queue
        .as_array()
        .unwrap()
        .iter()
        .map(|order| order["id"].as_i64().unwrap())
        .collect();
    assert_eq!(queued_ids, vec![ids[2], ids[0]]);
}

#[tokio::test]
async fn get_nonexistent_order_returns_404() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/orders/999")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["reason"], "not_found");
}

#[tokio::test]
async fn create_restaurant_empty_name_returns_400() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/restaurants",
            json!({ "id": 42, "name": "  ", "location": { "lat": 0.0, "lng": 0.0 } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn availability_patch_for_unknown_courier_returns_404() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "PATCH",
            "/couriers/99/availability",
            json!({ "is_available": false }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn full_delivery_flow_over_http() {
    let (app, state) = setup();
    seed_profiles(&app).await;

    let response = app.clone().oneshot(place_order_request()).await.unwrap();
    let order_id = body_json(response).await["id"].as_i64().unwrap();

    // Restaurant accepts and the courier wins the offer; these arrive over
    // the socket channel in production.
    state
        .engine
        .restaurant_accept(&OrderRef {
            id: order_id,
            restaurant_id: 42,
            user_id: 1,
        })
        .unwrap();
    state
        .engine
        .delivery_accept(&DeliveryAccept {
            partner_id: 5,
            order_id,
        })
        .unwrap();
    state.engine.out_for_delivery(order_id).unwrap();

    let otp = state
        .engine
        .order(order_id)
        .unwrap()
        .unwrap()
        .verification_code
        .unwrap();

    // Wrong code first: rejected without mutating the order.
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/deliveries/complete",
            json!({ "order_id": order_id, "delivery_partner_id": 5, "otp": "00000000" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["reason"], "invalid_code");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/deliveries/complete",
            json!({ "order_id": order_id, "delivery_partner_id": 5, "otp": otp.clone() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Order delivered successfully");
    assert_eq!(body["order"]["delivery_status"], "delivered");
    assert_eq!(body["order"]["status"], "completed");

    // Retrying with the correct code reports the conflict.
    let response = app
        .oneshot(json_request(
            "POST",
            "/deliveries/complete",
            json!({ "order_id": order_id, "delivery_partner_id": 5, "otp": otp }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["reason"], "already_delivered");
}

#[tokio::test]
async fn completion_with_missing_otp_is_rejected() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/deliveries/complete",
            json!({ "order_id": 1, "delivery_partner_id": 5, "otp": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["reason"], "validation");
}
