//! HTTP 层集成测试：路由、身份头、响应封装与 CSV 表头

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use canteen_server::db::models::DailySlot;
use canteen_server::{ServerState, api};

const EXPORT_HEADER: &str = "Timestamp,Slot Name,Slot Time,Active Bookings,Total Capacity,Occupancy Rate (%),Active Tokens,Avg Wait Time (min),Crowd Level";

async fn test_app() -> (tempfile::TempDir, Router, ServerState) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config = common::test_config();
    config.work_dir = tmp.path().to_string_lossy().into_owned();
    let state = ServerState::initialize(&config).await.expect("state");
    let app = api::build_app(state.clone());
    (tmp, app, state)
}

fn student(req: http::request::Builder, id: &str) -> http::request::Builder {
    req.header("x-user-id", id).header("x-user-role", "student")
}

fn staff(req: http::request::Builder, id: &str) -> http::request::Builder {
    req.header("x-user-id", id).header("x-user-role", "staff")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

async fn create_booking(app: &Router, slot: &DailySlot, user: &str) -> Value {
    let body = json!({
        "slotId": slot.id.clone().unwrap().to_string(),
        "items": [{"menuItemId": "menu:rice", "quantity": 1}],
    });
    let response = app
        .clone()
        .oneshot(
            student(Request::builder().method("POST").uri("/bookings"), user)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
async fn health_needs_no_identity() {
    let (_tmp, app, _state) = test_app().await;
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn missing_identity_headers_yield_401() {
    let (_tmp, app, _state) = test_app().await;
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/bookings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["code"], "E3001");
}

#[tokio::test]
async fn staff_routes_reject_students() {
    let (_tmp, app, _state) = test_app().await;
    let response = app
        .oneshot(
            student(Request::builder().method("GET").uri("/alerts"), "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn booking_response_uses_wire_field_names() {
    let (_tmp, app, state) = test_app().await;
    let slot = common::seed_open_slot(&state.db, "Lunch", 10).await;

    let body = create_booking(&app, &slot, "alice").await;
    assert_eq!(body["code"], "E0000");
    let data = &body["data"];
    assert_eq!(data["tokenNumber"], "L001");
    assert_eq!(data["queuePosition"], 1);
    assert!(data["estimatedWaitTime"].as_i64().unwrap() >= 1);
    assert_eq!(data["status"], "pending");
    assert_eq!(data["items"][0]["menuItemId"], "menu:rice");
}

#[tokio::test]
async fn cancel_enforces_ownership_and_state() {
    let (_tmp, app, state) = test_app().await;
    let slot = common::seed_open_slot(&state.db, "Lunch", 10).await;
    let body = create_booking(&app, &slot, "alice").await;
    let booking_id = body["data"]["id"].as_str().unwrap().to_string();

    // 非本人 → 403
    let response = app
        .clone()
        .oneshot(
            student(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/bookings/{booking_id}")),
                "mallory",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // 员工叫号后预约进入 serving，取消 → 400 E0104
    let slot_id = slot.id.clone().unwrap().to_string();
    let response = app
        .clone()
        .oneshot(
            staff(
                Request::builder()
                    .method("POST")
                    .uri(format!("/staff/call-next/{slot_id}")),
                "staff-1",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            student(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/bookings/{booking_id}")),
                "alice",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "E0104");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("serving"), "message should carry current state: {message}");
}

#[tokio::test]
async fn call_next_on_empty_queue_is_404() {
    let (_tmp, app, state) = test_app().await;
    let slot = common::seed_open_slot(&state.db, "Dinner", 10).await;
    let slot_id = slot.id.unwrap().to_string();

    let response = app
        .oneshot(
            staff(
                Request::builder()
                    .method("POST")
                    .uri(format!("/staff/call-next/{slot_id}")),
                "staff-1",
            )
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_emits_exact_csv_header() {
    let (_tmp, app, _state) = test_app().await;
    let response = app
        .oneshot(
            staff(Request::builder().method("GET").uri("/crowd/export"), "staff-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert_eq!(text.lines().next().unwrap(), EXPORT_HEADER);
}

#[tokio::test]
async fn slots_today_lazily_allocates_from_templates() {
    let (_tmp, app, state) = test_app().await;

    // 无模板 → 400
    let response = app
        .clone()
        .oneshot(
            student(Request::builder().method("GET").uri("/slots/today"), "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // 员工建模板
    let body = json!({"name": "Lunch", "start": "00:00", "end": "23:59", "capacity": 30});
    let response = app
        .clone()
        .oneshot(
            staff(Request::builder().method("POST").uri("/slots/templates"), "admin-1")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(
            student(Request::builder().method("GET").uri("/slots/today"), "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let slots = body["data"].as_array().unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0]["name"], "Lunch");
    assert_eq!(slots[0]["available"], 30);
    assert_eq!(slots[0]["level"], "low");

    // 幂等：仍然只有一个档位
    let response = app
        .oneshot(
            student(Request::builder().method("GET").uri("/slots/today"), "alice")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    drop(state);
}
