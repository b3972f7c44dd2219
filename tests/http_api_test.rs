mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["details"]["database"]["status"], "up");
}

#[tokio::test]
async fn inventory_flow_over_http() {
    let app = TestApp::new().await;

    let (status, org) = app
        .request(
            Method::POST,
            "/api/v1/organizations",
            Some(json!({ "name": "Harbor Grill", "code": "HARBOR" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let org_id = org["data"]["id"].as_str().expect("org id").to_string();

    let (status, product) = app
        .request(
            Method::POST,
            &format!("/api/v1/organizations/{org_id}/products"),
            Some(json!({ "name": "Salmon fillet", "code": "SALMON", "category": "seafood" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = product["data"]["id"].as_str().expect("product id").to_string();

    let (status, created) = app
        .request(
            Method::POST,
            &format!("/api/v1/organizations/{org_id}/inventory"),
            Some(json!({
                "product_id": product_id,
                "initial_stock": "8",
                "reorder_point": "3",
                "reorder_quantity": "10",
                "max_stock_level": "20",
                "unit_cost": "12.50",
                "category": "seafood"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["success"], true);
    assert_eq!(created["data"]["outcome"], "created");
    let item_id = created["data"]["value"]["id"].as_str().expect("item id").to_string();
    assert_eq!(created["data"]["value"]["status"], "good");

    let (status, update) = app
        .request(
            Method::POST,
            &format!("/api/v1/organizations/{org_id}/inventory/{item_id}/stock"),
            Some(json!({ "quantity": "6", "transaction_type": "usage", "reason": "Dinner service" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{update}");
    assert_eq!(update["data"]["status"], "low");

    let (status, short) = app
        .request(
            Method::POST,
            &format!("/api/v1/organizations/{org_id}/inventory/order-fulfillment"),
            Some(json!({
                "order_id": "ORD-77",
                "items": [{ "product_id": product_id, "quantity": "5" }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(short["success"], false);
    assert_eq!(short["error"], "Insufficient stock");
    assert_eq!(short["data"]["outcome"], "insufficient_stock");
    assert_eq!(short["data"]["lines"].as_array().map(Vec::len), Some(1));

    let (status, alerts) = app
        .request(
            Method::GET,
            &format!("/api/v1/organizations/{org_id}/inventory/alerts"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts["data"][0]["inventory_item_id"], item_id.as_str());

    let (status, report) = app
        .request(
            Method::GET,
            &format!("/api/v1/organizations/{org_id}/inventory/{item_id}/reconcile"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["data"]["consistent"], true);
}

#[tokio::test]
async fn staff_clock_cycle_over_http() {
    let app = TestApp::new().await;
    let scope = app.organization("CAFE").await;
    let org_id = scope.organization_id();

    let (status, created) = app
        .request(
            Method::POST,
            &format!("/api/v1/organizations/{org_id}/staff"),
            Some(json!({
                "first_name": "Noor",
                "last_name": "Haddad",
                "email": "noor@cafe.example",
                "role": "employee",
                "department": "Front of house",
                "hourly_rate": "16"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let staff_id = created["data"]["value"]["id"].as_str().expect("staff id").to_string();
    assert_eq!(created["data"]["value"]["employee_id"], "EMP-0001");

    let clock_uri = format!("/api/v1/organizations/{org_id}/staff/{staff_id}/clock");
    let (status, _) = app
        .request(
            Method::POST,
            &clock_uri,
            Some(json!({ "action": "clock_in", "occurred_at": "2024-05-01T10:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, conflict) = app
        .request(Method::POST, &clock_uri, Some(json!({ "action": "clock_in" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(conflict["success"], false);

    let (status, out) = app
        .request(
            Method::POST,
            &clock_uri,
            Some(json!({ "action": "clock_out", "occurred_at": "2024-05-01T13:30:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["data"]["status"], "completed");
    let hours: Decimal = out["data"]["total_hours"]
        .as_str()
        .expect("decimal string")
        .parse()
        .expect("decimal");
    assert_eq!(hours, dec!(3.5));
}

#[tokio::test]
async fn unknown_organization_is_not_found() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/organizations/{}/inventory", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "Not Found");
}

#[tokio::test]
async fn invalid_payload_is_a_bad_request() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/organizations",
            Some(json!({ "name": "", "code": "X" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
