use common_http_errors::ApiError;

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

#[tokio::test]
async fn api_error_missing_role_shape() {
    let err = ApiError::ForbiddenMissingRole { role: "admin", trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let code_header = resp.headers().get("X-Error-Code").unwrap();
    assert_eq!(code_header, "missing_role");
    let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("\"code\":\"missing_role\""), "body={}", body);
    assert!(body.contains("admin"), "expected missing role name in body: {}", body);
}

#[tokio::test]
async fn api_error_bad_request_shape() {
    let err = ApiError::BadRequest {
        code: "credit_requires_customer",
        trace_id: None,
        message: Some("Credit sales need a registered customer".into()),
    };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "credit_requires_customer");
    let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("\"code\":\"credit_requires_customer\""));
}

#[tokio::test]
async fn api_error_bad_gateway_shape() {
    let err = ApiError::gateway_unavailable("connection refused");
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "gateway_unavailable");
    let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("\"code\":\"gateway_unavailable\""));
    assert!(body.contains("connection refused"));
}

#[tokio::test]
async fn persistence_failure_carries_order_id() {
    let order_id = Uuid::new_v4();
    let err = ApiError::persistence(Some(order_id), "order_items insert failed");
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "persistence_failure");
    let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains(&order_id.to_string()), "body={}", body);
}

#[tokio::test]
async fn api_error_not_found_shape() {
    let err = ApiError::NotFound { code: "order_not_found", trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "order_not_found");
    let bytes = to_bytes(resp.into_body(), 1024).await.unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(body.contains("\"code\":\"order_not_found\""));
}
