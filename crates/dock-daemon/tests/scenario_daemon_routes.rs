//! In-process scenarios for the daemon surface that never reaches the
//! database: health, token verification failures, and the error body shape.
//!
//! The router runs over a lazy pool pointed at an unreachable address, so any
//! request that got past authentication would fail with 500 instead.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use common::{app_state, call, lazy_pool, router, sign, token, token_config, FakePayments, Req};
use dock_config::AppConfig;

fn token_router() -> axum::Router {
    router(app_state(
        lazy_pool(),
        token_config(),
        Arc::new(FakePayments::default()),
    ))
}

fn assert_unauthenticated(status: StatusCode, body: &serde_json::Value) {
    assert_eq!(status, StatusCode::UNAUTHORIZED, "body: {body}");
    assert_eq!(body["error"], "unauthenticated");
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn health_is_public() {
    let (status, body) = call(token_router(), Req::new("GET", "/health").empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "dock-daemon");
}

#[tokio::test]
async fn missing_token_is_401() {
    let (status, body) = call(token_router(), Req::new("GET", "/api/vessels").empty()).await;
    assert_unauthenticated(status, &body);
    assert_eq!(body["detail"], "missing bearer token");
}

#[tokio::test]
async fn malformed_token_is_401() {
    let (status, body) = call(
        token_router(),
        Req::new("GET", "/api/me").bearer("not-a-jwt").empty(),
    )
    .await;
    assert_unauthenticated(status, &body);
}

#[tokio::test]
async fn signature_from_another_token_is_401() {
    let mine = token("user_one");
    let theirs = token("user_two");
    let m: Vec<&str> = mine.split('.').collect();
    let t: Vec<&str> = theirs.split('.').collect();
    let spliced = format!("{}.{}.{}", m[0], t[1], m[2]);

    let (status, body) = call(
        token_router(),
        Req::new("GET", "/api/me").bearer(&spliced).empty(),
    )
    .await;
    assert_unauthenticated(status, &body);
}

#[tokio::test]
async fn expired_token_is_401() {
    let expired = sign(
        serde_json::json!({
            "sub": "user_old",
            "iss": common::ISSUER,
            "exp": Utc::now().timestamp() - 3600,
        }),
        Some(common::KID),
    );
    let (status, body) = call(
        token_router(),
        Req::new("GET", "/api/me").bearer(&expired).empty(),
    )
    .await;
    assert_unauthenticated(status, &body);
}

#[tokio::test]
async fn wrong_issuer_is_401() {
    let foreign = sign(
        serde_json::json!({
            "sub": "user_elsewhere",
            "iss": "https://someone-else.test",
            "exp": Utc::now().timestamp() + 600,
        }),
        Some(common::KID),
    );
    let (status, body) = call(
        token_router(),
        Req::new("GET", "/api/me").bearer(&foreign).empty(),
    )
    .await;
    assert_unauthenticated(status, &body);
}

#[tokio::test]
async fn unknown_kid_falls_back_to_first_key() {
    // The fixture set has one key, so an unmatched kid still verifies. The
    // request then needs the database, which the lazy pool cannot reach.
    let t = sign(
        serde_json::json!({
            "sub": "user_rotated",
            "iss": common::ISSUER,
            "exp": Utc::now().timestamp() + 600,
        }),
        Some("rotated-away"),
    );
    let (status, body) = call(
        token_router(),
        Req::new("GET", "/api/me").bearer(&t).empty(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "body: {body}");
    assert_eq!(body["detail"], "internal server error");
}

#[tokio::test]
async fn no_verifier_and_no_bypass_rejects_everything() {
    let st = Arc::new(dock_daemon::state::AppState::new(
        lazy_pool(),
        AppConfig::default(),
        Arc::new(FakePayments::default()),
        dock_entitlement::PlanCatalog::new(),
    ));
    let (status, body) = call(
        router(st),
        Req::new("GET", "/api/vessels").bearer("anything").empty(),
    )
    .await;
    assert_unauthenticated(status, &body);
}
