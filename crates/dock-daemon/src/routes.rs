//! Axum router for dock-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers so tests can drive the bare router. Handlers live in the
//! submodules, one per resource family.

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts, Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use axum::{async_trait, Json, Router};
use dock_db::users::{self, MemberPatch};
use serde::de::DeserializeOwned;

use crate::api_types::{HealthResponse, MeResponse};
use crate::auth::{AuthContext, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

mod billing;
mod checks;
mod imports;
mod inventory;
mod maintenance;
mod vessels;

/// JSON body extractor whose rejections use the daemon's error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejections use the daemon's error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// JSON body that may be omitted. A request without a body reads as `None`;
/// a body that is sent must parse as it would for [`ApiJson`].
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !sends_body(req.headers()) {
            return Ok(Self(None));
        }
        let ApiJson(value) = ApiJson::<T>::from_request(req, state).await?;
        Ok(Self(Some(value)))
    }
}

fn sends_body(headers: &HeaderMap) -> bool {
    let length = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    match length {
        Some(n) => n > 0,
        None => headers.contains_key(CONTENT_TYPE) || headers.contains_key(TRANSFER_ENCODING),
    }
}

/// Build the complete application router wired to the given shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/me", get(me))
        .route("/api/org/members", get(list_members))
        .route("/api/org/members/:user_id", patch(update_member))
        // vessels
        .route(
            "/api/vessels",
            get(vessels::list).post(vessels::create),
        )
        .route(
            "/api/vessels/:id",
            get(vessels::get_one)
                .patch(vessels::update)
                .delete(vessels::remove),
        )
        // inventory requirements and groups
        .route(
            "/api/vessels/:id/inventory/requirements",
            get(inventory::list_requirements).post(inventory::create_requirement),
        )
        .route(
            "/api/inventory/requirements/:id",
            patch(inventory::update_requirement).delete(inventory::delete_requirement),
        )
        .route(
            "/api/vessels/:id/inventory/groups",
            get(inventory::list_groups).post(inventory::create_group),
        )
        .route(
            "/api/vessels/:id/inventory/groups/reorder",
            put(inventory::reorder_groups),
        )
        .route(
            "/api/inventory/groups/:id",
            patch(inventory::update_group).delete(inventory::delete_group),
        )
        // inventory checks
        .route(
            "/api/vessels/:id/inventory/checks",
            get(checks::list).post(checks::create),
        )
        .route("/api/inventory/checks/:id", get(checks::get_one))
        .route("/api/inventory/checks/:id/lines", put(checks::replace_lines))
        .route("/api/inventory/checks/:id/submit", post(checks::submit))
        // maintenance
        .route(
            "/api/vessels/:id/maintenance/tasks",
            get(maintenance::list).post(maintenance::create),
        )
        .route(
            "/api/maintenance/tasks/:id/complete",
            post(maintenance::complete),
        )
        // billing
        .route("/api/billing/status", get(billing::status))
        .route("/api/billing/checkout-session", post(billing::checkout))
        .route("/api/billing/portal", post(billing::portal))
        // bulk import
        .route("/api/import/vessels", post(imports::vessels))
        .route(
            "/api/import/vessels/:id/inventory-requirements",
            post(imports::requirements),
        )
        .route(
            "/api/import/vessels/:id/maintenance-tasks",
            post(imports::tasks),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// /api/me and membership administration
// ---------------------------------------------------------------------------

pub(crate) async fn me(
    State(st): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<MeResponse>> {
    let mut conn = st.pool.acquire().await?;
    let memberships = users::list_memberships_for_user(&mut conn, user.id).await?;
    Ok(Json(MeResponse { user, memberships }))
}

pub(crate) async fn list_members(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
) -> ApiResult<impl IntoResponse> {
    let mut conn = st.pool.acquire().await?;
    Ok(Json(users::list_members(&mut conn, ctx.org_id).await?))
}

pub(crate) async fn update_member(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(body): ApiJson<MemberPatch>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_admin()?;
    let mut tx = st.pool.begin().await?;
    let member = users::update_member(&mut tx, ctx.org_id, user_id, &body).await?;
    tx.commit().await?;
    tracing::info!(org_id = ctx.org_id, user_id, by = ctx.user.id, "membership updated");
    Ok(Json(member))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http;
    use http_body_util::BodyExt;
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Default, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Note {
        #[serde(default)]
        text: Option<String>,
    }

    fn extractor_router() -> Router {
        Router::new()
            .route(
                "/items/:id",
                get(|ApiPath(id): ApiPath<i64>| async move { id.to_string() }),
            )
            .route(
                "/notes",
                post(|OptionalJson(note): OptionalJson<Note>| async move {
                    match note {
                        None => "none".to_string(),
                        Some(n) => n.text.unwrap_or_default(),
                    }
                }),
            )
    }

    async fn send(req: Request) -> (StatusCode, String) {
        let resp = extractor_router().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn post_notes(content_type: Option<&str>, body: &'static str) -> Request {
        let mut b = http::Request::builder().method("POST").uri("/notes");
        if let Some(ct) = content_type {
            b = b.header(CONTENT_TYPE, ct);
        }
        b.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn non_numeric_path_id_uses_error_body() {
        let req = http::Request::builder().uri("/items/abc").body(Body::empty()).unwrap();
        let (status, body) = send(req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["error"], "validation_failed");
        assert!(v["detail"].as_str().unwrap().contains("abc"));

        let req = http::Request::builder().uri("/items/42").body(Body::empty()).unwrap();
        assert_eq!(send(req).await, (StatusCode::OK, "42".to_string()));
    }

    #[tokio::test]
    async fn optional_body_absent_reads_as_none() {
        let (status, body) = send(post_notes(None, "")).await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "none"));

        let req = http::Request::builder()
            .method("POST")
            .uri("/notes")
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, "0")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(req).await.1, "none");
    }

    #[tokio::test]
    async fn optional_body_present_must_parse() {
        let json = Some("application/json");
        let (status, body) = send(post_notes(json, r#"{"text":"hi"}"#)).await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "hi"));

        for bad in [r#"{"text":"hi","extra":1}"#, "{not json", r#"{"text":5}"#] {
            let (status, body) = send(post_notes(json, bad)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{bad}");
            let v: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(v["error"], "validation_failed");
        }

        let (status, _) = send(post_notes(Some("text/plain"), r#"{"text":"hi"}"#)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
