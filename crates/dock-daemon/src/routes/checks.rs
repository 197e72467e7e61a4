//! Inventory checks. Any active member may run them.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use dock_db::checks::{self, NewCheck};

use super::{ApiJson, ApiPath, OptionalJson};
use crate::api_types::LinesRequest;
use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::state::AppState;

pub(crate) async fn list(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let mut conn = st.pool.acquire().await?;
    Ok(Json(checks::list_checks(&mut conn, ctx.org_id, vessel_id).await?))
}

pub(crate) async fn create(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
    OptionalJson(body): OptionalJson<NewCheck>,
) -> ApiResult<impl IntoResponse> {
    let body = body.unwrap_or_default();
    let mut tx = st.pool.begin().await?;
    let check = checks::create_check(&mut tx, ctx.org_id, vessel_id, ctx.user.id, &body).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(check)))
}

pub(crate) async fn get_one(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let mut conn = st.pool.acquire().await?;
    Ok(Json(checks::get_check(&mut conn, ctx.org_id, id).await?))
}

/// Reconcile the check's lines to exactly the submitted set.
pub(crate) async fn replace_lines(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<LinesRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut tx = st.pool.begin().await?;
    let (check, writes) = checks::replace_lines(&mut tx, ctx.org_id, id, &body.lines).await?;
    tx.commit().await?;
    tracing::debug!(check_id = id, writes = writes.total(), "lines request done");
    Ok(Json(check))
}

pub(crate) async fn submit(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let mut tx = st.pool.begin().await?;
    let check = checks::submit_check(&mut tx, ctx.org_id, id).await?;
    tx.commit().await?;
    Ok(Json(check))
}
