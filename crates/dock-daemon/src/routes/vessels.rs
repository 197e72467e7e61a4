use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use dock_db::vessels::{self, NewVessel, VesselPatch};

use super::{ApiJson, ApiPath};
use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::state::AppState;

pub(crate) async fn list(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
) -> ApiResult<impl IntoResponse> {
    let mut conn = st.pool.acquire().await?;
    Ok(Json(vessels::list_vessels(&mut conn, ctx.org_id).await?))
}

/// Entitlement-gated: 402 when the organization is inactive or at its limit.
pub(crate) async fn create(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiJson(body): ApiJson<NewVessel>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    let vessel = vessels::create_vessel(&mut tx, ctx.org_id, &body, Utc::now()).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(vessel)))
}

pub(crate) async fn get_one(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let mut conn = st.pool.acquire().await?;
    Ok(Json(vessels::fetch_vessel(&mut conn, ctx.org_id, id).await?))
}

pub(crate) async fn update(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<VesselPatch>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    let vessel = vessels::update_vessel(&mut tx, ctx.org_id, id, &body).await?;
    tx.commit().await?;
    Ok(Json(vessel))
}

pub(crate) async fn remove(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    vessels::delete_vessel(&mut tx, ctx.org_id, id).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
