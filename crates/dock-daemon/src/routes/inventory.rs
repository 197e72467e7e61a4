//! Inventory requirements and groups.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use dock_db::groups::{self, GroupPatch, NewGroup, ReorderGroups};
use dock_db::requirements::{self, NewRequirement, RequirementPatch};

use super::{ApiJson, ApiPath};
use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::state::AppState;

pub(crate) async fn list_requirements(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let mut conn = st.pool.acquire().await?;
    Ok(Json(
        requirements::list_requirements(&mut conn, ctx.org_id, vessel_id).await?,
    ))
}

pub(crate) async fn create_requirement(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
    ApiJson(body): ApiJson<NewRequirement>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    let req = requirements::create_requirement(&mut tx, ctx.org_id, vessel_id, &body).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(req)))
}

pub(crate) async fn update_requirement(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<RequirementPatch>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    let req = requirements::update_requirement(&mut tx, ctx.org_id, id, &body).await?;
    tx.commit().await?;
    Ok(Json(req))
}

pub(crate) async fn delete_requirement(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    requirements::delete_requirement(&mut tx, ctx.org_id, id).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_groups(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let mut conn = st.pool.acquire().await?;
    Ok(Json(groups::list_groups(&mut conn, ctx.org_id, vessel_id).await?))
}

pub(crate) async fn create_group(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
    ApiJson(body): ApiJson<NewGroup>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    let group = groups::create_group(&mut tx, ctx.org_id, vessel_id, &body).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Returns the groups in their new order.
pub(crate) async fn reorder_groups(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
    ApiJson(body): ApiJson<ReorderGroups>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    groups::reorder_groups(&mut tx, ctx.org_id, vessel_id, &body.group_ids).await?;
    let ordered = groups::list_groups(&mut tx, ctx.org_id, vessel_id).await?;
    tx.commit().await?;
    Ok(Json(ordered))
}

pub(crate) async fn update_group(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<GroupPatch>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    let group = groups::update_group(&mut tx, ctx.org_id, id, &body).await?;
    tx.commit().await?;
    Ok(Json(group))
}

pub(crate) async fn delete_group(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    groups::delete_group(&mut tx, ctx.org_id, id).await?;
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
