use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use dock_db::maintenance::{self, CompleteTask, NewMaintenanceTask};

use super::{ApiJson, ApiPath, OptionalJson};
use crate::auth::AuthContext;
use crate::error::ApiResult;
use crate::state::AppState;

pub(crate) async fn list(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    let mut conn = st.pool.acquire().await?;
    Ok(Json(
        maintenance::list_tasks(&mut conn, ctx.org_id, vessel_id).await?,
    ))
}

pub(crate) async fn create(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
    ApiJson(body): ApiJson<NewMaintenanceTask>,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let mut tx = st.pool.begin().await?;
    let task = maintenance::create_task(&mut tx, ctx.org_id, vessel_id, &body, Utc::now()).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Any active member may log a completion. The body is optional and defaults
/// `performed_at` to now.
pub(crate) async fn complete(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(id): ApiPath<i64>,
    OptionalJson(body): OptionalJson<CompleteTask>,
) -> ApiResult<impl IntoResponse> {
    let body = body.unwrap_or_default();
    let mut tx = st.pool.begin().await?;
    let done =
        maintenance::complete_task(&mut tx, ctx.org_id, id, ctx.user.id, &body, Utc::now()).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(done)))
}
