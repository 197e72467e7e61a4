//! Spreadsheet uploads. Rows commit independently; the report lists what was
//! created and which rows failed.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use dock_db::imports;
use dock_import::{parse_upload, Table};

use super::ApiPath;
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const UPLOAD_FIELD: &str = "file";

async fn read_upload(mut mp: Multipart) -> ApiResult<Table> {
    while let Some(field) = mp.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        return Ok(parse_upload(&filename, &bytes)?);
    }
    Err(ApiError::validation(format!(
        "multipart field '{UPLOAD_FIELD}' is required"
    )))
}

pub(crate) async fn vessels(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    mp: Multipart,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let table = read_upload(mp).await?;
    let mut tx = st.pool.begin().await?;
    let report = imports::import_vessels(&mut tx, ctx.org_id, &table, Utc::now()).await?;
    tx.commit().await?;
    Ok(Json(report))
}

pub(crate) async fn requirements(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
    mp: Multipart,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let table = read_upload(mp).await?;
    let mut tx = st.pool.begin().await?;
    let report = imports::import_requirements(&mut tx, ctx.org_id, vessel_id, &table).await?;
    tx.commit().await?;
    Ok(Json(report))
}

pub(crate) async fn tasks(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    ApiPath(vessel_id): ApiPath<i64>,
    mp: Multipart,
) -> ApiResult<impl IntoResponse> {
    ctx.require_manage()?;
    let table = read_upload(mp).await?;
    let mut tx = st.pool.begin().await?;
    let report =
        imports::import_tasks(&mut tx, ctx.org_id, vessel_id, &table, Utc::now()).await?;
    tx.commit().await?;
    Ok(Json(report))
}
