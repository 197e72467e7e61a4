//! Billing endpoints. All require ADMIN.

use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use dock_db::{billing, orgs};
use dock_entitlement::Plan;

use crate::api_types::{PlanQuery, UrlResponse};
use crate::auth::AuthContext;
use crate::error::{ApiError, ApiResult};
use crate::payments::CheckoutRequest;
use crate::state::AppState;

pub(crate) async fn status(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
) -> ApiResult<impl IntoResponse> {
    ctx.require_admin()?;
    let mut conn = st.pool.acquire().await?;
    Ok(Json(
        billing::billing_status(&mut conn, ctx.org_id, Utc::now()).await?,
    ))
}

pub(crate) async fn checkout(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
    Query(q): Query<PlanQuery>,
) -> ApiResult<Json<UrlResponse>> {
    ctx.require_admin()?;
    let raw = q
        .plan
        .ok_or_else(|| ApiError::validation("query parameter 'plan' is required"))?;
    let plan = Plan::parse(&raw).map_err(|e| ApiError::validation(e.to_string()))?;
    let price_id = st
        .plans
        .price_id(plan)
        .ok_or_else(|| anyhow!("no price configured for plan '{}'", plan.as_str()))?
        .to_string();

    let mut conn = st.pool.acquire().await?;
    let org = orgs::fetch_org(&mut conn, ctx.org_id).await?;
    let customer_id = match org.stripe_customer_id {
        Some(id) => id,
        None => {
            let id = st
                .payments
                .create_customer(org.id, &org.name, &ctx.user.email)
                .await?;
            orgs::set_stripe_customer(&mut conn, org.id, &id).await?;
            id
        }
    };

    let web = st.config.web_base();
    let url = st
        .payments
        .create_checkout_session(&CheckoutRequest {
            customer_id,
            price_id,
            org_id: org.id,
            success_url: format!("{web}/settings/billing?success=1"),
            cancel_url: format!("{web}/settings/billing?canceled=1"),
        })
        .await?;
    tracing::info!(org_id = org.id, plan = plan.as_str(), "checkout session created");
    Ok(Json(UrlResponse { url }))
}

pub(crate) async fn portal(
    State(st): State<Arc<AppState>>,
    ctx: AuthContext,
) -> ApiResult<Json<UrlResponse>> {
    ctx.require_admin()?;
    let mut conn = st.pool.acquire().await?;
    let org = orgs::fetch_org(&mut conn, ctx.org_id).await?;
    let customer_id = org.stripe_customer_id.ok_or_else(|| {
        ApiError::validation("No Stripe customer found. Please subscribe first.")
    })?;
    let return_url = format!("{}/settings/billing", st.config.web_base());
    let url = st
        .payments
        .create_portal_session(&customer_id, &return_url)
        .await?;
    Ok(Json(UrlResponse { url }))
}
