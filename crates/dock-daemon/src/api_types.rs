//! Request and response types for dock-daemon endpoints that are not plain
//! repository rows. Rows from `dock_db` are serialized as-is.

use dock_db::users::{MembershipView, User};
use dock_reconcile::LineInput;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

// ---------------------------------------------------------------------------
// /health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// /api/me
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub memberships: Vec<MembershipView>,
}

// ---------------------------------------------------------------------------
// Inventory checks
// ---------------------------------------------------------------------------

/// Full desired line set for a check.
#[derive(Debug, Clone, Deserialize)]
pub struct LinesRequest {
    pub lines: Vec<LineInput>,
}

// ---------------------------------------------------------------------------
// Billing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct PlanQuery {
    pub plan: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlResponse {
    pub url: String,
}
