//! Bearer-token authentication and tenant resolution.
//!
//! Tokens are RS256 JWTs checked against the provider's JWKS. The key set is
//! fetched on first use and kept until a fetch or key match fails; there is no
//! TTL. With no JWKS URL and `auth.dev_bypass` set, every request runs as the
//! fixed development identity.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use dock_config::AuthConfig;
use dock_db::users::{self, Identity, Role, User};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const ORG_HEADER: &str = "x-org-id";

/// Process-wide cache of the provider's verification keys.
#[derive(Clone)]
pub struct JwksCache {
    url: Option<String>,
    client: reqwest::Client,
    keys: Arc<RwLock<Option<Arc<JwkSet>>>>,
}

impl JwksCache {
    pub fn new(url: Option<String>) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
            keys: Arc::new(RwLock::new(None)),
        }
    }

    /// A cache that starts populated. The URL, if any, is only used after
    /// [`invalidate`](Self::invalidate).
    pub fn preloaded(url: Option<String>, keys: JwkSet) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
            keys: Arc::new(RwLock::new(Some(Arc::new(keys)))),
        }
    }

    pub async fn get(&self) -> anyhow::Result<Arc<JwkSet>> {
        if let Some(keys) = self.keys.read().await.as_ref() {
            return Ok(Arc::clone(keys));
        }

        let mut slot = self.keys.write().await;
        if let Some(keys) = slot.as_ref() {
            return Ok(Arc::clone(keys));
        }
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no JWKS URL configured"))?;
        let fetched: JwkSet = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        tracing::info!(keys = fetched.keys.len(), "jwks fetched");
        let fetched = Arc::new(fetched);
        *slot = Some(Arc::clone(&fetched));
        Ok(fetched)
    }

    pub async fn invalidate(&self) {
        *self.keys.write().await = None;
    }
}

/// Key with a matching `kid`, else the first key of the set.
pub fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    kid.and_then(|kid| keys.find(kid))
        .or_else(|| keys.keys.first())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

fn validation_for(cfg: &AuthConfig) -> Validation {
    let mut v = Validation::new(Algorithm::RS256);
    match &cfg.audience {
        Some(aud) => v.set_audience(&[aud]),
        None => v.validate_aud = false,
    }
    if let Some(iss) = &cfg.issuer {
        v.set_issuer(&[iss]);
    }
    v
}

/// Verify a bearer token and return the identity it asserts.
pub async fn verify_token(token: &str, cfg: &AuthConfig, jwks: &JwksCache) -> ApiResult<Identity> {
    let header =
        decode_header(token).map_err(|e| ApiError::unauthenticated(format!("malformed token: {e}")))?;

    let keys = match jwks.get().await {
        Ok(k) => k,
        Err(e) => {
            tracing::warn!(error = %e, "jwks fetch failed");
            jwks.invalidate().await;
            return Err(ApiError::unauthenticated("Unable to fetch JWKS"));
        }
    };

    let kid = header.kid.as_deref();
    if kid.is_some_and(|k| keys.find(k).is_none()) {
        // Keys may have rotated; refetch on the next request.
        jwks.invalidate().await;
    }
    let Some(jwk) = select_key(&keys, kid) else {
        jwks.invalidate().await;
        return Err(ApiError::unauthenticated("Invalid token key"));
    };

    let key = DecodingKey::from_jwk(jwk)
        .map_err(|e| ApiError::unauthenticated(format!("unusable token key: {e}")))?;
    let data = decode::<Claims>(token, &key, &validation_for(cfg))
        .map_err(|e| ApiError::unauthenticated(format!("invalid token: {e}")))?;

    Ok(Identity {
        provider: cfg.provider.clone(),
        subject: data.claims.sub,
        email: data.claims.email,
        name: data.claims.name,
    })
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

async fn identity_from_headers(headers: &HeaderMap, st: &AppState) -> ApiResult<Identity> {
    if st.config.auth.bypass_active() {
        tracing::warn!("auth dev bypass active; request runs as the development user");
        return Ok(dock_db::seed::dev_identity());
    }
    let token =
        bearer(headers).ok_or_else(|| ApiError::unauthenticated("missing bearer token"))?;
    verify_token(token, &st.config.auth, &st.jwks).await
}

/// Parse `X-Org-Id`. Absent means "pick the default membership".
pub fn requested_org(headers: &HeaderMap) -> ApiResult<Option<i64>> {
    match headers.get(ORG_HEADER) {
        None => Ok(None),
        Some(v) => v
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(Some)
            .ok_or_else(|| ApiError::validation("X-Org-Id must be an integer")),
    }
}

/// The authenticated user, without tenant resolution.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, st: &Arc<AppState>) -> ApiResult<Self> {
        let identity = identity_from_headers(&parts.headers, st).await?;
        let mut conn = st.pool.acquire().await?;
        let user = users::upsert_user(&mut conn, &identity).await?;
        Ok(CurrentUser(user))
    }
}

/// The authenticated user acting within one organization.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub org_id: i64,
    pub role: Role,
}

impl AuthContext {
    pub fn require_manage(&self) -> ApiResult<()> {
        if self.role.can_manage() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }

    pub fn require_admin(&self) -> ApiResult<()> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("ADMIN role required"))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, st: &Arc<AppState>) -> ApiResult<Self> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, st).await?;
        let wanted = requested_org(&parts.headers)?;

        let mut conn = st.pool.acquire().await?;
        let membership = users::resolve_membership(&mut conn, user.id, wanted)
            .await?
            .ok_or_else(|| ApiError::forbidden("No active membership for the requested organization"))?;
        if !membership.org_is_active {
            return Err(ApiError::forbidden("Organization is inactive"));
        }

        Ok(AuthContext {
            user,
            org_id: membership.org_id,
            role: membership.role,
        })
    }
}
