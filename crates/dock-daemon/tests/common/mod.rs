//! In-process harness for the daemon scenarios: a router over a real or lazy
//! pool, RS256 tokens signed with the fixture key, and a recording payment
//! provider.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use dock_config::AppConfig;
use dock_daemon::auth::JwksCache;
use dock_daemon::payments::{CheckoutRequest, PaymentProvider};
use dock_daemon::{routes, state::AppState};
use dock_entitlement::{Plan, PlanCatalog};
use http_body_util::BodyExt;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

pub const KID: &str = "scenario-key";
pub const ISSUER: &str = "https://auth.scenario.test";
const PRIVATE_PEM: &[u8] = include_bytes!("../fixtures/test_rsa.pem");
const JWKS_JSON: &str = include_str!("../fixtures/test_jwks.json");

static SEQ: AtomicU64 = AtomicU64::new(0);

pub fn unique(prefix: &str) -> String {
    let n = SEQ.fetch_add(1, Ordering::Relaxed);
    let ts = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}-{ts}-{n}")
}

/// Pool that never connects unless a handler reaches the database.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(std::time::Duration::from_millis(200))
        .connect_lazy("postgres://nobody@127.0.0.1:1/none")
        .expect("lazy pool")
}

/// `None` when DOCK_DATABASE_URL is unset; the caller skips.
pub async fn db_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var(dock_db::ENV_DB_URL) else {
        eprintln!("SKIP: DOCK_DATABASE_URL not set");
        return None;
    };
    let pool = dock_db::connect(&url, 4).await.expect("connect");
    dock_db::migrate(&pool).await.expect("migrate");
    Some(pool)
}

#[derive(Default)]
pub struct FakePayments {
    pub calls: Mutex<Vec<String>>,
}

impl FakePayments {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_customer(
        &self,
        org_id: i64,
        _org_name: &str,
        _email: &str,
    ) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(format!("customer:{org_id}"));
        Ok(format!("cus_{org_id}"))
    }

    async fn create_checkout_session(&self, req: &CheckoutRequest) -> anyhow::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("checkout:{}:{}", req.customer_id, req.price_id));
        Ok(format!("https://pay.test/checkout/{}", req.org_id))
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> anyhow::Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("portal:{customer_id}:{return_url}"));
        Ok("https://pay.test/portal".to_string())
    }
}

/// Config that requires tokens from the fixture key. The JWKS URL points
/// nowhere; the cache is preloaded instead.
pub fn token_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.jwks_url = Some("http://127.0.0.1:1/.well-known/jwks.json".to_string());
    cfg.auth.issuer = Some(ISSUER.to_string());
    cfg.billing.web_base_url = "https://app.scenario.test/".to_string();
    cfg
}

pub fn app_state(pool: PgPool, cfg: AppConfig, payments: Arc<FakePayments>) -> Arc<AppState> {
    let plans = PlanCatalog::new().with_price(Plan::Standard, "price_standard");
    let mut st = AppState::new(pool, cfg.clone(), payments, plans);
    let keys: JwkSet = serde_json::from_str(JWKS_JSON).expect("fixture jwks");
    st.jwks = JwksCache::preloaded(cfg.auth.jwks_url.clone(), keys);
    Arc::new(st)
}

pub fn router(st: Arc<AppState>) -> axum::Router {
    routes::build_router(st)
}

pub fn sign(claims: serde_json::Value, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(PRIVATE_PEM).expect("fixture key");
    encode(&header, &claims, &key).expect("sign")
}

/// Valid token for `sub`.
pub fn token(sub: &str) -> String {
    sign(
        serde_json::json!({
            "sub": sub,
            "email": format!("{sub}@scenario.test"),
            "name": "Scenario User",
            "iss": ISSUER,
            "exp": Utc::now().timestamp() + 600,
        }),
        Some(KID),
    )
}

pub struct Req {
    builder: axum::http::request::Builder,
}

impl Req {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            builder: Request::builder().method(method).uri(uri),
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.builder = self
            .builder
            .header("authorization", format!("Bearer {token}"));
        self
    }

    pub fn org(mut self, org_id: impl ToString) -> Self {
        self.builder = self.builder.header("x-org-id", org_id.to_string());
        self
    }

    pub fn empty(self) -> Request<Body> {
        self.builder.body(Body::empty()).unwrap()
    }

    pub fn json(self, v: serde_json::Value) -> Request<Body> {
        self.builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap()
    }

    pub fn csv(self, filename: &str, content: &str) -> Request<Body> {
        self.file(filename, "text/csv", content.as_bytes())
    }

    /// Multipart upload of `bytes` in the `file` field.
    pub fn file(self, filename: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "dockscenarioboundary";
        let mut body = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        self.builder
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }
}

/// Drive the router with a single request and return (status, json body).
pub async fn call(router: axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let bytes = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is not valid JSON")
    };
    (status, json)
}
