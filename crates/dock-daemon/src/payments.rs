//! Payment provider seam.
//!
//! The daemon only creates customers and hosted sessions; subscription state
//! is written back by the provider out of band. `StripeProvider` talks to the
//! Stripe REST API with form-encoded requests.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Inputs for a subscription checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub org_id: i64,
    pub success_url: String,
    pub cancel_url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer for an organization and return its provider id.
    async fn create_customer(&self, org_id: i64, org_name: &str, email: &str) -> Result<String>;

    /// Create a hosted checkout session and return its URL.
    async fn create_checkout_session(&self, req: &CheckoutRequest) -> Result<String>;

    /// Create a billing portal session and return its URL.
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String>;
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct UrlResponse {
    url: String,
}

pub struct StripeProvider {
    http: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
}

impl StripeProvider {
    pub fn new(api_base: impl Into<String>, secret_key: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build payment http client")?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T> {
        let key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| anyhow!("stripe secret key is not configured"))?;
        let url = format!("{}{}", self.api_base, path);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(key)
            .form(form)
            .send()
            .await
            .with_context(|| format!("stripe request failed: {path}"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "stripe error {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            ));
        }
        resp.json()
            .await
            .with_context(|| format!("unreadable stripe response: {path}"))
    }
}

fn pair(k: &str, v: impl ToString) -> (String, String) {
    (k.to_string(), v.to_string())
}

/// Form fields for a subscription checkout session.
pub fn checkout_form(req: &CheckoutRequest) -> Vec<(String, String)> {
    vec![
        pair("mode", "subscription"),
        pair("customer", &req.customer_id),
        pair("line_items[0][price]", &req.price_id),
        pair("line_items[0][quantity]", 1),
        pair("success_url", &req.success_url),
        pair("cancel_url", &req.cancel_url),
        pair("allow_promotion_codes", true),
        pair("metadata[org_id]", req.org_id),
        pair("subscription_data[metadata][org_id]", req.org_id),
    ]
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    async fn create_customer(&self, org_id: i64, org_name: &str, email: &str) -> Result<String> {
        let form = vec![
            pair("name", org_name),
            pair("email", email),
            pair("metadata[org_id]", org_id),
        ];
        let created: IdResponse = self.post_form("/customers", &form).await?;
        tracing::info!(org_id, customer_id = %created.id, "stripe customer created");
        Ok(created.id)
    }

    async fn create_checkout_session(&self, req: &CheckoutRequest) -> Result<String> {
        let session: UrlResponse = self
            .post_form("/checkout/sessions", &checkout_form(req))
            .await?;
        Ok(session.url)
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String> {
        let form = vec![pair("customer", customer_id), pair("return_url", return_url)];
        let session: UrlResponse = self.post_form("/billing_portal/sessions", &form).await?;
        Ok(session.url)
    }
}
