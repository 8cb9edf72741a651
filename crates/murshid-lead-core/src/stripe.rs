//! Stripe REST client
//!
//! Thin form-encoded client over the Stripe API: payment links, product
//! search, and price lookup. Only what the catalog resolver and the
//! payment-link orchestrator need.

use std::collections::HashMap;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error};

use crate::error::LeadError;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe API client
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    base_url: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            secret_key: secret_key.into(),
            base_url: STRIPE_API_BASE.to_string(),
        }
    }

    /// Point the client at a different base URL. For tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Make an authenticated request to Stripe.
    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        form: Option<&[(String, String)]>,
        query: Option<&[(&str, &str)]>,
    ) -> Result<T, LeadError> {
        let url = format!("{}{endpoint}", self.base_url);

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.secret_key, Option::<&str>::None);

        if let Some(form_data) = form {
            request = request.form(form_data);
        }
        if let Some(query_params) = query {
            request = request.query(query_params);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Stripe API request failed");
            LeadError::Provider(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Stripe API error");
            return Err(LeadError::Provider(format!("Stripe API error: {status}")));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Stripe response");
            LeadError::Internal(e.to_string())
        })
    }

    /// Search active products carrying a brand tag in their metadata.
    pub async fn search_products(&self, brand_tag: &str) -> Result<Vec<StripeProduct>, LeadError> {
        let query = format!("active:'true' AND metadata['brand']:'{brand_tag}'");
        debug!(query = %query, "Searching Stripe products");

        let list: StripeSearchList<StripeProduct> = self
            .request(
                reqwest::Method::GET,
                "/products/search",
                None,
                Some(&[("query", query.as_str()), ("limit", "100")]),
            )
            .await?;
        Ok(list.data)
    }

    /// List active prices for a product (most recent first).
    pub async fn list_prices(&self, product_id: &str) -> Result<Vec<StripePrice>, LeadError> {
        let list: StripeList<StripePrice> = self
            .request(
                reqwest::Method::GET,
                "/prices",
                None,
                Some(&[("product", product_id), ("active", "true"), ("limit", "10")]),
            )
            .await?;
        Ok(list.data)
    }

    /// Fetch one price by id.
    pub async fn get_price(&self, price_id: &str) -> Result<StripePrice, LeadError> {
        self.request(
            reqwest::Method::GET,
            &format!("/prices/{price_id}"),
            None,
            None,
        )
        .await
    }

    /// Create a hosted payment link for a price, with metadata attached to
    /// both the link and its payment intent for webhook reconciliation.
    pub async fn create_payment_link(
        &self,
        price_id: &str,
        metadata: &[(String, String)],
    ) -> Result<StripePaymentLink, LeadError> {
        let mut form: Vec<(String, String)> = vec![
            ("line_items[0][price]".to_string(), price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
            form.push((
                format!("payment_intent_data[metadata][{key}]"),
                value.clone(),
            ));
        }

        self.request(reqwest::Method::POST, "/payment_links", Some(&form), None)
            .await
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

// Stripe API response types

/// Stripe product
#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub active: bool,
    /// Default price id, when set on the product
    pub default_price: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe price
#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    #[serde(default)]
    pub active: bool,
    /// Amount in the currency's minor unit
    pub unit_amount: Option<i64>,
    pub currency: String,
}

/// Stripe payment link
#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentLink {
    pub id: String,
    pub url: String,
}

/// Stripe list response
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

/// Stripe search list response
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSearchList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}
