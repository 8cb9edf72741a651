//! Lead pipeline configuration

use std::collections::HashMap;
use std::time::Duration;

/// Lead Store (spreadsheet-backed CRM) configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Endpoint URL (`GOOGLE_SCRIPT_URL`)
    pub endpoint: String,
    /// Shared secret sent with every operation
    pub secret: String,
    /// Per-attempt abort timeout
    pub timeout: Duration,
    /// Maximum attempts for transient transport failures
    pub max_attempts: u32,
    /// First backoff delay, doubled each attempt
    pub base_backoff: Duration,
}

impl StoreConfig {
    pub fn new(endpoint: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            secret: secret.into(),
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, base_backoff: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.base_backoff = base_backoff;
        self
    }
}

/// Stripe configuration.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// API secret key
    pub secret_key: String,
    /// Webhook signing secret; empty disables webhook processing
    pub webhook_secret: String,
    /// Direct program-id to price-id map, checked before catalog search
    pub price_map: HashMap<String, String>,
    /// `metadata['brand']` tag identifying this brand's catalog products
    pub brand_tag: String,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            price_map: HashMap::new(),
            brand_tag: "murshid".to_string(),
        }
    }

    pub fn with_price(mut self, program_id: impl Into<String>, price_id: impl Into<String>) -> Self {
        self.price_map.insert(program_id.into(), price_id.into());
        self
    }

    pub fn with_brand_tag(mut self, tag: impl Into<String>) -> Self {
        self.brand_tag = tag.into();
        self
    }

    /// Direct price lookup for a program id.
    pub fn get_price_id(&self, program_id: &str) -> Option<&str> {
        self.price_map.get(program_id).map(String::as_str)
    }
}

/// One WhatsApp template: name, language code, and the ordered parameter
/// names the template body expects.
#[derive(Debug, Clone)]
pub struct TemplateConfig {
    pub name: String,
    pub language: String,
    pub params: Vec<String>,
}

/// WhatsApp Business API configuration.
///
/// Any of these may be absent; the dispatcher degrades to a silent skip
/// rather than failing the calling flow.
#[derive(Debug, Clone, Default)]
pub struct WhatsAppConfig {
    pub access_token: String,
    pub phone_number_id: String,
    /// Operator recipients (admin + manager phone numbers)
    pub recipients: Vec<String>,
    /// Template for "new lead" notifications; plain text when absent
    pub lead_template: Option<TemplateConfig>,
    /// Template for "payment received" notifications; plain text when absent
    pub payment_template: Option<TemplateConfig>,
}

impl WhatsAppConfig {
    /// Whether enough configuration is present to attempt delivery.
    pub fn is_configured(&self) -> bool {
        !self.access_token.is_empty()
            && !self.phone_number_id.is_empty()
            && !self.recipients.is_empty()
    }
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per key per window
    pub max_requests: u32,
    /// Fixed window duration
    pub window: Duration,
    /// Upstash-style Redis REST endpoint; in-memory fallback when absent
    pub redis_rest_url: Option<String>,
    /// Bearer token for the Redis REST endpoint
    pub redis_rest_token: Option<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 15,
            window: Duration::from_secs(3600),
            redis_rest_url: None,
            redis_rest_token: None,
        }
    }
}
