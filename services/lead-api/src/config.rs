//! Configuration for the Lead API service.

use std::time::Duration;

use murshid_lead_core::{RateLimitConfig, StoreConfig, StripeConfig, TemplateConfig, WhatsAppConfig};

/// Lead API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
    /// Payments feature flag; off disables payment links and webhooks
    pub payments_enabled: bool,
    /// Payment-link job queue capacity
    pub job_queue_capacity: usize,
    /// Lead Store configuration
    pub store: StoreConfig,
    /// Stripe configuration; present only when payments are enabled
    pub stripe: Option<StripeConfig>,
    /// WhatsApp notification configuration
    pub whatsapp: WhatsAppConfig,
    /// Rate limiter configuration
    pub rate_limit: RateLimitConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Lead Store: the primary flow's hard requirement
        let store_url = std::env::var("GOOGLE_SCRIPT_URL")
            .map_err(|_| ConfigError::Missing("GOOGLE_SCRIPT_URL"))?;
        let store_secret = std::env::var("GOOGLE_SCRIPT_SECRET")
            .map_err(|_| ConfigError::Missing("GOOGLE_SCRIPT_SECRET"))?;
        let store = StoreConfig::new(store_url, store_secret);

        // Server
        let http_port = std::env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECS"))?;

        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let job_queue_capacity = std::env::var("JOB_QUEUE_CAPACITY")
            .unwrap_or_else(|_| "64".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("JOB_QUEUE_CAPACITY"))?;

        // Payments: the flag is on by default but Stripe credentials are
        // a secondary channel, so their absence disables rather than fails
        let payments_flag = std::env::var("PAYMENTS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let stripe = match std::env::var("STRIPE_SECRET_KEY") {
            Ok(secret_key) if payments_flag && !secret_key.is_empty() => {
                let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default();
                let mut config = StripeConfig::new(secret_key, webhook_secret).with_brand_tag(
                    std::env::var("STRIPE_BRAND_TAG").unwrap_or_else(|_| "murshid".to_string()),
                );
                for (program_id, price_id) in
                    parse_price_map(&std::env::var("STRIPE_PRICE_MAP").unwrap_or_default())
                {
                    config = config.with_price(program_id, price_id);
                }
                Some(config)
            }
            _ => None,
        };
        let payments_enabled = payments_flag && stripe.is_some();

        let whatsapp = whatsapp_from_env();
        let rate_limit = rate_limit_from_env()?;

        Ok(Self {
            http_port,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
            payments_enabled,
            job_queue_capacity,
            store,
            stripe,
            whatsapp,
            rate_limit,
        })
    }
}

/// Parse `program_a=price_123,program_b=price_456`.
fn parse_price_map(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| {
            let (program, price) = pair.split_once('=')?;
            let program = program.trim();
            let price = price.trim();
            (!program.is_empty() && !price.is_empty())
                .then(|| (program.to_string(), price.to_string()))
        })
        .collect()
}

fn whatsapp_from_env() -> WhatsAppConfig {
    let recipients = ["WHATSAPP_ADMIN_PHONE", "WHATSAPP_MANAGER_PHONE"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .filter(|v| !v.is_empty())
        .collect();

    WhatsAppConfig {
        access_token: std::env::var("WHATSAPP_ACCESS_TOKEN").unwrap_or_default(),
        phone_number_id: std::env::var("WHATSAPP_PHONE_NUMBER_ID").unwrap_or_default(),
        recipients,
        lead_template: template_from_env(
            "WHATSAPP_TEMPLATE_NAME",
            "WHATSAPP_TEMPLATE_LANGUAGE",
            "WHATSAPP_TEMPLATE_PARAMS",
        ),
        payment_template: template_from_env(
            "WHATSAPP_PAYMENT_TEMPLATE_NAME",
            "WHATSAPP_PAYMENT_TEMPLATE_LANGUAGE",
            "WHATSAPP_PAYMENT_TEMPLATE_PARAMS",
        ),
    }
}

/// A template needs at least a name; language defaults to Arabic and the
/// parameter order comes from a comma-separated list.
fn template_from_env(name_var: &str, language_var: &str, params_var: &str) -> Option<TemplateConfig> {
    let name = std::env::var(name_var).ok().filter(|n| !n.is_empty())?;
    let language = std::env::var(language_var).unwrap_or_else(|_| "ar".to_string());
    let params = std::env::var(params_var)
        .unwrap_or_default()
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    Some(TemplateConfig {
        name,
        language,
        params,
    })
}

fn rate_limit_from_env() -> Result<RateLimitConfig, ConfigError> {
    let max_requests = std::env::var("RATE_LIMIT_MAX")
        .unwrap_or_else(|_| "15".to_string())
        .parse()
        .map_err(|_| ConfigError::Invalid("RATE_LIMIT_MAX"))?;
    let window_secs: u64 = std::env::var("RATE_LIMIT_WINDOW_SECS")
        .unwrap_or_else(|_| "3600".to_string())
        .parse()
        .map_err(|_| ConfigError::Invalid("RATE_LIMIT_WINDOW_SECS"))?;

    // Either naming convention works for the remote backend.
    let redis_rest_url = std::env::var("RATE_LIMIT_REDIS_REST_URL")
        .or_else(|_| std::env::var("UPSTASH_REDIS_REST_URL"))
        .ok();
    let redis_rest_token = std::env::var("RATE_LIMIT_REDIS_REST_TOKEN")
        .or_else(|_| std::env::var("UPSTASH_REDIS_REST_TOKEN"))
        .ok();

    Ok(RateLimitConfig {
        max_requests,
        window: Duration::from_secs(window_secs),
        redis_rest_url,
        redis_rest_token,
    })
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_map_parsing_skips_malformed_pairs() {
        let pairs = parse_price_map("program_a=price_1, program_b = price_2 ,broken,=x,y=");
        assert_eq!(
            pairs,
            vec![
                ("program_a".to_string(), "price_1".to_string()),
                ("program_b".to_string(), "price_2".to_string()),
            ]
        );
        assert!(parse_price_map("").is_empty());
    }
}
