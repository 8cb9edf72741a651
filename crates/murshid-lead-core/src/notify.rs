//! Operator notifications over WhatsApp
//!
//! Fans out "new lead" and "payment received" messages to the configured
//! operator numbers through the WhatsApp Business (Graph) API. Degrades to
//! a silent skip when unconfigured, and one recipient's failure never
//! blocks another's.

use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use murshid_types::LeadSubmission;

use crate::analytics::AnalyticsSink;
use crate::config::{TemplateConfig, WhatsAppConfig};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v20.0";

/// Currencies whose minor unit equals the major unit.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga", "pyg", "rwf", "ugx", "vnd", "vuv",
    "xaf", "xof", "xpf",
];

/// Context for a "payment received" notification.
#[derive(Debug, Clone)]
pub struct PaymentNotification {
    pub customer_name: String,
    pub amount_minor: i64,
    pub currency: String,
    pub package: Option<String>,
}

/// WhatsApp notification dispatcher.
pub struct NotificationDispatcher {
    client: Client,
    base_url: String,
    config: WhatsAppConfig,
    analytics: Arc<dyn AnalyticsSink>,
}

impl NotificationDispatcher {
    pub fn new(config: WhatsAppConfig, analytics: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            client: Client::new(),
            base_url: GRAPH_API_BASE.to_string(),
            config,
            analytics,
        }
    }

    /// Point the dispatcher at a different Graph API base URL. For tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Notify operators about a new lead. Never fails the calling flow.
    pub async fn notify_lead(&self, lead: &LeadSubmission) {
        if !self.config.is_configured() {
            debug!("WhatsApp not configured, skipping lead notification");
            return;
        }

        let message = match &self.config.lead_template {
            Some(template) => {
                template_message(template, |param| resolve_lead_param(param, lead))
            }
            None => text_message(&format!(
                "New lead: {} ({}) from {} — category {}, package {}",
                lead.full_name,
                lead.phone,
                lead.country,
                lead.category,
                lead.package.as_deref().unwrap_or("-"),
            )),
        };

        self.fan_out("lead", message).await;
    }

    /// Notify operators that a payment completed. Never fails the calling
    /// flow.
    pub async fn notify_payment(&self, payment: &PaymentNotification) {
        if !self.config.is_configured() {
            debug!("WhatsApp not configured, skipping payment notification");
            return;
        }

        let (display, raw) = format_amount(payment.amount_minor, &payment.currency);
        let message = match &self.config.payment_template {
            Some(template) => template_message(template, |param| {
                resolve_payment_param(param, payment, &display, &raw)
            }),
            None => text_message(&format!(
                "Payment received: {display} from {} for {}",
                payment.customer_name,
                payment.package.as_deref().unwrap_or("-"),
            )),
        };

        self.fan_out("payment", message).await;
    }

    /// Deliver one message body to every recipient, independently.
    async fn fan_out(&self, kind: &'static str, message: Value) {
        let url = format!("{}/{}/messages", self.base_url, self.config.phone_number_id);

        for recipient in &self.config.recipients {
            let mut payload = message.clone();
            payload["to"] = json!(recipient);

            let result = self
                .client
                .post(&url)
                .bearer_auth(&self.config.access_token)
                .json(&payload)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    info!(kind, recipient = %recipient, "WhatsApp notification sent");
                    metrics::counter!("notifications_sent_total", "kind" => kind).increment(1);
                    self.analytics
                        .track("whatsapp_sent", json!({ "kind": kind }))
                        .await;
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    warn!(kind, recipient = %recipient, %status, body = %body,
                        "WhatsApp notification rejected");
                    metrics::counter!("notifications_failed_total", "kind" => kind).increment(1);
                    self.analytics
                        .track("whatsapp_failed", json!({ "kind": kind, "status": status.as_u16() }))
                        .await;
                }
                Err(e) => {
                    error!(kind, recipient = %recipient, error = %e,
                        "WhatsApp notification failed");
                    metrics::counter!("notifications_failed_total", "kind" => kind).increment(1);
                    self.analytics
                        .track("whatsapp_failed", json!({ "kind": kind }))
                        .await;
                }
            }
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("configured", &self.config.is_configured())
            .field("recipients", &self.config.recipients.len())
            .finish_non_exhaustive()
    }
}

/// Templated message body. The template's parameter order comes from
/// configuration; each name is resolved through the kind's alias table.
fn template_message(template: &TemplateConfig, resolve: impl Fn(&str) -> String) -> Value {
    let parameters: Vec<Value> = template
        .params
        .iter()
        .map(|param| json!({ "type": "text", "text": resolve(param) }))
        .collect();

    json!({
        "messaging_product": "whatsapp",
        "type": "template",
        "template": {
            "name": template.name,
            "language": { "code": template.language },
            "components": [{ "type": "body", "parameters": parameters }],
        },
    })
}

/// Plain-text fallback body.
fn text_message(body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "type": "text",
        "text": { "body": body },
    })
}

/// Alias table for lead-notification template parameters.
fn resolve_lead_param(param: &str, lead: &LeadSubmission) -> String {
    match param.trim().to_lowercase().as_str() {
        "fullname" | "name" => lead.full_name.clone(),
        "phone" => lead.phone.clone(),
        "email" => lead.email.clone().unwrap_or_else(|| "-".into()),
        "country" => lead.country.clone(),
        "category" => lead.category.clone(),
        "package" | "program" => lead.package.clone().unwrap_or_else(|| "-".into()),
        "besttime" | "bestcontacttime" => lead.best_contact_time.clone(),
        "leadid" => lead.lead_id.clone(),
        other => {
            warn!(param = other, "Unknown lead template parameter");
            "-".into()
        }
    }
}

/// Alias table for payment-notification template parameters.
fn resolve_payment_param(
    param: &str,
    payment: &PaymentNotification,
    display_amount: &str,
    raw_amount: &str,
) -> String {
    match param.trim().to_lowercase().as_str() {
        "fullname" | "name" => payment.customer_name.clone(),
        "amount" => display_amount.to_string(),
        "rawamount" | "amount_raw" => raw_amount.to_string(),
        "currency" => payment.currency.to_uppercase(),
        "package" | "program" => payment.package.clone().unwrap_or_else(|| "-".into()),
        other => {
            warn!(param = other, "Unknown payment template parameter");
            "-".into()
        }
    }
}

/// Standard fraction digits for a currency's minor unit.
fn fraction_digits(currency: &str) -> u32 {
    if ZERO_DECIMAL_CURRENCIES.contains(&currency.to_lowercase().as_str()) {
        0
    } else {
        2
    }
}

/// Convert a minor-unit amount to `(display, raw)` major-unit strings,
/// e.g. `("1,234.50 EUR", "1234.50")`.
pub fn format_amount(amount_minor: i64, currency: &str) -> (String, String) {
    let digits = fraction_digits(currency);
    let raw = if digits == 0 {
        amount_minor.to_string()
    } else {
        let divisor = 10i64.pow(digits);
        let major = amount_minor / divisor;
        let minor = (amount_minor % divisor).abs();
        format!("{major}.{minor:0width$}", width = digits as usize)
    };

    let display = format!("{} {}", group_thousands(&raw), currency.to_uppercase());
    (display, raw)
}

/// Insert thousands separators into the integer part of a decimal string.
fn group_thousands(raw: &str) -> String {
    let (int_part, frac_part) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw, None),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", int_part),
    };

    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match frac_part {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_decimal_currency_formatting() {
        let (display, raw) = format_amount(123_450, "eur");
        assert_eq!(raw, "1234.50");
        assert_eq!(display, "1,234.50 EUR");
    }

    #[test]
    fn zero_decimal_currency_formatting() {
        let (display, raw) = format_amount(5000, "jpy");
        assert_eq!(raw, "5000");
        assert_eq!(display, "5,000 JPY");
    }

    #[test]
    fn small_amounts_keep_leading_zero_cents() {
        let (_, raw) = format_amount(105, "usd");
        assert_eq!(raw, "1.05");
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands("1234567.89"), "1,234,567.89");
        assert_eq!(group_thousands("999"), "999");
        assert_eq!(group_thousands("-12000"), "-12,000");
    }

    #[test]
    fn unknown_template_param_resolves_to_placeholder() {
        let payment = PaymentNotification {
            customer_name: "Amel".into(),
            amount_minor: 9900,
            currency: "eur".into(),
            package: None,
        };
        assert_eq!(resolve_payment_param("bogus", &payment, "99.00 EUR", "99.00"), "-");
        assert_eq!(resolve_payment_param("amount", &payment, "99.00 EUR", "99.00"), "99.00 EUR");
    }
}
