//! Lead submission types
//!
//! `RawLead` is the untrusted inbound shape; `LeadSubmission` is the
//! validated, normalized record every downstream step operates on.
//! A `LeadSubmission` is never mutated after validation.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum length for the lead identifier.
pub const MAX_LEAD_ID_LEN: usize = 100;
/// Maximum length for the full name.
pub const MAX_FULL_NAME_LEN: usize = 100;
/// Maximum length for the phone field (raw, before digit extraction).
pub const MAX_PHONE_LEN: usize = 30;
/// Minimum number of digit characters required in the phone field.
pub const MIN_PHONE_DIGITS: usize = 8;
/// Maximum length for the optional email.
pub const MAX_EMAIL_LEN: usize = 200;
/// Maximum length for the category.
pub const MAX_CATEGORY_LEN: usize = 50;
/// Maximum length for the package/program identifier.
pub const MAX_PACKAGE_LEN: usize = 100;
/// Maximum length for the qualitative answer fields.
pub const MAX_ANSWER_LEN: usize = 120;

/// Raw inbound lead payload, before validation.
///
/// Everything is optional here; the validator decides what is required
/// and reports per-field violations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLead {
    pub lead_id: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub category: Option<String>,
    pub country: Option<String>,
    pub package: Option<String>,
    pub gender: Option<String>,
    pub age_group: Option<String>,
    pub specialization: Option<String>,
    pub social_familiarity: Option<String>,
    pub previous_training: Option<String>,
    pub awareness_level: Option<String>,
    pub best_contact_time: Option<String>,
}

/// A validated, normalized lead.
///
/// Immutable once produced by the validator; the store client, the
/// notification dispatcher and the payment-link job all read the same
/// value.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSubmission {
    pub lead_id: String,
    pub full_name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub category: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub gender: String,
    pub age_group: String,
    pub specialization: String,
    pub social_familiarity: String,
    pub previous_training: String,
    pub awareness_level: String,
    pub best_contact_time: String,
}

/// Generate a server-side lead identifier.
///
/// Epoch milliseconds plus a random alphanumeric suffix; unpredictable,
/// well under [`MAX_LEAD_ID_LEN`].
pub fn generate_lead_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("lead_{millis}_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_lead_id_is_bounded_and_unique() {
        let a = generate_lead_id();
        let b = generate_lead_id();
        assert!(a.len() <= MAX_LEAD_ID_LEN);
        assert!(a.starts_with("lead_"));
        assert_ne!(a, b);
    }

    #[test]
    fn raw_lead_accepts_camel_case_payload() {
        let raw: RawLead = serde_json::from_str(
            r#"{"fullName":"Amel","phone":"+216 55 123 456","ageGroup":"25-34"}"#,
        )
        .unwrap();
        assert_eq!(raw.full_name.as_deref(), Some("Amel"));
        assert_eq!(raw.age_group.as_deref(), Some("25-34"));
        assert!(raw.lead_id.is_none());
    }
}
