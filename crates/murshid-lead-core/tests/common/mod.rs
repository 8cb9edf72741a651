//! Shared test doubles for the lead pipeline tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use murshid_lead_core::error::LeadError;
use murshid_lead_core::store::{CreateLeadOutcome, LeadStore, PaidDetails};
use murshid_lead_core::{MemorySink, NotificationDispatcher, WhatsAppConfig};
use murshid_types::{LeadSubmission, RawLead};

/// In-memory Lead Store double. Enforces uniqueness on (email, phone)
/// like the real spreadsheet backend, and records every call.
#[derive(Default)]
pub struct MockLeadStore {
    created: Mutex<Vec<LeadSubmission>>,
    identities: Mutex<HashSet<(String, String)>>,
    attach_calls: Mutex<Vec<(String, String)>>,
    mark_paid_calls: Mutex<Vec<String>>,
}

impl MockLeadStore {
    pub async fn created_count(&self) -> usize {
        self.created.lock().await.len()
    }

    pub async fn attach_calls(&self) -> Vec<(String, String)> {
        self.attach_calls.lock().await.clone()
    }

    pub async fn mark_paid_calls(&self) -> Vec<String> {
        self.mark_paid_calls.lock().await.clone()
    }
}

#[async_trait]
impl LeadStore for MockLeadStore {
    async fn create_lead(&self, lead: &LeadSubmission) -> Result<CreateLeadOutcome, LeadError> {
        let identity = (
            lead.email.clone().unwrap_or_default(),
            lead.phone.clone(),
        );
        let mut identities = self.identities.lock().await;
        if !identities.insert(identity) {
            return Ok(CreateLeadOutcome { duplicate: true });
        }
        self.created.lock().await.push(lead.clone());
        Ok(CreateLeadOutcome { duplicate: false })
    }

    async fn attach_payment_link(&self, lead_id: &str, url: &str) -> Result<(), LeadError> {
        self.attach_calls
            .lock()
            .await
            .push((lead_id.to_string(), url.to_string()));
        Ok(())
    }

    async fn mark_paid(&self, lead_id: &str, _details: &PaidDetails) -> Result<(), LeadError> {
        self.mark_paid_calls.lock().await.push(lead_id.to_string());
        Ok(())
    }
}

/// Dispatcher with no credentials: every notify call is a silent skip.
pub fn silent_notifier(analytics: Arc<MemorySink>) -> Arc<NotificationDispatcher> {
    Arc::new(NotificationDispatcher::new(
        WhatsAppConfig::default(),
        analytics,
    ))
}

/// A fully valid raw lead for the given country/package.
pub fn raw_lead(country: &str, package: Option<&str>, phone: &str) -> RawLead {
    RawLead {
        lead_id: None,
        full_name: Some("Amel Ben Salah".into()),
        phone: Some(phone.into()),
        email: Some(format!("amel+{phone}@example.com")),
        category: Some("individuals".into()),
        country: Some(country.into()),
        package: package.map(Into::into),
        gender: Some("female".into()),
        age_group: Some("25-34".into()),
        specialization: Some("marketing".into()),
        social_familiarity: Some("daily".into()),
        previous_training: Some("none".into()),
        awareness_level: Some("high".into()),
        best_contact_time: Some("evening".into()),
    }
}
