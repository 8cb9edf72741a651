//! End-to-end submission pipeline
//!
//! Exercises `LeadService::submit` against the mock Lead Store and a
//! wiremock Stripe: eligibility routing, duplicate short-circuit, rate
//! limiting, and the detached payment-link job.

mod common;

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{raw_lead, silent_notifier, MockLeadStore};
use murshid_lead_core::error::LeadError;
use murshid_lead_core::stripe::StripeClient;
use murshid_lead_core::{
    CatalogResolver, JobQueue, LeadService, MemorySink, PaymentLinkOrchestrator, RateLimitConfig,
    RateLimiter, StripeConfig,
};

struct Pipeline {
    service: LeadService,
    store: Arc<MockLeadStore>,
    analytics: Arc<MemorySink>,
    jobs: JobQueue,
}

/// Wire the full pipeline against a wiremock Stripe.
async fn pipeline(stripe_server: &MockServer, max_requests: u32) -> Pipeline {
    let store = Arc::new(MockLeadStore::default());
    let analytics = Arc::new(MemorySink::default());

    let stripe = StripeClient::new("sk_test_123").with_base_url(stripe_server.uri());
    let catalog = Arc::new(CatalogResolver::new(
        stripe.clone(),
        StripeConfig::new("sk_test_123", "whsec_test").with_brand_tag("murshid"),
    ));
    let orchestrator = Arc::new(PaymentLinkOrchestrator::new(
        stripe,
        catalog,
        store.clone(),
    ));
    let (jobs, _worker) = JobQueue::spawn(8, orchestrator);

    let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
        max_requests,
        window: Duration::from_secs(3600),
        redis_rest_url: None,
        redis_rest_token: None,
    }));

    let service = LeadService::new(
        limiter,
        store.clone(),
        silent_notifier(analytics.clone()),
        analytics.clone(),
        Some(jobs.clone()),
    );

    Pipeline {
        service,
        store,
        analytics,
        jobs,
    }
}

/// Mount a one-program catalog plus a payment-link endpoint.
async fn mount_stripe_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/products/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": [{
                "id": "prod_1",
                "name": "Breakthrough Program",
                "active": true,
                "default_price": "price_1",
                "metadata": {
                    "brand": "murshid",
                    "program_id": "program_breakthrough",
                    "sessions": "8",
                    "duration": "8 weeks"
                }
            }],
            "has_more": false
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/prices/price_1$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "price_1",
            "active": true,
            "unit_amount": 49900,
            "currency": "eur"
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/payment_links"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "plink_1",
            "url": "https://buy.stripe.com/test_plink_1"
        })))
        .mount(server)
        .await;
}

/// Poll until the worker has finished `n` jobs.
async fn wait_for_jobs(jobs: &JobQueue, n: u64) {
    for _ in 0..100 {
        if jobs.completed() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("worker did not finish {n} job(s), completed={}", jobs.completed());
}

#[tokio::test]
async fn paid_country_submission_spawns_a_payment_link_job() {
    let stripe = MockServer::start().await;
    mount_stripe_catalog(&stripe).await;
    let p = pipeline(&stripe, 15).await;

    let outcome = p
        .service
        .submit(
            raw_lead("France", Some("program_breakthrough"), "+33 6 12 34 56 78"),
            "203.0.113.9",
        )
        .await
        .unwrap();

    assert!(!outcome.duplicate);
    assert!(outcome.payment_link_pending);
    assert_eq!(p.store.created_count().await, 1);

    wait_for_jobs(&p.jobs, 1).await;

    // The background job resolved the catalog and wrote the link back.
    let attaches = p.store.attach_calls().await;
    assert_eq!(attaches.len(), 1);
    assert_eq!(attaches[0].0, outcome.lead_id);
    assert_eq!(attaches[0].1, "https://buy.stripe.com/test_plink_1");
}

#[tokio::test]
async fn exempt_country_submission_spawns_no_job() {
    let stripe = MockServer::start().await;
    // No catalog mounted: any Stripe call would 404 and fail the test
    // through the attach assertion below.
    let p = pipeline(&stripe, 15).await;

    let outcome = p
        .service
        .submit(raw_lead("Tunisia", None, "+216 55 123 456"), "203.0.113.9")
        .await
        .unwrap();

    assert!(!outcome.payment_link_pending);
    assert_eq!(p.store.created_count().await, 1);
    assert_eq!(p.jobs.depth(), 0);
    assert_eq!(p.jobs.completed(), 0);
    assert!(p.store.attach_calls().await.is_empty());
}

#[tokio::test]
async fn duplicate_submission_skips_all_side_effects() {
    let stripe = MockServer::start().await;
    mount_stripe_catalog(&stripe).await;
    let p = pipeline(&stripe, 15).await;

    let raw = raw_lead("France", Some("program_breakthrough"), "+33 6 12 34 56 78");
    let first = p.service.submit(raw.clone(), "203.0.113.9").await.unwrap();
    assert!(!first.duplicate);
    wait_for_jobs(&p.jobs, 1).await;

    let second = p.service.submit(raw, "203.0.113.9").await.unwrap();
    assert!(second.duplicate);
    assert!(!second.payment_link_pending);

    // Store saw one creation; no second job, no second analytics event.
    assert_eq!(p.store.created_count().await, 1);
    assert_eq!(p.jobs.completed(), 1);
    assert_eq!(p.analytics.count("lead_submitted").await, 1);
}

#[tokio::test]
async fn over_limit_requests_are_rejected() {
    let stripe = MockServer::start().await;
    let p = pipeline(&stripe, 3).await;

    for i in 0..3 {
        let raw = raw_lead("Tunisia", None, &format!("+216 55 123 45{i}"));
        p.service.submit(raw, "198.51.100.7").await.unwrap();
    }

    let err = p
        .service
        .submit(raw_lead("Tunisia", None, "+216 55 123 459"), "198.51.100.7")
        .await
        .unwrap_err();
    assert!(matches!(err, LeadError::RateLimited));
    assert_eq!(p.store.created_count().await, 3);
}

#[tokio::test]
async fn validation_failure_reports_field_paths() {
    let stripe = MockServer::start().await;
    let p = pipeline(&stripe, 15).await;

    let mut raw = raw_lead("France", None, "+33 6 12 34 56 78");
    raw.phone = Some("12345".into());
    let err = p.service.submit(raw, "203.0.113.9").await.unwrap_err();

    let LeadError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert!(errors.iter().any(|e| e.field == "phone"));
    assert_eq!(p.store.created_count().await, 0);
}

#[tokio::test]
async fn paid_lead_without_package_skips_the_job_but_succeeds() {
    let stripe = MockServer::start().await;
    let p = pipeline(&stripe, 15).await;

    let outcome = p
        .service
        .submit(raw_lead("France", None, "+33 6 12 34 56 78"), "203.0.113.9")
        .await
        .unwrap();

    assert!(!outcome.duplicate);
    assert!(!outcome.payment_link_pending);
    assert_eq!(p.store.created_count().await, 1);
    assert_eq!(p.jobs.completed(), 0);
}
