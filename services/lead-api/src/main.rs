//! Murshid Lead API
//!
//! Bilingual coaching-brand lead intake and payment orchestration service.
//!
//! ## Endpoints
//!
//! - `POST /api/submit-lead` - Validate and record a lead submission
//! - `POST /api/stripe/webhook` - Billing-provider webhook handler
//!
//! ## Health Endpoints
//!
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe
//! - `GET /metrics` - Prometheus metrics
//!
//! All collaborators (rate limiter, Lead Store client, payment-link
//! orchestrator, notification dispatcher, webhook reconciler) are
//! constructed here and injected; there are no ambient singletons.

mod config;
mod error;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use murshid_lead_core::stripe::StripeClient;
use murshid_lead_core::{
    AnalyticsSink, CatalogResolver, HttpLeadStore, JobQueue, LeadService, LogSink,
    NotificationDispatcher, PaymentLinkOrchestrator, RateLimiter, WebhookReconciler,
};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("lead_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Murshid Lead API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        payments_enabled = config.payments_enabled,
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Construct the pipeline
    let (state, worker) = build_state(config.clone());

    // Build HTTP router
    let app = build_router(state, metrics_handle);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    run_http_server(app, addr).await?;

    // Drain the payment-link worker before exiting; the queue sender was
    // dropped with the router, so the worker stops once it is empty.
    if let Some(worker) = worker {
        tracing::info!("Draining payment link jobs");
        if tokio::time::timeout(Duration::from_secs(30), worker)
            .await
            .is_err()
        {
            tracing::warn!("Payment link worker did not drain in time");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Construct every service object and wire them together.
fn build_state(config: Config) -> (AppState, Option<JoinHandle<()>>) {
    let analytics: Arc<dyn AnalyticsSink> = Arc::new(LogSink);

    let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
    let store = Arc::new(HttpLeadStore::new(config.store.clone()));
    let notifier = Arc::new(NotificationDispatcher::new(
        config.whatsapp.clone(),
        analytics.clone(),
    ));
    if !config.whatsapp.is_configured() {
        tracing::warn!("WhatsApp notifications unconfigured, operator alerts will be skipped");
    }

    // Payment machinery only exists when the feature is on and Stripe is
    // configured.
    let (jobs, worker, reconciler) = match (config.payments_enabled, &config.stripe) {
        (true, Some(stripe_config)) => {
            let stripe = StripeClient::new(stripe_config.secret_key.clone());
            let catalog = Arc::new(CatalogResolver::new(stripe.clone(), stripe_config.clone()));
            let orchestrator = Arc::new(PaymentLinkOrchestrator::new(
                stripe,
                catalog,
                store.clone(),
            ));
            let (jobs, worker) = JobQueue::spawn(config.job_queue_capacity, orchestrator);

            let reconciler = if stripe_config.webhook_secret.is_empty() {
                tracing::warn!("STRIPE_WEBHOOK_SECRET unset, webhook processing disabled");
                None
            } else {
                Some(WebhookReconciler::new(
                    stripe_config.webhook_secret.clone(),
                    store.clone(),
                    notifier.clone(),
                    analytics.clone(),
                ))
            };
            (Some(jobs), Some(worker), reconciler)
        }
        _ => {
            tracing::info!("Payments disabled, leads will be recorded without payment links");
            (None, None, None)
        }
    };

    let leads = LeadService::new(limiter, store, notifier, analytics, jobs.clone());
    let state = AppState::new(leads, reconciler, jobs, config);
    (state, worker)
}

fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // API routes; the webhook uses the raw body for signature
    // verification, so no JSON extractor layers apply
    let api = Router::new()
        .route("/api/submit-lead", post(handlers::submit_lead))
        .route("/api/stripe/webhook", post(handlers::stripe_webhook));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        // Request ID propagation (outermost)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        // Tracing with request details
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Request timeout (innermost - closest to handler)
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .merge(api)
        .layer(middleware)
        .merge(health_routes)
        .merge(metrics_route)
        .with_state(state)
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Submission latency is dominated by the Lead Store round trip
    let latency_buckets = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("lead_operation_duration_seconds".to_string()),
        latency_buckets,
    )?;

    let handle = builder.install_recorder()?;

    metrics::describe_counter!("leads_submitted_total", "Lead submissions by status");
    metrics::describe_counter!("lead_store_requests_total", "Lead Store calls by outcome");
    metrics::describe_counter!("webhooks_processed_total", "Webhook events by kind");
    metrics::describe_counter!("payment_links_created_total", "Payment links by outcome");
    metrics::describe_counter!("payment_link_jobs_enqueued_total", "Payment link jobs enqueued");
    metrics::describe_counter!("payment_link_jobs_dropped_total", "Payment link jobs dropped");
    metrics::describe_counter!("notifications_sent_total", "Operator notifications sent");
    metrics::describe_counter!("notifications_failed_total", "Operator notifications failed");
    metrics::describe_counter!("rate_limit_rejections_total", "Requests rejected by rate limit");
    metrics::describe_histogram!(
        "lead_operation_duration_seconds",
        "Lead operation latency in seconds"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
