//! Background payment-link jobs
//!
//! The payment-link step is detached from the HTTP response on purpose:
//! the submitter never waits on billing-provider latency. Rather than an
//! unawaited future, jobs go through a bounded queue drained by a single
//! worker task, which makes the "no caller to report to" contract explicit
//! and lets tests observe queue depth and completions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use murshid_types::LeadSubmission;

use crate::payment_link::PaymentLinkOrchestrator;

/// One queued payment-link job. Keyed by `{lead_id}:stripe` in logs.
#[derive(Debug, Clone)]
pub struct PaymentLinkJob {
    pub lead: LeadSubmission,
}

impl PaymentLinkJob {
    pub fn key(&self) -> String {
        format!("{}:stripe", self.lead.lead_id)
    }
}

/// Submission handle for the payment-link worker.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<PaymentLinkJob>,
    capacity: usize,
    completed: Arc<AtomicU64>,
}

impl JobQueue {
    /// Create the queue and spawn its worker task. The worker exits when
    /// every `JobQueue` handle has been dropped and the queue is drained.
    pub fn spawn(
        capacity: usize,
        orchestrator: Arc<PaymentLinkOrchestrator>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<PaymentLinkJob>(capacity);
        let completed = Arc::new(AtomicU64::new(0));

        let worker_completed = completed.clone();
        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let key = job.key();
                info!(job = %key, "Payment link job started");

                // All failure handling lives inside the orchestrator;
                // the job is terminal either way.
                let url = orchestrator.create_payment_link(&job.lead).await;
                info!(job = %key, created = url.is_some(), "Payment link job finished");

                worker_completed.fetch_add(1, Ordering::Relaxed);
            }
            info!("Payment link worker drained, shutting down");
        });

        (
            Self {
                tx,
                capacity,
                completed,
            },
            worker,
        )
    }

    /// Enqueue a job without waiting. Returns false when the queue is
    /// saturated; the lead stays valid and is recoverable by manual
    /// follow-up.
    pub fn enqueue(&self, lead: LeadSubmission) -> bool {
        let job = PaymentLinkJob { lead };
        let key = job.key();
        match self.tx.try_send(job) {
            Ok(()) => {
                metrics::counter!("payment_link_jobs_enqueued_total").increment(1);
                true
            }
            Err(e) => {
                warn!(job = %key, error = %e, "Payment link queue full, dropping job");
                metrics::counter!("payment_link_jobs_dropped_total").increment(1);
                false
            }
        }
    }

    /// Jobs currently queued.
    pub fn depth(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    /// Jobs the worker has finished (success or failure).
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("capacity", &self.capacity)
            .field("depth", &self.depth())
            .field("completed", &self.completed())
            .finish()
    }
}
