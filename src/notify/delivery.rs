//! Background email delivery pool.
//!
//! Jobs are accepted through a bounded queue without blocking the caller
//! and drained by a fixed number of worker tasks. Each job is attempted up
//! to `max_attempts` times with exponential backoff on transient failures,
//! then sent once more as plain text before being counted as failed.
//! Outcomes are never reported back to the enqueuing request; they are
//! logged and tallied in [`DeliveryStats`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};

use crate::config::DeliveryConfig;
use crate::{AppError, Result};

use super::transport::{EmailTransport, OutgoingEmail, TransportError};

/// One email bound to the notification it mirrors.
#[derive(Debug, Clone)]
pub struct EmailJob {
    /// Notification record the email belongs to.
    pub notification_id: String,
    /// Rendered email.
    pub email: OutgoingEmail,
}

/// Retry schedule for a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Transport attempts before the plain-text fallback.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each time.
    pub base_delay: Duration,
    /// Upper bound for one transport call.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Derive the schedule from configuration.
    #[must_use]
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.retry_base(),
            attempt_timeout: config.attempt_timeout(),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Sent with the rendered template after `attempts` tries.
    Delivered {
        /// Attempts used, including the successful one.
        attempts: u32,
    },
    /// Sent only by the plain-text fallback.
    FallbackDelivered,
    /// Every attempt and the fallback failed.
    Failed,
    /// Shutdown interrupted the retry schedule.
    Abandoned,
}

/// Running totals of delivery outcomes.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    fallback_delivered: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
}

/// Point-in-time copy of [`DeliveryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySnapshot {
    /// Delivered with the rendered template.
    pub delivered: u64,
    /// Delivered by the plain-text fallback.
    pub fallback_delivered: u64,
    /// Not delivered at all.
    pub failed: u64,
    /// Dropped because of shutdown.
    pub abandoned: u64,
}

impl DeliverySnapshot {
    /// Jobs that reached a terminal outcome.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.delivered + self.fallback_delivered + self.failed + self.abandoned
    }
}

impl DeliveryStats {
    fn record(&self, outcome: DeliveryOutcome) {
        let counter = match outcome {
            DeliveryOutcome::Delivered { .. } => &self.delivered,
            DeliveryOutcome::FallbackDelivered => &self.fallback_delivered,
            DeliveryOutcome::Failed => &self.failed,
            DeliveryOutcome::Abandoned => &self.abandoned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the current totals.
    #[must_use]
    pub fn snapshot(&self) -> DeliverySnapshot {
        DeliverySnapshot {
            delivered: self.delivered.load(Ordering::Relaxed),
            fallback_delivered: self.fallback_delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Handle used to submit email jobs.
#[derive(Clone)]
pub struct DeliveryPool {
    queue_tx: mpsc::Sender<EmailJob>,
    stats: Arc<DeliveryStats>,
}

/// Join handles for the delivery workers.
pub struct DeliveryRuntime {
    workers: Vec<JoinHandle<()>>,
}

impl DeliveryRuntime {
    /// Wait for every worker to exit.
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(err) = worker.await {
                error!(%err, "delivery worker panicked");
            }
        }
    }
}

impl DeliveryPool {
    /// Start `config.workers` delivery tasks sharing one bounded queue.
    ///
    /// Workers stop when `cancel` fires or every pool handle is dropped.
    #[must_use]
    pub fn start(
        transport: Arc<dyn EmailTransport>,
        config: &DeliveryConfig,
        cancel: CancellationToken,
    ) -> (Self, DeliveryRuntime) {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity);
        let queue_rx = Arc::new(Mutex::new(queue_rx));
        let stats = Arc::new(DeliveryStats::default());
        let policy = RetryPolicy::from_config(config);

        let workers = (0..config.workers)
            .map(|worker_id| {
                spawn_worker(
                    worker_id,
                    Arc::clone(&transport),
                    Arc::clone(&queue_rx),
                    Arc::clone(&stats),
                    policy,
                    cancel.clone(),
                )
            })
            .collect();

        info!(workers = config.workers, "email delivery pool started");
        (Self { queue_tx, stats }, DeliveryRuntime { workers })
    }

    /// Hand a job to the pool without waiting.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Delivery` if the queue is full or the pool stopped.
    pub fn try_enqueue(&self, job: EmailJob) -> Result<()> {
        self.queue_tx.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(job) => AppError::Delivery(format!(
                "email queue full; dropped email for notification {}",
                job.notification_id
            )),
            mpsc::error::TrySendError::Closed(job) => AppError::Delivery(format!(
                "email pool stopped; dropped email for notification {}",
                job.notification_id
            )),
        })
    }

    /// Current outcome totals.
    #[must_use]
    pub fn stats(&self) -> DeliverySnapshot {
        self.stats.snapshot()
    }
}

fn spawn_worker(
    worker_id: usize,
    transport: Arc<dyn EmailTransport>,
    queue_rx: Arc<Mutex<mpsc::Receiver<EmailJob>>>,
    stats: Arc<DeliveryStats>,
    policy: RetryPolicy,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            loop {
                let job = tokio::select! {
                    () = cancel.cancelled() => {
                        info!("delivery worker shutting down");
                        break;
                    }
                    maybe_job = async { queue_rx.lock().await.recv().await } => {
                        if let Some(job) = maybe_job { job } else {
                            info!("delivery queue closed");
                            break;
                        }
                    }
                };

                let outcome = deliver(transport.as_ref(), &job, policy, &cancel).await;
                stats.record(outcome);
            }
        }
        .instrument(tracing::info_span!("delivery_worker", worker_id)),
    )
}

/// Run the retry schedule and fallback for one job.
pub async fn deliver(
    transport: &dyn EmailTransport,
    job: &EmailJob,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> DeliveryOutcome {
    let notification_id = job.notification_id.as_str();

    for attempt in 1..=policy.max_attempts {
        match attempt_send(transport, job.email.clone(), policy.attempt_timeout).await {
            Ok(()) => {
                info!(notification_id, attempt, "email delivered");
                return DeliveryOutcome::Delivered { attempts: attempt };
            }
            Err(TransportError::Permanent(reason)) => {
                warn!(notification_id, attempt, %reason, "email rejected; skipping retries");
                break;
            }
            Err(TransportError::Transient(reason)) => {
                let delay = policy.backoff(attempt);
                warn!(notification_id, attempt, %reason, delay = ?delay, "email attempt failed");
                tokio::select! {
                    () = cancel.cancelled() => {
                        warn!(notification_id, "shutdown during email retry; abandoning");
                        return DeliveryOutcome::Abandoned;
                    }
                    () = sleep(delay) => {}
                }
            }
        }
    }

    match attempt_send(transport, job.email.plain_only(), policy.attempt_timeout).await {
        Ok(()) => {
            info!(notification_id, "email delivered by plain-text fallback");
            DeliveryOutcome::FallbackDelivered
        }
        Err(err) => {
            error!(notification_id, %err, to = %job.email.to, "email delivery failed");
            DeliveryOutcome::Failed
        }
    }
}

async fn attempt_send(
    transport: &dyn EmailTransport,
    email: OutgoingEmail,
    limit: Duration,
) -> std::result::Result<(), TransportError> {
    match timeout(limit, transport.send(email)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Transient(format!(
            "attempt timed out after {limit:?}"
        ))),
    }
}
