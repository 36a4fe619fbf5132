//! Background sync worker pool
//!
//! A bounded job queue drained by a fixed set of workers. Retryable failures
//! are re-enqueued with an `eligible_at` computed from the backoff schedule
//! instead of sleeping a worker, so one flaky destination cannot pin the
//! whole pool.
//!
//! Destinations are registered by id and can be disabled at runtime: an
//! attempt already in flight finishes, but queued jobs for a disabled
//! destination are dropped when a worker picks them up.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::core::EngineError;
use crate::core::config::SyncConfig;
use crate::domain::attribution::AttributionModel;
use crate::domain::sync::destination::Destination;
use crate::domain::sync::dispatcher::SyncDispatcher;
use crate::utils::retry::backoff_delay;

/// One queued delivery attempt
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub lead_id: String,
    pub destination_id: String,
    pub model: AttributionModel,
    pub attempt: u32,
    /// Earliest wall-clock time (epoch millis) this job may run
    pub eligible_at: i64,
}

struct RegisteredDestination {
    destination: Arc<dyn Destination>,
    enabled: AtomicBool,
}

pub struct SyncWorkerPool {
    dispatcher: Arc<SyncDispatcher>,
    destinations: Arc<DashMap<String, RegisteredDestination>>,
    config: SyncConfig,
    tx: mpsc::Sender<SyncJob>,
    receiver: Arc<Mutex<mpsc::Receiver<SyncJob>>>,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncWorkerPool {
    pub fn new(dispatcher: Arc<SyncDispatcher>, config: SyncConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            dispatcher,
            destinations: Arc::new(DashMap::new()),
            config,
            tx,
            receiver: Arc::new(Mutex::new(rx)),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Register a destination under its own id. Re-registering replaces the
    /// previous entry and re-enables it.
    pub fn register(&self, destination: Arc<dyn Destination>) {
        let id = destination.id().to_string();
        self.destinations.insert(
            id,
            RegisteredDestination {
                destination,
                enabled: AtomicBool::new(true),
            },
        );
    }

    /// Stop accepting new attempts for a destination. In-flight attempts
    /// finish; queued jobs are dropped on pickup.
    pub fn disable(&self, destination_id: &str) -> bool {
        match self.destinations.get(destination_id) {
            Some(entry) => {
                entry.enabled.store(false, Ordering::SeqCst);
                tracing::info!(destination = %destination_id, "Destination disabled");
                true
            }
            None => false,
        }
    }

    pub fn enable(&self, destination_id: &str) -> bool {
        match self.destinations.get(destination_id) {
            Some(entry) => {
                entry.enabled.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, destination_id: &str) -> bool {
        self.destinations
            .get(destination_id)
            .map(|e| e.enabled.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Queue a first delivery attempt. Applies backpressure when the queue
    /// is full rather than dropping.
    pub async fn enqueue(
        &self,
        lead_id: &str,
        destination_id: &str,
        model: AttributionModel,
    ) -> Result<(), EngineError> {
        if !self.is_enabled(destination_id) {
            return Err(EngineError::Validation(format!(
                "destination {destination_id} is not registered or is disabled"
            )));
        }
        self.submit(SyncJob {
            lead_id: lead_id.to_string(),
            destination_id: destination_id.to_string(),
            model,
            attempt: 1,
            eligible_at: Utc::now().timestamp_millis(),
        })
        .await
    }

    async fn submit(&self, job: SyncJob) -> Result<(), EngineError> {
        self.tx
            .send(job)
            .await
            .map_err(|_| EngineError::Config("sync queue is closed".into()))
    }

    /// Spawn the worker tasks. Idempotent only in the sense that calling it
    /// twice doubles the pool; hosts call it once at startup.
    pub async fn start(&self) {
        let mut handles = self.handles.lock().await;
        for worker_id in 0..self.config.workers {
            let dispatcher = self.dispatcher.clone();
            let destinations = self.destinations.clone();
            let receiver = self.receiver.clone();
            let tx = self.tx.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                tracing::debug!(worker_id, "Sync worker started");
                loop {
                    let job = {
                        let mut rx = receiver.lock().await;
                        tokio::select! {
                            _ = shutdown_rx.changed() => break,
                            job = rx.recv() => match job {
                                Some(job) => job,
                                None => break,
                            },
                        }
                    };

                    // Park not-yet-eligible jobs off-queue on a timer so
                    // eligible work behind them keeps flowing.
                    let wait_ms = job.eligible_at - Utc::now().timestamp_millis();
                    if wait_ms > 0 {
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(std::time::Duration::from_millis(wait_ms as u64))
                                .await;
                            if tx.send(job).await.is_err() {
                                tracing::debug!("Sync queue closed while re-submitting parked job");
                            }
                        });
                        continue;
                    }

                    run_job(&dispatcher, &destinations, &tx, &config, job).await;
                }
                tracing::debug!(worker_id, "Sync worker stopped");
            }));
        }
    }

    /// Signal shutdown and wait for workers to finish their current attempt.
    /// Jobs still queued are dropped.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Sync worker join failed");
            }
        }
    }
}

async fn run_job(
    dispatcher: &SyncDispatcher,
    destinations: &DashMap<String, RegisteredDestination>,
    tx: &mpsc::Sender<SyncJob>,
    config: &SyncConfig,
    job: SyncJob,
) {
    let destination = match destinations.get(&job.destination_id) {
        Some(entry) if entry.enabled.load(Ordering::SeqCst) => entry.destination.clone(),
        Some(_) => {
            tracing::warn!(
                lead_id = %job.lead_id,
                destination = %job.destination_id,
                "Dropping job for disabled destination"
            );
            return;
        }
        None => {
            tracing::warn!(
                lead_id = %job.lead_id,
                destination = %job.destination_id,
                "Dropping job for unregistered destination"
            );
            return;
        }
    };

    let result = dispatcher
        .dispatch_once(&job.lead_id, destination.as_ref(), job.model, job.attempt)
        .await;

    match result {
        Ok(outcome) => {
            tracing::info!(
                lead_id = %job.lead_id,
                destination = %job.destination_id,
                attempt = job.attempt,
                idempotency_key = %outcome.idempotency_key(),
                "Sync job completed"
            );
        }
        Err(EngineError::RetryableDelivery { detail, .. }) => {
            if job.attempt >= config.max_attempts {
                tracing::error!(
                    lead_id = %job.lead_id,
                    destination = %job.destination_id,
                    attempts = job.attempt,
                    detail = %detail,
                    "Retries exhausted, delivery failed permanently"
                );
                return;
            }
            let delay = backoff_delay(config.base_delay_ms, job.attempt - 1, config.max_delay_ms);
            let requeued = SyncJob {
                attempt: job.attempt + 1,
                eligible_at: Utc::now().timestamp_millis() + delay.as_millis() as i64,
                ..job
            };
            if tx.send(requeued).await.is_err() {
                tracing::error!("Sync queue closed while re-enqueueing retry");
            }
        }
        Err(EngineError::InFlight { .. }) => {
            // Another dispatch owns the pair right now; try again shortly
            // without burning an attempt.
            let requeued = SyncJob {
                eligible_at: Utc::now().timestamp_millis() + config.base_delay_ms as i64,
                ..job
            };
            let _ = tx.send(requeued).await;
        }
        Err(e) => {
            tracing::error!(
                lead_id = %job.lead_id,
                destination = %job.destination_id,
                attempt = job.attempt,
                error = %e,
                "Sync job failed"
            );
        }
    }
}
