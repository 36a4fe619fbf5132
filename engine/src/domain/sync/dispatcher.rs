//! Conversion sync dispatch
//!
//! Drives one conversion record from assembled journey to destination:
//!
//! 1. Assemble the journey and compute attribution (lazy, at dispatch time).
//! 2. Derive the idempotency key; a prior success under the same key
//!    short-circuits without touching the destination.
//! 3. Take the per-(lead, destination) in-flight guard; a concurrent
//!    dispatch for the same pair gets `InFlight` instead of a double send.
//! 4. Deliver under a bounded timeout, classify, and append exactly one
//!    audit row per attempt. Retryable failures back off exponentially up
//!    to the attempt cap, then surface as permanent.
//!
//! An audit-write failure aborts the dispatch with `AuditWrite`: the outcome
//! of the in-flight attempt is unknown, and pretending otherwise would break
//! the at-most-one-effective-delivery guarantee.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::core::EngineError;
use crate::core::config::{AttributionConfig, SyncConfig};
use crate::data::StorageGateway;
use crate::data::sqlite::SqliteError;
use crate::data::types::{JourneyRow, SyncOutcome};
use crate::domain::attribution::{self, AttributionModel, AttributionResult};
use crate::domain::journey::{Journey, JourneyAssembler};
use crate::domain::sync::audit::SyncAuditLog;
use crate::domain::sync::destination::{Delivery, Destination};
use crate::domain::sync::payload::ConversionPayload;
use crate::utils::retry::backoff_delay;

/// Terminal result of a dispatch
#[derive(Debug, Clone)]
pub enum DispatchOutcome {
    Delivered {
        idempotency_key: String,
        attempts: u32,
    },
    /// A prior success under the same key was found; nothing was sent
    AlreadyDelivered {
        idempotency_key: String,
        first_delivered_at: i64,
    },
}

impl DispatchOutcome {
    pub fn idempotency_key(&self) -> &str {
        match self {
            DispatchOutcome::Delivered { idempotency_key, .. }
            | DispatchOutcome::AlreadyDelivered { idempotency_key, .. } => idempotency_key,
        }
    }
}

/// Removes the in-flight marker when the dispatch ends, success or not
struct InFlightGuard<'a> {
    map: &'a DashMap<String, ()>,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}

pub struct SyncDispatcher {
    gateway: Arc<StorageGateway>,
    assembler: JourneyAssembler,
    audit: SyncAuditLog,
    sync_config: SyncConfig,
    attribution_config: AttributionConfig,
    in_flight: DashMap<String, ()>,
}

impl SyncDispatcher {
    pub fn new(
        gateway: Arc<StorageGateway>,
        assembler: JourneyAssembler,
        sync_config: SyncConfig,
        attribution_config: AttributionConfig,
    ) -> Self {
        let audit = SyncAuditLog::new(gateway.store().clone());
        Self {
            gateway,
            assembler,
            audit,
            sync_config,
            attribution_config,
            in_flight: DashMap::new(),
        }
    }

    pub fn audit(&self) -> &SyncAuditLog {
        &self.audit
    }

    /// Dispatch one lead's conversion to one destination, retrying inline.
    pub async fn dispatch(
        &self,
        lead_id: &str,
        destination: &dyn Destination,
        model: AttributionModel,
    ) -> Result<DispatchOutcome, EngineError> {
        let (payload, idempotency_key, journey, attribution) =
            match self.prepare(lead_id, destination, model).await? {
                Prepared::ShortCircuit(outcome) => return Ok(outcome),
                Prepared::Fresh {
                    payload,
                    idempotency_key,
                    journey,
                    attribution,
                } => (payload, idempotency_key, journey, attribution),
            };

        let _guard = self.acquire_in_flight(lead_id, destination.id())?;
        self.save_snapshot(&journey, &attribution).await?;

        let request_snapshot = payload.to_json().to_string();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let delivery = self.deliver_with_timeout(destination, &payload).await;
            self.record_attempt(lead_id, destination.id(), &idempotency_key, attempt, &delivery, &request_snapshot)
                .await?;

            match delivery {
                Delivery::Success { .. } => {
                    return Ok(DispatchOutcome::Delivered {
                        idempotency_key,
                        attempts: attempt,
                    });
                }
                Delivery::Permanent { detail, .. } => {
                    return Err(EngineError::PermanentDelivery {
                        destination: destination.id().to_string(),
                        detail,
                    });
                }
                Delivery::Retryable { detail, .. } => {
                    if attempt >= self.sync_config.max_attempts {
                        return Err(EngineError::PermanentDelivery {
                            destination: destination.id().to_string(),
                            detail: format!("retries exhausted after {attempt} attempts: {detail}"),
                        });
                    }
                    let delay = backoff_delay(
                        self.sync_config.base_delay_ms,
                        attempt - 1,
                        self.sync_config.max_delay_ms,
                    );
                    tracing::warn!(
                        lead_id = %lead_id,
                        destination = %destination.id(),
                        attempt,
                        delay_ms = delay.as_millis(),
                        detail = %detail,
                        "Transient delivery failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Single delivery attempt, for queue-driven retrying.
    ///
    /// A retryable failure comes back as `RetryableDelivery` so the caller
    /// can re-enqueue with its own backoff schedule instead of blocking here.
    pub async fn dispatch_once(
        &self,
        lead_id: &str,
        destination: &dyn Destination,
        model: AttributionModel,
        attempt: u32,
    ) -> Result<DispatchOutcome, EngineError> {
        let (payload, idempotency_key, journey, attribution) =
            match self.prepare(lead_id, destination, model).await? {
                Prepared::ShortCircuit(outcome) => return Ok(outcome),
                Prepared::Fresh {
                    payload,
                    idempotency_key,
                    journey,
                    attribution,
                } => (payload, idempotency_key, journey, attribution),
            };

        let _guard = self.acquire_in_flight(lead_id, destination.id())?;
        if attempt <= 1 {
            self.save_snapshot(&journey, &attribution).await?;
        }

        let request_snapshot = payload.to_json().to_string();
        let delivery = self.deliver_with_timeout(destination, &payload).await;
        self.record_attempt(lead_id, destination.id(), &idempotency_key, attempt, &delivery, &request_snapshot)
            .await?;

        match delivery {
            Delivery::Success { .. } => Ok(DispatchOutcome::Delivered {
                idempotency_key,
                attempts: attempt,
            }),
            Delivery::Permanent { detail, .. } => Err(EngineError::PermanentDelivery {
                destination: destination.id().to_string(),
                detail,
            }),
            Delivery::Retryable { detail, .. } => Err(EngineError::RetryableDelivery {
                destination: destination.id().to_string(),
                detail,
            }),
        }
    }

    /// Dispatch to several destinations independently; one destination's
    /// failure never blocks the others.
    pub async fn dispatch_all(
        &self,
        lead_id: &str,
        destinations: &[Arc<dyn Destination>],
        model: AttributionModel,
    ) -> Vec<(String, Result<DispatchOutcome, EngineError>)> {
        let tasks = destinations.iter().map(|destination| async move {
            let result = self.dispatch(lead_id, destination.as_ref(), model).await;
            (destination.id().to_string(), result)
        });
        futures::future::join_all(tasks).await
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn prepare(
        &self,
        lead_id: &str,
        destination: &dyn Destination,
        model: AttributionModel,
    ) -> Result<Prepared, EngineError> {
        let journey = self.assembler.assemble(lead_id).await?;
        if journey.is_empty() {
            return Err(EngineError::NotReady {
                lead_id: lead_id.to_string(),
            });
        }

        let lead = self
            .gateway
            .get_lead(lead_id)
            .await?
            .ok_or_else(|| EngineError::Validation(format!("unknown lead: {lead_id}")))?;

        let attribution = attribution::compute(&journey, model, &self.attribution_config);
        let payload = ConversionPayload::build(&lead, &attribution);
        let idempotency_key = payload.idempotency_key(destination.id());

        if let Some(prior) = self.audit.find_prior_success(&idempotency_key).await? {
            tracing::info!(
                lead_id = %lead_id,
                destination = %destination.id(),
                idempotency_key = %idempotency_key,
                "Prior success found, short-circuiting dispatch"
            );
            return Ok(Prepared::ShortCircuit(DispatchOutcome::AlreadyDelivered {
                idempotency_key,
                first_delivered_at: prior.created_at,
            }));
        }

        Ok(Prepared::Fresh {
            payload,
            idempotency_key,
            journey,
            attribution,
        })
    }

    fn acquire_in_flight(
        &self,
        lead_id: &str,
        destination: &str,
    ) -> Result<InFlightGuard<'_>, EngineError> {
        let key = format!("{lead_id}|{destination}");
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(_) => Err(EngineError::InFlight {
                lead_id: lead_id.to_string(),
                destination: destination.to_string(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Ok(InFlightGuard {
                    map: &self.in_flight,
                    key,
                })
            }
        }
    }

    async fn deliver_with_timeout(
        &self,
        destination: &dyn Destination,
        payload: &ConversionPayload,
    ) -> Delivery {
        let timeout = Duration::from_secs(self.sync_config.dispatch_timeout_secs);
        match tokio::time::timeout(timeout, destination.deliver(payload)).await {
            Ok(delivery) => delivery,
            Err(_) => Delivery::Retryable {
                http_status: None,
                detail: format!("delivery timed out after {}s", timeout.as_secs()),
            },
        }
    }

    async fn record_attempt(
        &self,
        lead_id: &str,
        destination: &str,
        idempotency_key: &str,
        attempt: u32,
        delivery: &Delivery,
        request_snapshot: &str,
    ) -> Result<(), EngineError> {
        let outcome = match delivery {
            Delivery::Success { .. } => SyncOutcome::Success,
            Delivery::Retryable { .. } => SyncOutcome::Failed,
            Delivery::Permanent { .. } => SyncOutcome::Rejected,
        };
        self.audit
            .append(
                lead_id,
                destination,
                idempotency_key,
                attempt,
                outcome,
                delivery.http_status(),
                request_snapshot.to_string(),
                delivery.response_body(),
            )
            .await?;
        Ok(())
    }

    /// Materialize the journey + credits used for this dispatch so the audit
    /// trail can be reconciled against what was actually attributed.
    async fn save_snapshot(
        &self,
        journey: &Journey,
        attribution: &AttributionResult,
    ) -> Result<(), EngineError> {
        let credits = serde_json::to_string(&attribution.credits)
            .map_err(|e| EngineError::Storage(SqliteError::Serialization(e.to_string())))?;
        let row = JourneyRow {
            id: Uuid::new_v4().to_string(),
            lead_id: journey.lead_id.clone(),
            model: attribution.model.to_string(),
            touchpoint_count: journey.len() as i64,
            credits,
            assembled_at: Utc::now().timestamp_millis(),
        };
        self.gateway.save_journey(&row).await?;
        Ok(())
    }
}

enum Prepared {
    ShortCircuit(DispatchOutcome),
    Fresh {
        payload: ConversionPayload,
        idempotency_key: String,
        journey: Journey,
        attribution: AttributionResult,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use crate::data::cache::CacheService;
    use crate::data::sqlite::SqliteService;
    use crate::data::types::{LeadRow, SessionRow, TouchpointRow};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Destination double driven by a script of canned deliveries
    struct MockDestination {
        id: String,
        script: StdMutex<VecDeque<Delivery>>,
        calls: AtomicU32,
    }

    impl MockDestination {
        fn new(id: &str, script: Vec<Delivery>) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                script: StdMutex::new(script.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Destination for MockDestination {
        fn id(&self) -> &str {
            &self.id
        }

        async fn deliver(&self, _payload: &ConversionPayload) -> Delivery {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Delivery::Success {
                    http_status: Some(200),
                    body: None,
                })
        }
    }

    fn success() -> Delivery {
        Delivery::Success {
            http_status: Some(200),
            body: Some("ok".to_string()),
        }
    }

    fn retryable() -> Delivery {
        Delivery::Retryable {
            http_status: Some(503),
            detail: "unavailable".to_string(),
        }
    }

    fn permanent() -> Delivery {
        Delivery::Permanent {
            http_status: Some(400),
            detail: "bad payload".to_string(),
        }
    }

    fn test_sync_config() -> SyncConfig {
        SyncConfig {
            max_attempts: 5,
            base_delay_ms: 1,
            max_delay_ms: 8,
            dispatch_timeout_secs: 5,
            workers: 1,
            queue_capacity: 16,
        }
    }

    async fn setup() -> (Arc<StorageGateway>, SyncDispatcher) {
        let store = Arc::new(SqliteService::init_in_memory().await.unwrap());
        let cache = CacheService::new(&CacheConfig {
            max_entries: 100,
            journey_ttl_secs: 300,
        });
        let gateway = Arc::new(StorageGateway::new(store, cache, Duration::from_secs(300)));
        let assembler = JourneyAssembler::new(gateway.clone(), 1);
        let dispatcher = SyncDispatcher::new(
            gateway.clone(),
            assembler,
            test_sync_config(),
            AttributionConfig::default(),
        );
        (gateway, dispatcher)
    }

    async fn seed_journey(gateway: &StorageGateway, lead_id: &str, touchpoints: usize) {
        gateway
            .create_lead(&LeadRow {
                id: lead_id.to_string(),
                email: Some("lead@example.com".to_string()),
                external_ref: None,
                created_at: 0,
                updated_at: 0,
            })
            .await
            .unwrap();
        gateway
            .create_session(&SessionRow {
                id: format!("{lead_id}-sess"),
                lead_id: lead_id.to_string(),
                first_touch_at: 0,
                last_touch_at: 0,
                attribution_model: None,
                source: None,
                medium: None,
                campaign: None,
                created_at: 0,
                updated_at: 0,
            })
            .await
            .unwrap();
        for i in 0..touchpoints {
            gateway
                .insert_touchpoint(&TouchpointRow {
                    id: format!("{lead_id}-tp-{i}"),
                    session_id: format!("{lead_id}-sess"),
                    lead_id: lead_id.to_string(),
                    ordinal: i as i64,
                    channel: format!("channel-{i}"),
                    campaign: None,
                    occurred_at: (i as i64) * 10_000,
                    params: None,
                    created_at: 0,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_journey_not_ready() {
        let (gateway, dispatcher) = setup().await;
        seed_journey(&gateway, "lead-1", 0).await;
        let destination = MockDestination::new("meta", vec![]);

        let err = dispatcher
            .dispatch("lead-1", destination.as_ref(), AttributionModel::Linear)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotReady { .. }));
        assert_eq!(destination.calls(), 0);
    }

    #[tokio::test]
    async fn test_success_single_audit_row() {
        let (gateway, dispatcher) = setup().await;
        seed_journey(&gateway, "lead-1", 2).await;
        let destination = MockDestination::new("meta", vec![success()]);

        let outcome = dispatcher
            .dispatch("lead-1", destination.as_ref(), AttributionModel::Linear)
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Delivered { attempts: 1, .. }));

        let history = dispatcher.audit().history("lead-1", "meta").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, "success");
    }

    #[tokio::test]
    async fn test_redispatch_short_circuits() {
        let (gateway, dispatcher) = setup().await;
        seed_journey(&gateway, "lead-1", 2).await;
        let destination = MockDestination::new("meta", vec![success()]);

        dispatcher
            .dispatch("lead-1", destination.as_ref(), AttributionModel::Linear)
            .await
            .unwrap();
        let second = dispatcher
            .dispatch("lead-1", destination.as_ref(), AttributionModel::Linear)
            .await
            .unwrap();

        assert!(matches!(second, DispatchOutcome::AlreadyDelivered { .. }));
        // The destination only ever saw one call
        assert_eq!(destination.calls(), 1);
        let history = dispatcher.audit().history("lead-1", "meta").await.unwrap();
        assert_eq!(
            history.iter().filter(|r| r.outcome == "success").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_three_transient_failures_then_success() {
        let (gateway, dispatcher) = setup().await;
        seed_journey(&gateway, "lead-1", 3).await;
        let destination = MockDestination::new(
            "meta",
            vec![retryable(), retryable(), retryable(), success()],
        );

        let outcome = dispatcher
            .dispatch("lead-1", destination.as_ref(), AttributionModel::Linear)
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Delivered { attempts: 4, .. }));

        let history = dispatcher.audit().history("lead-1", "meta").await.unwrap();
        assert_eq!(history.len(), 4);
        let outcomes: Vec<&str> = history.iter().map(|r| r.outcome.as_str()).collect();
        assert_eq!(outcomes, vec!["failed", "failed", "failed", "success"]);
        // Attempt numbers ascend and timestamps never go backwards
        for window in history.windows(2) {
            assert!(window[0].attempt < window[1].attempt);
            assert!(window[0].created_at <= window[1].created_at);
        }
    }

    #[tokio::test]
    async fn test_permanent_rejection_no_retry() {
        let (gateway, dispatcher) = setup().await;
        seed_journey(&gateway, "lead-1", 2).await;
        let destination = MockDestination::new("meta", vec![permanent(), success()]);

        let err = dispatcher
            .dispatch("lead-1", destination.as_ref(), AttributionModel::Linear)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PermanentDelivery { .. }));
        assert_eq!(destination.calls(), 1);

        let history = dispatcher.audit().history("lead-1", "meta").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, "rejected");
    }

    #[tokio::test]
    async fn test_retries_exhausted_becomes_permanent() {
        let (gateway, dispatcher) = setup().await;
        seed_journey(&gateway, "lead-1", 2).await;
        let destination = MockDestination::new("meta", vec![retryable(); 10]);

        let err = dispatcher
            .dispatch("lead-1", destination.as_ref(), AttributionModel::Linear)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PermanentDelivery { .. }));
        assert_eq!(destination.calls(), 5);

        let history = dispatcher.audit().history("lead-1", "meta").await.unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.iter().all(|r| r.outcome == "failed"));
    }

    #[tokio::test]
    async fn test_in_flight_guard_rejects_concurrent() {
        let (gateway, dispatcher) = setup().await;
        seed_journey(&gateway, "lead-1", 2).await;
        let destination = MockDestination::new("meta", vec![success()]);

        // Simulate another dispatch already holding the pair
        dispatcher.in_flight.insert("lead-1|meta".to_string(), ());
        let err = dispatcher
            .dispatch("lead-1", destination.as_ref(), AttributionModel::Linear)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InFlight { .. }));
        assert_eq!(destination.calls(), 0);

        // Released guard allows a later dispatch
        dispatcher.in_flight.remove("lead-1|meta");
        assert!(
            dispatcher
                .dispatch("lead-1", destination.as_ref(), AttributionModel::Linear)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_dispatch_all_isolates_failures() {
        let (gateway, dispatcher) = setup().await;
        seed_journey(&gateway, "lead-1", 2).await;
        let good = MockDestination::new("good", vec![success()]);
        let bad = MockDestination::new("bad", vec![permanent()]);
        let destinations: Vec<Arc<dyn Destination>> = vec![good.clone(), bad.clone()];

        let results = dispatcher
            .dispatch_all("lead-1", &destinations, AttributionModel::Linear)
            .await;

        assert_eq!(results.len(), 2);
        let by_id: std::collections::HashMap<_, _> =
            results.iter().map(|(id, r)| (id.as_str(), r)).collect();
        assert!(by_id["good"].is_ok());
        assert!(matches!(
            by_id["bad"],
            Err(EngineError::PermanentDelivery { .. })
        ));
    }

    #[tokio::test]
    async fn test_dispatch_saves_journey_snapshot() {
        let (gateway, dispatcher) = setup().await;
        seed_journey(&gateway, "lead-1", 3).await;
        let destination = MockDestination::new("meta", vec![success()]);

        dispatcher
            .dispatch("lead-1", destination.as_ref(), AttributionModel::PositionBased)
            .await
            .unwrap();

        let snapshot = gateway.latest_journey("lead-1").await.unwrap().unwrap();
        assert_eq!(snapshot.model, "position_based");
        assert_eq!(snapshot.touchpoint_count, 3);
    }

    #[tokio::test]
    async fn test_dispatch_once_surfaces_retryable() {
        let (gateway, dispatcher) = setup().await;
        seed_journey(&gateway, "lead-1", 2).await;
        let destination = MockDestination::new("meta", vec![retryable(), success()]);

        let err = dispatcher
            .dispatch_once("lead-1", destination.as_ref(), AttributionModel::Linear, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RetryableDelivery { .. }));

        let outcome = dispatcher
            .dispatch_once("lead-1", destination.as_ref(), AttributionModel::Linear, 2)
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Delivered { attempts: 2, .. }));

        let history = dispatcher.audit().history("lead-1", "meta").await.unwrap();
        assert_eq!(history.len(), 2);
    }
}
