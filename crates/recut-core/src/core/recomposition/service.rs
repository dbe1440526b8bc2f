//! Recomposition Service
//!
//! Builds recomposition configs, submits them to the rendering backend and
//! drives records through their lifecycle from external status updates.
//! The service never infers completion on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{RenderingBackend, TriggerPriority, TriggerRequest};
use super::builder::RecompositionConfigBuilder;
use super::config::{RenderOverrides, UpdatedCompositionConfig};
use super::events::{StatusEvent, StatusTarget};
use super::record::{RecompositionRecord, RecompositionStatus};
use super::store::{CompositionStore, RecordStore};
use crate::core::edit::EditPlan;
use crate::core::settings::{RecutSettings, TrackingSettings};
use crate::core::{CoreError, CoreResult, TriggerError};

/// Per-call trigger options
#[derive(Clone, Debug, Default)]
pub struct TriggerOptions {
    pub priority: TriggerPriority,
    pub webhook_url: Option<String>,
    pub overrides: RenderOverrides,
}

impl TriggerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_priority(mut self, priority: TriggerPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_webhook(mut self, url: impl Into<String>) -> Self {
        self.webhook_url = Some(url.into());
        self
    }

    pub fn with_overrides(mut self, overrides: RenderOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

pub struct RecompositionService {
    records: Arc<dyn RecordStore>,
    compositions: Arc<dyn CompositionStore>,
    backend: Arc<dyn RenderingBackend>,
    tracking: TrackingSettings,
    submit_timeout: Duration,
}

impl RecompositionService {
    pub fn new(
        records: Arc<dyn RecordStore>,
        compositions: Arc<dyn CompositionStore>,
        backend: Arc<dyn RenderingBackend>,
    ) -> Self {
        Self {
            records,
            compositions,
            backend,
            tracking: TrackingSettings::default(),
            submit_timeout: Duration::from_secs(30),
        }
    }

    /// Applies tracking paths and the submission timeout
    pub fn with_settings(mut self, settings: &RecutSettings) -> Self {
        self.tracking = settings.tracking.clone();
        self.submit_timeout = Duration::from_secs(settings.backend.timeout_sec);
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn status_url(&self, id: &str) -> String {
        format!("{}/{}/status", self.tracking.base_path, id)
    }

    pub fn result_url(&self, id: &str) -> String {
        format!("{}/{}/result", self.tracking.base_path, id)
    }

    // =========================================================================
    // Trigger
    // =========================================================================

    /// Builds the config for `plan`, records it as PENDING and submits it.
    ///
    /// On backend failure the PENDING record is kept (see `retry_trigger`)
    /// and the failure is returned as `CoreError::Trigger`.
    pub async fn trigger(
        &self,
        generation_id: &str,
        composition_id: &str,
        plan: &EditPlan,
        options: TriggerOptions,
    ) -> CoreResult<RecompositionRecord> {
        let original = self.compositions.get_config(composition_id).await?;
        let config = RecompositionConfigBuilder::new(composition_id, generation_id, original)
            .with_overrides(options.overrides.clone())
            .build(plan);

        let record = RecompositionRecord::new(plan.clone(), config);
        let id = record.recomposition_id.clone();
        self.records.put(record).await?;
        info!(
            "Created recomposition {} for composition {} ({} operation(s))",
            id,
            composition_id,
            plan.operation_count()
        );

        self.submit(&id, &options).await
    }

    /// Re-submits a record that is still PENDING after a failed trigger
    pub async fn retry_trigger(
        &self,
        id: &str,
        options: TriggerOptions,
    ) -> CoreResult<RecompositionRecord> {
        self.submit(id, &options).await
    }

    async fn submit(&self, id: &str, options: &TriggerOptions) -> CoreResult<RecompositionRecord> {
        let record = self.records.get(id).await?;
        if record.status != RecompositionStatus::Pending {
            return Err(CoreError::InvalidTransition {
                id: id.to_string(),
                from: record.status,
                to: RecompositionStatus::Triggered,
            });
        }

        let request = TriggerRequest {
            composition_id: record.composition_id.clone(),
            config: record.config.clone(),
            priority: options.priority,
            webhook_url: options.webhook_url.clone(),
            generation_id: record.generation_id.clone(),
            edit_summary: record.edit_plan.summary(),
        };

        // No record lock is held across the network call
        let outcome = match tokio::time::timeout(
            self.submit_timeout,
            self.backend.submit(&request, id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TriggerError::Timeout(self.submit_timeout)),
        };

        let response = match outcome {
            Ok(response) => response,
            Err(source) => {
                warn!(
                    "Rendering backend {} rejected recomposition {}: {}",
                    self.backend.name(),
                    id,
                    source
                );
                let message = source.to_string();
                self.records
                    .update(
                        id,
                        Box::new(move |r: &mut RecompositionRecord| {
                            r.error_message = Some(message);
                            Ok(())
                        }),
                    )
                    .await?;
                return Err(CoreError::Trigger {
                    recomposition_id: id.to_string(),
                    source,
                });
            }
        };

        let job_id = response.job_id.clone();
        let status_url = self.status_url(id);
        let result_url = self.result_url(id);
        let triggered = self
            .records
            .update(
                id,
                Box::new(move |r: &mut RecompositionRecord| {
                    r.mark_triggered(job_id, status_url, result_url)?;
                    r.error_message = None;
                    Ok(())
                }),
            )
            .await;

        match triggered {
            Ok(record) => {
                info!(
                    "Recomposition {} triggered as job {} (estimated {:?}s)",
                    id, response.job_id, response.estimated_duration
                );
                Ok(record)
            }
            Err(e) => {
                // Cancelled while the submission was in flight
                warn!(
                    "Recomposition {} accepted as job {} but could not be marked triggered: {}",
                    id, response.job_id, e
                );
                Err(e)
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Applies an external status update. Repeating the current status is a
    /// no-op; moving backwards or out of a terminal state is rejected.
    pub async fn update_status(
        &self,
        id: &str,
        status: RecompositionStatus,
        error: Option<String>,
    ) -> CoreResult<RecompositionRecord> {
        self.apply_status(id, status, error, None).await
    }

    /// Same as `update_status`, addressed by backend job id
    pub async fn update_status_by_job(
        &self,
        job_id: &str,
        status: RecompositionStatus,
        error: Option<String>,
    ) -> CoreResult<RecompositionRecord> {
        let record = self
            .records
            .find_by_job(job_id)
            .await
            .ok_or_else(|| CoreError::RenderJobNotFound(job_id.to_string()))?;
        self.apply_status(&record.recomposition_id, status, error, None)
            .await
    }

    /// Marks a non-terminal record CANCELLED. The backend job is not touched.
    pub async fn cancel(&self, id: &str) -> CoreResult<RecompositionRecord> {
        self.update_status(id, RecompositionStatus::Cancelled, None)
            .await
    }

    /// Handles one inbound event
    pub async fn handle_event(&self, event: StatusEvent) -> CoreResult<RecompositionRecord> {
        let id = match &event.target {
            StatusTarget::Recomposition(id) => id.clone(),
            StatusTarget::Job(job_id) => self
                .records
                .find_by_job(job_id)
                .await
                .map(|r| r.recomposition_id)
                .ok_or_else(|| CoreError::RenderJobNotFound(job_id.clone()))?,
        };
        self.apply_status(&id, event.status, event.error_message, event.error_details)
            .await
    }

    async fn apply_status(
        &self,
        id: &str,
        status: RecompositionStatus,
        error: Option<String>,
        details: Option<serde_json::Value>,
    ) -> CoreResult<RecompositionRecord> {
        // PENDING and TRIGGERED are owned by `submit`, which has the job id
        if matches!(
            status,
            RecompositionStatus::Pending | RecompositionStatus::Triggered
        ) {
            let current = self.records.get(id).await?;
            return Err(CoreError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                to: status,
            });
        }

        let record = self
            .records
            .update(
                id,
                Box::new(move |r: &mut RecompositionRecord| {
                    if r.transition(status)? && status == RecompositionStatus::Failed {
                        r.error_message = error;
                        r.error_details = details;
                    }
                    Ok(())
                }),
            )
            .await?;

        info!("Recomposition {} is {}", id, record.status);
        Ok(record)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_record(&self, id: &str) -> CoreResult<RecompositionRecord> {
        self.records.get(id).await
    }

    /// Records of a composition, oldest first
    pub async fn records_for_composition(&self, composition_id: &str) -> Vec<RecompositionRecord> {
        self.records
            .list()
            .await
            .into_iter()
            .filter(|r| r.composition_id == composition_id)
            .collect()
    }

    // =========================================================================
    // Rollback
    // =========================================================================

    /// Re-renders the pre-edit config of `id` as a new recomposition
    pub async fn rollback(&self, id: &str, options: TriggerOptions) -> CoreResult<RecompositionRecord> {
        let source = self.records.get(id).await?;
        let original = match (&source.rollback_config, source.can_rollback) {
            (Some(config), true) => config.clone(),
            _ => return Err(CoreError::RollbackUnavailable(id.to_string())),
        };

        let config = UpdatedCompositionConfig::restoring(
            &source.composition_id,
            &source.generation_id,
            original,
        );
        let plan = EditPlan::new(&format!("Roll back recomposition {}", id))
            .with_intent(&format!("Restore composition {} to its pre-edit state", source.composition_id));

        let mut record = RecompositionRecord::new(plan, config);
        record.rollback_of = Some(id.to_string());
        record.discard_rollback();
        let rollback_id = record.recomposition_id.clone();
        self.records.put(record).await?;
        debug!("Created rollback {} of recomposition {}", rollback_id, id);

        self.submit(&rollback_id, &options).await
    }

    // =========================================================================
    // Event Channel
    // =========================================================================

    /// Consumes status events until the channel closes. Resolves to the number
    /// of events applied successfully.
    pub fn spawn_status_listener(
        self: Arc<Self>,
        mut events: mpsc::Receiver<StatusEvent>,
    ) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut applied = 0;
            while let Some(event) = events.recv().await {
                match self.handle_event(event.clone()).await {
                    Ok(_) => applied += 1,
                    Err(e) => warn!("Dropped status event {:?}: {}", event.target, e),
                }
            }
            debug!("Status listener stopped after {} event(s)", applied);
            applied
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::edit::EditOperation;
    use crate::core::recomposition::{
        CompositionConfig, InMemoryCompositionStore, InMemoryRecordStore, TriggerResponse,
    };
    use crate::core::Resolution;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Backend double returning a scripted outcome
    struct MockBackend {
        fail_with: StdMutex<Option<TriggerError>>,
        delay: Duration,
        calls: AtomicUsize,
        keys: StdMutex<Vec<String>>,
    }

    impl MockBackend {
        fn ok() -> Self {
            Self {
                fail_with: StdMutex::new(None),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                keys: StdMutex::new(Vec::new()),
            }
        }

        fn failing(error: TriggerError) -> Self {
            let backend = Self::ok();
            *backend.fail_with.lock().unwrap() = Some(error);
            backend
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::ok()
            }
        }

        fn recover(&self) {
            *self.fail_with.lock().unwrap() = None;
        }
    }

    #[async_trait]
    impl RenderingBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        async fn submit(
            &self,
            request: &TriggerRequest,
            idempotency_key: &str,
        ) -> Result<TriggerResponse, TriggerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.keys.lock().unwrap().push(idempotency_key.to_string());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if let Some(error) = self.fail_with.lock().unwrap().clone() {
                return Err(error);
            }
            assert!(!request.edit_summary.is_empty());
            Ok(TriggerResponse {
                job_id: format!("job_{}", call),
                status: "queued".to_string(),
                estimated_duration: Some(20.0),
                queue_position: Some(1),
            })
        }
    }

    async fn service(backend: MockBackend) -> (Arc<RecompositionService>, Arc<MockBackend>) {
        let compositions = Arc::new(InMemoryCompositionStore::new());
        compositions
            .insert("comp", CompositionConfig::new(15.0, Resolution::fhd(), 30.0))
            .await;
        let backend = Arc::new(backend);
        let service = RecompositionService::new(
            Arc::new(InMemoryRecordStore::with_defaults()),
            compositions,
            backend.clone(),
        );
        (Arc::new(service), backend)
    }

    fn plan() -> EditPlan {
        EditPlan::new("tighten")
            .add_operation(EditOperation::trim_duration(0, 3.0))
            .add_operation(EditOperation::reorder(vec![1, 2], vec![2, 1]))
    }

    // -------------------------------------------------------------------------
    // Trigger
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_trigger_success() {
        let (service, backend) = service(MockBackend::ok()).await;

        let record = service
            .trigger("gen", "comp", &plan(), TriggerOptions::new())
            .await
            .unwrap();

        assert_eq!(record.status, RecompositionStatus::Triggered);
        assert_eq!(record.rendering_job_id.as_deref(), Some("job_0"));
        let id = &record.recomposition_id;
        assert_eq!(record.status_url, Some(format!("/recompositions/{}/status", id)));
        assert_eq!(record.result_url, Some(format!("/recompositions/{}/result", id)));
        assert!(record.triggered_at.is_some());
        assert_eq!(record.config.clip_edits.len(), 1);
        assert_eq!(backend.keys.lock().unwrap().as_slice(), &[id.clone()]);
    }

    #[tokio::test]
    async fn test_trigger_failure_keeps_pending_record() {
        let (service, backend) = service(MockBackend::failing(TriggerError::Rejected {
            status: 503,
            message: "busy".into(),
        }))
        .await;

        let err = service
            .trigger("gen", "comp", &plan(), TriggerOptions::new())
            .await
            .unwrap_err();
        let CoreError::Trigger {
            recomposition_id,
            source,
        } = err
        else {
            panic!("expected trigger error");
        };
        assert!(source.is_transient());

        let record = service.get_record(&recomposition_id).await.unwrap();
        assert_eq!(record.status, RecompositionStatus::Pending);
        assert!(record.rendering_job_id.is_none());
        assert!(record.error_message.unwrap().contains("busy"));

        // A caller-side retry promotes the same record
        backend.recover();
        let retried = service
            .retry_trigger(&recomposition_id, TriggerOptions::new())
            .await
            .unwrap();
        assert_eq!(retried.status, RecompositionStatus::Triggered);
        assert!(retried.error_message.is_none());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_status_update_cannot_enter_triggered() {
        let (service, backend) =
            service(MockBackend::failing(TriggerError::Network("down".into()))).await;

        let err = service
            .trigger("gen", "comp", &plan(), TriggerOptions::new())
            .await
            .unwrap_err();
        let CoreError::Trigger { recomposition_id: id, .. } = err else {
            panic!("expected trigger error");
        };

        for status in [RecompositionStatus::Triggered, RecompositionStatus::Pending] {
            let err = service.update_status(&id, status, None).await.unwrap_err();
            assert!(matches!(
                err,
                CoreError::InvalidTransition {
                    from: RecompositionStatus::Pending,
                    ..
                }
            ));
        }
        let err = service
            .handle_event(StatusEvent::for_record(id.clone(), RecompositionStatus::Triggered))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        let record = service.get_record(&id).await.unwrap();
        assert_eq!(record.status, RecompositionStatus::Pending);
        assert!(record.rendering_job_id.is_none());

        // Still retryable
        backend.recover();
        let retried = service.retry_trigger(&id, TriggerOptions::new()).await.unwrap();
        assert_eq!(retried.status, RecompositionStatus::Triggered);
        assert!(retried.rendering_job_id.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_retries_keep_one_job() {
        let backend = MockBackend {
            delay: Duration::from_millis(30),
            ..MockBackend::failing(TriggerError::Network("down".into()))
        };
        let (service, backend) = service(backend).await;

        let err = service
            .trigger("gen", "comp", &plan(), TriggerOptions::new())
            .await
            .unwrap_err();
        let CoreError::Trigger { recomposition_id: id, .. } = err else {
            panic!("expected trigger error");
        };
        backend.recover();

        let (a, b) = tokio::join!(
            service.retry_trigger(&id, TriggerOptions::new()),
            service.retry_trigger(&id, TriggerOptions::new())
        );

        let (won, lost) = match (a, b) {
            (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => (won, lost),
            other => panic!("expected exactly one winner: {:?}", other),
        };
        assert!(matches!(
            lost,
            CoreError::InvalidTransition {
                to: RecompositionStatus::Triggered,
                ..
            }
        ));

        let stored = service.get_record(&id).await.unwrap();
        assert_eq!(stored.status, RecompositionStatus::Triggered);
        assert_eq!(stored.rendering_job_id, won.rendering_job_id);
        // Both retries reuse the record id as idempotency key
        assert!(backend.keys.lock().unwrap().iter().all(|k| k == &id));
    }

    #[tokio::test]
    async fn test_trigger_timeout() {
        let (service, _) = service(MockBackend::slow(Duration::from_millis(200))).await;
        let service = Arc::try_unwrap(service)
            .ok()
            .unwrap()
            .with_submit_timeout(Duration::from_millis(20));

        let err = service
            .trigger("gen", "comp", &plan(), TriggerOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Trigger {
                source: TriggerError::Timeout(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_trigger_unknown_composition() {
        let (service, backend) = service(MockBackend::ok()).await;
        let err = service
            .trigger("gen", "missing", &plan(), TriggerOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::CompositionNotFound(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_custom_tracking_base_path() {
        let (service, _) = service(MockBackend::ok()).await;
        let mut settings = RecutSettings::default();
        settings.tracking.base_path = "/api/v1/recompositions".to_string();
        let service = Arc::try_unwrap(service).ok().unwrap().with_settings(&settings);

        assert_eq!(service.status_url("abc"), "/api/v1/recompositions/abc/status");
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_status_updates() {
        let (service, _) = service(MockBackend::ok()).await;
        let record = service
            .trigger("gen", "comp", &plan(), TriggerOptions::new())
            .await
            .unwrap();
        let id = record.recomposition_id.clone();

        let record = service
            .update_status(&id, RecompositionStatus::Processing, None)
            .await
            .unwrap();
        assert!(record.completed_at.is_none());

        let record = service
            .update_status_by_job("job_0", RecompositionStatus::Failed, Some("encoder crashed".into()))
            .await
            .unwrap();
        assert_eq!(record.status, RecompositionStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("encoder crashed"));
        let stamped = record.completed_at;
        assert!(stamped.is_some());

        // Replayed callback is harmless
        let again = service
            .update_status(&id, RecompositionStatus::Failed, Some("other".into()))
            .await
            .unwrap();
        assert_eq!(again.completed_at, stamped);
        assert_eq!(again.error_message.as_deref(), Some("encoder crashed"));

        // Late or backwards updates are rejected
        assert!(matches!(
            service.update_status(&id, RecompositionStatus::Completed, None).await,
            Err(CoreError::InvalidTransition { .. })
        ));
        assert!(service.cancel(&id).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (service, _) = service(MockBackend::ok()).await;
        assert!(matches!(
            service
                .update_status_by_job("nope", RecompositionStatus::Completed, None)
                .await,
            Err(CoreError::RenderJobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_pending_record() {
        let (service, _) = service(MockBackend::failing(TriggerError::Network("reset".into()))).await;
        let err = service
            .trigger("gen", "comp", &plan(), TriggerOptions::new())
            .await
            .unwrap_err();
        let CoreError::Trigger { recomposition_id, .. } = err else {
            panic!("expected trigger error");
        };

        let record = service.cancel(&recomposition_id).await.unwrap();
        assert_eq!(record.status, RecompositionStatus::Cancelled);

        // Cancelled records cannot be re-submitted
        assert!(matches!(
            service.retry_trigger(&recomposition_id, TriggerOptions::new()).await,
            Err(CoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_updates_end_in_a_defined_state() {
        let (service, _) = service(MockBackend::ok()).await;
        let record = service
            .trigger("gen", "comp", &plan(), TriggerOptions::new())
            .await
            .unwrap();
        let id = record.recomposition_id.clone();

        let mut handles = Vec::new();
        for status in [
            RecompositionStatus::Processing,
            RecompositionStatus::Completed,
            RecompositionStatus::Failed,
            RecompositionStatus::Cancelled,
            RecompositionStatus::Processing,
            RecompositionStatus::Completed,
        ] {
            let service = service.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                service.update_status(&id, status, None).await
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }

        let record = service.get_record(&id).await.unwrap();
        assert!(accepted >= 1);
        assert!(record.status.is_terminal());
        assert!(record.completed_at.is_some());
    }

    // -------------------------------------------------------------------------
    // Rollback and Queries
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_rollback_creates_new_record() {
        let (service, _) = service(MockBackend::ok()).await;
        let original = service
            .trigger("gen", "comp", &plan(), TriggerOptions::new())
            .await
            .unwrap();
        service
            .update_status(&original.recomposition_id, RecompositionStatus::Completed, None)
            .await
            .unwrap();

        let rollback = service
            .rollback(&original.recomposition_id, TriggerOptions::new())
            .await
            .unwrap();

        assert_ne!(rollback.recomposition_id, original.recomposition_id);
        assert_eq!(rollback.rollback_of.as_deref(), Some(original.recomposition_id.as_str()));
        assert_eq!(rollback.status, RecompositionStatus::Triggered);
        assert!(rollback.config.is_empty());
        assert_eq!(rollback.config.render_settings.duration_seconds, 15.0);
        assert!(!rollback.can_rollback);

        // The source stays rollback-eligible
        assert!(service.get_record(&original.recomposition_id).await.unwrap().can_rollback);

        // A rollback record has no snapshot of its own
        assert!(matches!(
            service.rollback(&rollback.recomposition_id, TriggerOptions::new()).await,
            Err(CoreError::RollbackUnavailable(_))
        ));

        let all = service.records_for_composition("comp").await;
        assert_eq!(all.len(), 2);
        assert!(service.records_for_composition("other").await.is_empty());
    }

    #[tokio::test]
    async fn test_status_listener() {
        let (service, _) = service(MockBackend::ok()).await;
        let record = service
            .trigger("gen", "comp", &plan(), TriggerOptions::new())
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let listener = service.clone().spawn_status_listener(rx);

        tx.send(StatusEvent::for_job("job_0", RecompositionStatus::Processing))
            .await
            .unwrap();
        tx.send(StatusEvent::for_record(&record.recomposition_id, RecompositionStatus::Completed))
            .await
            .unwrap();
        tx.send(StatusEvent::for_job("unknown", RecompositionStatus::Completed))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(listener.await.unwrap(), 2);
        let record = service.get_record(&record.recomposition_id).await.unwrap();
        assert_eq!(record.status, RecompositionStatus::Completed);
    }
}
