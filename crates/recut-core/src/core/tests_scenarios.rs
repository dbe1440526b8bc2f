//! End-to-end scenarios across timeline, edit and recomposition modules.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::edit::{
    EditOperation, EditPlan, InMemoryClipStore, TimelineApplier, TimelineEditor, TimelineValidator,
};
use crate::core::recomposition::{
    CompositionConfig, InMemoryCompositionStore, InMemoryRecordStore, RecompositionService,
    RecompositionStatus, RenderingBackend, TriggerOptions, TriggerRequest, TriggerResponse,
};
use crate::core::timeline::{reflow, total_duration, Clip};
use crate::core::{CoreError, Resolution, TriggerError};

fn three_clips() -> Vec<Clip> {
    vec![
        Clip::new("clip_a", "gen_1", 0, 0.0, 5.0),
        Clip::new("clip_b", "gen_1", 1, 5.0, 5.0),
        Clip::new("clip_c", "gen_1", 2, 10.0, 5.0),
    ]
}

fn span_of(clips: &[Clip], clip_id: &str) -> (f64, f64) {
    let clip = clips
        .iter()
        .find(|c| c.clip_id == clip_id)
        .unwrap_or_else(|| panic!("missing clip {}", clip_id));
    (clip.start_time_seconds, clip.end_time_seconds)
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn test_in_range_plan_without_conflicts_is_feasible() {
    let clips = three_clips();
    let plans = vec![
        EditPlan::new("trim").add_operation(EditOperation::trim_duration(0, 3.0)),
        EditPlan::new("split").add_operation(EditOperation::split(1, 2.5)),
        EditPlan::new("mixed")
            .add_operation(EditOperation::trim_duration(0, 4.0))
            .add_operation(EditOperation::split(2, 1.0))
            .add_operation(EditOperation::reorder(vec![1, 2], vec![2, 1]))
            .add_operation(EditOperation::volume(1, 0.5))
            .add_operation(EditOperation::transition(0, 1, "fade", 0.5)),
    ];

    let validator = TimelineValidator::new();
    for plan in &plans {
        let result = validator.validate(plan, &clips);
        assert!(result.is_feasible, "{}: {:?}", plan.natural_language_request, result.errors);
        assert!(result.errors.is_empty());
    }
}

#[test]
fn test_trim_and_split_on_same_clip_conflict() {
    let plan = EditPlan::new("cut it up")
        .add_operation(EditOperation::trim_duration(0, 3.0))
        .add_operation(EditOperation::split(0, 1.0));

    let result = TimelineValidator::new().validate(&plan, &three_clips());

    assert!(!result.is_feasible);
    assert!(result
        .error_messages()
        .iter()
        .any(|m| m.contains("trim") && m.contains("split")));
}

// =============================================================================
// Apply + Reflow
// =============================================================================

#[test]
fn test_trim_then_reflow_closes_gap() {
    let mut clips = three_clips();
    let plan = EditPlan::new("shorter intro").add_operation(EditOperation::trim_duration(0, 3.0));

    let result = TimelineApplier::new().apply(&plan, &mut clips);
    assert!(result.success);
    assert_eq!(clips[0].duration_seconds, 3.0);

    reflow(&mut clips);
    assert_eq!(clips[1].start_time_seconds, clips[0].end_time_seconds);
    assert_eq!(total_duration(&clips), 13.0);
}

#[test]
fn test_reorder_then_reflow_swaps_positions() {
    let mut clips = three_clips();
    let plan =
        EditPlan::new("swap last two").add_operation(EditOperation::reorder(vec![1, 2], vec![2, 1]));

    let result = TimelineApplier::new().apply(&plan, &mut clips);
    assert!(result.success);

    let report = reflow(&mut clips);
    assert_eq!(report.total_duration, 15.0);
    assert_eq!(span_of(&clips, "clip_a"), (0.0, 5.0));
    assert_eq!(span_of(&clips, "clip_c"), (5.0, 10.0));
    assert_eq!(span_of(&clips, "clip_b"), (10.0, 15.0));
}

#[test]
fn test_reflow_is_a_fixed_point() {
    let mut clips = three_clips();
    clips[1].start_time_seconds = 6.5;
    clips[1].end_time_seconds = 11.5;

    reflow(&mut clips);
    let once = clips.clone();
    let second = reflow(&mut clips);

    assert!(second.is_unchanged());
    assert_eq!(clips, once);
}

#[tokio::test]
async fn test_combined_trim_and_reorder_through_editor() {
    let store = Arc::new(InMemoryClipStore::new());
    store.insert("gen_1", three_clips()).await;
    let editor = TimelineEditor::new(store.clone());

    let plan = EditPlan::new("shorter intro, then swap the rest")
        .add_operation(EditOperation::trim_duration(0, 3.0))
        .add_operation(EditOperation::reorder(vec![1, 2], vec![2, 1]));

    let outcome = editor.apply_plan("gen_1", &plan).await.unwrap();

    assert!(outcome.apply.success);
    assert!(outcome.saved);
    assert_eq!(outcome.total_duration(), 13.0);
    assert_eq!(span_of(&outcome.clips, "clip_a"), (0.0, 3.0));
    assert_eq!(span_of(&outcome.clips, "clip_c"), (3.0, 8.0));
    assert_eq!(span_of(&outcome.clips, "clip_b"), (8.0, 13.0));

    // Written back: a preview of an empty plan sees the edited timeline.
    let reloaded = editor.preview("gen_1", &EditPlan::new("noop")).await.unwrap();
    assert_eq!(reloaded.clips, outcome.clips);
}

#[tokio::test]
async fn test_conflicting_plan_leaves_store_untouched() {
    let store = Arc::new(InMemoryClipStore::new());
    store.insert("gen_1", three_clips()).await;
    let editor = TimelineEditor::new(store);

    let plan = EditPlan::new("conflict")
        .add_operation(EditOperation::trim_duration(0, 3.0))
        .add_operation(EditOperation::split(0, 1.0));

    let err = editor.apply_plan("gen_1", &plan).await.unwrap_err();
    assert!(matches!(err, CoreError::PlanRejected { .. }));

    let current = editor.preview("gen_1", &EditPlan::new("noop")).await.unwrap();
    assert_eq!(current.clips, three_clips());
}

// =============================================================================
// Recomposition Lifecycle
// =============================================================================

struct CountingBackend {
    fail: bool,
    calls: AtomicUsize,
}

impl CountingBackend {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RenderingBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    async fn submit(
        &self,
        _request: &TriggerRequest,
        _idempotency_key: &str,
    ) -> Result<TriggerResponse, TriggerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TriggerError::Network("connection refused".to_string()));
        }
        Ok(TriggerResponse {
            job_id: format!("job_{}", call),
            status: "queued".to_string(),
            estimated_duration: Some(20.0),
            queue_position: Some(1),
        })
    }
}

async fn service(fail: bool) -> Arc<RecompositionService> {
    let compositions = Arc::new(InMemoryCompositionStore::new());
    compositions
        .insert("comp_1", CompositionConfig::new(15.0, Resolution::fhd(), 30.0))
        .await;
    Arc::new(RecompositionService::new(
        Arc::new(InMemoryRecordStore::with_defaults()),
        compositions,
        Arc::new(CountingBackend::new(fail)),
    ))
}

fn edit_plan() -> EditPlan {
    EditPlan::new("shorter intro").add_operation(EditOperation::trim_duration(0, 3.0))
}

#[tokio::test]
async fn test_successful_trigger_is_tracked() {
    let service = service(false).await;

    let record = service
        .trigger("gen_1", "comp_1", &edit_plan(), TriggerOptions::new())
        .await
        .unwrap();

    let id = &record.recomposition_id;
    assert_eq!(record.status, RecompositionStatus::Triggered);
    assert!(record.rendering_job_id.is_some());
    assert_eq!(
        record.status_url.as_deref(),
        Some(format!("/recompositions/{}/status", id).as_str())
    );
    assert_eq!(
        record.result_url.as_deref(),
        Some(format!("/recompositions/{}/result", id).as_str())
    );
    assert_eq!(record.config.clip_edits.len(), 1);
}

#[tokio::test]
async fn test_failed_trigger_stays_pending() {
    let service = service(true).await;

    let err = service
        .trigger("gen_1", "comp_1", &edit_plan(), TriggerOptions::new())
        .await
        .unwrap_err();

    let id = match err {
        CoreError::Trigger { recomposition_id, .. } => recomposition_id,
        other => panic!("unexpected error: {:?}", other),
    };
    let record = service.get_record(&id).await.unwrap();
    assert_eq!(record.status, RecompositionStatus::Pending);
    assert!(record.rendering_job_id.is_none());
    assert!(record.error_message.is_some());
}

#[tokio::test]
async fn test_concurrent_status_updates_never_tear() {
    let service = service(false).await;
    let record = service
        .trigger("gen_1", "comp_1", &edit_plan(), TriggerOptions::new())
        .await
        .unwrap();
    let id = record.recomposition_id.clone();

    let statuses = [
        RecompositionStatus::Processing,
        RecompositionStatus::Completed,
        RecompositionStatus::Failed,
        RecompositionStatus::Processing,
        RecompositionStatus::Completed,
        RecompositionStatus::Failed,
    ];

    let mut handles = Vec::new();
    for (i, status) in statuses.into_iter().enumerate() {
        let service = service.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            let message = (status == RecompositionStatus::Failed).then(|| format!("worker {}", i));
            service.update_status(&id, status, message).await
        }));
    }
    for handle in handles {
        // Losing races surface as InvalidTransition; only the stored state matters.
        let _ = handle.await.unwrap();
    }

    let record = service.get_record(&id).await.unwrap();
    assert!(record.status.is_terminal());
    assert!(record.completed_at.is_some());
    match record.status {
        RecompositionStatus::Failed => assert!(record.error_message.is_some()),
        RecompositionStatus::Completed => assert!(record.error_message.is_none()),
        other => panic!("unexpected terminal status {}", other),
    }
}
