//! Event handling through the measure runner

mod common;

use common::{BrokenLoader, CountingLoader, ctx, screened_patient};
use octofhir_cqm::measures;
use octofhir_cqm::{CardStatus, ClinicalEvent, EventKind, MeasureRunner, RecordLoader, RunnerError};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn bundled_runner(loader: Arc<CountingLoader>) -> MeasureRunner {
    MeasureRunner::bundled(loader).unwrap()
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_event_without_patient_produces_nothing() {
    let loader = Arc::new(CountingLoader::with([screened_patient("p1")]));
    let runner = bundled_runner(Arc::clone(&loader));

    let effects = runner
        .handle(&ClinicalEvent::without_patient(EventKind::LabReportCreated), &ctx())
        .await
        .unwrap();
    assert!(effects.is_empty());
    assert_eq!(loader.calls(), 0);
}

#[tokio::test]
async fn test_unrelated_event_kind_skips_loading() {
    let loader = Arc::new(CountingLoader::with([screened_patient("p1")]));
    let library = Arc::new(measures::bundled_value_sets().unwrap());
    let runner =
        MeasureRunner::from_definitions([measures::glycemic_poor_control()], library, Arc::clone(&loader) as Arc<dyn RecordLoader>)
            .unwrap();

    let effects = runner
        .handle(&ClinicalEvent::new(EventKind::ImagingReportCreated, "p1"), &ctx())
        .await
        .unwrap();
    assert!(effects.is_empty());
    assert_eq!(loader.calls(), 0);
}

#[tokio::test]
async fn test_unknown_patient_produces_nothing() {
    let loader = Arc::new(CountingLoader::with([screened_patient("p1")]));
    let runner = bundled_runner(Arc::clone(&loader));

    let effects = runner
        .handle(&ClinicalEvent::new(EventKind::LabReportCreated, "p2"), &ctx())
        .await
        .unwrap();
    assert!(effects.is_empty());
    assert_eq!(loader.calls(), 1);
}

#[tokio::test]
async fn test_one_effect_per_responding_measure() {
    let loader = Arc::new(CountingLoader::with([screened_patient("p1")]));
    let runner = bundled_runner(Arc::clone(&loader));

    let effects = runner
        .handle(&ClinicalEvent::new(EventKind::LabReportCreated, "p1"), &ctx())
        .await
        .unwrap();
    assert_eq!(loader.calls(), 1);

    let summary: Vec<(&str, &str, CardStatus)> = effects
        .iter()
        .map(|e| (e.patient.as_str(), e.key.as_str(), e.data.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("p1", "CMS130v14", CardStatus::Satisfied),
            ("p1", "CMS122v14", CardStatus::NotApplicable),
        ]
    );
}

#[tokio::test]
async fn test_imaging_event_reaches_colorectal_only() {
    let loader = Arc::new(CountingLoader::with([screened_patient("p1")]));
    let runner = bundled_runner(loader);

    let effects = runner
        .handle(&ClinicalEvent::new(EventKind::ImagingReportCreated, "p1"), &ctx())
        .await
        .unwrap();
    assert_eq!(effects.len(), 1);
    assert_eq!(effects[0].key, "CMS130v14");
}

// ============================================================================
// Effects
// ============================================================================

#[tokio::test]
async fn test_repeated_events_produce_identical_effects() {
    let runner = bundled_runner(Arc::new(CountingLoader::with([screened_patient("p1")])));
    let event = ClinicalEvent::new(EventKind::PatientUpdated, "p1");

    let first = runner.handle(&event, &ctx()).await.unwrap();
    let second = runner.handle(&event, &ctx()).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_effect_serializes_for_host() {
    let runner = bundled_runner(Arc::new(CountingLoader::with([screened_patient("p1")])));
    let effects = runner
        .handle(&ClinicalEvent::new(EventKind::LabReportCreated, "p1"), &ctx())
        .await
        .unwrap();

    let payload: serde_json::Value = serde_json::from_str(&effects[0].to_json().unwrap()).unwrap();
    assert_eq!(payload["patient"], "p1");
    assert_eq!(payload["key"], "CMS130v14");
    assert_eq!(payload["data"]["status"], "satisfied");
    assert_eq!(payload["data"]["due_in"], 273);
    assert!(payload["data"]["can_be_snoozed"].is_boolean());
    assert!(payload.get("can_be_snoozed").is_none());
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_loader_failure_is_reported() {
    let runner = MeasureRunner::bundled(Arc::new(BrokenLoader)).unwrap();
    let err = runner
        .handle(&ClinicalEvent::new(EventKind::LabReportCreated, "p1"), &ctx())
        .await
        .unwrap_err();

    assert!(matches!(&err, RunnerError::Load { patient_id, .. } if patient_id == "p1"));
    assert!(err.to_string().starts_with("Failed to load patient 'p1'"));
}

#[tokio::test]
async fn test_invalid_definition_is_rejected() {
    let mut definition = measures::colorectal_screening();
    definition.exclusions.push(octofhir_cqm::eval::ExclusionRule::HospiceDiagnosis {
        value_set: "Unknown".into(),
    });
    let library = Arc::new(measures::bundled_value_sets().unwrap());
    let err = MeasureRunner::from_definitions([definition], library, Arc::new(BrokenLoader)).unwrap_err();
    assert!(matches!(err, RunnerError::Eval(_)));
}
