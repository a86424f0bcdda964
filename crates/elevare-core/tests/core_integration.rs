#![allow(clippy::unwrap_used)]

use elevare_core::*;
use std::time::Duration;

#[test]
fn test_event_wire_format() {
    let event = PipelineEvent::new(EventType::AudioTranscript, "Let's learn!");
    let json: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
    assert_eq!(json["type"], "AUDIO_TRANSCRIPT");
    assert_eq!(json["message"], "Let's learn!");
}

#[test]
fn test_completed_event_is_terminal() {
    let event = PipelineEvent::completed("PLAN_LESSONS");
    assert!(event.is_terminal());
    assert_eq!(event.payload["pipeline"], "PLAN_LESSONS");
    assert!(!PipelineEvent::new(EventType::StudyGuide, serde_json::json!({})).is_terminal());
}

#[test]
fn test_event_type_names_match_serde() {
    for ty in [
        EventType::AudioTranscript,
        EventType::ResearchReport,
        EventType::ResearchContext,
        EventType::ResearchSources,
        EventType::ResearchImages,
        EventType::WhiteboardReset,
        EventType::WhiteboardUpdate,
        EventType::StudyGuide,
        EventType::PipelineCompleted,
    ] {
        let serialized = serde_json::to_value(ty).unwrap();
        assert_eq!(serialized, ty.as_str());
    }
}

#[test]
fn test_event_round_trips_through_json() {
    let event = PipelineEvent::new(
        EventType::ResearchSources,
        serde_json::json!(["https://example.org"]),
    );
    let back: PipelineEvent = serde_json::from_str(&event.to_json().unwrap()).unwrap();
    assert_eq!(back, event);
}

#[test]
fn test_stage_error_display() {
    let err = StageError::new(
        "research",
        CapabilityError::Research("upstream 503".into()),
    );
    assert_eq!(
        err.to_string(),
        "stage 'research' failed: Research error: upstream 503"
    );
    assert!(!err.is_cancelled());

    let timeout = StageError::new("report_summary", StageFailure::Timeout(Duration::from_secs(5)));
    assert!(timeout.to_string().contains("timed out after 5s"));

    assert!(StageError::new("x", StageFailure::Cancelled).is_cancelled());
}

#[test]
fn test_stage_error_converts_to_elevare_error() {
    let err: ElevareError =
        StageError::new("study_guide", CapabilityError::Extraction("bad".into())).into();
    assert!(matches!(err, ElevareError::Stage(_)));
    assert!(err.to_string().starts_with("Stage error:"));
}
