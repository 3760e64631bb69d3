//! Serialization tests for the API types.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use certis::api::{
    ApiFailure, ApiResponse, AssessmentJson, DecisionRequest, EvaluateRequest, HealthResponse,
    RegistrationJson, ScoresInput, StatusResponse, SubmitRequest, status_for,
};
use certis_core::grading::ComponentScore;
use certis_core::{
    Assessment, AssessmentId, BatchId, CertisError, Decision, EntityKind, EvaluatorId, Grade,
    PortalMetrics, ProgramId, Registration, RegistrationDetails, RegistrationId,
    RegistrationStatus, Score, SubjectId, Target,
};
use chrono::{TimeZone, Utc};

// =============================================================================
// ENVELOPE
// =============================================================================

#[test]
fn test_success_envelope_omits_error() {
    let json = serde_json::to_string(&ApiResponse::ok(5u32)).unwrap();
    assert_eq!(json, r#"{"success":true,"data":5}"#);
}

#[test]
fn test_failure_carries_code_and_message() {
    let failure = ApiFailure::from(CertisError::not_found(EntityKind::Batch, 4));
    assert_eq!(failure.status, StatusCode::NOT_FOUND);
    assert_eq!(failure.error.code, "not_found");
    assert!(failure.error.message.contains('4'));
}

#[test]
fn test_status_mapping() {
    let conflict = CertisError::CapacityExceeded {
        target: Target::Batch(BatchId(1)),
        quota: 1,
        registered: 1,
    };
    assert_eq!(status_for(&conflict), StatusCode::CONFLICT);
    assert_eq!(
        status_for(&CertisError::OutOfRange {
            component: "theory".into(),
            value: "101".into()
        }),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(
        status_for(&CertisError::InvalidState {
            id: RegistrationId(1),
            status: RegistrationStatus::Pending
        }),
        StatusCode::CONFLICT
    );
    assert_eq!(
        status_for(&CertisError::Storage("disk full".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

// =============================================================================
// SERVICE RESPONSES
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_status_response_groups_by_status() {
    let status = StatusResponse::from(PortalMetrics {
        programs: 2,
        registrations: 5,
        pending: 3,
        approved: 2,
        ..PortalMetrics::default()
    });
    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["programs"], 2);
    assert_eq!(json["registrations_by_status"]["pending"], 3);
    assert_eq!(json["registrations_by_status"]["approved"], 2);
}

// =============================================================================
// REQUESTS
// =============================================================================

#[test]
fn test_submit_request_targets() {
    let batch: SubmitRequest =
        serde_json::from_str(r#"{"subject_id":9,"batch_id":2,"documents":["https://x/cv.pdf"]}"#)
            .unwrap();
    assert_eq!(batch.target().unwrap(), Target::Batch(BatchId(2)));
    assert_eq!(batch.details().documents.len(), 1);

    let position: SubmitRequest = serde_json::from_str(r#"{"subject_id":9,"position_id":3}"#).unwrap();
    assert_eq!(position.target().unwrap(), Target::Position(ProgramId(3)));
    assert_eq!(position.details(), RegistrationDetails::default());
}

#[test]
fn test_decision_accepts_verb_and_status() {
    let a: DecisionRequest = serde_json::from_str(r#"{"decision":"approve"}"#).unwrap();
    let b: DecisionRequest =
        serde_json::from_str(r#"{"decision":"rejected","note":"quota reached"}"#).unwrap();
    assert_eq!(a.decision, Decision::Approved);
    assert_eq!(b.decision, Decision::Rejected);
    assert_eq!(b.note.as_deref(), Some("quota reached"));
    assert!(serde_json::from_str::<DecisionRequest>(r#"{"decision":"maybe"}"#).is_err());
}

#[test]
fn test_scores_keep_literal_digits() {
    let request: EvaluateRequest = serde_json::from_str(
        r#"{"evaluator_id":1,"scores":{"theory":69.99,"practice":"80.5","extra":70}}"#,
    )
    .unwrap();
    assert_eq!(
        request.scores.to_raw().unwrap(),
        vec![
            ("theory".to_string(), "69.99".to_string()),
            ("practice".to_string(), "80.5".to_string()),
            ("extra".to_string(), "70".to_string()),
        ]
    );
}

#[test]
fn test_scores_are_not_rounded_through_f64() {
    let scores: ScoresInput =
        serde_json::from_str(r#"{"theory":69.99999999999999999,"practice":1e300}"#).unwrap();
    assert_eq!(
        scores.to_raw().unwrap(),
        vec![
            ("theory".to_string(), "69.99999999999999999".to_string()),
            ("practice".to_string(), "1e300".to_string()),
        ]
    );
}

#[test]
fn test_scores_as_list() {
    let scores: ScoresInput =
        serde_json::from_str(r#"[{"name":"discipline","score":88},{"name":"skill","score":"91.25"}]"#)
            .unwrap();
    let raw = scores.to_raw().unwrap();
    assert_eq!(raw[1], ("skill".to_string(), "91.25".to_string()));
}

#[test]
fn test_non_numeric_score_rejected() {
    let scores: ScoresInput = serde_json::from_str(r#"{"theory":true}"#).unwrap();
    assert!(matches!(
        scores.to_raw(),
        Err(CertisError::ValidationFailed { field, .. }) if field == "theory"
    ));
}

// =============================================================================
// RESPONSES
// =============================================================================

#[test]
fn test_assessment_json_renders_two_decimals() {
    let at = Utc.with_ymd_and_hms(2027, 3, 1, 9, 0, 0).unwrap();
    let assessment = Assessment {
        id: AssessmentId(1),
        registration: RegistrationId(4),
        components: vec![ComponentScore {
            name: "theory".into(),
            score: Score::from_points(80).unwrap(),
        }],
        final_score: Score::from_hundredths(6_800).unwrap(),
        passed: false,
        grade: Grade::D,
        evaluator: EvaluatorId(2),
        evaluated_at: at,
        notes: None,
    };
    let json = serde_json::to_value(AssessmentJson::from(assessment)).unwrap();
    assert_eq!(json["final_score"], "68.00");
    assert_eq!(json["components"][0]["score"], "80.00");
    assert_eq!(json["grade"], "D");
    assert_eq!(json["grade_label"], "Needs Improvement");
    assert_eq!(json["registration_id"], 4);
}

#[test]
fn test_registration_json_flattens_target() {
    let at = Utc.with_ymd_and_hms(2027, 1, 2, 8, 30, 0).unwrap();
    let reg = Registration {
        id: RegistrationId(3),
        subject: SubjectId(11),
        target: Target::Position(ProgramId(6)),
        status: RegistrationStatus::Pending,
        details: RegistrationDetails::default(),
        submitted_at: at,
        admin_note: None,
        processed_at: None,
        cancelled_at: None,
    };
    let json = serde_json::to_value(RegistrationJson::from(reg)).unwrap();
    assert_eq!(json["target"]["kind"], "position");
    assert_eq!(json["target"]["id"], 6);
    assert_eq!(json["status"], "pending");
    assert_eq!(json["subject_id"], 11);
}
