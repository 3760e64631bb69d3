//! Structured state-transition events.
//!
//! Both the HTTP handlers and the CLI report through these helpers so the
//! event names and fields stay identical across surfaces.

use certis_core::{Assessment, CertisError, Reconciliation, Registration};

pub fn registration_submitted(reg: &Registration) {
    tracing::info!(
        event = "registration_submitted",
        registration_id = reg.id.0,
        subject_id = reg.subject.0,
        target = %reg.target
    );
}

pub fn registration_decided(reg: &Registration) {
    tracing::info!(
        event = "registration_decided",
        registration_id = reg.id.0,
        target = %reg.target,
        status = %reg.status
    );
}

pub fn registration_cancelled(reg: &Registration) {
    tracing::info!(
        event = "registration_cancelled",
        registration_id = reg.id.0,
        target = %reg.target
    );
}

pub fn assessment_recorded(assessment: &Assessment) {
    tracing::info!(
        event = "assessment_recorded",
        registration_id = assessment.registration.0,
        evaluator_id = assessment.evaluator.0,
        final_score = %assessment.final_score,
        passed = assessment.passed,
        grade = assessment.grade.letter()
    );
}

pub fn capacity_reconciled(rec: &Reconciliation) {
    if rec.drifted() {
        tracing::warn!(
            event = "capacity_reconciled",
            target = %rec.target,
            before = rec.before,
            after = rec.after
        );
    } else {
        tracing::debug!(event = "capacity_reconciled", target = %rec.target, count = rec.after);
    }
}

/// Report a failed operation. Only capacity refusals get their own event.
pub fn failure(err: &CertisError) {
    match err {
        CertisError::CapacityExceeded {
            target,
            quota,
            registered,
        } => {
            tracing::warn!(
                event = "capacity_exceeded",
                target = %target,
                quota = *quota,
                registered = *registered
            );
        }
        CertisError::Storage(_) | CertisError::Serialization(_) => {
            tracing::error!(error = %err, "store failure");
        }
        _ => tracing::debug!(code = err.code(), error = %err, "request refused"),
    }
}
