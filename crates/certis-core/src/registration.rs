//! # Registration State Machine
//!
//! ```text
//! submit ──▶ Pending ──approve──▶ Approved ──cancel──▶ Cancelled
//!               │
//!               └──────reject──▶ Rejected
//! ```
//!
//! Approval takes a seat through [`capacity::reserve`] in the same
//! transaction that writes the status, so a full target leaves the
//! registration Pending. Cancellation gives the seat back.
//!
//! Transitions on one registration cannot interleave: each runs in a redb
//! write transaction, and those execute one at a time.

use crate::capacity;
use crate::primitives::MAX_TEXT_LENGTH;
use crate::storage::{Reader, StoreTxn};
use crate::{
    Assessment, Batch, CertisError, Decision, EntityKind, Program, ProgramKind, Registration,
    RegistrationDetails, RegistrationId, RegistrationStatus, SubjectId, Target,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registration together with its assessment, if one was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationDetail {
    pub registration: Registration,
    pub assessment: Option<Assessment>,
}

/// The target must exist, be open, and be the right shape for its program.
fn check_target(r: &impl Reader, target: Target) -> Result<(), CertisError> {
    let (name, status) = match target {
        Target::Batch(id) => {
            let batch: Batch = r.require(id.0)?;
            let program: Program = r.require(batch.program_id.0)?;
            if !program.status.accepts_registrations() {
                return Err(CertisError::validation(
                    "target",
                    format!("program {} is {}", program.id, program.status),
                ));
            }
            (format!("batch {}", id), batch.status)
        }
        Target::Position(id) => {
            let program: Program = r.require(id.0)?;
            if program.kind == ProgramKind::Certification {
                return Err(CertisError::validation(
                    "target",
                    format!(
                        "program {} is a certification; register on one of its batches",
                        id
                    ),
                ));
            }
            (format!("position {}", id), program.status)
        }
    };
    if !status.accepts_registrations() {
        return Err(CertisError::validation(
            "target",
            format!("{} is {} and not open for registration", name, status),
        ));
    }
    Ok(())
}

/// Create a Pending registration. Capacity is untouched.
pub fn submit(
    tx: &StoreTxn,
    subject: SubjectId,
    target: Target,
    details: RegistrationDetails,
    now: DateTime<Utc>,
) -> Result<Registration, CertisError> {
    details.validate()?;
    check_target(tx, target)?;

    for id in tx.registrations_of(subject)? {
        let existing: Registration = tx.require(id.0)?;
        if existing.target == target && existing.is_active() {
            return Err(CertisError::AlreadyRegistered {
                subject,
                target,
                existing: existing.id,
            });
        }
    }

    let registration = Registration {
        id: RegistrationId(tx.next_id(EntityKind::Registration)?),
        subject,
        target,
        status: RegistrationStatus::Pending,
        details,
        submitted_at: now,
        admin_note: None,
        processed_at: None,
        cancelled_at: None,
    };
    tx.put(&registration)?;
    tx.link_registration(&registration)?;
    Ok(registration)
}

fn check_transition(
    registration: &Registration,
    next: RegistrationStatus,
) -> Result<(), CertisError> {
    if !registration.status.can_transition_to(next) {
        return Err(CertisError::InvalidTransition {
            id: registration.id,
            from: registration.status,
            to: next,
        });
    }
    Ok(())
}

/// Approve or reject a Pending registration.
pub fn decide(
    tx: &StoreTxn,
    id: RegistrationId,
    decision: Decision,
    note: Option<String>,
    now: DateTime<Utc>,
) -> Result<Registration, CertisError> {
    if let Some(n) = note.as_ref().filter(|n| n.len() > MAX_TEXT_LENGTH) {
        return Err(CertisError::validation(
            "note",
            format!("length {} exceeds maximum {} bytes", n.len(), MAX_TEXT_LENGTH),
        ));
    }

    let mut registration: Registration = tx.require(id.0)?;
    let next = decision.target_status();
    check_transition(&registration, next)?;

    if decision == Decision::Approved {
        capacity::reserve(tx, registration.target)?;
    }

    registration.status = next;
    registration.admin_note = note;
    registration.processed_at = Some(now);
    tx.put(&registration)?;
    Ok(registration)
}

/// Cancel an Approved registration and free its seat.
pub fn cancel(
    tx: &StoreTxn,
    id: RegistrationId,
    now: DateTime<Utc>,
) -> Result<Registration, CertisError> {
    let mut registration: Registration = tx.require(id.0)?;
    check_transition(&registration, RegistrationStatus::Cancelled)?;

    capacity::release(tx, registration.target)?;
    registration.status = RegistrationStatus::Cancelled;
    registration.cancelled_at = Some(now);
    tx.put(&registration)?;
    Ok(registration)
}

/// Delete a registration and its assessment. An Approved one frees its seat.
pub fn remove(tx: &StoreTxn, id: RegistrationId) -> Result<Registration, CertisError> {
    let registration: Registration = tx.require(id.0)?;
    if registration.status == RegistrationStatus::Approved {
        capacity::release(tx, registration.target)?;
    }
    purge(tx, id)?;
    Ok(registration)
}

/// Drop a registration, its indexes and its assessment without touching
/// capacity. Returns whether an assessment went with it.
pub(crate) fn purge(tx: &StoreTxn, id: RegistrationId) -> Result<bool, CertisError> {
    let registration: Registration = tx.require(id.0)?;
    let assessed = match tx.assessment_of(id)? {
        Some(assessment) => {
            tx.remove::<Assessment>(assessment.0)?;
            tx.unlink_assessment(id)?;
            true
        }
        None => false,
    };
    tx.unlink_registration(&registration)?;
    tx.remove::<Registration>(id.0)?;
    Ok(assessed)
}

/// Load a registration and its assessment.
pub fn detail(r: &impl Reader, id: RegistrationId) -> Result<RegistrationDetail, CertisError> {
    let registration: Registration = r.require(id.0)?;
    let assessment = match r.assessment_of(id)? {
        Some(a) => r.get::<Assessment>(a.0)?,
        None => None,
    };
    Ok(RegistrationDetail {
        registration,
        assessment,
    })
}

// =============================================================================
// TESTS
// =============================================================================
