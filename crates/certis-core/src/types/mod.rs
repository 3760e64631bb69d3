//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the portal:
//! - Entity identifiers (`ProgramId`, `BatchId`, `RegistrationId`, ...)
//! - Unified status enumerations (`ProgramStatus`, `RegistrationStatus`)
//! - Registration targets (`Target`)
//! - Error types (`CertisError`)
//!
//! Entity records and their create/patch inputs live in [`records`].
//!
//! ## Status Enumerations
//!
//! Every status concern has exactly one tagged type. Comparisons happen on
//! variants, never on strings; the human labels are presentation only.

mod records;

pub use records::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a certification or internship program.
    ProgramId
);
id_type!(
    /// Identifier of a certification module.
    ModuleId
);
id_type!(
    /// Identifier of a certification batch (cohort).
    BatchId
);
id_type!(
    /// Identifier of a registration.
    RegistrationId
);
id_type!(
    /// Identifier of an assessment.
    AssessmentId
);
id_type!(
    /// The registrant, as asserted by the identity provider.
    SubjectId
);
id_type!(
    /// The assessor, as asserted by the identity provider.
    EvaluatorId
);

/// The kinds of persisted entity, used for id sequences and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Program,
    Module,
    Batch,
    Registration,
    Assessment,
}

impl EntityKind {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Program => "program",
            EntityKind::Module => "module",
            EntityKind::Batch => "batch",
            EntityKind::Registration => "registration",
            EntityKind::Assessment => "assessment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PROGRAMS
// =============================================================================

/// Program variant.
///
/// Certification programs own modules and batches; registrations target a
/// batch. Internship programs have no sub-batches and act as a single
/// position with their own quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramKind {
    Certification,
    Internship,
}

impl ProgramKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramKind::Certification => "certification",
            ProgramKind::Internship => "internship",
        }
    }
}

impl fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProgramKind {
    type Err = CertisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "certification" | "sertifikasi" => Ok(ProgramKind::Certification),
            "internship" | "pkl" | "magang" => Ok(ProgramKind::Internship),
            _ => Err(CertisError::validation("kind", format!("unknown program kind '{s}'"))),
        }
    }
}

/// Publication status shared by programs and batches.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    /// Being prepared; not open for registration.
    #[default]
    Draft,
    /// Open for registration.
    Active,
    /// Finished; no further registrations.
    Closed,
}

impl ProgramStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramStatus::Draft => "draft",
            ProgramStatus::Active => "active",
            ProgramStatus::Closed => "closed",
        }
    }

    /// Whether new registrations may be submitted.
    #[must_use]
    pub fn accepts_registrations(&self) -> bool {
        matches!(self, ProgramStatus::Active)
    }
}

impl fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProgramStatus {
    type Err = CertisError;

    /// Accepts the English names and the legacy labels ("draf", "aktif", "selesai").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" | "draf" => Ok(ProgramStatus::Draft),
            "active" | "aktif" => Ok(ProgramStatus::Active),
            "closed" | "selesai" => Ok(ProgramStatus::Closed),
            _ => Err(CertisError::validation("status", format!("unknown status '{s}'"))),
        }
    }
}

// =============================================================================
// REGISTRATIONS
// =============================================================================

/// Lifecycle state of a registration.
///
/// ```text
/// Pending ──approve──▶ Approved ──cancel──▶ Cancelled
///    │
///    └────reject────▶ Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl RegistrationStatus {
    /// All states, in lifecycle order.
    pub const ALL: [RegistrationStatus; 4] = [
        RegistrationStatus::Pending,
        RegistrationStatus::Approved,
        RegistrationStatus::Rejected,
        RegistrationStatus::Cancelled,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }

    /// Rejected and Cancelled accept no further transitions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Rejected | RegistrationStatus::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the lifecycle graph.
    #[must_use]
    pub fn can_transition_to(&self, next: RegistrationStatus) -> bool {
        matches!(
            (self, next),
            (
                RegistrationStatus::Pending,
                RegistrationStatus::Approved | RegistrationStatus::Rejected
            ) | (RegistrationStatus::Approved, RegistrationStatus::Cancelled)
        )
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RegistrationStatus {
    type Err = CertisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RegistrationStatus::Pending),
            "approved" => Ok(RegistrationStatus::Approved),
            "rejected" => Ok(RegistrationStatus::Rejected),
            "cancelled" | "canceled" => Ok(RegistrationStatus::Cancelled),
            _ => Err(CertisError::validation("status", format!("unknown status '{s}'"))),
        }
    }
}

/// An admin's verdict on a pending registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    #[serde(alias = "approve")]
    Approved,
    #[serde(alias = "reject")]
    Rejected,
}

impl Decision {
    /// The registration status this decision leads to.
    #[must_use]
    pub fn target_status(&self) -> RegistrationStatus {
        match self {
            Decision::Approved => RegistrationStatus::Approved,
            Decision::Rejected => RegistrationStatus::Rejected,
        }
    }
}

impl std::str::FromStr for Decision {
    type Err = CertisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Ok(Decision::Approved),
            "reject" | "rejected" => Ok(Decision::Rejected),
            _ => Err(CertisError::validation("decision", format!("unknown decision '{s}'"))),
        }
    }
}

// =============================================================================
// TARGETS
// =============================================================================

/// What a registration books a seat on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A batch of a certification program.
    Batch(BatchId),
    /// An internship program acting as its own single position.
    Position(ProgramId),
}

impl Target {
    /// Index key: (kind tag, id).
    #[must_use]
    pub fn key(&self) -> (u8, u64) {
        match self {
            Target::Batch(id) => (0, id.0),
            Target::Position(id) => (1, id.0),
        }
    }

    #[must_use]
    pub fn kind_str(&self) -> &'static str {
        match self {
            Target::Batch(_) => "batch",
            Target::Position(_) => "position",
        }
    }

    /// Parse the `kind` path segment used by the CLI and HTTP surface.
    pub fn from_parts(kind: &str, id: u64) -> Result<Self, CertisError> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "batch" => Ok(Target::Batch(BatchId(id))),
            "position" | "internship" => Ok(Target::Position(ProgramId(id))),
            other => Err(CertisError::validation(
                "target",
                format!("unknown target kind '{other}'"),
            )),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Batch(id) => write!(f, "batch {}", id),
            Target::Position(id) => write!(f, "position {}", id),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by the portal core.
///
/// - No silent failures: every variant names the offending field or id
/// - Store failures are reported as-is and never retried here
/// - A failed operation leaves the store exactly as it was
#[derive(Debug, Error)]
pub enum CertisError {
    /// Malformed, missing or out-of-enumeration input.
    #[error("Validation failed on '{field}': {reason}")]
    ValidationFailed { field: String, reason: String },

    /// Unknown id.
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: u64 },

    /// A state machine precondition was violated.
    #[error("Registration {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: RegistrationId,
        from: RegistrationStatus,
        to: RegistrationStatus,
    },

    /// The target has no seat left.
    #[error("Capacity exceeded on {target}: {registered}/{quota} seats taken")]
    CapacityExceeded {
        target: Target,
        quota: u32,
        registered: u32,
    },

    /// The subject already holds a pending or approved registration for the target.
    #[error("Subject {subject} already registered on {target} (registration {existing})")]
    AlreadyRegistered {
        subject: SubjectId,
        target: Target,
        existing: RegistrationId,
    },

    /// A component score lies outside [0, 100].
    #[error("Score for '{component}' out of range [0, 100]: {value}")]
    OutOfRange { component: String, value: String },

    /// Evaluation requested on a registration that is not approved.
    #[error("Registration {id} is {status}; only approved registrations can be assessed")]
    InvalidState {
        id: RegistrationId,
        status: RegistrationStatus,
    },

    /// The underlying store failed (open, transaction, commit, I/O).
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CertisError {
    /// Shorthand for [`CertisError::ValidationFailed`].
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`CertisError::NotFound`].
    #[must_use]
    pub fn not_found(kind: EntityKind, id: u64) -> Self {
        Self::NotFound { kind, id }
    }

    /// Stable machine-readable code for API envelopes.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            CertisError::ValidationFailed { .. } => "validation_failed",
            CertisError::NotFound { .. } => "not_found",
            CertisError::InvalidTransition { .. } => "invalid_transition",
            CertisError::CapacityExceeded { .. } => "capacity_exceeded",
            CertisError::AlreadyRegistered { .. } => "already_registered",
            CertisError::OutOfRange { .. } => "out_of_range",
            CertisError::InvalidState { .. } => "invalid_state",
            CertisError::Storage(_) => "storage",
            CertisError::Serialization(_) => "serialization",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_edges() {
        use RegistrationStatus::*;

        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Cancelled));
        assert!(!Approved.can_transition_to(Rejected));
        for next in RegistrationStatus::ALL {
            assert!(!Rejected.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn terminal_states() {
        assert!(RegistrationStatus::Rejected.is_terminal());
        assert!(RegistrationStatus::Cancelled.is_terminal());
        assert!(!RegistrationStatus::Pending.is_terminal());
        assert!(!RegistrationStatus::Approved.is_terminal());
    }

    #[test]
    fn legacy_status_labels_parse() {
        assert_eq!("Aktif".parse::<ProgramStatus>().ok(), Some(ProgramStatus::Active));
        assert_eq!("Draf".parse::<ProgramStatus>().ok(), Some(ProgramStatus::Draft));
        assert_eq!("Selesai".parse::<ProgramStatus>().ok(), Some(ProgramStatus::Closed));
        assert!("archived".parse::<ProgramStatus>().is_err());
    }

    #[test]
    fn target_keys_do_not_collide() {
        assert_ne!(Target::Batch(BatchId(7)).key(), Target::Position(ProgramId(7)).key());
    }

    #[test]
    fn target_from_parts() {
        assert_eq!(
            Target::from_parts("batch", 3).ok(),
            Some(Target::Batch(BatchId(3)))
        );
        assert_eq!(
            Target::from_parts("Position", 4).ok(),
            Some(Target::Position(ProgramId(4)))
        );
        assert!(matches!(
            Target::from_parts("room", 1),
            Err(CertisError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn decision_maps_to_status() {
        assert_eq!(
            Decision::Approved.target_status(),
            RegistrationStatus::Approved
        );
        assert_eq!("reject".parse::<Decision>().ok(), Some(Decision::Rejected));
    }

    #[test]
    fn error_codes_are_stable() {
        let err = CertisError::not_found(EntityKind::Batch, 9);
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.to_string(), "batch 9 not found");
    }
}
