//! # Entity Records
//!
//! Persisted records and the inputs that create or patch them.
//!
//! Records are plain data: relations are ids, never embedded objects.
//! Loading a related record is always an explicit store call.

use super::{
    AssessmentId, BatchId, CertisError, EvaluatorId, ModuleId, ProgramId, ProgramKind,
    ProgramStatus, RegistrationId, RegistrationStatus, SubjectId, Target,
};
use crate::grading::{ComponentScore, Grade};
use crate::primitives::{MAX_DOCUMENTS, MAX_NAME_LENGTH, MAX_TEXT_LENGTH, MAX_URL_LENGTH};
use crate::score::Score;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// FIELD VALIDATION
// =============================================================================

/// Require a non-empty name within `MAX_NAME_LENGTH`.
pub(crate) fn validate_name(field: &str, value: &str) -> Result<(), CertisError> {
    if value.trim().is_empty() {
        return Err(CertisError::validation(field, "must not be empty"));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(CertisError::validation(
            field,
            format!("length {} exceeds maximum {} bytes", value.len(), MAX_NAME_LENGTH),
        ));
    }
    Ok(())
}

pub(crate) fn validate_text(field: &str, value: Option<&str>) -> Result<(), CertisError> {
    match value {
        Some(v) if v.len() > MAX_TEXT_LENGTH => Err(CertisError::validation(
            field,
            format!("length {} exceeds maximum {} bytes", v.len(), MAX_TEXT_LENGTH),
        )),
        _ => Ok(()),
    }
}

/// URLs are opaque; only emptiness and length are checked.
pub(crate) fn validate_url(field: &str, value: Option<&str>) -> Result<(), CertisError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(CertisError::validation(field, "must not be empty")),
        Some(v) if v.len() > MAX_URL_LENGTH => Err(CertisError::validation(
            field,
            format!("length {} exceeds maximum {} bytes", v.len(), MAX_URL_LENGTH),
        )),
        _ => Ok(()),
    }
}

fn validate_dates(start: NaiveDate, end: NaiveDate) -> Result<(), CertisError> {
    if end < start {
        return Err(CertisError::validation(
            "end_date",
            format!("{} is before start date {}", end, start),
        ));
    }
    Ok(())
}

/// An empty string clears an optional URL; anything else replaces it.
fn patch_url(field: &str, slot: &mut Option<String>, value: &str) -> Result<(), CertisError> {
    if value.is_empty() {
        *slot = None;
    } else {
        validate_url(field, Some(value))?;
        *slot = Some(value.to_string());
    }
    Ok(())
}

// =============================================================================
// PROGRAM
// =============================================================================

/// A certification program or an internship position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub kind: ProgramKind,
    pub name: String,
    pub description: String,
    /// Seats. For internships this is the position quota; for certifications
    /// it is informational and each batch carries its own.
    pub quota: u32,
    /// Approved registrations on the position. Always 0 for certifications.
    pub registered: u32,
    pub status: ProgramStatus,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProgram {
    pub kind: ProgramKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub quota: u32,
    #[serde(default)]
    pub status: ProgramStatus,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl NewProgram {
    pub fn validate(&self) -> Result<(), CertisError> {
        validate_name("name", &self.name)?;
        validate_text("description", Some(&self.description))?;
        validate_url("thumbnail_url", self.thumbnail_url.as_deref())
    }

    pub(crate) fn into_record(self, id: ProgramId, now: DateTime<Utc>) -> Program {
        Program {
            id,
            kind: self.kind,
            name: self.name.trim().to_string(),
            description: self.description,
            quota: self.quota,
            registered: 0,
            status: self.status,
            thumbnail_url: self.thumbnail_url,
            created_at: now,
        }
    }
}

/// Partial update of a program. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quota: Option<u32>,
    pub status: Option<ProgramStatus>,
    /// Empty string clears the thumbnail.
    pub thumbnail_url: Option<String>,
}

impl ProgramPatch {
    /// Apply onto `program`, validating every touched field first.
    pub fn apply_to(&self, program: &mut Program) -> Result<(), CertisError> {
        let mut next = program.clone();
        if let Some(name) = &self.name {
            validate_name("name", name)?;
            next.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            validate_text("description", Some(description))?;
            next.description.clone_from(description);
        }
        if let Some(quota) = self.quota {
            if quota < next.registered {
                return Err(CertisError::validation(
                    "quota",
                    format!("{} is below the {} seats already taken", quota, next.registered),
                ));
            }
            next.quota = quota;
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(url) = &self.thumbnail_url {
            patch_url("thumbnail_url", &mut next.thumbnail_url, url)?;
        }
        *program = next;
        Ok(())
    }
}

// =============================================================================
// MODULE
// =============================================================================

/// An ordered learning unit of a certification program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub program_id: ProgramId,
    pub title: String,
    pub position: u32,
    pub material_url: Option<String>,
}

/// Input for creating a module. Without a position it is appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewModule {
    pub program_id: ProgramId,
    pub title: String,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub material_url: Option<String>,
}

impl NewModule {
    pub fn validate(&self) -> Result<(), CertisError> {
        validate_name("title", &self.title)?;
        validate_url("material_url", self.material_url.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulePatch {
    pub title: Option<String>,
    pub position: Option<u32>,
    /// Empty string clears the material link.
    pub material_url: Option<String>,
}

impl ModulePatch {
    pub fn apply_to(&self, module: &mut Module) -> Result<(), CertisError> {
        let mut next = module.clone();
        if let Some(title) = &self.title {
            validate_name("title", title)?;
            next.title = title.trim().to_string();
        }
        if let Some(position) = self.position {
            next.position = position;
        }
        if let Some(url) = &self.material_url {
            patch_url("material_url", &mut next.material_url, url)?;
        }
        *module = next;
        Ok(())
    }
}

// =============================================================================
// BATCH
// =============================================================================

/// A scheduled cohort of a certification program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: BatchId,
    pub program_id: ProgramId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub quota: u32,
    /// Approved registrations; never exceeds `quota`.
    pub registered: u32,
    pub status: ProgramStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBatch {
    pub program_id: ProgramId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub quota: u32,
    #[serde(default)]
    pub status: ProgramStatus,
}

impl NewBatch {
    pub fn validate(&self) -> Result<(), CertisError> {
        validate_name("name", &self.name)?;
        validate_dates(self.start_date, self.end_date)
    }

    pub(crate) fn into_record(self, id: BatchId, now: DateTime<Utc>) -> Batch {
        Batch {
            id,
            program_id: self.program_id,
            name: self.name.trim().to_string(),
            start_date: self.start_date,
            end_date: self.end_date,
            quota: self.quota,
            registered: 0,
            status: self.status,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchPatch {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub quota: Option<u32>,
    pub status: Option<ProgramStatus>,
}

impl BatchPatch {
    pub fn apply_to(&self, batch: &mut Batch) -> Result<(), CertisError> {
        let mut next = batch.clone();
        if let Some(name) = &self.name {
            validate_name("name", name)?;
            next.name = name.trim().to_string();
        }
        if let Some(start) = self.start_date {
            next.start_date = start;
        }
        if let Some(end) = self.end_date {
            next.end_date = end;
        }
        validate_dates(next.start_date, next.end_date)?;
        if let Some(quota) = self.quota {
            if quota < next.registered {
                return Err(CertisError::validation(
                    "quota",
                    format!("{} is below the {} seats already taken", quota, next.registered),
                ));
            }
            next.quota = quota;
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        *batch = next;
        Ok(())
    }
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// Registrant-supplied payload. Document links are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationDetails {
    pub motivation: Option<String>,
    pub documents: Vec<String>,
}

impl RegistrationDetails {
    pub fn validate(&self) -> Result<(), CertisError> {
        validate_text("motivation", self.motivation.as_deref())?;
        if self.documents.len() > MAX_DOCUMENTS {
            return Err(CertisError::validation(
                "documents",
                format!("{} documents exceed maximum {}", self.documents.len(), MAX_DOCUMENTS),
            ));
        }
        for doc in &self.documents {
            validate_url("documents", Some(doc))?;
        }
        Ok(())
    }
}

/// A subject's request for a seat on a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub subject: SubjectId,
    pub target: Target,
    pub status: RegistrationStatus,
    pub details: RegistrationDetails,
    pub submitted_at: DateTime<Utc>,
    pub admin_note: Option<String>,
    /// Set when an admin approves or rejects.
    pub processed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Registration {
    /// Pending or Approved: blocks a second registration on the same target.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

// =============================================================================
// ASSESSMENT
// =============================================================================

/// The one assessment of an approved registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub registration: RegistrationId,
    pub components: Vec<ComponentScore>,
    pub final_score: Score,
    pub passed: bool,
    pub grade: Grade,
    pub evaluator: EvaluatorId,
    pub evaluated_at: DateTime<Utc>,
    pub notes: Option<String>,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn batch() -> Batch {
        NewBatch {
            program_id: ProgramId(1),
            name: "Batch 1".into(),
            start_date: date(2026, 1, 5),
            end_date: date(2026, 3, 5),
            quota: 10,
            status: ProgramStatus::Active,
        }
        .into_record(BatchId(1), Utc::now())
    }

    #[test]
    fn batch_dates_must_be_ordered() {
        let input = NewBatch {
            program_id: ProgramId(1),
            name: "Batch".into(),
            start_date: date(2026, 2, 1),
            end_date: date(2026, 1, 31),
            quota: 5,
            status: ProgramStatus::Draft,
        };
        assert!(matches!(
            input.validate(),
            Err(CertisError::ValidationFailed { ref field, .. }) if field == "end_date"
        ));
    }

    #[test]
    fn same_day_batch_is_valid() {
        let mut b = batch();
        let patch = BatchPatch {
            end_date: Some(b.start_date),
            ..BatchPatch::default()
        };
        assert!(patch.apply_to(&mut b).is_ok());
        assert_eq!(b.start_date, b.end_date);
    }

    #[test]
    fn quota_cannot_drop_below_registered() {
        let mut b = batch();
        b.registered = 4;
        let patch = BatchPatch {
            quota: Some(3),
            ..BatchPatch::default()
        };
        assert!(patch.apply_to(&mut b).is_err());
        assert_eq!(b.quota, 10, "failed patch leaves record untouched");

        let patch = BatchPatch {
            quota: Some(4),
            ..BatchPatch::default()
        };
        assert!(patch.apply_to(&mut b).is_ok());
        assert_eq!(b.quota, 4);
    }

    #[test]
    fn failed_patch_is_atomic() {
        let mut b = batch();
        let patch = BatchPatch {
            name: Some("Renamed".into()),
            end_date: Some(date(2025, 1, 1)),
            ..BatchPatch::default()
        };
        assert!(patch.apply_to(&mut b).is_err());
        assert_eq!(b.name, "Batch 1");
    }

    #[test]
    fn empty_thumbnail_clears() {
        let mut program = NewProgram {
            kind: ProgramKind::Certification,
            name: "Web Dev".into(),
            description: String::new(),
            quota: 0,
            status: ProgramStatus::Draft,
            thumbnail_url: Some("https://cdn.example/t.png".into()),
        }
        .into_record(ProgramId(1), Utc::now());

        let patch = ProgramPatch {
            thumbnail_url: Some(String::new()),
            ..ProgramPatch::default()
        };
        patch.apply_to(&mut program).unwrap();
        assert_eq!(program.thumbnail_url, None);
    }

    #[test]
    fn blank_name_rejected() {
        let input = NewProgram {
            kind: ProgramKind::Internship,
            name: "   ".into(),
            description: String::new(),
            quota: 3,
            status: ProgramStatus::Active,
            thumbnail_url: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn too_many_documents_rejected() {
        let details = RegistrationDetails {
            motivation: None,
            documents: (0..=MAX_DOCUMENTS).map(|i| format!("doc-{i}.pdf")).collect(),
        };
        assert!(details.validate().is_err());
    }
}
