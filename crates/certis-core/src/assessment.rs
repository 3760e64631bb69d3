//! # Assessment Engine
//!
//! Records the one assessment of an approved registration.
//!
//! The scheme comes from the program kind behind the registration's target.
//! Evaluating again replaces the previous result under the same assessment
//! id, so there is never more than one per registration.

use crate::grading::{self, GradingConfig};
use crate::primitives::MAX_TEXT_LENGTH;
use crate::query::{self, Filter, Page, PageRequest, SortOrder};
use crate::storage::{Reader, StoreTxn};
use crate::{
    Assessment, AssessmentId, Batch, CertisError, EntityKind, EvaluatorId, Program, ProgramKind,
    Registration, RegistrationId, RegistrationStatus, Target,
};
use chrono::{DateTime, Utc};

/// The kind of program a target belongs to.
pub fn program_kind(r: &impl Reader, target: Target) -> Result<ProgramKind, CertisError> {
    let program_id = match target {
        Target::Batch(id) => r.require::<Batch>(id.0)?.program_id,
        Target::Position(id) => id,
    };
    Ok(r.require::<Program>(program_id.0)?.kind)
}

/// Grade `scores` and upsert the assessment of `registration`.
///
/// `scores` are `(component, decimal text)` pairs.
pub fn evaluate(
    tx: &StoreTxn,
    grading: &GradingConfig,
    registration: RegistrationId,
    scores: &[(String, String)],
    evaluator: EvaluatorId,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<Assessment, CertisError> {
    let reg: Registration = tx.require(registration.0)?;
    if reg.status != RegistrationStatus::Approved {
        return Err(CertisError::InvalidState {
            id: reg.id,
            status: reg.status,
        });
    }
    if let Some(n) = notes.as_ref().filter(|n| n.len() > MAX_TEXT_LENGTH) {
        return Err(CertisError::validation(
            "notes",
            format!("length {} exceeds maximum {} bytes", n.len(), MAX_TEXT_LENGTH),
        ));
    }

    let scheme = grading.scheme_for(program_kind(tx, reg.target)?);
    let (components, outcome) = grading::grade(scheme, scores)?;

    let id = match tx.assessment_of(registration)? {
        Some(existing) => existing,
        None => AssessmentId(tx.next_id(EntityKind::Assessment)?),
    };
    let assessment = Assessment {
        id,
        registration,
        components,
        final_score: outcome.final_score,
        passed: outcome.passed,
        grade: outcome.grade,
        evaluator,
        evaluated_at: now,
        notes,
    };
    tx.put(&assessment)?;
    tx.link_assessment(&assessment)?;
    Ok(assessment)
}

/// The assessment of a registration, if any. Unknown registrations are `NotFound`.
pub fn get_assessment(
    r: &impl Reader,
    registration: RegistrationId,
) -> Result<Option<Assessment>, CertisError> {
    r.require::<Registration>(registration.0)?;
    match r.assessment_of(registration)? {
        Some(id) => r.get(id.0),
        None => Ok(None),
    }
}

pub fn list_assessments(
    r: &impl Reader,
    filter: &Filter<Assessment>,
    order: SortOrder,
    page: PageRequest,
) -> Result<Page<Assessment>, CertisError> {
    Ok(query::select(r.scan()?, filter, order, page))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::grading::Grade;
    use crate::storage::RedbStore;
    use crate::{
        Decision, NewBatch, NewProgram, ProgramStatus, RegistrationDetails, SubjectId, catalog,
        registration,
    };
    use chrono::NaiveDate;

    fn raw(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, s)| (n.to_string(), s.to_string()))
            .collect()
    }

    /// A certification batch with one registration in the given state.
    fn setup(approve: bool) -> (RedbStore, RegistrationId) {
        let store = RedbStore::in_memory().unwrap();
        let id = store
            .write(|tx| {
                let now = Utc::now();
                let p = catalog::create_program(
                    tx,
                    NewProgram {
                        kind: ProgramKind::Certification,
                        name: "Data Engineering".into(),
                        description: String::new(),
                        quota: 0,
                        status: ProgramStatus::Active,
                        thumbnail_url: None,
                    },
                    now,
                )?;
                let b = catalog::create_batch(
                    tx,
                    NewBatch {
                        program_id: p.id,
                        name: "Batch 1".into(),
                        start_date: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
                        end_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
                        quota: 5,
                        status: ProgramStatus::Active,
                    },
                    now,
                )?;
                let reg = registration::submit(
                    tx,
                    SubjectId(3),
                    Target::Batch(b.id),
                    RegistrationDetails::default(),
                    now,
                )?;
                if approve {
                    registration::decide(tx, reg.id, Decision::Approved, None, now)?;
                }
                Ok(reg.id)
            })
            .unwrap();
        (store, id)
    }

    #[test]
    fn pending_registration_cannot_be_assessed() {
        let (store, id) = setup(false);
        let result = store.write(|tx| {
            evaluate(
                tx,
                &GradingConfig::default(),
                id,
                &raw(&[("theory", "80"), ("practice", "80")]),
                EvaluatorId(1),
                None,
                Utc::now(),
            )
        });
        assert!(matches!(
            result,
            Err(CertisError::InvalidState {
                status: RegistrationStatus::Pending,
                ..
            })
        ));
    }

    #[test]
    fn reevaluation_replaces_in_place() {
        let (store, id) = setup(true);
        let grading = GradingConfig::default();
        let first = store
            .write(|tx| {
                evaluate(
                    tx,
                    &grading,
                    id,
                    &raw(&[("theory", "80"), ("practice", "60")]),
                    EvaluatorId(1),
                    None,
                    Utc::now(),
                )
            })
            .unwrap();
        assert_eq!(first.grade, Grade::D);
        assert!(!first.passed);

        let second = store
            .write(|tx| {
                evaluate(
                    tx,
                    &grading,
                    id,
                    &raw(&[("theory", "95"), ("practice", "90")]),
                    EvaluatorId(2),
                    Some("retake".into()),
                    Utc::now(),
                )
            })
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.final_score.to_string(), "92.00");
        assert_eq!(second.grade, Grade::A);

        let stored = store.read(|r| get_assessment(r, id)).unwrap().unwrap();
        assert_eq!(stored, second);
        assert_eq!(store.read(|r| r.count::<Assessment>()).unwrap(), 1);
    }

    #[test]
    fn bad_score_leaves_previous_result() {
        let (store, id) = setup(true);
        let grading = GradingConfig::default();
        store
            .write(|tx| {
                evaluate(
                    tx,
                    &grading,
                    id,
                    &raw(&[("theory", "70"), ("practice", "70")]),
                    EvaluatorId(1),
                    None,
                    Utc::now(),
                )
            })
            .unwrap();

        let result = store.write(|tx| {
            evaluate(
                tx,
                &grading,
                id,
                &raw(&[("theory", "70"), ("practice", "170")]),
                EvaluatorId(1),
                None,
                Utc::now(),
            )
        });
        assert!(matches!(
            result,
            Err(CertisError::OutOfRange { ref component, .. }) if component == "practice"
        ));

        let stored = store.read(|r| get_assessment(r, id)).unwrap().unwrap();
        assert_eq!(stored.final_score.to_string(), "70.00");
        assert!(stored.passed);
    }

    #[test]
    fn passed_filter_lists_assessments() {
        let (store, id) = setup(true);
        store
            .write(|tx| {
                evaluate(
                    tx,
                    &GradingConfig::default(),
                    id,
                    &raw(&[("theory", "50"), ("practice", "50")]),
                    EvaluatorId(1),
                    None,
                    Utc::now(),
                )
            })
            .unwrap();
        let failed = store
            .read(|r| {
                list_assessments(
                    r,
                    &Filter::all().and(query::assessment::passed(false)),
                    SortOrder::Newest,
                    PageRequest::default(),
                )
            })
            .unwrap();
        assert_eq!(failed.total, 1);
        assert_eq!(failed.items[0].grade, Grade::E);
    }

    #[test]
    fn unknown_registration_is_not_found() {
        let store = RedbStore::in_memory().unwrap();
        assert!(matches!(
            store.read(|r| get_assessment(r, RegistrationId(99))),
            Err(CertisError::NotFound {
                kind: EntityKind::Registration,
                id: 99
            })
        ));
    }
}
