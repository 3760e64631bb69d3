//! # Portal
//!
//! The facade the API and CLI talk to. Each method opens exactly one
//! transaction on the store and stamps the current time where a record
//! needs one.

use crate::assessment;
use crate::capacity::{self, CapacityView, Reconciliation};
use crate::catalog::{self, ProgramIncludes, ProgramView, Removed};
use crate::grading::GradingConfig;
use crate::query::{self, Filter, Page, PageRequest, SortOrder};
use crate::registration::{self, RegistrationDetail};
use crate::storage::{Reader, RedbStore};
use crate::{
    Assessment, Batch, BatchId, BatchPatch, CertisError, Decision, EvaluatorId, Module, ModuleId,
    ModulePatch, NewBatch, NewModule, NewProgram, Program, ProgramId, ProgramPatch, Registration,
    RegistrationDetails, RegistrationId, RegistrationStatus, SubjectId, Target,
};
use chrono::Utc;
use serde::Serialize;
use std::path::Path;

/// Record counts, for status endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PortalMetrics {
    pub programs: u64,
    pub modules: u64,
    pub batches: u64,
    pub registrations: u64,
    pub assessments: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub cancelled: u64,
}

/// Store plus grading configuration.
#[derive(Debug)]
pub struct Portal {
    store: RedbStore,
    grading: GradingConfig,
}

impl Portal {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>, grading: GradingConfig) -> Result<Self, CertisError> {
        grading.validate()?;
        Ok(Self {
            store: RedbStore::open(path)?,
            grading,
        })
    }

    /// A portal backed by an in-memory database.
    pub fn in_memory(grading: GradingConfig) -> Result<Self, CertisError> {
        grading.validate()?;
        Ok(Self {
            store: RedbStore::in_memory()?,
            grading,
        })
    }

    #[must_use]
    pub fn grading(&self) -> &GradingConfig {
        &self.grading
    }

    // -------------------------------------------------------------------------
    // Programs
    // -------------------------------------------------------------------------

    pub fn create_program(&self, input: NewProgram) -> Result<Program, CertisError> {
        self.store
            .write(|tx| catalog::create_program(tx, input, Utc::now()))
    }

    pub fn get_program(&self, id: ProgramId) -> Result<Program, CertisError> {
        self.store.read(|r| r.require(id.0))
    }

    pub fn load_program(
        &self,
        id: ProgramId,
        includes: ProgramIncludes,
    ) -> Result<ProgramView, CertisError> {
        self.store.read(|r| catalog::load_program(r, id, includes))
    }

    pub fn update_program(
        &self,
        id: ProgramId,
        patch: &ProgramPatch,
    ) -> Result<Program, CertisError> {
        self.store.write(|tx| catalog::update_program(tx, id, patch))
    }

    pub fn delete_program(&self, id: ProgramId) -> Result<Removed, CertisError> {
        self.store.write(|tx| catalog::delete_program(tx, id))
    }

    pub fn list_programs(
        &self,
        filter: &Filter<Program>,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<Page<Program>, CertisError> {
        self.store
            .read(|r| Ok(query::select(r.scan()?, filter, order, page)))
    }

    // -------------------------------------------------------------------------
    // Modules
    // -------------------------------------------------------------------------

    pub fn create_module(&self, input: NewModule) -> Result<Module, CertisError> {
        self.store.write(|tx| catalog::create_module(tx, input))
    }

    pub fn update_module(&self, id: ModuleId, patch: &ModulePatch) -> Result<Module, CertisError> {
        self.store.write(|tx| catalog::update_module(tx, id, patch))
    }

    pub fn delete_module(&self, id: ModuleId) -> Result<Module, CertisError> {
        self.store.write(|tx| catalog::delete_module(tx, id))
    }

    pub fn list_modules(&self, program: ProgramId) -> Result<Vec<Module>, CertisError> {
        self.store.read(|r| {
            r.require::<Program>(program.0)?;
            catalog::list_modules(r, program)
        })
    }

    // -------------------------------------------------------------------------
    // Batches
    // -------------------------------------------------------------------------

    pub fn create_batch(&self, input: NewBatch) -> Result<Batch, CertisError> {
        self.store
            .write(|tx| catalog::create_batch(tx, input, Utc::now()))
    }

    pub fn get_batch(&self, id: BatchId) -> Result<Batch, CertisError> {
        self.store.read(|r| r.require(id.0))
    }

    pub fn update_batch(&self, id: BatchId, patch: &BatchPatch) -> Result<Batch, CertisError> {
        self.store.write(|tx| catalog::update_batch(tx, id, patch))
    }

    pub fn delete_batch(&self, id: BatchId) -> Result<Removed, CertisError> {
        self.store.write(|tx| catalog::delete_batch(tx, id))
    }

    pub fn list_batches(&self, program: ProgramId) -> Result<Vec<Batch>, CertisError> {
        self.store.read(|r| {
            r.require::<Program>(program.0)?;
            catalog::list_batches(r, program)
        })
    }

    /// Batches across all programs, e.g. `batch::of_program` and `batch::active`.
    pub fn find_batches(
        &self,
        filter: &Filter<Batch>,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<Page<Batch>, CertisError> {
        self.store
            .read(|r| Ok(query::select(r.scan()?, filter, order, page)))
    }

    // -------------------------------------------------------------------------
    // Registrations
    // -------------------------------------------------------------------------

    pub fn submit_registration(
        &self,
        subject: SubjectId,
        target: Target,
        details: RegistrationDetails,
    ) -> Result<Registration, CertisError> {
        self.store
            .write(|tx| registration::submit(tx, subject, target, details, Utc::now()))
    }

    pub fn decide_registration(
        &self,
        id: RegistrationId,
        decision: Decision,
        note: Option<String>,
    ) -> Result<Registration, CertisError> {
        self.store
            .write(|tx| registration::decide(tx, id, decision, note, Utc::now()))
    }

    pub fn cancel_registration(&self, id: RegistrationId) -> Result<Registration, CertisError> {
        self.store
            .write(|tx| registration::cancel(tx, id, Utc::now()))
    }

    pub fn get_registration(&self, id: RegistrationId) -> Result<Registration, CertisError> {
        self.store.read(|r| r.require(id.0))
    }

    pub fn registration_detail(
        &self,
        id: RegistrationId,
    ) -> Result<RegistrationDetail, CertisError> {
        self.store.read(|r| registration::detail(r, id))
    }

    pub fn delete_registration(&self, id: RegistrationId) -> Result<Registration, CertisError> {
        self.store.write(|tx| registration::remove(tx, id))
    }

    pub fn list_registrations(
        &self,
        filter: &Filter<Registration>,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<Page<Registration>, CertisError> {
        self.store
            .read(|r| Ok(query::select(r.scan()?, filter, order, page)))
    }

    // -------------------------------------------------------------------------
    // Assessments
    // -------------------------------------------------------------------------

    pub fn evaluate_registration(
        &self,
        id: RegistrationId,
        scores: &[(String, String)],
        evaluator: EvaluatorId,
        notes: Option<String>,
    ) -> Result<Assessment, CertisError> {
        self.store.write(|tx| {
            assessment::evaluate(
                tx,
                &self.grading,
                id,
                scores,
                evaluator,
                notes,
                Utc::now(),
            )
        })
    }

    pub fn get_assessment(&self, id: RegistrationId) -> Result<Option<Assessment>, CertisError> {
        self.store.read(|r| assessment::get_assessment(r, id))
    }

    pub fn list_assessments(
        &self,
        filter: &Filter<Assessment>,
        order: SortOrder,
        page: PageRequest,
    ) -> Result<Page<Assessment>, CertisError> {
        self.store
            .read(|r| assessment::list_assessments(r, filter, order, page))
    }

    // -------------------------------------------------------------------------
    // Capacity
    // -------------------------------------------------------------------------

    pub fn get_capacity(&self, target: Target) -> Result<CapacityView, CertisError> {
        self.store.read(|r| capacity::get_capacity(r, target))
    }

    pub fn reconcile(&self, target: Target) -> Result<Reconciliation, CertisError> {
        self.store.write(|tx| capacity::reconcile(tx, target))
    }

    pub fn reconcile_all(&self) -> Result<Vec<Reconciliation>, CertisError> {
        self.store.write(capacity::reconcile_all)
    }

    // -------------------------------------------------------------------------
    // Metrics
    // -------------------------------------------------------------------------

    pub fn metrics(&self) -> Result<PortalMetrics, CertisError> {
        self.store.read(|r| {
            let mut metrics = PortalMetrics {
                programs: r.count::<Program>()?,
                modules: r.count::<Module>()?,
                batches: r.count::<Batch>()?,
                registrations: r.count::<Registration>()?,
                assessments: r.count::<Assessment>()?,
                ..PortalMetrics::default()
            };
            for reg in r.scan::<Registration>()? {
                let slot = match reg.status {
                    RegistrationStatus::Pending => &mut metrics.pending,
                    RegistrationStatus::Approved => &mut metrics.approved,
                    RegistrationStatus::Rejected => &mut metrics.rejected,
                    RegistrationStatus::Cancelled => &mut metrics.cancelled,
                };
                *slot += 1;
            }
            Ok(metrics)
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
