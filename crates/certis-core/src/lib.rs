//! # certis-core
//!
//! Registration, seat accounting and grading for the Certis certification
//! and internship portal - THE LOGIC.
//!
//! ## Components
//!
//! - **Entity Store** (`storage`, `catalog`): programs, modules, batches,
//!   registrations and assessments in redb, with cascading deletes
//! - **Capacity Tracker** (`capacity`): seat counters that never exceed quota
//! - **Registration State Machine** (`registration`): submit, decide, cancel
//! - **Assessment Engine** (`grading`, `assessment`): fixed-point scoring,
//!   pass/fail and letter grades, one assessment per registration
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - No floating point: scores are integer hundredths
//! - Every state change is one redb write transaction; failures roll back
//! - The core never logs; it returns typed errors and the caller reports them

// =============================================================================
// MODULES
// =============================================================================

pub mod assessment;
pub mod capacity;
pub mod catalog;
pub mod grading;
pub mod portal;
pub mod primitives;
pub mod query;
pub mod registration;
pub mod score;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Assessment, AssessmentId, Batch, BatchId, BatchPatch, CertisError, Decision, EntityKind,
    EvaluatorId, Module, ModuleId, ModulePatch, NewBatch, NewModule, NewProgram, Program,
    ProgramId, ProgramKind, ProgramPatch, ProgramStatus, Registration, RegistrationDetails,
    RegistrationId, RegistrationStatus, SubjectId, Target,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use capacity::{CapacityView, Reconciliation};
pub use catalog::{ProgramIncludes, ProgramView, Removed};
pub use grading::{AssessmentScheme, ComponentScore, Grade, GradingConfig, Outcome};
pub use portal::{Portal, PortalMetrics};
pub use query::{Filter, Page, PageRequest, SortOrder};
pub use registration::RegistrationDetail;
pub use score::{Score, Weight};
pub use storage::RedbStore;
