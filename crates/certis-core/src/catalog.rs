//! # Catalog
//!
//! CRUD for programs, their modules and their batches.
//!
//! Ownership cascades on delete: a program takes its modules, batches and
//! every registration (with assessment) booked on them; a batch takes its
//! registrations. All functions run inside the caller's transaction.

use crate::registration;
use crate::storage::{Reader, StoreTxn};
use crate::{
    Batch, BatchId, BatchPatch, CertisError, EntityKind, Module, ModuleId, ModulePatch, NewBatch,
    NewModule, NewProgram, Program, ProgramId, ProgramKind, ProgramPatch, Target,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which relations [`load_program`] fetches alongside the program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramIncludes {
    pub batches: bool,
    pub modules: bool,
}

impl ProgramIncludes {
    /// Parse a comma-separated list such as `"batches,modules"`.
    pub fn parse(list: &str) -> Result<Self, CertisError> {
        let mut includes = Self::default();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item {
                "batches" => includes.batches = true,
                "modules" => includes.modules = true,
                other => {
                    return Err(CertisError::validation(
                        "include",
                        format!("unknown relation '{other}'"),
                    ));
                }
            }
        }
        Ok(includes)
    }
}

/// A program with explicitly requested relations. `None` means not loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramView {
    #[serde(flatten)]
    pub program: Program,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batches: Option<Vec<Batch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<Vec<Module>>,
}

/// What a cascading delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Removed {
    pub programs: u64,
    pub modules: u64,
    pub batches: u64,
    pub registrations: u64,
    pub assessments: u64,
}

fn require_certification(program: &Program) -> Result<(), CertisError> {
    if program.kind != ProgramKind::Certification {
        return Err(CertisError::validation(
            "program_id",
            format!(
                "program {} is an internship; only certification programs have modules and batches",
                program.id
            ),
        ));
    }
    Ok(())
}

// =============================================================================
// PROGRAMS
// =============================================================================

pub fn create_program(
    tx: &StoreTxn,
    input: NewProgram,
    now: DateTime<Utc>,
) -> Result<Program, CertisError> {
    input.validate()?;
    let id = ProgramId(tx.next_id(EntityKind::Program)?);
    let program = input.into_record(id, now);
    tx.put(&program)?;
    Ok(program)
}

pub fn update_program(
    tx: &StoreTxn,
    id: ProgramId,
    patch: &ProgramPatch,
) -> Result<Program, CertisError> {
    let mut program: Program = tx.require(id.0)?;
    patch.apply_to(&mut program)?;
    tx.put(&program)?;
    Ok(program)
}

pub fn delete_program(tx: &StoreTxn, id: ProgramId) -> Result<Removed, CertisError> {
    let program: Program = tx.require(id.0)?;
    let mut removed = Removed {
        programs: 1,
        ..Removed::default()
    };

    for module_id in tx.modules_of(id)? {
        if let Some(module) = tx.get::<Module>(module_id.0)? {
            tx.unlink_module(&module)?;
            tx.remove::<Module>(module_id.0)?;
            removed.modules += 1;
        }
    }

    for batch_id in tx.batches_of(id)? {
        let r = delete_batch(tx, batch_id)?;
        removed.batches += r.batches;
        removed.registrations += r.registrations;
        removed.assessments += r.assessments;
    }

    if program.kind == ProgramKind::Internship {
        let r = purge_registrations(tx, Target::Position(id))?;
        removed.registrations += r.registrations;
        removed.assessments += r.assessments;
    }

    tx.remove::<Program>(id.0)?;
    Ok(removed)
}

/// Drop every registration on a target that is itself being deleted.
fn purge_registrations(tx: &StoreTxn, target: Target) -> Result<Removed, CertisError> {
    let mut removed = Removed::default();
    for reg_id in tx.registrations_on(target)? {
        if registration::purge(tx, reg_id)? {
            removed.assessments += 1;
        }
        removed.registrations += 1;
    }
    Ok(removed)
}

/// Load a program and whichever relations were asked for.
pub fn load_program(
    r: &impl Reader,
    id: ProgramId,
    includes: ProgramIncludes,
) -> Result<ProgramView, CertisError> {
    let program: Program = r.require(id.0)?;
    let batches = if includes.batches {
        Some(list_batches(r, id)?)
    } else {
        None
    };
    let modules = if includes.modules {
        Some(list_modules(r, id)?)
    } else {
        None
    };
    Ok(ProgramView {
        program,
        batches,
        modules,
    })
}

// =============================================================================
// MODULES
// =============================================================================

pub fn create_module(tx: &StoreTxn, input: NewModule) -> Result<Module, CertisError> {
    input.validate()?;
    let program: Program = tx.require(input.program_id.0)?;
    require_certification(&program)?;

    let position = match input.position {
        Some(p) => p,
        None => list_modules(tx, program.id)?
            .last()
            .map_or(1, |m| m.position.saturating_add(1)),
    };

    let module = Module {
        id: ModuleId(tx.next_id(EntityKind::Module)?),
        program_id: program.id,
        title: input.title.trim().to_string(),
        position,
        material_url: input.material_url,
    };
    tx.put(&module)?;
    tx.link_module(&module)?;
    Ok(module)
}

pub fn update_module(
    tx: &StoreTxn,
    id: ModuleId,
    patch: &ModulePatch,
) -> Result<Module, CertisError> {
    let mut module: Module = tx.require(id.0)?;
    patch.apply_to(&mut module)?;
    tx.put(&module)?;
    Ok(module)
}

pub fn delete_module(tx: &StoreTxn, id: ModuleId) -> Result<Module, CertisError> {
    let module: Module = tx.require(id.0)?;
    tx.unlink_module(&module)?;
    tx.remove::<Module>(id.0)?;
    Ok(module)
}

/// Modules of a program by position, ties broken by id.
pub fn list_modules(r: &impl Reader, program: ProgramId) -> Result<Vec<Module>, CertisError> {
    let mut modules = Vec::new();
    for id in r.modules_of(program)? {
        modules.push(r.require::<Module>(id.0)?);
    }
    modules.sort_by_key(|m| (m.position, m.id));
    Ok(modules)
}

// =============================================================================
// BATCHES
// =============================================================================

pub fn create_batch(
    tx: &StoreTxn,
    input: NewBatch,
    now: DateTime<Utc>,
) -> Result<Batch, CertisError> {
    input.validate()?;
    let program: Program = tx.require(input.program_id.0)?;
    require_certification(&program)?;

    let id = BatchId(tx.next_id(EntityKind::Batch)?);
    let batch = input.into_record(id, now);
    tx.put(&batch)?;
    tx.link_batch(&batch)?;
    Ok(batch)
}

pub fn update_batch(tx: &StoreTxn, id: BatchId, patch: &BatchPatch) -> Result<Batch, CertisError> {
    let mut batch: Batch = tx.require(id.0)?;
    patch.apply_to(&mut batch)?;
    tx.put(&batch)?;
    Ok(batch)
}

pub fn delete_batch(tx: &StoreTxn, id: BatchId) -> Result<Removed, CertisError> {
    let batch: Batch = tx.require(id.0)?;
    let mut removed = purge_registrations(tx, Target::Batch(id))?;
    tx.unlink_batch(&batch)?;
    tx.remove::<Batch>(id.0)?;
    removed.batches = 1;
    Ok(removed)
}

/// Batches of a program by start date, ties broken by id.
pub fn list_batches(r: &impl Reader, program: ProgramId) -> Result<Vec<Batch>, CertisError> {
    let mut batches = Vec::new();
    for id in r.batches_of(program)? {
        batches.push(r.require::<Batch>(id.0)?);
    }
    batches.sort_by_key(|b| (b.start_date, b.id));
    Ok(batches)
}

// =============================================================================
// TESTS
// =============================================================================
