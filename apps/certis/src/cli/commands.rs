//! # CLI Command Implementations

use super::{BatchAction, ProgramAction};
use crate::config::Settings;
use crate::{AppError, api, audit};
use certis_core::query::program as program_filter;
use certis_core::{
    Batch, BatchId, CertisError, Decision, EvaluatorId, Filter, NewBatch, NewProgram, PageRequest,
    Portal, Program, ProgramId, ProgramIncludes, RegistrationDetails, RegistrationId, SortOrder,
    SubjectId, Target,
};
use serde::Serialize;
use std::fs;

/// Resolved settings plus output mode.
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub json_mode: bool,
}

impl Context {
    fn open(&self) -> Result<Portal, AppError> {
        Ok(Portal::open(
            &self.settings.database,
            self.settings.grading.clone(),
        )?)
    }

    /// Pretty JSON in json mode, otherwise the human rendering.
    fn emit<T: Serialize>(&self, value: &T, human: impl FnOnce(&T)) {
        if self.json_mode {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
        } else {
            human(value);
        }
    }
}

/// Split `name=value` score arguments.
pub fn parse_score_args(args: &[String]) -> Result<Vec<(String, String)>, CertisError> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| {
                    CertisError::validation("scores", format!("expected name=value, got '{arg}'"))
                })
        })
        .collect()
}

fn print_program(p: &Program) {
    println!(
        "#{:<4} {:<13} {:<7} {}/{}  {}",
        p.id, p.kind, p.status, p.registered, p.quota, p.name
    );
}

fn print_batch(b: &Batch) {
    println!(
        "#{:<4} {} .. {}  {:<7} {}/{}  {}",
        b.id, b.start_date, b.end_date, b.status, b.registered, b.quota, b.name
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(ctx: &Context) -> Result<(), AppError> {
    let portal = ctx.open()?;
    let addr = ctx.settings.bind_address();

    println!("Starting Certis HTTP server...");
    println!("  Database: {}", ctx.settings.database.display());
    println!("  Address:  http://{}", addr);
    println!();
    println!("Endpoints:");
    println!("  GET  /health                          - Health check");
    println!("  GET  /status                          - Entity counts");
    println!("  *    /programs, /batches, /modules    - Catalog");
    println!("  *    /registrations                   - Submit, decide, cancel");
    println!("  *    /registrations/{{id}}/assessment   - Grading");
    println!("  GET  /capacity/{{kind}}/{{id}}            - Seats");
    println!();

    api::run_server(&addr, portal).await
}

// =============================================================================
// INIT / STATUS
// =============================================================================

/// Create a fresh database file.
pub fn cmd_init(ctx: &Context, force: bool) -> Result<(), AppError> {
    let path = &ctx.settings.database;
    if path.exists() {
        if !force {
            return Err(AppError::Io(format!(
                "{} already exists (use --force to replace it)",
                path.display()
            )));
        }
        fs::remove_file(path)?;
    }
    ctx.open()?;
    tracing::info!(database = %path.display(), "database initialized");
    ctx.emit(&serde_json::json!({ "database": path.display().to_string() }), |_| {
        println!("Initialized empty database at {}", path.display());
    });
    Ok(())
}

/// Show entity counts.
pub fn cmd_status(ctx: &Context) -> Result<(), AppError> {
    let status = api::StatusResponse::from(ctx.open()?.metrics()?);
    ctx.emit(&status, |s| {
        println!("Certis Status");
        println!("=============");
        println!("Database: {}", ctx.settings.database.display());
        println!();
        println!("Programs:      {}", s.programs);
        println!("Modules:       {}", s.modules);
        println!("Batches:       {}", s.batches);
        println!("Registrations: {}", s.registrations);
        println!("  pending      {}", s.registrations_by_status.pending);
        println!("  approved     {}", s.registrations_by_status.approved);
        println!("  rejected     {}", s.registrations_by_status.rejected);
        println!("  cancelled    {}", s.registrations_by_status.cancelled);
        println!("Assessments:   {}", s.assessments);
    });
    Ok(())
}

// =============================================================================
// CATALOG
// =============================================================================

pub fn cmd_program(ctx: &Context, action: ProgramAction) -> Result<(), AppError> {
    let portal = ctx.open()?;
    match action {
        ProgramAction::Create {
            kind,
            name,
            quota,
            description,
            status,
        } => {
            let program = portal.create_program(NewProgram {
                kind,
                name,
                description,
                quota,
                status,
                thumbnail_url: None,
            })?;
            ctx.emit(&program, print_program);
        }
        ProgramAction::List {
            kind,
            active,
            search,
            page,
            per_page,
        } => {
            let mut filter = Filter::all()
                .and_opt(kind, program_filter::of_kind)
                .and_opt(search.as_deref(), program_filter::name_contains);
            if active {
                filter = filter.and(program_filter::active());
            }
            let page = portal.list_programs(
                &filter,
                SortOrder::Oldest,
                PageRequest::new(page, per_page),
            )?;
            ctx.emit(&page, |page| {
                page.items.iter().for_each(print_program);
                println!("-- page {}/{} ({} total)", page.page, page.last_page, page.total);
            });
        }
        ProgramAction::Show { id, include } => {
            let includes = match include.as_deref() {
                Some(list) => ProgramIncludes::parse(list)?,
                None => ProgramIncludes::default(),
            };
            let view = portal.load_program(ProgramId(id), includes)?;
            ctx.emit(&view, |view| {
                print_program(&view.program);
                if !view.program.description.is_empty() {
                    println!("      {}", view.program.description);
                }
                for module in view.modules.iter().flatten() {
                    println!("  module {}. {}", module.position, module.title);
                }
                for batch in view.batches.iter().flatten() {
                    print!("  batch ");
                    print_batch(batch);
                }
            });
        }
        ProgramAction::Delete { id } => {
            let removed = portal.delete_program(ProgramId(id))?;
            ctx.emit(&removed, |r| {
                println!(
                    "Deleted program {} ({} modules, {} batches, {} registrations, {} assessments)",
                    id, r.modules, r.batches, r.registrations, r.assessments
                );
            });
        }
    }
    Ok(())
}

pub fn cmd_batch(ctx: &Context, action: BatchAction) -> Result<(), AppError> {
    let portal = ctx.open()?;
    match action {
        BatchAction::Create {
            program,
            name,
            start,
            end,
            quota,
            status,
        } => {
            let batch = portal.create_batch(NewBatch {
                program_id: ProgramId(program),
                name,
                start_date: start,
                end_date: end,
                quota,
                status,
            })?;
            ctx.emit(&batch, print_batch);
        }
        BatchAction::List { program } => {
            let batches = portal.list_batches(ProgramId(program))?;
            ctx.emit(&batches, |list| list.iter().for_each(print_batch));
        }
        BatchAction::Delete { id } => {
            let removed = portal.delete_batch(BatchId(id))?;
            ctx.emit(&removed, |r| {
                println!(
                    "Deleted batch {} ({} registrations, {} assessments)",
                    id, r.registrations, r.assessments
                );
            });
        }
    }
    Ok(())
}

// =============================================================================
// REGISTRATION WORKFLOW
// =============================================================================

/// Report and convert a core failure.
fn refused(err: CertisError) -> AppError {
    audit::failure(&err);
    err.into()
}

pub fn cmd_register(
    ctx: &Context,
    subject: u64,
    batch: Option<u64>,
    position: Option<u64>,
    motivation: Option<String>,
    documents: Vec<String>,
) -> Result<(), AppError> {
    let request = api::SubmitRequest {
        subject_id: subject,
        batch_id: batch,
        position_id: position,
        motivation,
        documents,
    };
    let target = request.target()?;
    let details: RegistrationDetails = request.details();
    let reg = ctx
        .open()?
        .submit_registration(SubjectId(subject), target, details)
        .map_err(refused)?;
    audit::registration_submitted(&reg);
    ctx.emit(&api::RegistrationJson::from(reg), |r| {
        println!(
            "Registration {} submitted on {} {} ({})",
            r.id, r.target.kind, r.target.id, r.status
        );
    });
    Ok(())
}

pub fn cmd_decide(
    ctx: &Context,
    id: u64,
    decision: Decision,
    note: Option<String>,
) -> Result<(), AppError> {
    let reg = ctx
        .open()?
        .decide_registration(RegistrationId(id), decision, note)
        .map_err(refused)?;
    audit::registration_decided(&reg);
    ctx.emit(&api::RegistrationJson::from(reg), |r| {
        println!("Registration {} is now {}", r.id, r.status);
    });
    Ok(())
}

pub fn cmd_cancel(ctx: &Context, id: u64) -> Result<(), AppError> {
    let reg = ctx
        .open()?
        .cancel_registration(RegistrationId(id))
        .map_err(refused)?;
    audit::registration_cancelled(&reg);
    ctx.emit(&api::RegistrationJson::from(reg), |r| {
        println!("Registration {} cancelled", r.id);
    });
    Ok(())
}

pub fn cmd_evaluate(
    ctx: &Context,
    id: u64,
    evaluator: u64,
    scores: &[String],
    notes: Option<String>,
) -> Result<(), AppError> {
    let raw = parse_score_args(scores)?;
    let assessment = ctx
        .open()?
        .evaluate_registration(RegistrationId(id), &raw, EvaluatorId(evaluator), notes)
        .map_err(refused)?;
    audit::assessment_recorded(&assessment);
    ctx.emit(&api::AssessmentJson::from(assessment), |a| {
        for c in &a.components {
            println!("  {:<16} {:>6}", c.name, c.score);
        }
        println!(
            "Final {} - {} ({}) - {}",
            a.final_score,
            a.grade,
            a.grade_label,
            if a.passed { "passed" } else { "not passed" }
        );
    });
    Ok(())
}

// =============================================================================
// CAPACITY
// =============================================================================

pub fn cmd_capacity(ctx: &Context, kind: &str, id: u64) -> Result<(), AppError> {
    let view = ctx.open()?.get_capacity(Target::from_parts(kind, id)?)?;
    ctx.emit(&view, |v| {
        println!(
            "{}: {}/{} seats taken, {} remaining",
            v.target, v.registered, v.quota, v.remaining
        );
    });
    Ok(())
}

pub fn cmd_reconcile(ctx: &Context, kind: Option<&str>, id: Option<u64>) -> Result<(), AppError> {
    let portal = ctx.open()?;
    let results = match (kind, id) {
        (Some(kind), Some(id)) => vec![portal.reconcile(Target::from_parts(kind, id)?)?],
        (None, None) => portal.reconcile_all()?,
        _ => {
            return Err(
                CertisError::validation("target", "give both kind and id, or neither").into(),
            );
        }
    };
    results.iter().for_each(audit::capacity_reconciled);
    ctx.emit(&results, |list| {
        let drifted: Vec<_> = list.iter().filter(|r| r.drifted()).collect();
        for r in &drifted {
            println!("{}: {} -> {}", r.target, r.before, r.after);
        }
        println!("{} target(s) checked, {} repaired", list.len(), drifted.len());
    });
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{FileConfig, Overrides};
    use certis_core::{ProgramKind, ProgramStatus, RegistrationStatus};

    fn context(dir: &tempfile::TempDir) -> Context {
        let overrides = Overrides {
            database: Some(dir.path().join("cli.redb")),
            ..Overrides::default()
        };
        Context {
            settings: Settings::merge(FileConfig::default(), overrides).unwrap(),
            json_mode: true,
        }
    }

    #[test]
    fn score_arguments_split_on_equals() {
        let raw = parse_score_args(&["theory = 80".into(), "practice=61.5".into()]).unwrap();
        assert_eq!(
            raw,
            vec![
                ("theory".to_string(), "80".to_string()),
                ("practice".to_string(), "61.5".to_string()),
            ]
        );
        assert!(parse_score_args(&["theory".into()]).is_err());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        cmd_init(&ctx, false).unwrap();
        assert!(matches!(cmd_init(&ctx, false), Err(AppError::Io(_))));
        cmd_init(&ctx, true).unwrap();
    }

    #[test]
    fn register_decide_cancel_through_commands() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        cmd_program(
            &ctx,
            ProgramAction::Create {
                kind: ProgramKind::Internship,
                name: "Support desk".into(),
                quota: 1,
                description: String::new(),
                status: ProgramStatus::Active,
            },
        )
        .unwrap();

        cmd_register(&ctx, 5, None, Some(1), None, vec![]).unwrap();
        cmd_register(&ctx, 6, None, Some(1), None, vec![]).unwrap();
        cmd_decide(&ctx, 1, Decision::Approved, None).unwrap();
        assert!(matches!(
            cmd_decide(&ctx, 2, Decision::Approved, None),
            Err(AppError::Core(CertisError::CapacityExceeded { .. }))
        ));
        cmd_cancel(&ctx, 1).unwrap();
        cmd_decide(&ctx, 2, Decision::Approved, None).unwrap();
        cmd_reconcile(&ctx, None, None).unwrap();

        let portal = ctx.open().unwrap();
        assert_eq!(
            portal.get_registration(RegistrationId(2)).unwrap().status,
            RegistrationStatus::Approved
        );
        assert_eq!(portal.get_capacity(Target::Position(ProgramId(1))).unwrap().registered, 1);
    }

    #[test]
    fn reconcile_needs_both_parts() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        assert!(cmd_reconcile(&ctx, Some("batch"), None).is_err());
    }
}
