//! # Certis CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `status` - Show entity counts
//! - `program` - Create, list, show and delete programs
//! - `batch` - Create, list and delete batches
//! - `register` - Submit a registration
//! - `decide` - Approve or reject a pending registration
//! - `cancel` - Cancel a registration
//! - `evaluate` - Record an assessment
//! - `capacity` - Show seats on a batch or position
//! - `reconcile` - Recount seat counters

mod commands;

use crate::AppError;
use crate::config::{Overrides, Settings};
use certis_core::{Decision, ProgramKind, ProgramStatus};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Certis - certification & internship portal
///
/// Programs, batches, registrations with seat accounting, and grading.
#[derive(Parser, Debug)]
#[command(name = "certis")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the redb database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (default 127.0.0.1)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (default 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Replace an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Show entity counts and registrations by status
    Status,

    /// Manage programs
    Program {
        #[command(subcommand)]
        action: ProgramAction,
    },

    /// Manage batches of certification programs
    Batch {
        #[command(subcommand)]
        action: BatchAction,
    },

    /// Submit a registration on a batch or an internship position
    Register {
        /// Applicant id
        #[arg(short, long)]
        subject: u64,

        /// Batch id (certification programs)
        #[arg(short, long, conflicts_with = "position", required_unless_present = "position")]
        batch: Option<u64>,

        /// Internship program id
        #[arg(short, long)]
        position: Option<u64>,

        /// Motivation text
        #[arg(short, long)]
        motivation: Option<String>,

        /// Supporting document URL (repeatable)
        #[arg(long = "document")]
        documents: Vec<String>,
    },

    /// Approve or reject a pending registration
    Decide {
        /// Registration id
        id: u64,

        /// approve | reject
        decision: Decision,

        /// Note stored with the decision
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Cancel an approved registration and free its seat
    Cancel {
        /// Registration id
        id: u64,
    },

    /// Record (or replace) the assessment of an approved registration
    Evaluate {
        /// Registration id
        id: u64,

        /// Evaluator id
        #[arg(short, long)]
        evaluator: u64,

        /// Component score as name=value (repeatable)
        #[arg(short, long = "score", required = true)]
        scores: Vec<String>,

        /// Evaluator notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Show quota and taken seats of a target
    Capacity {
        /// batch | position
        kind: String,

        /// Target id
        id: u64,
    },

    /// Recount approved registrations and repair seat counters
    Reconcile {
        /// batch | position; omit to reconcile everything
        #[arg(requires = "id")]
        kind: Option<String>,

        /// Target id
        id: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProgramAction {
    /// Create a program
    Create {
        /// certification | internship
        #[arg(short, long)]
        kind: ProgramKind,

        #[arg(short, long)]
        name: String,

        /// Seats (internship positions)
        #[arg(long, default_value = "0")]
        quota: u32,

        #[arg(short, long, default_value = "")]
        description: String,

        /// draft | active | closed
        #[arg(short, long, default_value = "draft")]
        status: ProgramStatus,
    },

    /// List programs
    List {
        #[arg(short, long)]
        kind: Option<ProgramKind>,

        /// Only active programs
        #[arg(short, long)]
        active: bool,

        /// Case-insensitive name filter
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "15")]
        per_page: usize,
    },

    /// Show a program
    Show {
        id: u64,

        /// Relations to load, e.g. "batches,modules"
        #[arg(short, long)]
        include: Option<String>,
    },

    /// Delete a program with its modules, batches and registrations
    Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum BatchAction {
    /// Create a batch of a certification program
    Create {
        #[arg(short, long)]
        program: u64,

        #[arg(short, long)]
        name: String,

        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        #[arg(long)]
        quota: u32,

        #[arg(short, long, default_value = "draft")]
        status: ProgramStatus,
    },

    /// List batches of a program
    List {
        #[arg(short, long)]
        program: u64,
    },

    /// Delete a batch and its registrations
    Delete { id: u64 },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let (host, port) = match &cli.command {
        Some(Commands::Server { host, port }) => (host.clone(), *port),
        _ => (None, None),
    };
    let settings = Settings::resolve(Overrides {
        config: cli.config,
        database: cli.database,
        host,
        port,
    })?;
    let ctx = Context {
        settings,
        json_mode: cli.json_mode,
    };

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&ctx).await,
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Status) | None => cmd_status(&ctx),
        Some(Commands::Program { action }) => cmd_program(&ctx, action),
        Some(Commands::Batch { action }) => cmd_batch(&ctx, action),
        Some(Commands::Register {
            subject,
            batch,
            position,
            motivation,
            documents,
        }) => cmd_register(&ctx, subject, batch, position, motivation, documents),
        Some(Commands::Decide { id, decision, note }) => cmd_decide(&ctx, id, decision, note),
        Some(Commands::Cancel { id }) => cmd_cancel(&ctx, id),
        Some(Commands::Evaluate {
            id,
            evaluator,
            scores,
            notes,
        }) => cmd_evaluate(&ctx, id, evaluator, &scores, notes),
        Some(Commands::Capacity { kind, id }) => cmd_capacity(&ctx, &kind, id),
        Some(Commands::Reconcile { kind, id }) => cmd_reconcile(&ctx, kind.as_deref(), id),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_evaluate_scores() {
        let cli = Cli::try_parse_from([
            "certis", "evaluate", "4", "-e", "9", "-s", "theory=80", "-s", "practice=61.5",
        ])
        .unwrap();
        let Some(Commands::Evaluate { id, scores, .. }) = cli.command else {
            panic!("expected evaluate");
        };
        assert_eq!(id, 4);
        assert_eq!(scores, vec!["theory=80", "practice=61.5"]);
    }

    #[test]
    fn register_needs_exactly_one_target() {
        assert!(Cli::try_parse_from(["certis", "register", "-s", "1"]).is_err());
        assert!(
            Cli::try_parse_from(["certis", "register", "-s", "1", "-b", "2", "-p", "3"]).is_err()
        );
        assert!(Cli::try_parse_from(["certis", "register", "-s", "1", "-p", "3"]).is_ok());
    }

    #[test]
    fn decision_accepts_verbs() {
        let cli = Cli::try_parse_from(["certis", "decide", "2", "reject", "-n", "late"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Decide {
                decision: Decision::Rejected,
                ..
            })
        ));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["certis", "status", "--json-mode", "-D", "/tmp/x.redb"]).unwrap();
        assert!(cli.json_mode);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/x.redb")));
    }
}
