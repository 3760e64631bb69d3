//! # Certis - Certification & Internship Portal
//!
//! The main binary for the Certis portal.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for catalog, registration and grading operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │              apps/certis (THE BINARY)            │
//! │                                                  │
//! │   ┌─────────────┐          ┌─────────────┐       │
//! │   │    CLI      │          │  HTTP API   │       │
//! │   │   (clap)    │          │   (axum)    │       │
//! │   └──────┬──────┘          └──────┬──────┘       │
//! │          └───────────┬────────────┘              │
//! │                      ▼                           │
//! │              ┌───────────────┐                   │
//! │              │  certis-core  │                   │
//! │              │  (THE LOGIC)  │                   │
//! │              └───────────────┘                   │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! certis server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! certis program create --kind internship --name "Backend intern" --quota 2 --status active
//! certis register --subject 7 --position 1
//! certis decide 1 approve
//! certis evaluate 1 --evaluator 3 -s discipline=85 -s teamwork=90 -s skill=78.5
//! ```

use certis::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // CERTIS_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("CERTIS_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "certis=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Certis startup banner.
fn print_banner() {
    println!(
        r#"
   ██████╗███████╗██████╗ ████████╗██╗███████╗
  ██╔════╝██╔════╝██╔══██╗╚══██╔══╝██║██╔════╝
  ██║     █████╗  ██████╔╝   ██║   ██║███████╗
  ██║     ██╔══╝  ██╔══██╗   ██║   ██║╚════██║
  ╚██████╗███████╗██║  ██║   ██║   ██║███████║
   ╚═════╝╚══════╝╚═╝  ╚═╝   ╚═╝   ╚═╝╚══════╝

  Certification & Internship Portal v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
