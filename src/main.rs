//! schema-lens CLI
//!
//! Reads schema descriptions from JSON files and prints the normalized
//! schema, its health report, or a diff between two descriptions.
//! Logs go to stderr so stdout stays machine-readable.

use anyhow::Context;
use clap::{Parser, Subcommand};
use schema_lens::config::{LogConfig, Settings};
use schema_lens::error::{AppError, ErrorResponse};
use schema_lens::snapshot::{SchemaSnapshot, SnapshotSource, SnapshotStore};
use schema_lens::{parse_schema, SchemaDescription};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "schema-lens", version, about = "Normalize, audit and diff schema descriptions")]
struct Cli {
    /// Print single-line JSON instead of pretty output
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the normalized schema (tables, relationships, health)
    Normalize {
        /// Schema description JSON file
        file: PathBuf,
    },
    /// Print only the health report
    Health {
        /// Schema description JSON file
        file: PathBuf,
    },
    /// Diff two schema descriptions
    Diff {
        /// Description to diff from
        from: PathBuf,
        /// Description to diff to
        to: PathBuf,
        #[arg(long, default_value = "deployed")]
        from_source: SnapshotSource,
        #[arg(long, default_value = "local")]
        to_source: SnapshotSource,
        /// Print only the change counters
        #[arg(long)]
        summary: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load configuration")?;
    init_tracing(&settings.log);
    debug!("Analyzer settings: {:?}", settings.analyzer);

    match run(cli, &settings).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => match error_report(&err) {
            Some(report) => {
                error!("{:#}", err);
                eprintln!("{}", serde_json::to_string(&report)?);
                Ok(ExitCode::FAILURE)
            }
            None => Err(err),
        },
    }
}

/// Structured report for failures raised by the library, keeping any file context
fn error_report(err: &anyhow::Error) -> Option<ErrorResponse> {
    let app_error = err.downcast_ref::<AppError>()?;
    let mut report = app_error.to_response();
    report.message = format!("{:#}", err);
    Some(report)
}

async fn run(cli: Cli, settings: &Settings) -> anyhow::Result<()> {
    match cli.command {
        Command::Normalize { file } => {
            let description = read_description(&file).await?;
            let schema = parse_schema(&description, &settings.analyzer)?;
            print_json(&schema, cli.compact)?;
        }
        Command::Health { file } => {
            let description = read_description(&file).await?;
            let schema = parse_schema(&description, &settings.analyzer)?;
            print_json(&schema.health, cli.compact)?;
        }
        Command::Diff {
            from,
            to,
            from_source,
            to_source,
            summary,
        } => {
            let store = SnapshotStore::new();

            let from_snapshot = SchemaSnapshot::capture(
                read_description(&from).await?,
                from_source,
                &settings.analyzer,
            )?
            .with_label(from.display().to_string());
            let to_snapshot = SchemaSnapshot::capture(
                read_description(&to).await?,
                to_source,
                &settings.analyzer,
            )?
            .with_label(to.display().to_string());

            let from_id = store.save(from_snapshot).await?.id;
            let to_id = store.save(to_snapshot).await?.id;

            let diff = store.diff(from_id, to_id).await?;
            info!("{} changes between {} and {}", diff.summary.total_changes(), from.display(), to.display());

            if summary {
                print_json(&diff.summary, cli.compact)?;
            } else {
                print_json(&diff, cli.compact)?;
            }
        }
    }

    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing(log: &LogConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));

    let registry = tracing_subscriber::registry().with(env_filter);

    if log.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

async fn read_description(path: &Path) -> anyhow::Result<SchemaDescription> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let description = SchemaDescription::from_json_str(&raw)
        .with_context(|| format!("invalid schema description in {}", path.display()))?;
    Ok(description)
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> anyhow::Result<()> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", out);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_report_for_library_error() {
        let id = Uuid::new_v4();
        let err = anyhow::Error::new(AppError::SnapshotNotFound { id }).context("diff failed");

        let report = error_report(&err).unwrap();

        assert_eq!(report.code, "SNAPSHOT_NOT_FOUND");
        assert!(report.message.starts_with("diff failed: "));
        assert!(report.message.contains(&id.to_string()));
    }

    #[test]
    fn test_error_report_skips_foreign_errors() {
        let err = anyhow::anyhow!("failed to load configuration");
        assert!(error_report(&err).is_none());
    }
}
