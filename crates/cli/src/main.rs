//! Operator CLI for the stowage storage audit.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;
use stowage_audit::{
    AuditContext, AuditSummary, Auditor, CancellationToken, Phase, ProgressObserver,
    RemediationAction, RemediationReport,
};
use stowage_core::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status of a run stopped by an interrupt; resume by running it again.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "stowagectl")]
#[command(about = "Audit and reconcile the bundle catalog against the object store")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "STOWAGE_CONFIG",
        default_value = "config/stowage.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit the catalog against the object store
    Audit {
        #[command(subcommand)]
        mode: AuditCommands,
    },
    /// Apply (or preview) corrections from audit findings
    Remediate {
        action: ActionArg,
        /// Make changes. Without this flag nothing is modified.
        #[arg(long, default_value_t = false)]
        apply: bool,
        /// Findings file (default: the matching audit's artifact)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Check catalog and object store connectivity
    Health,
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Verify every catalog version and manifest entry, resuming if interrupted
    Full {
        /// Discard an unfinished checkpoint and start over
        #[arg(long, default_value_t = false)]
        restart: bool,
    },
    /// Find unreferenced broken versions and orphaned store paths
    Unused {
        /// Directory holding completed full-audit findings
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Find versions whose manifest is broken but whose archive is intact
    Manifests {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Plan downgrades for channels pointing at broken versions
    DefaultChannels {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Include non-default channels
        #[arg(long, default_value_t = false)]
        all_channels: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    Downgrade,
    Manifests,
    SoftDelete,
    PurgeOrphans,
}

impl From<ActionArg> for RemediationAction {
    fn from(arg: ActionArg) -> Self {
        match arg {
            ActionArg::Downgrade => RemediationAction::Downgrade,
            ActionArg::Manifests => RemediationAction::Manifests,
            ActionArg::SoftDelete => RemediationAction::SoftDelete,
            ActionArg::PurgeOrphans => RemediationAction::PurgeOrphans,
        }
    }
}

/// Logs page throughput for long runs.
struct ProgressLog {
    started: Instant,
    items: Mutex<u64>,
}

impl ProgressLog {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            items: Mutex::new(0),
        }
    }
}

impl ProgressObserver for ProgressLog {
    fn on_page(&self, phase: Phase, first_id: i64, last_id: i64, items: usize) {
        let Ok(mut total) = self.items.lock() else {
            return;
        };
        *total += items as u64;
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            *total as f64 / elapsed
        } else {
            0.0
        };
        tracing::debug!(
            phase = %phase,
            first_id,
            last_id,
            items_this_run = *total,
            items_per_sec = %format_args!("{rate:.1}"),
            "Progress"
        );
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let Cli { config, command } = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&config)?;

    let storage = stowage_storage::from_config(&config.storage)
        .await
        .context("failed to initialize object store")?;
    let catalog = stowage_catalog::from_config(&config.catalog)
        .await
        .context("failed to initialize catalog")?;

    if let Commands::Health = command {
        storage
            .health_check()
            .await
            .context("object store health check failed")?;
        catalog
            .health_check()
            .await
            .context("catalog health check failed")?;
        println!("Object store: ok ({})", storage.backend_name());
        println!("Catalog: ok");
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let ctx = AuditContext::new(catalog, storage, config.audit.clone())
        .context("failed to initialize audit metrics")?
        .with_cancellation(cancel)
        .with_observer(std::sync::Arc::new(ProgressLog::new()));
    let auditor = Auditor::new(ctx);

    match command {
        Commands::Audit { mode } => run_audit(&auditor, mode).await,
        Commands::Remediate {
            action,
            apply,
            input,
        } => {
            let report = auditor
                .remediate(action.into(), apply, input.as_deref())
                .await
                .context("remediation failed")?;
            print_report(&report, &config.audit.artifacts_dir);
            Ok(if report.interrupted {
                ExitCode::from(EXIT_INTERRUPTED)
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Health => Ok(ExitCode::SUCCESS),
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if path.exists() {
        tracing::info!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path.display());
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("STOWAGE_").ignore(&["config"]).split("__"))
        .extract()
        .context("failed to load configuration")?;
    config.validate().map_err(stowage_core::Error::Config)?;
    Ok(config)
}

/// Cancel at the next page or batch boundary on Ctrl-C; in-flight work drains first.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping at the next boundary");
            cancel.cancel();
        }
    });
}

async fn run_audit(auditor: &Auditor, mode: AuditCommands) -> Result<ExitCode> {
    let artifacts = auditor.context().config.artifacts_dir.clone();
    match mode {
        AuditCommands::Full { restart } => {
            let summary = auditor
                .run_full(restart)
                .await
                .context("full audit failed")?;
            print_summary(&summary);
            Ok(if summary.completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_INTERRUPTED)
            })
        }
        AuditCommands::Unused { input } => {
            let Some(report) = auditor
                .run_unused(input.as_deref())
                .await
                .context("unused audit failed")?
            else {
                return Ok(interrupted());
            };
            println!("Unused versions: {}", report.unused_versions.len());
            println!("Orphaned store paths: {}", report.orphans.len());
            println!("Artifacts: {}", artifacts.join("unused").display());
            if report.interrupted {
                eprintln!(
                    "Orphan walk interrupted; orphans.json covers only the organizations walked."
                );
                return Ok(ExitCode::from(EXIT_INTERRUPTED));
            }
            Ok(ExitCode::SUCCESS)
        }
        AuditCommands::Manifests { input } => {
            let Some(broken) = auditor
                .run_manifests(input.as_deref())
                .await
                .context("manifest audit failed")?
            else {
                return Ok(interrupted());
            };
            println!("Versions needing manifest cleanup: {}", broken.len());
            println!("Artifacts: {}", artifacts.join("manifests").display());
            Ok(ExitCode::SUCCESS)
        }
        AuditCommands::DefaultChannels {
            input,
            all_channels,
        } => {
            let Some(plan) = auditor
                .run_default_channels(input.as_deref(), all_channels)
                .await
                .context("default channel audit failed")?
            else {
                return Ok(interrupted());
            };

            if plan.candidates.is_empty() {
                println!("No downgrades planned.");
            } else {
                println!(
                    "{:<10} {:<20} {:<30} {:<12} {:<12} Replacement",
                    "Channel", "Name", "App", "Broken", "Target"
                );
                println!("{}", "-".repeat(100));
                for c in &plan.candidates {
                    println!(
                        "{:<10} {:<20} {:<30} {:<12} {:<12} {}",
                        c.channel_id,
                        c.channel_name,
                        c.app_id,
                        c.broken_version_id,
                        c.replacement_version_id,
                        c.replacement_version_name
                    );
                }
            }
            if !plan.no_candidates.is_empty() {
                println!(
                    "\n{} channel(s) have no intact version in their history and need review.",
                    plan.no_candidates.len()
                );
            }
            println!(
                "Artifacts: {}",
                artifacts.join("default-channels").display()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn interrupted() -> ExitCode {
    eprintln!("Full audit interrupted before completing; run the command again to resume.");
    ExitCode::from(EXIT_INTERRUPTED)
}

fn print_summary(summary: &AuditSummary) {
    let status = if summary.completed {
        "completed"
    } else if summary.interrupted {
        "interrupted"
    } else {
        "incomplete"
    };
    println!("Full audit {status}");
    println!("  Lookup:                   {:?}", summary.lookup);
    println!("  Phase / cursor:           {} / {}", summary.phase, summary.cursor);
    println!("  Pages:                    {}", summary.pages);
    println!("  Versions checked:         {}", summary.versions_checked);
    println!("  Manifest entries checked: {}", summary.manifest_entries_checked);
    println!("  Missing versions:         {}", summary.missing_versions);
    println!("  Missing manifest entries: {}", summary.missing_manifest_entries);
    println!("  Apps with issues:         {}", summary.apps_with_issues);
    if summary.interrupted {
        println!("\nRun `stowagectl audit full` again to resume.");
    }
}

fn print_report(report: &RemediationReport, artifacts: &Path) {
    let mode = if report.apply { "applied" } else { "dry run" };
    println!("Remediation {} ({mode})", report.action);
    println!("  Items:            {}", report.total);
    if report.apply {
        println!("  Applied:          {}", report.applied);
        println!("  Already applied:  {}", report.already_applied);
        println!("  Conflicts:        {}", report.conflicts);
    } else {
        println!("  Would change:     {}", report.planned);
    }
    println!("  Protected skips:  {}", report.skipped_protected);
    println!(
        "Report: {}",
        artifacts
            .join(stowage_audit::runner::REMEDIATION_DIR)
            .join(report.action.report_file())
            .display()
    );
    if report.interrupted {
        println!("\nInterrupted before every batch ran. Re-run to continue.");
    }
    if !report.apply && report.planned > 0 {
        println!("\nNothing was changed. Re-run with --apply to make these changes.");
    }
}
