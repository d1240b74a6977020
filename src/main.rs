use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repoclone::discovery::fetch_inventory;
use repoclone::report::{collect_open_pull_requests, render, ReportFormat, ReportStyle};
use repoclone::{Config, GitHubClient, GuardVerdict, ReconciliationAction, SyncEngine, SyncPolicy};

#[derive(Parser)]
#[command(name = "repoclone")]
#[command(about = "Mirror every repository of a GitHub organization into a local directory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Default directory repositories are mirrored into
        #[arg(short, long, default_value = "~/src")]
        base_dir: String,
    },

    /// Clone, update and prune local copies of an organization's repositories
    Sync {
        /// Organization to mirror
        org: String,

        /// Local root directory (defaults to base_directory from configuration)
        #[arg(short, long)]
        path: Option<String>,

        /// Clone repositories missing locally
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        clone: Option<bool>,

        /// Update repositories already present
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        update: Option<bool>,

        /// Delete local directories whose repository no longer exists
        #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
        remove: Option<bool>,

        /// Show the planned actions without executing them
        #[arg(long)]
        dry_run: bool,

        /// Do not ask for confirmation before deleting
        #[arg(short, long)]
        yes: bool,

        /// Delete even when the safety limits refuse the plan
        #[arg(long)]
        force: bool,
    },

    /// Report open pull requests across an organization
    Report {
        /// Organization to report on
        org: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        /// Disable colored dates in text output
        #[arg(long)]
        no_color: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let config = load_config(cli.config)?;
    init_logging(cli.verbose, &config)?;
    info!("Starting repoclone v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Init { base_dir } => cmd_init(base_dir, &config),
        Commands::Sync {
            org,
            path,
            clone,
            update,
            remove,
            dry_run,
            yes,
            force,
        } => {
            let policy = SyncPolicy {
                clone: clone.unwrap_or(config.sync.clone),
                update: update.unwrap_or(config.sync.update),
                remove: remove.unwrap_or(config.sync.remove),
            };
            cmd_sync(org, path, policy, dry_run, yes, force, &config).await
        }
        Commands::Report {
            org,
            format,
            no_color,
        } => cmd_report(org, format, no_color, &config).await,
    }
}

/// Initialize logging based on verbosity level
///
/// Logs go to stderr so report output on stdout stays machine-readable.
fn init_logging(verbose: bool, config: &Config) -> Result<()> {
    let default_level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

/// Write configuration with the given base directory
fn cmd_init(base_dir: String, config: &Config) -> Result<ExitCode> {
    let expanded_base_dir = shellexpand::full(&base_dir)?.into_owned();
    std::fs::create_dir_all(&expanded_base_dir)
        .with_context(|| format!("Failed to create base directory {}", expanded_base_dir))?;

    let mut new_config = config.clone();
    new_config.base_directory = base_dir;

    let config_path = Config::default_config_path()?;
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    new_config.save(&config_path)?;

    info!("Configuration saved to: {:?}", config_path);

    println!("✅ repoclone initialized");
    println!("   Config: {:?}", config_path);
    println!("   Base directory: {}", expanded_base_dir);

    Ok(ExitCode::SUCCESS)
}

/// Reconcile the local root with the organization's repositories
async fn cmd_sync(
    org: String,
    path: Option<String>,
    policy: SyncPolicy,
    dry_run: bool,
    yes: bool,
    force: bool,
    config: &Config,
) -> Result<ExitCode> {
    let root = match path {
        Some(path) => shellexpand::full(&path)?.into_owned(),
        None => config.base_directory.clone(),
    };
    let root = PathBuf::from(root);

    let engine = SyncEngine::from_config(config)?;

    println!("🔍 Discovering repositories of {}...", org);
    let plan = engine.prepare(&org, &root, &policy).await?;
    println!(
        "   Found {} repositories, {} local directories",
        plan.remote_count, plan.local_dir_count
    );

    let deletions: Vec<&ReconciliationAction> = plan.deletions().collect();
    if !deletions.is_empty() {
        println!(
            "\n🗑️  {} local directories would be deleted from {}:",
            deletions.len(),
            root.display()
        );
        for action in &deletions {
            println!("   - {}", action.name());
        }
    }

    let verdict = engine.deletion_verdict(&plan);
    if let GuardVerdict::Refused { reason } = &verdict {
        if force {
            println!("\n⚠️  Deletion gate overridden by --force: {}", reason);
        } else {
            println!("\n🛑 Deletion gate refuses this plan: {}", reason);
        }
    }

    if dry_run {
        println!("\n🔍 Dry run mode - planned actions:");
        for action in &plan.actions {
            println!("   {}", action);
        }
        let refused = matches!(verdict, GuardVerdict::Refused { .. }) && !force;
        return Ok(if refused {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    engine.check_deletions(&plan, force)?;

    if !deletions.is_empty() && !yes && console::user_attended() {
        let proceed = Confirm::new()
            .with_prompt(format!("Delete {} directories?", deletions.len()))
            .default(false)
            .interact()?;
        if !proceed {
            println!("Aborted, nothing was changed");
            return Ok(ExitCode::FAILURE);
        }
    }

    println!("\n🔄 Synchronizing {} repositories", plan.actions.len());
    let summary = engine.execute(&plan).await;

    println!("\n🎉 Synchronization Complete!");
    println!("   ✅ Successful operations: {}", summary.successful);
    println!("   ❌ Failed operations: {}", summary.failed);
    println!("   ⏭️  Skipped operations: {}", summary.skipped);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    if summary.has_failures() {
        println!("\n🔍 Failed Operations:");
        for failure in summary.failures() {
            println!("   ❌ {}", failure);
        }
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

/// Print open pull requests of every repository in the organization
async fn cmd_report(
    org: String,
    format: ReportFormat,
    no_color: bool,
    config: &Config,
) -> Result<ExitCode> {
    let client = GitHubClient::new(config)?;
    let per_page = config.github.per_page;

    let repos = fetch_inventory(&client, &org, per_page).await?;
    let prs = collect_open_pull_requests(&client, &org, &repos, per_page).await?;
    info!("Found {} open pull requests in {}", prs.len(), org);

    let mut report_style = ReportStyle::from_config(&config.report);
    if no_color {
        report_style.color = false;
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    render(&prs, format, &report_style, Utc::now(), &mut out)?;
    out.flush()?;

    Ok(ExitCode::SUCCESS)
}
