use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use taskloop::artifact::{ArtifactLayout, ArtifactStore, EXECUTION_FILE, FsArtifactStore, LayoutKind};
use taskloop::escalation::{ScopeCascade, resolve_scope};
use taskloop::execution::{StateRepairValidator, ValidateOptions, parse_lenient};
use taskloop::oracle::CompletionOracle;
use taskloop::prompt::{CLASSIFY_SCOPE_TEMPLATE, PromptLoader};
use taskloop::runner::{LoopController, RunConfig, TaskInfo};
use taskloop::worker::{CliWorker, Worker};
use taskloop::workspace::{WorkspaceContext, validate_task_id};

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

/// File logging; `RUST_LOG` overrides the configured filter
fn setup_logging(filter: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("taskloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::new()
        .parse_filters(filter)
        .parse_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Everything a command needs to reach one project's artifacts
struct App {
    config: Config,
    workspace: WorkspaceContext,
    store: Arc<FsArtifactStore>,
}

impl App {
    fn new(cli: &Cli, config: Config) -> Result<Self> {
        let root = match &cli.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        let workspace = config.workspace_context(&root);
        let store = Arc::new(FsArtifactStore::new(workspace.clone()));
        Ok(Self {
            config,
            workspace,
            store,
        })
    }

    fn loader(&self) -> PromptLoader {
        match &self.config.workspace.templates_dir {
            Some(dir) => PromptLoader::new(dir),
            None => PromptLoader::builtin(),
        }
    }

    fn worker(&self) -> Arc<dyn Worker> {
        Arc::new(CliWorker::new(self.config.worker_config()))
    }
}

async fn run_application(cli: &Cli, app: &App) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
        println!("  Workspace: {}", app.workspace.folder().display());
    }

    validate_task_id(cli.command.task_id()).context("Invalid task id")?;

    match &cli.command {
        Commands::Run {
            task_id,
            prompt,
            max_iterations,
            unbounded,
            fresh,
            layout,
        } => {
            let mut run = RunConfig::new(prompt.clone(), app.config.budget(*max_iterations, *unbounded));
            run.clear_folder = *fresh;
            handle_run_command(app, task_id, &run, *layout).await
        }
        Commands::Repair { task_id, dry_run } => handle_repair_command(app, task_id, *dry_run),
        Commands::Validate { task_id, raw } => handle_validate_command(app, task_id, *raw),
        Commands::Scope { task_id } => handle_scope_command(app, task_id).await,
        Commands::Status { task_id } => handle_status_command(app, task_id),
    }
}

async fn handle_run_command(app: &App, task_id: &str, run: &RunConfig, layout: Option<LayoutKind>) -> Result<()> {
    info!("Running task {} with budget {}", task_id, run.budget);
    println!("{} {} (max iterations: {})", "Running:".cyan(), task_id, run.budget);

    let controller = LoopController::new(
        app.worker(),
        app.store.clone(),
        app.workspace.clone(),
        app.loader(),
        app.config.controller_options(layout),
    )?;

    match controller.run(task_id, run).await {
        Ok(summary) => {
            println!(
                "{} {} verified after {} iterations ({} completed, {} pending)",
                "Done:".green(),
                task_id,
                summary.iterations_used,
                summary.completed,
                summary.pending
            );
            if summary.auto_passed {
                println!("  {}", "Review wrote no verdict; pass was recorded automatically".yellow());
            }
            if let Some(scope) = summary.scope {
                println!("  Scope: {}", scope);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "Failed:".red(), task_id);
            Err(e).context(format!("Task {} did not complete", task_id))
        }
    }
}

fn handle_repair_command(app: &App, task_id: &str, dry_run: bool) -> Result<()> {
    info!("Repairing execution record for {} (dry run: {})", task_id, dry_run);
    let validator = StateRepairValidator::new()?;

    let Some(outcome) = validator.maintain(app.store.as_ref(), task_id, dry_run)? else {
        println!("{} no {} for {}", "Skipped:".yellow(), EXECUTION_FILE, task_id);
        return Ok(());
    };

    if !outcome.parsed {
        return Err(eyre!("{} for {} is not JSON; nothing repaired", EXECUTION_FILE, task_id));
    }

    if outcome.report.warnings.is_empty() {
        println!("{} {} is already valid", "OK:".green(), EXECUTION_FILE);
        return Ok(());
    }

    let verb = if outcome.written { "Repaired" } else { "Would repair" };
    println!("{} {} changes", format!("{}:", verb).as_str().green(), outcome.report.warnings.len());
    for warning in &outcome.report.warnings {
        println!("  - {}", warning);
    }
    Ok(())
}

fn handle_validate_command(app: &App, task_id: &str, raw: bool) -> Result<()> {
    info!("Validating execution record for {} (raw: {})", task_id, raw);
    let text = app
        .store
        .read(task_id, EXECUTION_FILE)?
        .ok_or_else(|| eyre!("no {} for task {}", EXECUTION_FILE, task_id))?;

    let value: serde_json::Value = if raw {
        serde_json::from_str(&text).context(format!("{} is not valid JSON", EXECUTION_FILE))?
    } else {
        parse_lenient(&text).ok_or_else(|| eyre!("{} holds no recoverable JSON", EXECUTION_FILE))?
    };

    let options = if raw { ValidateOptions::raw() } else { ValidateOptions::default() };
    let report = StateRepairValidator::new()?.validate(&value, options);

    for warning in &report.warnings {
        println!("  {} {}", "repair:".yellow(), warning);
    }
    if report.valid {
        println!("{} {} is valid", "OK:".green(), EXECUTION_FILE);
        return Ok(());
    }
    for error in &report.errors {
        println!("  {} {}", "error:".red(), error);
    }
    Err(eyre!("{} has {} schema errors", EXECUTION_FILE, report.errors.len()))
}

async fn handle_scope_command(app: &App, task_id: &str) -> Result<()> {
    info!("Resolving scope for {}", task_id);
    let template = app.loader().load(CLASSIFY_SCOPE_TEMPLATE)?;
    let cascade = ScopeCascade::standard(app.worker(), template, task_id, app.workspace.root().to_path_buf());
    let scope = resolve_scope(app.store.as_ref(), task_id, &cascade).await?;
    println!("{} {}", "Scope:".green(), scope);
    Ok(())
}

fn handle_status_command(app: &App, task_id: &str) -> Result<()> {
    info!("Getting status for task {}", task_id);
    let layout = ArtifactLayout::for_kind(app.config.loop_.layout);
    let oracle = CompletionOracle::new(app.store.clone(), layout);
    let counts = oracle.counts(task_id);
    let info = TaskInfo::load(app.store.as_ref(), task_id);

    let phase = if oracle.is_verified(task_id) {
        "verified".green()
    } else if oracle.is_in_verify_phase(task_id) {
        "verify".cyan()
    } else {
        "execute".normal()
    };

    println!("{} {}", "Task:".green(), task_id);
    println!("  Phase:     {}", phase);
    println!("  Checklist: {} pending, {} completed", counts.pending, counts.completed);
    println!("  Attempts:  {}", info.attempts);
    if let Some(last_run) = info.last_run {
        println!("  Last run:  {}", last_run.to_rfc3339());
    }
    if let Some(error) = &info.last_error {
        println!("  {} {} (attempt {})", "Last error:".red(), error.message, error.attempt);
    }
    if info.re_researched {
        println!("  Research was redone after repeated failure");
    }
    if let Some(record) = StateRepairValidator::new()?.load(app.store.as_ref(), task_id)? {
        let items = record.items().count();
        let done = record.items().filter(|i| i.completed).count();
        println!(
            "  Record:    {:?}, phase {} ({}/{} items)",
            record.status, record.current_phase.id, done, items
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with the configured level
    setup_logging(config.log_filter()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    let app = App::new(&cli, config)?;

    // Run the main application logic
    run_application(&cli, &app).await.context("Application failed")?;

    Ok(())
}
