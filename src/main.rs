//! # ReqFlow CLI
//!
//! Validate onboarding request records and drive workflows stored in a
//! local JSON file.
//!
//! Usage:
//!   reqflow validate request.json            # Check a record, print errors
//!   reqflow create request.json              # Validate and store a workflow
//!   reqflow list --status Overdue            # List with derived status
//!   reqflow task WF-ID TASK-HR Complete      # Update one task
//!   reqflow remind WF-ID [WF-ID...] -m "..." # Send reminders
//!   reqflow sweep                            # Remind everything that is due
//!   reqflow stats                            # Counts by status

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqflow_core::ReqflowConfig;
use reqflow_validation::Record;
use reqflow_workflow::{
    JsonFileWorkflowStore, LogNotifier, Presenter, SortDirection, SortKey, TaskStatus,
    WorkflowFilter, WorkflowManager, WorkflowStatus, sort_workflows,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "reqflow",
    version,
    about = "📋 ReqFlow — onboarding request validation and reminders"
)]
struct Cli {
    /// Config file (default: ~/.reqflow/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Workflow store path (overrides config)
    #[arg(long)]
    store: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a request record without storing it
    Validate { file: PathBuf },
    /// Validate a request record and create its workflow
    Create { file: PathBuf },
    /// List workflows with their derived status
    List {
        #[arg(long)]
        search: Option<String>,
        /// Open, "In Progress", Complete or Overdue
        #[arg(long)]
        status: Option<WorkflowStatus>,
        /// employee, workflowId, hireDate, createdAt or progress
        #[arg(long, default_value = "createdAt")]
        sort: SortKey,
        #[arg(long, default_value = "asc")]
        direction: SortDirection,
    },
    /// Set the status of one task
    Task {
        workflow_id: String,
        task_id: String,
        /// Open, "In Progress" or Complete
        status: TaskStatus,
    },
    /// Send reminders for one or more workflows
    Remind {
        #[arg(required = true)]
        workflow_ids: Vec<String>,
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Send reminders to every workflow that is due
    Sweep,
    /// Print counts by derived status
    Stats,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

/// Prints manager feedback to the terminal.
struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn progress(&self, message: &str) {
        println!("⏳ {message}");
    }
    fn success(&self, message: &str) {
        println!("✅ {message}");
    }
    fn warning(&self, message: &str) {
        println!("⚠️  {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("❌ {message}");
    }
}

fn read_record(path: &Path) -> Result<Record> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("{} is not a JSON object", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "reqflow=debug,reqflow_workflow=debug,reqflow_validation=debug"
    } else {
        "reqflow=info,reqflow_workflow=info,reqflow_validation=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => ReqflowConfig::load_from(Path::new(&expand_path(path)))?,
        None => ReqflowConfig::load()?,
    };
    let store_path = expand_path(cli.store.as_deref().unwrap_or(&config.store.path));
    tracing::debug!("Using workflow store {store_path}");

    let manager = WorkflowManager::new(
        &config.workflow,
        Arc::new(JsonFileWorkflowStore::new(&store_path)),
        Arc::new(LogNotifier::new()),
    )?
    .with_presenter(Arc::new(ConsolePresenter));

    match cli.command {
        Command::Validate { file } => {
            let record = read_record(&file)?;
            let result = manager.validator().validate_workflow(&record);
            if result.is_valid {
                println!("✅ {} is valid", file.display());
            } else {
                println!("❌ {} has {} problem(s):", file.display(), result.errors.len());
                for (field, errors) in result.errors.iter() {
                    for err in errors {
                        println!("   {field}: {}", err.message);
                    }
                }
                std::process::exit(1);
            }
        }
        Command::Create { file } => {
            let record = read_record(&file)?;
            let workflow = manager.create_workflow(&record).await?;
            println!("   Workflow: {}", workflow.workflow_id);
            println!("   Employee: {}", workflow.employee);
            println!("   Hire:     {}", workflow.hire_date);
            println!("   Tasks:    {}", workflow.tasks_total);
        }
        Command::List {
            search,
            status,
            sort,
            direction,
        } => {
            let filter = WorkflowFilter {
                search,
                status,
                ..WorkflowFilter::default()
            };
            let mut views = manager.filter_workflows(manager.list_workflows().await?, &filter);
            sort_workflows(&mut views, sort, direction);
            if views.is_empty() {
                println!("📭 No workflows");
            }
            for view in &views {
                let wf = &view.workflow;
                println!(
                    "{} {:<28} {:<24} {:<12} {:>3}% hire {}{}",
                    if view.needs_reminder { "🔔" } else { "  " },
                    wf.workflow_id,
                    wf.employee,
                    view.status,
                    view.progress,
                    wf.hire_date,
                    if wf.reminder_count > 0 {
                        format!(" ({} reminders)", wf.reminder_count)
                    } else {
                        String::new()
                    }
                );
            }
        }
        Command::Task {
            workflow_id,
            task_id,
            status,
        } => {
            let view = manager
                .update_task_status(&workflow_id, &task_id, status)
                .await?;
            println!(
                "   {} is {} ({}/{} tasks)",
                workflow_id, view.status, view.workflow.tasks_complete, view.workflow.tasks_total
            );
        }
        Command::Remind {
            workflow_ids,
            message,
        } => {
            if let [workflow_id] = workflow_ids.as_slice() {
                manager.send_reminder(workflow_id, message.as_deref()).await?;
            } else {
                let check = manager.validator().validate_bulk_operation(&workflow_ids);
                if let Some(message) = check.errors.first_message() {
                    anyhow::bail!("{message}");
                }
                let report = manager
                    .send_bulk_reminders(&workflow_ids, message.as_deref())
                    .await?;
                for outcome in report.results.iter().filter(|o| !o.success) {
                    println!(
                        "   ❌ {}: {}",
                        outcome.workflow_id,
                        outcome.error.as_deref().unwrap_or_default()
                    );
                }
            }
        }
        Command::Sweep => match manager.check_and_send_reminders().await? {
            Some(report) => println!("📣 {}", report.summary_message()),
            None => println!("😴 No workflows need reminders"),
        },
        Command::Stats => {
            let stats = manager.statistics(None).await?;
            println!("📊 Workflows: {}", stats.total);
            println!("   Open:        {}", stats.open);
            println!("   In Progress: {}", stats.in_progress);
            println!("   Complete:    {}", stats.complete);
            println!("   Overdue:     {}", stats.overdue);
            println!("   Need reminders: {}", stats.needing_reminders);
        }
    }

    Ok(())
}
