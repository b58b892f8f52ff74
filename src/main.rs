//! # HoundHub — dog-training CRM automation engine
//!
//! Runs the scheduled-task and workflow email engine over the CRM database.
//! An external timer (cron, systemd) is expected to invoke `houndhub tick`
//! periodically; `houndhub watch` is the self-timing alternative.
//!
//! Usage:
//!   houndhub tick                        # run one tick and exit
//!   houndhub watch --interval-secs 900   # tick on a timer
//!   houndhub enroll --workflow 1 --client 2
//!   houndhub cancel --enrollment 3
//!   houndhub logs --limit 20
//!   houndhub seed-demo                   # demo workflow + client + tasks

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use houndhub_core::HoundHubConfig;
use houndhub_db::{trigger_type, CrmDb, StepAttachments, WorkflowStepSeed};
use houndhub_notify::{smtp::SmtpMailer, LogMailer, Mailer};
use houndhub_scheduler::{run_tick, TaskContext, TaskRegistry};
use houndhub_workflow::{
    enrollment, BookingReminderTask, EnrollOutcome, WorkflowStepTask,
};

#[derive(Parser)]
#[command(
    name = "houndhub",
    version,
    about = "HoundHub — scheduled-task and workflow automation for a dog-training CRM"
)]
struct Cli {
    /// Path to config file (default ~/.houndhub/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one tick: execute every due scheduled task, then exit.
    Tick,
    /// Keep ticking on a fixed interval.
    Watch {
        #[arg(long, default_value = "900")]
        interval_secs: u64,
    },
    /// Enroll a client into a workflow.
    Enroll {
        #[arg(long)]
        workflow: i64,
        #[arg(long)]
        client: i64,
    },
    /// Cancel an active enrollment and its pending steps.
    Cancel {
        #[arg(long)]
        enrollment: i64,
    },
    /// Show recent task log entries.
    Logs {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Insert a demo workflow, client, booking, and trigger.
    SeedDemo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let expanded = shellexpand::tilde(path).to_string();
            HoundHubConfig::load_from(Path::new(&expanded))?
        }
        None => HoundHubConfig::load()?,
    };
    let config = Arc::new(config);

    let db_path = shellexpand::tilde(&config.database_path).to_string();
    let db = Arc::new(CrmDb::open(Path::new(&db_path))?);

    match cli.command {
        Command::Tick => {
            ensure_default_tasks(&db)?;
            let ctx = build_context(db, config)?;
            let summary = run_tick(&build_registry(), &ctx).await?;
            // Individual task failures are in the audit log; only a store
            // failure exits non-zero.
            println!(
                "Tick complete: {} succeeded, {} failed",
                summary.tasks_run, summary.tasks_failed
            );
        }
        Command::Watch { interval_secs } => {
            ensure_default_tasks(&db)?;
            let registry = build_registry();
            tracing::info!("Watching: tick every {interval_secs}s");
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                interval.tick().await;
                let ctx = build_context(db.clone(), config.clone())?;
                if let Err(e) = run_tick(&registry, &ctx).await {
                    tracing::error!("Tick aborted: {e}");
                }
            }
        }
        Command::Enroll { workflow, client } => {
            match enrollment::enroll(&db, workflow, client, "cli", Utc::now())? {
                EnrollOutcome::Enrolled { enrollment_id } => {
                    println!("Enrolled: enrollment id {enrollment_id}");
                }
                EnrollOutcome::AlreadyEnrolled => {
                    println!("Client {client} already has an active enrollment in workflow {workflow}");
                }
            }
        }
        Command::Cancel { enrollment } => {
            let cancelled = enrollment::cancel(&db, enrollment, Utc::now())?;
            println!("Cancelled enrollment {enrollment} ({cancelled} pending step(s) dropped)");
        }
        Command::Logs { limit } => {
            let logs = db.recent_task_logs(limit)?;
            if logs.is_empty() {
                println!("No task logs yet.");
            }
            for log in logs {
                println!(
                    "{}  [{}] {} — {} ({} item(s), {}ms)",
                    log.created_at.format("%Y-%m-%d %H:%M:%S"),
                    log.status,
                    log.task_name,
                    log.message,
                    log.items_processed,
                    log.execution_time_ms
                );
            }
        }
        Command::SeedDemo => seed_demo(&db)?,
    }

    Ok(())
}

/// All known task handlers, registered explicitly.
fn build_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry.register(WorkflowStepTask::TASK_TYPE, Arc::new(WorkflowStepTask));
    registry.register(BookingReminderTask::TASK_TYPE, Arc::new(BookingReminderTask));
    registry
}

fn build_context(db: Arc<CrmDb>, config: Arc<HoundHubConfig>) -> Result<TaskContext> {
    let mailer: Arc<dyn Mailer> = if config.smtp.enabled {
        Arc::new(SmtpMailer::from_config(&config.smtp)?)
    } else {
        tracing::warn!("SMTP disabled: outbound email will be logged, not sent");
        Arc::new(LogMailer)
    };
    Ok(TaskContext {
        db,
        mailer,
        config,
        now: Utc::now(),
    })
}

/// Seed the two standing tasks on first run against an empty table.
fn ensure_default_tasks(db: &CrmDb) -> Result<()> {
    db.ensure_task("Workflow Steps", WorkflowStepTask::TASK_TYPE, "interval", "15")?;
    db.ensure_task(
        "Booking Reminders",
        BookingReminderTask::TASK_TYPE,
        "interval",
        "60",
    )?;
    Ok(())
}

fn seed_demo(db: &CrmDb) -> Result<()> {
    let now = Utc::now();

    let workflow = db.insert_workflow("New Client Welcome", true)?;
    let mut welcome = WorkflowStepSeed::new(workflow, 1, "Welcome", "immediate", "");
    welcome.email_subject = "Welcome to {business_name}!".into();
    welcome.email_body_html =
        "<p>Hi {client_name},</p><p>We're thrilled to start training with you.</p>".into();
    welcome.email_body_text = "Hi {client_name},\n\nWe're thrilled to start training with you.".into();
    db.insert_step(&welcome)?;

    let mut check_in = WorkflowStepSeed::new(workflow, 2, "Check-in", "after_previous", "1 day");
    check_in.email_subject = "How was your first session?".into();
    check_in.email_body_html = "<p>Hi {client_name}, how did it go?</p>".into();
    check_in.email_body_text = "Hi {client_name}, how did it go?".into();
    check_in.attachments = StepAttachments {
        include_booking_link: true,
        ..Default::default()
    };
    db.insert_step(&check_in)?;

    let mut invoice = WorkflowStepSeed::new(workflow, 3, "Invoice", "after_previous", "2 days");
    invoice.email_subject = "Your invoice from {business_name}".into();
    invoice.email_body_html = "<p>Hi {client_name}, your invoice is ready.</p>".into();
    invoice.email_body_text = "Hi {client_name}, your invoice is ready.".into();
    invoice.attachments = StepAttachments {
        invoice_id: Some(1),
        ..Default::default()
    };
    db.insert_step(&invoice)?;

    db.insert_trigger(workflow, trigger_type::APPOINTMENT_BOOKING, Some(1), None)?;

    let client = db.insert_client("Daisy", "Barker", Some("daisy@example.com"), Some("555-0100"))?;
    db.insert_booking(client, 1, now + Duration::hours(20), "confirmed")?;

    ensure_default_tasks(db)?;

    println!("Seeded demo data:");
    println!("  workflow {workflow} \"New Client Welcome\" (3 steps, booking trigger)");
    println!("  client {client} with a session ~20h out");
    println!("Try: houndhub enroll --workflow {workflow} --client {client}, then houndhub tick");
    Ok(())
}
