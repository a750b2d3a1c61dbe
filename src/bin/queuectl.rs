//! # queuectl
//!
//! Command-line surface of the queue monitoring subsystem: the health monitor
//! (tables, JSON, or check-only gating), the retry sweep, terminal-record
//! flush, worker restart signalling, reminder dispatch, and the scheduler
//! loop itself.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

use tasklight_queue::config::QueueConfig;
use tasklight_queue::health::HealthEngine;
use tasklight_queue::logging::init_logging;
use tasklight_queue::reporting::{self, ReportMode};
use tasklight_queue::retry::RetryOrchestrator;
use tasklight_queue::scheduler::{
    standard_schedule, standard_tasks, Coordinator, PgLeaseProvider, TracingEventSink,
};
use tasklight_queue::services::{PgWorkerPool, QueueReminderService, WorkerPool};
use tasklight_queue::store::{JobStore, PgJobStore};
use tasklight_queue::Result;

#[derive(Parser, Debug)]
#[command(name = "queuectl")]
#[command(about = "Queue health monitoring and job lifecycle management")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path (defaults plus TASKLIGHT_* env overrides when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report queue health (tables by default)
    Monitor {
        /// Additionally print performance metrics
        #[arg(long)]
        verbose: bool,
        /// Emit one machine-parseable JSON object
        #[arg(long)]
        json: bool,
        /// Render nothing; exit 0 when healthy, 1 when not
        #[arg(long)]
        check: bool,
    },
    /// Retry eligible failed jobs and report the counts
    RetryFailed,
    /// Purge terminal job records past retention
    Flush,
    /// Signal a rolling worker-pool restart
    RestartWorkers,
    /// Dispatch reminder processing to the notification workers
    ProcessReminders,
    /// Run the coordinator loop until interrupted
    Scheduler,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let config = match QueueConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("queuectl: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, config).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("queuectl: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: QueueConfig) -> anyhow::Result<ExitCode> {
    let pg = PgJobStore::connect(&config.database).await?;
    let store: Arc<dyn JobStore> = Arc::new(pg.clone());

    match command {
        Commands::Monitor {
            verbose,
            json,
            check,
        } => {
            let engine = HealthEngine::new(store, config.health.clone());
            let mode = ReportMode::from_flags(check, json, verbose);
            Ok(monitor(&engine, mode).await?)
        }
        Commands::RetryFailed => {
            let orchestrator = RetryOrchestrator::new(store, config.retry.clone());
            let report = orchestrator.run().await?;
            println!("Retry run: {report}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Flush => {
            let cutoff = chrono::Utc::now() - config.scheduler.retention();
            let purged = store.purge_terminal(cutoff).await?;
            println!("Purged {purged} terminal job record(s)");
            Ok(ExitCode::SUCCESS)
        }
        Commands::RestartWorkers => {
            PgWorkerPool::new(pg.pool().clone()).restart().await?;
            println!("Worker restart signalled");
            Ok(ExitCode::SUCCESS)
        }
        Commands::ProcessReminders => {
            use tasklight_queue::services::ReminderService;
            let reminders = QueueReminderService::new(store);
            let report = reminders.process_due().await?;
            println!("Dispatched {} reminder job(s)", report.dispatched);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Scheduler => scheduler_loop(config, pg).await,
    }
}

/// The monitor subcommand. `--check` holds no locks and renders nothing; in
/// `--json` mode errors still produce valid JSON on stdout.
async fn monitor(engine: &HealthEngine, mode: ReportMode) -> Result<ExitCode> {
    if mode == ReportMode::Check {
        let healthy = engine.is_healthy().await?;
        return Ok(if healthy {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    match engine.snapshot().await {
        Ok(snapshot) => {
            print!("{}", reporting::render(&snapshot, mode)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if mode == ReportMode::Json => {
            println!("{}", reporting::render_json_error(&err));
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err),
    }
}

async fn scheduler_loop(config: QueueConfig, pg: PgJobStore) -> anyhow::Result<ExitCode> {
    let store: Arc<dyn JobStore> = Arc::new(pg.clone());

    let engine = Arc::new(HealthEngine::new(Arc::clone(&store), config.health.clone()));
    let orchestrator = Arc::new(RetryOrchestrator::new(
        Arc::clone(&store),
        config.retry.clone(),
    ));
    let reminders = Arc::new(QueueReminderService::new(Arc::clone(&store)));
    let worker_pool = Arc::new(PgWorkerPool::new(pg.pool().clone()));

    let schedule = standard_schedule(&config.scheduler)?;
    let handlers = standard_tasks(
        engine,
        orchestrator,
        store,
        reminders,
        worker_pool,
        &config.scheduler,
    );
    let coordinator = Coordinator::new(
        schedule,
        handlers,
        Arc::new(PgLeaseProvider::new(pg.pool().clone())),
        Arc::new(TracingEventSink),
        &config.scheduler,
    )?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        } else {
            error!("failed to install ctrl-c handler");
        }
    });

    coordinator.run(shutdown_rx).await?;
    Ok(ExitCode::SUCCESS)
}
