//! automerge-bot binary

use anyhow::{anyhow, Context, Result};
use automerge_bot::config::Config;
use automerge_bot::http::{router, AppState};
use automerge_bot::notify::{FeishuNotifier, Notifier};
use automerge_bot::platform::CodeupHost;
use automerge_bot::scheduler::Scheduler;
use automerge_bot::store::{FileStore, TaskStore};
use automerge_bot::types::ExecutionType;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "automerge-bot", version, about = "Scheduled branch auto-merging")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler and HTTP server
    Serve,
    /// Run one due-task check and exit
    Check,
    /// Run the pipeline once for one task and exit
    Execute {
        /// Id of the task to run
        #[arg(long)]
        task_id: i64,
    },
}

fn build_scheduler(config: &Config) -> Result<Arc<Scheduler>> {
    let store = FileStore::open(&config.data_dir)
        .with_context(|| format!("failed to open store in {}", config.data_dir.display()))?;

    let host = CodeupHost::new(config.api_base.clone()).context("failed to create Codeup client")?;

    let notifier: Option<Arc<dyn Notifier>> = match &config.notify.webhook_url {
        Some(url) => Some(Arc::new(FeishuNotifier::new(
            url.clone(),
            config.notify.notify_on_success,
            config.notify.notify_on_failure,
        )?)),
        None => None,
    };

    Ok(Arc::new(Scheduler::new(
        Arc::new(store),
        Arc::new(host),
        notifier,
        config.credentials.clone(),
        config.check_interval,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let scheduler = build_scheduler(&config)?;

    match cli.command {
        Command::Serve => {
            scheduler.start();

            let state = AppState {
                scheduler: Arc::clone(&scheduler),
                webhook_secret: config.webhook_secret.clone(),
            };
            let app = router(state);

            let listener = tokio::net::TcpListener::bind(config.bind_addr.as_str())
                .await
                .with_context(|| format!("failed to bind {}", config.bind_addr))?;
            info!(addr = config.bind_addr, "http server listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await
                .context("http server failed")?;

            scheduler.stop();
        }
        Command::Check => {
            let outcomes = scheduler.check_and_execute_tasks().await;
            info!(count = outcomes.len(), "check complete");
            for outcome in &outcomes {
                println!(
                    "{}: {}{}",
                    outcome.task_name,
                    outcome.status,
                    outcome
                        .error
                        .as_deref()
                        .map(|e| format!(" ({e})"))
                        .unwrap_or_default()
                );
            }
        }
        Command::Execute { task_id } => {
            let task = scheduler
                .store()
                .task(task_id)
                .await?
                .ok_or_else(|| anyhow!("task {task_id} not found"))?;
            if !task.enabled {
                return Err(anyhow!("task {task_id} is disabled"));
            }

            let outcome = scheduler.execute_task(&task, ExecutionType::Manual).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
