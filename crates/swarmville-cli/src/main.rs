mod config;

use clap::{Parser, Subcommand};
use config::SwarmConfig;
use std::path::PathBuf;
use std::sync::Arc;
use swarmville_agent::{cost_per_1k_tokens, SimulatedBackend};
use swarmville_core::{OrchestrationEvent, Task};
use swarmville_gateway::GatewayServer;
use swarmville_orchestrator::{decompose, EventBus, InMemoryTaskStore, Orchestrator, RunOutcome};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swarmville", about = "SwarmVille: multi-agent task orchestration")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "swarmville.toml")]
    config: PathBuf,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP/WebSocket gateway
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one task in-process and print the final task
    Run {
        description: String,
        #[arg(long, default_value = "cli_user")]
        user: String,
        /// Approve every gated step automatically
        #[arg(long)]
        approve_all: bool,
    },
    /// Print the plan a description decomposes into
    Decompose { description: String },
    /// List the configured workers
    Roster,
}

fn init_tracing(pretty: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if pretty {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    }
}

fn build_orchestrator(config: &SwarmConfig) -> (Arc<Orchestrator>, EventBus) {
    let bus = EventBus::new(config.orchestrator.event_capacity);
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(InMemoryTaskStore::new()),
        Arc::new(SimulatedBackend::new(config.backend.clone())),
        Arc::new(bus.clone()),
        config.roster(),
        config.orchestrator.clone(),
    ));
    (orchestrator, bus)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.pretty);

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!(error = %e, "Failed to load .env");
        }
    }

    let config = SwarmConfig::load(&cli.config).await?;

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);

            let (orchestrator, bus) = build_orchestrator(&config);
            info!(
                workers = orchestrator.roster().len(),
                approvals = config.orchestrator.enforce_approvals,
                "Orchestrator ready"
            );
            let app = GatewayServer::build(orchestrator, &bus);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("SwarmVille gateway listening on {}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        Commands::Run {
            description,
            user,
            approve_all,
        } => {
            let (orchestrator, bus) = build_orchestrator(&config);
            let logger = tokio::spawn(log_events(bus.subscribe()));

            let (task, handle) = orchestrator.submit(&user, "cli", &description).await?;
            let mut outcome = handle.await??;
            while let RunOutcome::AwaitingApproval { subtask_id } = outcome {
                let Some(approval) = orchestrator.approvals().pending_for_subtask(subtask_id).await
                else {
                    break;
                };
                if !approve_all {
                    info!(approval_id = %approval.id, action = %approval.action, "Stopped at approval gate");
                    break;
                }
                info!(approval_id = %approval.id, "Auto-approving");
                let (_, handle) = orchestrator.decide_approval(approval.id, true).await?;
                outcome = handle.await??;
            }

            logger.abort();
            let task: Task = orchestrator.get(task.id).await?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        Commands::Decompose { description } => {
            let plan = decompose(&description, &config.roster());
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Roster => {
            let roster = config.roster();
            println!("Workers:");
            for worker in &roster {
                println!(
                    "  {} ({}, {}) [{}] model={} ${}/1k tokens",
                    worker.id,
                    worker.name,
                    worker.role,
                    worker.tools.join(", "),
                    worker.llm_model,
                    cost_per_1k_tokens(&worker.llm_model)
                );
            }
            println!("\nTotal: {} worker(s)", roster.len());
        }
    }

    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<OrchestrationEvent>) {
    loop {
        match events.recv().await {
            Ok(OrchestrationEvent::TaskUpdated {
                status, progress, ..
            }) => info!(%status, progress, "Task updated"),
            Ok(OrchestrationEvent::RecoverySuggested {
                agent_id, recovery, ..
            }) => warn!(worker = %agent_id, ?recovery, "Recovery suggested"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
