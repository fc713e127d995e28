use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use fleet_agent::{AgentAddr, AgentClient, ContainerAction};
use fleet_orchestrator::{CreateWorkspaceRequest, OrchestratorConfig, ProvisioningOrchestrator};

#[derive(Parser)]
#[command(name = "fleetctl")]
#[command(about = "Workspace fleet orchestration")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Provision a workspace for a user on a named agent
    Provision {
        /// Username (routing key)
        user: String,
        /// Target agent, host or host:port
        agent: String,
        /// CPU cores for the container
        #[arg(long)]
        cpus: Option<f64>,
        /// Memory limit in MB
        #[arg(long)]
        memory: Option<u64>,
        /// Request GPU access
        #[arg(long)]
        gpu: bool,
    },
    /// Tear down a user's workspace
    Deprovision {
        /// Username (routing key)
        user: String,
    },
    /// Show a user's workspace record
    Workspace {
        /// Username (routing key)
        user: String,
    },
    /// Poll the fleet and print per-agent resource snapshots
    Status,
    /// List containers on one agent
    Containers {
        /// Agent, host or host:port
        agent: String,
    },
    /// Start, stop, or restart a container on an agent
    Container {
        /// Agent, host or host:port
        agent: String,
        /// Container name
        name: String,
        #[arg(value_parser = ["start", "stop", "restart"])]
        action: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = fleet_logging::init_subscriber();

    let config = OrchestratorConfig::from_env();
    info!(
        agents = config.agents.len(),
        state_dir = %config.state_dir.display(),
        "Configuration loaded"
    );

    let orchestrator = ProvisioningOrchestrator::from_config(&config)?;
    let args = Args::parse();

    match args.command {
        Command::Provision {
            user,
            agent,
            cpus,
            memory,
            gpu,
        } => {
            let req = CreateWorkspaceRequest {
                user_id: user,
                agent: AgentAddr::parse(&agent)?,
                cpus,
                memory_mb: memory,
                gpu,
            };
            let outcome = orchestrator.provision(req).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.fully_active() {
                std::process::exit(1);
            }
        }
        Command::Deprovision { user } => {
            let report = orchestrator.deprovision(&user).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.fully_succeeded() {
                std::process::exit(1);
            }
        }
        Command::Workspace { user } => {
            let workspace = orchestrator.get_workspace(&user).await?;
            println!("{}", serde_json::to_string_pretty(&workspace)?);
        }
        Command::Status => {
            let statuses = orchestrator.fleet_status().await;
            println!("{}", serde_json::to_string_pretty(&statuses)?);
        }
        Command::Containers { agent } => {
            let addr = AgentAddr::parse(&agent)?;
            let containers = orchestrator.monitor().poll_containers(&addr).await?;
            println!("{}", serde_json::to_string_pretty(&containers)?);
        }
        Command::Container {
            agent,
            name,
            action,
        } => {
            let addr = AgentAddr::parse(&agent)?;
            let client = AgentClient::new(config.container_timeout());
            let act = match action.as_str() {
                "start" => ContainerAction::Start,
                "stop" => ContainerAction::Stop,
                _ => ContainerAction::Restart,
            };
            client.container_action(&addr, &name, act).await?;
            let status = client.container_status(&addr, &name).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
