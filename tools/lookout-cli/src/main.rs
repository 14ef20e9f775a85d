use clap::{Args, Parser, Subcommand};
use lookout_cli::{build_policy, is_ack, parse_param, parse_timeout, send_command, EventFilter};
use lookout_core::{subjects, Event, Policy};
use message_queue::{MessageBus, NatsBus};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "lookout")]
#[command(about = "Lookout CLI - manage agent policies and watch their events")]
#[command(version = lookout_core::VERSION)]
struct Cli {
    /// NATS server the agents are connected to
    #[arg(long, default_value = "nats://localhost:4222")]
    bus: String,

    /// How long to wait for an agent's reply
    #[arg(long, default_value = "5s", value_parser = parse_timeout)]
    timeout: Duration,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Policy management commands
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Print events as agents publish them
    Events {
        /// Only events from this agent
        #[arg(long)]
        agent: Option<String>,
        /// Only events from this policy
        #[arg(long)]
        policy: Option<String>,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Add a policy to an agent
    Add(PolicySpec),
    /// Replace an agent's policy definition
    Modify(PolicySpec),
    /// Remove a policy from an agent
    Delete {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        name: String,
    },
}

#[derive(Args)]
struct PolicySpec {
    #[arg(long)]
    agent: String,
    #[arg(long)]
    name: String,
    #[arg(long = "type")]
    policy_type: String,
    /// Handler parameter, e.g. --param interval=10s
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

impl PolicySpec {
    fn into_policy(self) -> Policy {
        build_policy(&self.name, &self.agent, &self.policy_type, self.params)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let bus = NatsBus::connect(&cli.bus).await?;

    match cli.command {
        Commands::Policy { action } => handle_policy_action(&bus, action, cli.timeout).await,
        Commands::Events { agent, policy } => {
            let filter = EventFilter {
                agent_uid: agent,
                policy_name: policy,
            };
            handle_events(&bus, filter).await
        }
    }
}

async fn handle_policy_action(
    bus: &dyn MessageBus,
    action: PolicyAction,
    timeout: Duration,
) -> anyhow::Result<()> {
    let (command, policy) = match action {
        PolicyAction::Add(spec) => (subjects::POLICY_ADD, spec.into_policy()),
        PolicyAction::Modify(spec) => (subjects::POLICY_MODIFY, spec.into_policy()),
        PolicyAction::Delete { agent, name } => {
            // The agent only needs the name; the type is carried for decoding.
            (subjects::POLICY_DELETE, Policy::new(name, agent, "unspecified"))
        }
    };

    let reply = send_command(bus, command, &policy, timeout).await?;
    if !is_ack(command, &reply) {
        anyhow::bail!("{} rejected {}: {}", policy.agent_uid, command, reply);
    }
    println!("{reply}");
    Ok(())
}

async fn handle_events(bus: &dyn MessageBus, filter: EventFilter) -> anyhow::Result<()> {
    let mut events = bus.subscribe(subjects::POLICY_EVENTS).await?;
    while let Some(message) = events.next().await {
        match message.json::<Event>() {
            Ok(event) if filter.matches(&event) => {
                println!("{}", serde_json::to_string(&event)?);
            }
            Ok(_) => {}
            Err(err) => eprintln!("skipping undecodable event: {err}"),
        }
    }
    Ok(())
}
