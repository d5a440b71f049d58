use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_bridge::agent::{event_channel, AgentEvent, TerminalReason, ToolCall, ToolDispatcher};
use atelier_bridge::config::{AtelierConfig, McpConfig, McpServerConfig};
use atelier_bridge::llm::ProviderKind;
use atelier_bridge::mcp::{ConnectionPool, ToolRegistry};
use atelier_bridge::BridgeClient;

#[derive(Parser)]
#[command(name = "atelier")]
#[command(about = "Drive creative-application MCP servers from an LLM conversation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// LLM provider (anthropic or openai); default from .atelier.toml
    #[arg(long, env = "ATELIER_PROVIDER", global = true)]
    provider: Option<ProviderKind>,

    /// Model id; default from .atelier.toml or the provider default
    #[arg(short = 'm', long, env = "ATELIER_MODEL", global = true)]
    model: Option<String>,

    /// Increase verbosity (-v events and info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one message and let the model use the connected tools
    Chat {
        /// Message to send
        message: String,
        /// Step ceiling for this conversation
        #[arg(long)]
        max_steps: Option<usize>,
        /// System prompt (overrides .atelier.toml)
        #[arg(long, short)]
        system: Option<String>,
        /// JSON file with application state to include in the preamble
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// List tools grouped by server
    Tools {
        /// Only list tools from a specific server
        #[arg(long)]
        server: Option<String>,
    },
    /// Connect to every configured server and report status
    Servers,
    /// Call a tool directly
    Call {
        /// Tool name
        tool: String,
        /// Arguments as JSON
        #[arg(long, short)]
        args: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let registry = tracing_subscriber::registry().with(filter);
    if use_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut settings = AtelierConfig::load()?;
    if let Some(provider) = cli.provider {
        if provider != settings.llm.provider {
            // Provider-specific defaults must follow the new provider
            settings.llm.base_url = None;
            settings.llm.api_key_env = None;
        }
        settings.llm.provider = provider;
    }
    if let Some(model) = cli.model {
        settings.llm.model = Some(model);
    }
    let servers = McpConfig::load()?
        .map(|config| config.enabled_servers())
        .unwrap_or_default();

    match cli.command {
        Commands::Chat {
            message,
            max_steps,
            system,
            snapshot,
        } => {
            let max_steps = max_steps.unwrap_or(settings.agent.max_steps);
            run_chat(&settings, &servers, &message, max_steps, system, snapshot, cli.verbose > 0).await?;
        }
        Commands::Tools { server } => run_tools(&settings, &servers, server).await,
        Commands::Servers => run_servers(&settings, &servers).await,
        Commands::Call { tool, args } => run_call(&settings, &servers, &tool, args).await?,
    }

    Ok(())
}

async fn run_chat(
    settings: &AtelierConfig,
    servers: &BTreeMap<String, McpServerConfig>,
    message: &str,
    max_steps: usize,
    system: Option<String>,
    snapshot: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let mut client = BridgeClient::from_config(settings)?;
    if let Some(system) = system {
        client.set_system_prompt(Some(system));
    }
    if let Some(path) = snapshot {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        client.set_context_snapshot(Some(value));
    }

    let printer = if verbose {
        let (tx, rx) = event_channel();
        client = client.with_event_sender(tx);
        Some(tokio::spawn(print_events(rx)))
    } else {
        None
    };

    let outcome = client.connect(servers).await;
    for (name, ok) in &outcome {
        if !ok {
            eprintln!("warning: server '{}' failed to connect", name);
        }
    }

    let state = client.chat(message, max_steps).await;
    client.disconnect().await;
    // Dropping the client closes the event channel
    drop(client);
    if let Some(printer) = printer {
        printer.await.ok();
    }

    match state.terminal_reason() {
        Some(TerminalReason::StepLimit) => {
            eprintln!("Stopped after {} steps without a final answer", state.steps().len());
        }
        Some(TerminalReason::ProviderFailed(e)) => {
            return Err(anyhow::anyhow!("{}", e));
        }
        _ => {}
    }
    if let Some(text) = state.final_text() {
        println!("{}", text);
    }
    Ok(())
}

async fn print_events(mut rx: atelier_bridge::agent::EventReceiver) {
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::StepStart { step } => eprintln!("[step {}]", step),
            AgentEvent::ToolStart { name, arguments, .. } => {
                eprintln!("  -> {} {}", name, arguments);
            }
            AgentEvent::ToolComplete {
                name,
                server,
                duration,
                is_error,
                result,
                ..
            } => {
                let status = if is_error { "failed" } else { "ok" };
                eprintln!(
                    "  <- {} [{}] {} in {}ms: {}",
                    name,
                    server.unwrap_or_else(|| "-".to_string()),
                    status,
                    duration.as_millis(),
                    result
                );
            }
            AgentEvent::Error { message } => eprintln!("error: {}", message),
            _ => {}
        }
    }
}

/// Connect without a provider, for commands that never call the LLM
async fn connect_only(
    settings: &AtelierConfig,
    servers: &BTreeMap<String, McpServerConfig>,
) -> (ConnectionPool, ToolRegistry, BTreeMap<String, bool>) {
    let mut pool = ConnectionPool::new().with_startup_timeout(settings.agent.startup_timeout());
    let outcome = pool.connect_all(servers).await;

    let mut registry = ToolRegistry::new();
    for connection in pool.connections() {
        registry.refresh(connection.server_name(), connection.tools().to_vec());
    }
    (pool, registry, outcome)
}

async fn run_tools(
    settings: &AtelierConfig,
    servers: &BTreeMap<String, McpServerConfig>,
    server: Option<String>,
) {
    let (mut pool, registry, _) = connect_only(settings, servers).await;

    for (name, tools) in registry.grouped_by_server() {
        if server.as_deref().is_some_and(|wanted| wanted != name) {
            continue;
        }
        println!("{} ({} tools)", name, tools.len());
        for tool in tools {
            let description = registry
                .resolve(&tool)
                .filter(|d| d.owning_server == name)
                .map(|d| d.description.lines().next().unwrap_or_default().to_string())
                .unwrap_or_else(|| "(shadowed by another server)".to_string());
            println!("  {:<28} {}", tool, description);
        }
    }

    pool.disconnect_all().await;
}

async fn run_servers(settings: &AtelierConfig, servers: &BTreeMap<String, McpServerConfig>) {
    let (mut pool, _, outcome) = connect_only(settings, servers).await;

    if outcome.is_empty() {
        println!("No servers configured (.mcp.json)");
    }
    for status in pool.status() {
        println!("{:<16} {:<10} {} tools", status.name, status.kind, status.tool_count);
    }
    for (name, _) in outcome.iter().filter(|(_, ok)| !**ok) {
        println!("{:<16} {:<10} -", name, "failed");
    }

    pool.disconnect_all().await;
}

async fn run_call(
    settings: &AtelierConfig,
    servers: &BTreeMap<String, McpServerConfig>,
    tool: &str,
    args: Option<String>,
) -> Result<()> {
    let arguments = match args {
        Some(raw) => serde_json::from_str(&raw).context("--args must be valid JSON")?,
        None => serde_json::json!({}),
    };

    let (mut pool, registry, _) = connect_only(settings, servers).await;
    let result = ToolDispatcher::new(&registry, &pool)
        .with_timeout(settings.agent.tool_timeout())
        .dispatch_one(&ToolCall::new("cli", tool, arguments))
        .await;
    pool.disconnect_all().await;

    match result.value() {
        Some(serde_json::Value::String(text)) => println!("{}", text),
        Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
        None => {
            return Err(anyhow::anyhow!(
                "{}",
                result.error().unwrap_or("tool call did not complete")
            ))
        }
    }
    Ok(())
}
