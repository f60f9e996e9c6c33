//! Scout CLI application
//!
//! Connects a streaming chat model to a tool server and drives it from the
//! terminal. Run `scout "task"` for a one-shot answer or plain `scout` for
//! an interactive loop.

mod args;
mod console;

use anyhow::Context;
use args::Cli;
use clap::Parser;
use console::Console;
use scout_core::{Agent, AgentConfig, AgentEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for verbose logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let console = Console::new(cli.verbose);
    let config = build_config(&cli)?;
    info!(
        model = %config.model,
        server_script = %config.server_script.display(),
        "starting scout"
    );

    console.info(&format!(
        "Connecting to tool server: {} run {}",
        config.runtime,
        config.server_script.display()
    ));

    let mut agent = Agent::connect(config)
        .await
        .context("Failed to connect to the tool server")?;
    console.info(&format!("Tools: {}", agent.tool_names().join(", ")));

    let result = match &cli.task {
        Some(task) => run_one(&mut agent, &console, task).await,
        None => run_interactive(&mut agent, &console).await,
    };

    // The child process must not outlive the session, even on error
    if let Err(e) = agent.shutdown().await {
        console.error(&format!("Shutdown failed: {}", e));
    }

    result
}

/// Build the effective configuration from the file plus flag overrides
fn build_config(cli: &Cli) -> anyhow::Result<AgentConfig> {
    let mut config = if cli.config_file.exists() {
        AgentConfig::load(&cli.config_file)
            .with_context(|| format!("Bad config file {}", cli.config_file.display()))?
    } else {
        AgentConfig::default()
    };

    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(script) = &cli.server_script {
        config.server_script = script.clone();
    }
    if !cli.allowed_dirs.is_empty() {
        config.allowed_dirs = cli.allowed_dirs.clone();
    }

    Ok(config)
}

/// Run a single task and exit
async fn run_one(agent: &mut Agent, console: &Console, task: &str) -> anyhow::Result<()> {
    run_turn(agent, console, task).await
}

/// Prompt loop; `exit` or `quit` (or EOF) ends the session
async fn run_interactive(agent: &mut Agent, console: &Console) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        console.prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        run_turn(agent, console, input).await?;
    }

    Ok(())
}

async fn run_turn(agent: &mut Agent, console: &Console, input: &str) -> anyhow::Result<()> {
    agent
        .run_turn(input, |event| match event {
            AgentEvent::Token(token) => console.token(token),
            AgentEvent::ToolDispatch(name) => console.tool_dispatch(name),
            AgentEvent::ToolResult { name, is_error } => console.tool_result(name, is_error),
        })
        .await?;
    console.end_line();
    Ok(())
}
