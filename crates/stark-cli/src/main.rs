//! CLI entry point for Stark.
//!
//! This binary provides the `stark` command: `run` executes an agent defined
//! in a TOML file, `validate` checks a definition without calling any model.

mod cli;
mod helpers;

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use stark_agent::{ModelGateway, RunResult, Runner, StreamEvent, load_agent_file, provider_router};
use tracing::info;

use cli::{Cli, Commands, RunArgs};
use helpers::{describe_tree, env_var, init_tracing, load_input};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    init_tracing(if cli.verbose { "debug" } else { "info" });

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Validate { agent } => cmd_validate(&agent),
    }
}

// ---------------------------------------------------------------------------
// Subcommand: run
// ---------------------------------------------------------------------------

async fn cmd_run(args: RunArgs) -> Result<()> {
    let agent = load_agent_file(&args.agent)
        .with_context(|| format!("failed to load agent from {}", args.agent.display()))?;
    let input = load_input(args.input.as_deref(), args.messages.as_deref())?;

    let router = provider_router(&agent, env_var).context("failed to configure model providers")?;
    let gateway: Arc<dyn ModelGateway> = Arc::new(router);

    info!(agent = %agent.name, model = %agent.model, stream = args.stream, "running agent");
    let runner = Runner::new(agent, gateway);

    let result = if args.stream {
        stream_run(&runner, input).await?
    } else {
        runner.run_async(input).await.context("agent run failed")?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if !args.stream {
        println!("{}", result.final_output().unwrap_or_default());
    }

    if result.max_iterations_reached {
        eprintln!(
            "warning: stopped after {} iterations without a final answer",
            result.iterations
        );
    }
    Ok(())
}

/// Print content chunks to stdout as they arrive and tool activity to
/// stderr; return the final result.
async fn stream_run(runner: &Runner, input: Vec<stark_agent::Message>) -> Result<RunResult> {
    let mut events = runner.run_stream(input);
    let mut stdout = std::io::stdout();

    while let Some(event) = events.next().await {
        match event.context("agent run failed")? {
            StreamEvent::ContentChunk(text) => {
                print!("{text}");
                stdout.flush()?;
            }
            StreamEvent::ToolCalls(calls) => {
                for call in calls {
                    eprintln!("-> {} {}", call.name, call.arguments);
                }
            }
            StreamEvent::ToolResponse(result) => {
                let status = if result.success { "ok" } else { "failed" };
                eprintln!("<- {} [{status}]", result.tool_name);
            }
            StreamEvent::IterationEnd(data) if !data.has_tool_calls => println!(),
            StreamEvent::AgentRunEnd(result) => return Ok(*result),
            _ => {}
        }
    }
    anyhow::bail!("event stream ended before the run finished")
}

// ---------------------------------------------------------------------------
// Subcommand: validate
// ---------------------------------------------------------------------------

fn cmd_validate(path: &std::path::Path) -> Result<()> {
    let agent = load_agent_file(path)
        .with_context(|| format!("failed to load agent from {}", path.display()))?;
    print!("{}", describe_tree(&agent)?);
    println!("ok: {} is valid", path.display());
    Ok(())
}
