//! CLI argument definitions for Stark.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Stark -- run declarative LLM agents with tools and sub-agents.
#[derive(Parser)]
#[command(
    name = "stark",
    version,
    about = "Stark -- run declarative LLM agents",
    long_about = "Runs an agent defined in a TOML file: the agent calls its model, \
                  dispatches local, MCP and sub-agent tools, and reports the result."
)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run an agent on one input.
    Run(RunArgs),

    /// Load and validate an agent definition, then print its tree.
    Validate {
        /// Path to the agent definition (TOML).
        #[arg(long, short)]
        agent: PathBuf,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the agent definition (TOML).
    #[arg(long, short)]
    pub agent: PathBuf,

    /// User input for the run.
    #[arg(long, short, conflicts_with = "messages")]
    pub input: Option<String>,

    /// JSON file holding the input conversation as an array of turns.
    #[arg(long, short)]
    pub messages: Option<PathBuf>,

    /// Print content as it streams and tool activity on stderr.
    #[arg(long)]
    pub stream: bool,

    /// Print the full run result as JSON.
    #[arg(long)]
    pub json: bool,
}
