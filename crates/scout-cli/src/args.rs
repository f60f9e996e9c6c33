//! CLI argument definitions using clap
//!
//! Two ways to run:
//! - scout "task"            # one-shot: run the task and exit
//! - scout                   # interactive prompt loop

use clap::Parser;
use std::path::PathBuf;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "scout.json";

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Scout - streaming CLI agent backed by an external tool server")]
#[command(version)]
pub struct Cli {
    /// Task to run (omit for an interactive prompt)
    pub task: Option<String>,

    /// Path to configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: PathBuf,

    /// Chat model identifier (overrides the config file)
    #[arg(long)]
    pub model: Option<String>,

    /// Base URL of the chat service (overrides the config file)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Tool server entry script (overrides the config file)
    #[arg(long)]
    pub server_script: Option<PathBuf>,

    /// Directory the tool server may touch; repeatable
    #[arg(long = "allow", value_name = "DIR")]
    pub allowed_dirs: Vec<PathBuf>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,
}
