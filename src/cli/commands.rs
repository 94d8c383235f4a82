//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: drive a task through the execute/verify loop
//! - repair / validate: normalize or check a task's execution record
//! - scope: resolve a task's scope for multi-repository routing
//! - status: show a task's artifacts and attempt history

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskloop::artifact::LayoutKind;

/// Taskloop - a self-correcting execute/verify loop around an AI coding agent
#[derive(Parser, Debug)]
#[command(name = "taskloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root the worker runs in (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub root: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a task until its review passes
    Run {
        /// Task ID (name of the task directory)
        task_id: String,

        /// What the task should achieve
        #[arg(short, long)]
        prompt: String,

        /// Maximum worker invocations
        #[arg(short, long, conflicts_with = "unbounded")]
        max_iterations: Option<u32>,

        /// Run until the review passes, with no iteration cap
        #[arg(long)]
        unbounded: bool,

        /// Delete the task's artifacts and history first
        #[arg(long)]
        fresh: bool,

        /// Artifact naming family (standard, critical-review, prompt-refinement)
        #[arg(short, long)]
        layout: Option<LayoutKind>,
    },

    /// Repair the task's execution.json in place
    Repair {
        /// Task ID
        task_id: String,

        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the task's execution.json against the schema
    Validate {
        /// Task ID
        task_id: String,

        /// Validate the file as written, without sanitizing or repairing
        #[arg(long)]
        raw: bool,
    },

    /// Resolve and record the task's scope
    Scope {
        /// Task ID
        task_id: String,
    },

    /// Show a task's progress
    Status {
        /// Task ID
        task_id: String,
    },
}

impl Commands {
    /// Task the command operates on
    pub fn task_id(&self) -> &str {
        match self {
            Commands::Run { task_id, .. }
            | Commands::Repair { task_id, .. }
            | Commands::Validate { task_id, .. }
            | Commands::Scope { task_id }
            | Commands::Status { task_id } => task_id,
        }
    }
}
