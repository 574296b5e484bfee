// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ppg` — spawn and shepherd parallel coding agents in Git worktrees.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod exit_error;
mod output;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use output::OutputMode;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ppg", about = "Parallel agent orchestrator for Git worktrees", version)]
struct Cli {
    /// Print results as JSON envelopes
    #[arg(long, global = true)]
    json: bool,

    /// Project root (defaults to the enclosing Git repository)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize ppg state in this repository
    Init,

    /// Spawn agents on a prompt inside an isolated worktree
    Spawn(commands::spawn::SpawnArgs),

    /// Show worktrees and live agent statuses
    Status,

    /// Kill agents; optionally remove their worktrees
    Kill(commands::kill::KillArgs),

    /// Attach the terminal to an agent's window
    Attach {
        /// Agent id or name
        agent: String,
    },

    /// Print an agent's recent terminal output
    Logs {
        /// Agent id or name
        agent: String,
        /// How many trailing lines to print
        #[arg(long, default_value_t = 100)]
        lines: usize,
    },

    /// Merge a worktree's branch back into its base branch
    Merge(commands::merge::MergeArgs),

    /// Open a pull request for a worktree's branch
    Pr(commands::merge::PrArgs),

    /// Restart an agent in a fresh window with its recorded prompt
    Restart {
        /// Agent id
        agent: String,
        /// Replace the recorded prompt
        #[arg(long)]
        prompt: Option<String>,
    },

    /// Resume an agent from its recorded session id
    Resume {
        /// Agent id
        agent: String,
    },

    /// Kill everything and clean up every worktree
    Reset,

    /// Clean up merged and failed worktrees
    Clean,

    /// Spawn a swarm template now
    Swarm(commands::spawn::TemplateArgs),

    /// Spawn a prompt template now
    Prompt(commands::spawn::TemplateArgs),

    /// Manage the cron scheduler
    Cron {
        #[command(subcommand)]
        command: commands::cron::CronCommand,
    },

    /// Run the WebSocket endpoint in the foreground
    Serve {
        #[arg(long)]
        port: Option<u16>,
        /// Serve plain ws:// instead of wss://
        #[arg(long)]
        no_tls: bool,
    },

    /// Manage dashboard auth tokens
    Token {
        #[command(subcommand)]
        command: commands::token::TokenCommand,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    match commands::dispatch(cli, mode).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            mode.failure(&err);
            ExitCode::from(err.code.clamp(0, 255) as u8)
        }
    }
}
