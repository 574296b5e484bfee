// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command implementations. Each command resolves the project root,
//! calls the engine/daemon libraries, and prints through [`OutputMode`].

pub mod cron;
pub mod init;
pub mod kill;
pub mod merge;
pub mod restart;
pub mod spawn;
pub mod status;
pub mod token;

use crate::exit_error::ExitError;
use crate::output::OutputMode;
use crate::{Cli, Command};
use std::path::PathBuf;

/// Project root: `--root`, or the enclosing Git repository.
pub async fn resolve_root(explicit: Option<PathBuf>) -> Result<PathBuf, ExitError> {
    match explicit {
        Some(root) => Ok(root),
        None => {
            let cwd = std::env::current_dir()?;
            Ok(ppg_engine::worktree::git::repo_root(&cwd).await?)
        }
    }
}

pub async fn dispatch(cli: Cli, mode: OutputMode) -> Result<(), ExitError> {
    let root = resolve_root(cli.root).await?;

    match cli.command {
        Command::Init => init::run(&root, mode).await,
        Command::Spawn(args) => spawn::run(&root, args, mode).await,
        Command::Status => status::run(&root, mode).await,
        Command::Kill(args) => kill::run(&root, args, mode).await,
        Command::Attach { agent } => status::attach(&root, &agent, mode).await,
        Command::Logs { agent, lines } => status::logs(&root, &agent, lines, mode).await,
        Command::Merge(args) => merge::run(&root, args, mode).await,
        Command::Pr(args) => merge::pr(&root, args, mode).await,
        Command::Restart { agent, prompt } => {
            restart::restart(&root, &agent, prompt, mode).await
        }
        Command::Resume { agent } => restart::resume(&root, &agent, mode).await,
        Command::Reset => kill::reset(&root, mode).await,
        Command::Clean => kill::clean(&root, mode).await,
        Command::Swarm(args) => spawn::swarm(&root, args, mode).await,
        Command::Prompt(args) => spawn::prompt(&root, args, mode).await,
        Command::Cron { command } => cron::run(&root, command, mode).await,
        Command::Serve { port, no_tls } => {
            let config = ppg_daemon::ServeConfig {
                port: port.unwrap_or(ppg_daemon::serve::DEFAULT_PORT),
                tls: !no_tls,
            };
            let pm = ppg_pm::detect_backend().await;
            // Never cancelled from here; `serve` stops on signals.
            let cancel = tokio_util::sync::CancellationToken::new();
            ppg_daemon::serve(&root, pm, config, cancel)
                .await
                .map_err(|e| ExitError::internal(e.to_string()))
        }
        Command::Token { command } => token::run(&root, command, mode).await,
    }
}
