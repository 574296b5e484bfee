// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ppgd` — the ppg daemon binary.
//!
//! Subcommands:
//!   serve [--port N] [--no-tls] [--root PATH]   WebSocket endpoint
//!   cron [--root PATH]                          schedule runner

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use ppg_core::{ProjectPaths, SystemClock};
use ppg_daemon::cron::{
    append_cron_log, remove_pid_file, write_pid_file, CronDaemon, TemplateRunner,
};
use ppg_daemon::serve::{serve, ServeConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;

struct Args {
    command: String,
    root: PathBuf,
    port: u16,
    tls: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let command = args.next().ok_or_else(usage)?;
    let mut parsed = Args {
        command,
        root: std::env::current_dir().map_err(|e| e.to_string())?,
        port: ppg_daemon::serve::DEFAULT_PORT,
        tls: true,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--root" => {
                parsed.root = PathBuf::from(args.next().ok_or("--root needs a value")?);
            }
            "--port" => {
                parsed.port = args
                    .next()
                    .ok_or("--port needs a value")?
                    .parse()
                    .map_err(|_| "--port needs a number".to_string())?;
            }
            "--no-tls" => parsed.tls = false,
            other => return Err(format!("unknown flag: {other}")),
        }
    }
    Ok(parsed)
}

fn usage() -> String {
    "usage: ppgd <serve|cron> [--root PATH] [--port N] [--no-tls]".to_string()
}

fn init_logging(log_path: &std::path::Path) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let dir = log_path.parent()?;
    std::fs::create_dir_all(dir).ok()?;
    let file_name = log_path.file_name()?.to_string_lossy().into_owned();
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            eprintln!("{}", usage());
            return ExitCode::from(2);
        }
    };
    let paths = ProjectPaths::new(&args.root);

    match args.command.as_str() {
        "serve" => {
            let _guard = init_logging(&paths.serve_log);
            let pm = ppg_pm::detect_backend().await;
            let config = ServeConfig { port: args.port, tls: args.tls };
            match serve(&args.root, pm, config, CancellationToken::new()).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "serve failed");
                    eprintln!("ppgd: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        "cron" => {
            let _guard = init_logging(&paths.cron_log);
            if let Err(e) = write_pid_file(&paths) {
                eprintln!("ppgd: cron pid file: {e}");
                return ExitCode::FAILURE;
            }
            append_cron_log(&paths, "Cron daemon started");

            let pm = ppg_pm::detect_backend().await;
            let runner = Arc::new(TemplateRunner::new(args.root.clone(), pm));
            let daemon = CronDaemon::new(&args.root, SystemClock, runner);
            let cancel = daemon.cancel_token();

            // SIGTERM/SIGINT unlink the PID file and stop the loop.
            let signal_paths = paths.clone();
            tokio::spawn(async move {
                let mut sigterm = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(s) => s,
                    Err(_) => return,
                };
                let mut sigint = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::interrupt(),
                ) {
                    Ok(s) => s,
                    Err(_) => return,
                };
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
                append_cron_log(&signal_paths, "Cron daemon stopping");
                remove_pid_file(&signal_paths);
                cancel.cancel();
            });

            daemon.run().await;
            remove_pid_file(&paths);
            ExitCode::SUCCESS
        }
        other => {
            eprintln!("unknown command: {other}");
            eprintln!("{}", usage());
            ExitCode::from(2)
        }
    }
}
