// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serve lifecycle: PID lock, TLS, listener, hub wiring, teardown.

use crate::auth::AuthStore;
use crate::certs::{ensure_certs, CertError};
use crate::hub::{Hub, HubHooks};
use crate::rate_limit::RateLimiter;
use crate::streamer::TerminalStreamer;
use crate::watcher::{ManifestWatcher, WatcherOptions};
use fs2::FileExt;
use futures_util::future::BoxFuture;
use ppg_core::ProjectPaths;
use ppg_pm::Pm;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig as TlsConfig;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_PORT: u16 = 7878;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("another serve process holds the PID lock")]
    AlreadyRunning,

    #[error(transparent)]
    Cert(#[from] CertError),

    #[error("tls setup failed: {0}")]
    Tls(String),

    #[error("watcher setup failed: {0}")]
    Watch(String),

    #[error(transparent)]
    Store(#[from] ppg_store::StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serve options.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub port: u16,
    pub tls: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT, tls: true }
    }
}

/// Discovery metadata written to `serve.json`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServeMeta<'a> {
    pid: u32,
    port: u16,
    tls: bool,
    fingerprint: &'a str,
    started_at: chrono::DateTime<chrono::Utc>,
}

/// Run the WebSocket endpoint until SIGTERM/SIGINT (or cancellation).
pub async fn serve(
    root: &Path,
    pm: Arc<dyn Pm>,
    config: ServeConfig,
    cancel: CancellationToken,
) -> Result<(), ServeError> {
    let paths = ProjectPaths::new(root);
    std::fs::create_dir_all(&paths.logs_dir)?;

    // Manifest must exist before serving it.
    ppg_store::read_manifest(root)?;

    // 1. PID lock first; never truncate a live daemon's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.serve_pid)?;
    lock_file.try_lock_exclusive().map_err(|_| ServeError::AlreadyRunning)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 2. TLS material.
    let cert_info = ensure_certs(&paths)?;
    let tls_acceptor = if config.tls {
        Some(tls_acceptor(&cert_info.cert_path, &cert_info.key_path)?)
    } else {
        None
    };

    // 3. Bind, then publish discovery metadata.
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    let port = listener.local_addr()?.port();
    write_serve_meta(&paths, port, config.tls, &cert_info.fingerprint)?;

    // 4. Wire the hub to the watcher and streamer.
    let auth = Arc::new(AuthStore::new(paths.auth_file.clone()));
    let limiter = Arc::new(RateLimiter::new());
    let streamer = Arc::new(TerminalStreamer::new(Arc::clone(&pm)));
    let hooks = terminal_hooks(root.to_path_buf(), Arc::clone(&pm));
    let hub = Arc::new(Hub::new(
        root.to_path_buf(),
        auth,
        limiter,
        Arc::clone(&streamer),
        hooks,
    ));

    let (watcher, watch_rx) = ManifestWatcher::start(
        root,
        Arc::clone(&pm),
        WatcherOptions::default(),
        Arc::new(|e| warn!(error = %e, "watcher error")),
    )
    .map_err(|e| ServeError::Watch(e.to_string()))?;
    let relay = Arc::clone(&hub).relay_watch_events(watch_rx);

    info!(port, tls = config.tls, fingerprint = %cert_info.fingerprint, "serve ready");

    // 5. Accept until a signal or cancellation.
    let mut sigterm =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = sigterm.recv() => break,
            _ = sigint.recv() => break,
            accepted = listener.accept() => {
                let Ok((stream, peer)) = accepted else { continue };
                let hub = Arc::clone(&hub);
                let acceptor = tls_acceptor.clone();
                tokio::spawn(async move {
                    let ip = peer.ip().to_string();
                    match acceptor {
                        Some(acceptor) => match acceptor.accept(stream).await {
                            Ok(tls_stream) => hub.handle_connection(tls_stream, ip).await,
                            Err(e) => tracing::debug!(error = %e, "tls handshake failed"),
                        },
                        None => hub.handle_connection(stream, ip).await,
                    }
                });
            }
        }
    }

    // Teardown, reverse order of setup.
    info!("serve shutting down");

    // 1. Stop producing events
    watcher.stop();
    relay.abort();
    streamer.destroy();

    // 2. Say goodbye to clients
    hub.close();

    // 3. Remove discovery metadata and PID file
    if let Err(e) = std::fs::remove_file(&paths.serve_json) {
        warn!(error = %e, "serve.json removal failed");
    }
    if let Err(e) = std::fs::remove_file(&paths.serve_pid) {
        warn!(error = %e, "serve.pid removal failed");
    }

    // 4. Lock released when lock_file drops
    Ok(())
}

/// Default terminal hooks: input writes raw text to the agent's pane,
/// resize is ignored (pane size is the multiplexer's business).
fn terminal_hooks(root: PathBuf, pm: Arc<dyn Pm>) -> HubHooks {
    let input_root = root.clone();
    HubHooks {
        on_terminal_input: Some(Arc::new(move |agent_id: String, data: String| {
            let root = input_root.clone();
            let pm = Arc::clone(&pm);
            let fut: BoxFuture<'static, Result<(), String>> = Box::pin(async move {
                let manifest = ppg_store::read_manifest(&root).map_err(|e| e.to_string())?;
                let (_, agent) = manifest
                    .find_agent(&agent_id)
                    .ok_or_else(|| format!("unknown agent: {agent_id}"))?;
                pm.send_literal(&agent.tmux_target, &data)
                    .await
                    .map_err(|e| e.to_string())
            });
            fut
        })),
        on_terminal_resize: None,
    }
}

fn tls_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, ServeError> {
    let cert_pem = std::fs::read(cert_path)?;
    let mut reader = std::io::BufReader::new(cert_pem.as_slice());
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(|e| ServeError::Tls(e.to_string()))?;

    let key_pem = std::fs::read(key_path)?;
    let mut reader = std::io::BufReader::new(key_pem.as_slice());
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ServeError::Tls(e.to_string()))?
        .ok_or_else(|| ServeError::Tls("no private key in PEM".to_string()))?;

    let config = TlsConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServeError::Tls(e.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn write_serve_meta(
    paths: &ProjectPaths,
    port: u16,
    tls: bool,
    fingerprint: &str,
) -> Result<(), ServeError> {
    let meta = ServeMeta {
        pid: std::process::id(),
        port,
        tls,
        fingerprint,
        started_at: chrono::Utc::now(),
    };
    let mut body = serde_json::to_vec_pretty(&meta).map_err(|e| ServeError::Tls(e.to_string()))?;
    body.push(b'\n');
    let tmp = paths.serve_json.with_extension(format!("json.tmp-{}", std::process::id()));
    std::fs::write(&tmp, &body)?;
    std::fs::rename(&tmp, &paths.serve_json)?;
    Ok(())
}

#[cfg(test)]
#[path = "serve_tests.rs"]
mod tests;
