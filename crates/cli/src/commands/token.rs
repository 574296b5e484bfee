// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `ppg token {add,list,revoke}`.

use crate::exit_error::ExitError;
use crate::output::OutputMode;
use clap::Subcommand;
use ppg_core::{ErrorCode, ProjectPaths};
use ppg_daemon::AuthStore;
use std::path::Path;

#[derive(Subcommand)]
pub enum TokenCommand {
    /// Mint a token; the plaintext is printed exactly once
    Add { label: String },
    /// List token labels and usage times
    List,
    /// Revoke a token by label
    Revoke { label: String },
}

pub async fn run(root: &Path, command: TokenCommand, mode: OutputMode) -> Result<(), ExitError> {
    let paths = ProjectPaths::new(root);
    let store = AuthStore::new(paths.auth_file);

    match command {
        TokenCommand::Add { label } => {
            let plaintext = store.add_token(&label)?;
            mode.success(
                &format!("{plaintext}\n(store this now; it will not be shown again)"),
                &serde_json::json!({ "label": label, "token": plaintext }),
            );
            Ok(())
        }
        TokenCommand::List => {
            let tokens = store.list_tokens()?;
            if mode == OutputMode::Json {
                // Hashes stay private even in JSON output.
                let redacted: Vec<_> = tokens
                    .iter()
                    .map(|t| {
                        serde_json::json!({
                            "label": t.label,
                            "createdAt": t.created_at,
                            "lastUsedAt": t.last_used_at,
                        })
                    })
                    .collect();
                mode.success("", &redacted);
                return Ok(());
            }
            if tokens.is_empty() {
                println!("no tokens (mint one with `ppg token add <label>`)");
                return Ok(());
            }
            for token in tokens {
                let last = token
                    .last_used_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!("{}  created {}  last used {}", token.label, token.created_at.to_rfc3339(), last);
            }
            Ok(())
        }
        TokenCommand::Revoke { label } => {
            if !store.revoke_token(&label)? {
                return Err(ExitError::new(
                    ErrorCode::InvalidArgs,
                    format!("no token labeled {label:?}"),
                ));
            }
            mode.success(
                &format!("revoked {label}"),
                &serde_json::json!({ "label": label }),
            );
            Ok(())
        }
    }
}
