// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human vs `--json` output.

use crate::exit_error::ExitError;
use serde::Serialize;

/// How command results reach stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    /// Print a successful result: human text, or `{ok:true, ...}`.
    pub fn success<T: Serialize>(self, human: &str, data: &T) {
        match self {
            OutputMode::Human => {
                if !human.is_empty() {
                    println!("{human}");
                }
            }
            OutputMode::Json => {
                let envelope = serde_json::json!({ "ok": true, "data": data });
                println!("{envelope}");
            }
        }
    }

    /// Print a failure envelope; the caller handles the exit code.
    pub fn failure(self, err: &ExitError) {
        match self {
            OutputMode::Human => eprintln!("ppg: {}", err.message),
            OutputMode::Json => {
                let envelope = serde_json::json!({
                    "ok": false,
                    "code": err.error_code.as_str(),
                    "message": err.message,
                });
                println!("{envelope}");
            }
        }
    }
}
