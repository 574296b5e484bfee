// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use ppg_core::ErrorCode;
use std::fmt;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    /// Machine code for `--json` envelopes.
    pub error_code: ErrorCode,
    pub message: String,
}

impl ExitError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code: error_code.exit_code(), error_code, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

impl From<ppg_engine::EngineError> for ExitError {
    fn from(e: ppg_engine::EngineError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<ppg_store::StoreError> for ExitError {
    fn from(e: ppg_store::StoreError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<ppg_pm::PmError> for ExitError {
    fn from(e: ppg_pm::PmError) -> Self {
        let code = match e {
            ppg_pm::PmError::PmNotFound => ErrorCode::PmNotFound,
            _ => ErrorCode::Internal,
        };
        Self::new(code, e.to_string())
    }
}

impl From<ppg_daemon::AuthError> for ExitError {
    fn from(e: ppg_daemon::AuthError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<ppg_daemon::cron::CronError> for ExitError {
    fn from(e: ppg_daemon::cron::CronError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<std::io::Error> for ExitError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(e.to_string())
    }
}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
