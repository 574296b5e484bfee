// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token store persisted at `<root>/.ppg/auth.json` (mode 0600).
//!
//! Plaintext tokens are returned exactly once at creation; only SHA-256
//! hex digests are stored. Validation compares digests in constant time
//! and refreshes `lastUsedAt` on a match. Reads are cached in-process
//! until the next successful write.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const TOKEN_PREFIX: &str = "tk_";
const TOKEN_BYTES: usize = 24;

/// Errors from the auth store.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token label already exists: {0}")]
    DuplicateToken(String),

    #[error("auth file is corrupt: {0}")]
    Corrupt(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthError {
    pub fn code(&self) -> ppg_core::ErrorCode {
        match self {
            AuthError::DuplicateToken(_) => ppg_core::ErrorCode::DuplicateToken,
            AuthError::Corrupt(_) => ppg_core::ErrorCode::AuthCorrupt,
            AuthError::Io(_) => ppg_core::ErrorCode::Internal,
        }
    }
}

/// One stored token (digest only, never plaintext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEntry {
    pub label: String,
    /// SHA-256 hex of the plaintext token.
    pub hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthFile {
    tokens: Vec<TokenEntry>,
}

/// Token store bound to one auth file.
pub struct AuthStore {
    path: PathBuf,
    cache: Mutex<Option<AuthFile>>,
}

impl AuthStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), cache: Mutex::new(None) }
    }

    /// Mint a token under `label`; returns the plaintext exactly once.
    pub fn add_token(&self, label: &str) -> Result<String, AuthError> {
        let mut file = self.load()?;
        if file.tokens.iter().any(|t| t.label == label) {
            return Err(AuthError::DuplicateToken(label.to_string()));
        }

        let mut bytes = [0u8; TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        let plaintext = format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes));

        file.tokens.push(TokenEntry {
            label: label.to_string(),
            hash: sha256_hex(&plaintext),
            created_at: Utc::now(),
            last_used_at: None,
        });
        self.persist(file)?;
        Ok(plaintext)
    }

    /// Look up a plaintext token; refreshes `lastUsedAt` on a match.
    pub fn validate_token(&self, plaintext: &str) -> Result<Option<TokenEntry>, AuthError> {
        let mut file = self.load()?;
        let digest = sha256_hex(plaintext);

        // Visit every entry so timing does not reveal which label (if
        // any) matched.
        let mut matched: Option<usize> = None;
        for (i, entry) in file.tokens.iter().enumerate() {
            if constant_time_eq(entry.hash.as_bytes(), digest.as_bytes()) {
                matched = Some(i);
            }
        }

        match matched {
            Some(i) => {
                file.tokens[i].last_used_at = Some(Utc::now());
                let entry = file.tokens[i].clone();
                self.persist(file)?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Remove a token by label; returns whether one existed.
    pub fn revoke_token(&self, label: &str) -> Result<bool, AuthError> {
        let mut file = self.load()?;
        let before = file.tokens.len();
        file.tokens.retain(|t| t.label != label);
        let removed = file.tokens.len() < before;
        if removed {
            self.persist(file)?;
        }
        Ok(removed)
    }

    pub fn list_tokens(&self) -> Result<Vec<TokenEntry>, AuthError> {
        Ok(self.load()?.tokens)
    }

    /// Cached read; a missing file is an empty store, a bad parse is
    /// `AuthCorrupt`.
    fn load(&self) -> Result<AuthFile, AuthError> {
        let mut cache = self.cache.lock();
        if let Some(file) = cache.as_ref() {
            return Ok(file.clone());
        }
        let file = match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| AuthError::Corrupt(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AuthFile::default(),
            Err(e) => return Err(e.into()),
        };
        *cache = Some(file.clone());
        Ok(file)
    }

    /// Atomic replace (mode 0600); refreshes the cache on success.
    fn persist(&self, file: AuthFile) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut body = serde_json::to_vec_pretty(&file)
            .map_err(|e| AuthError::Corrupt(e.to_string()))?;
        body.push(b'\n');

        let tmp = self.path.with_extension(format!("json.tmp-{}", std::process::id()));
        {
            let mut f = std::fs::File::create(&tmp)?;
            set_owner_only(&f)?;
            f.write_all(&body)?;
            f.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        *self.cache.lock() = Some(file);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Compare without early exit; both sides are fixed-width hex digests.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(unix)]
fn set_owner_only(file: &std::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
