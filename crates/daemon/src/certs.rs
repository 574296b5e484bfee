// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-signed TLS material for the serve endpoint.
//!
//! EC P-256 key + certificate, generated only when missing. SANs cover
//! localhost, the loopback addresses, and (best-effort) the machine's
//! primary outbound address so LAN dashboards can pin the fingerprint.

use ppg_core::ProjectPaths;
use rcgen::{CertificateParams, DnType, KeyPair, PKCS_ECDSA_P256_SHA256};
use sha2::{Digest, Sha256};
use std::net::{IpAddr, UdpSocket};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CertError {
    #[error("certificate generation failed: {0}")]
    Generate(String),

    #[error("certificate file unreadable: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the material lives and how to pin it.
#[derive(Debug, Clone)]
pub struct CertInfo {
    pub cert_path: std::path::PathBuf,
    pub key_path: std::path::PathBuf,
    /// SHA-256 of the certificate DER, lowercase hex.
    pub fingerprint: String,
    /// Whether this call generated fresh material.
    pub generated: bool,
}

/// Ensure `certs/server.{key,crt}` exist; returns the fingerprint.
pub fn ensure_certs(paths: &ProjectPaths) -> Result<CertInfo, CertError> {
    if paths.cert_key.exists() && paths.cert_crt.exists() {
        let fingerprint = fingerprint_of_pem(&std::fs::read(&paths.cert_crt)?)?;
        return Ok(CertInfo {
            cert_path: paths.cert_crt.clone(),
            key_path: paths.cert_key.clone(),
            fingerprint,
            generated: false,
        });
    }

    std::fs::create_dir_all(&paths.certs_dir)?;

    let key_pair = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256)
        .map_err(|e| CertError::Generate(e.to_string()))?;

    let mut params = CertificateParams::new(san_names())
        .map_err(|e| CertError::Generate(e.to_string()))?;
    params.distinguished_name.push(DnType::CommonName, "ppg");
    let cert = params
        .self_signed(&key_pair)
        .map_err(|e| CertError::Generate(e.to_string()))?;

    std::fs::write(&paths.cert_key, key_pair.serialize_pem())?;
    std::fs::write(&paths.cert_crt, cert.pem())?;
    tracing::info!(path = %paths.certs_dir.display(), "generated self-signed certificate");

    Ok(CertInfo {
        cert_path: paths.cert_crt.clone(),
        key_path: paths.cert_key.clone(),
        fingerprint: hex_digest(cert.der()),
        generated: true,
    })
}

/// Subject alternative names: hostnames and IPs as plain strings
/// (rcgen sorts out which is which).
fn san_names() -> Vec<String> {
    let mut names = vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "::1".to_string(),
    ];
    if let Some(ip) = primary_local_ip() {
        let name = ip.to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Best-effort primary outbound address: the local side of a UDP
/// "connection" to a public address. No packet is sent.
fn primary_local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_loopback() || ip.is_unspecified() {
        None
    } else {
        Some(ip)
    }
}

fn fingerprint_of_pem(pem: &[u8]) -> Result<String, CertError> {
    let mut reader = std::io::BufReader::new(pem);
    let der = rustls_pemfile::certs(&mut reader)
        .next()
        .ok_or_else(|| CertError::Parse("no certificate in PEM".to_string()))?
        .map_err(|e| CertError::Parse(e.to_string()))?;
    Ok(hex_digest(&der))
}

fn hex_digest(der: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(der.as_ref());
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
#[path = "certs_tests.rs"]
mod tests;
