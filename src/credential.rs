//! Inspection of a stored PEM credential.
//!
//! A credential file holds the end-entity certificate first, then its
//! private key, then any chain certificates (the layout written by
//! [`CertificateBundle::write_pem`](crate::CertificateBundle::write_pem)).

use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument};
use x509_parser::objects::{oid_registry, oid2sn};

use crate::cookies::unix_now;

const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Errors raised while reading a stored credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The file could not be read.
    #[error("cannot read credential {}: {source}", path.display())]
    Io {
        /// The credential path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The file is not PEM.
    #[error("credential {} is not PEM: {source}", path.display())]
    Pem {
        /// The credential path.
        path: PathBuf,
        /// The PEM framing error.
        #[source]
        source: pem::PemError,
    },

    /// The file holds no `CERTIFICATE` block.
    #[error("no certificate in credential {}", path.display())]
    NoCertificate {
        /// The credential path.
        path: PathBuf,
    },

    /// The first certificate is not valid X.509.
    #[error("unreadable certificate in {}: {reason}", path.display())]
    Certificate {
        /// The credential path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },
}

/// Summary of the end-entity certificate in a credential file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialInfo {
    /// File the credential was read from.
    pub path: PathBuf,
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Serial number as colon-separated hex.
    pub serial: String,
    /// Signature algorithm short name, or its OID when unknown.
    pub signature_algorithm: String,
    /// Start of validity as Unix seconds.
    pub not_before: i64,
    /// End of validity as Unix seconds.
    pub not_after: i64,
    /// Whether the file also carries a private key block.
    pub has_private_key: bool,
    /// Certificates after the end-entity one.
    pub chain_len: usize,
}

impl CredentialInfo {
    /// Seconds of validity left at `now`, zero once expired.
    #[must_use]
    pub fn seconds_left_at(&self, now: i64) -> i64 {
        (self.not_after - now).max(0)
    }

    /// Seconds of validity left now.
    #[must_use]
    pub fn seconds_left(&self) -> i64 {
        self.seconds_left_at(unix_now())
    }

    /// Whether at least `required` seconds of validity remain at `now`.
    #[must_use]
    pub fn is_valid_for_at(&self, required: i64, now: i64) -> bool {
        now >= self.not_before && now < self.not_after && self.not_after - now >= required
    }

    /// Whether at least `required` seconds of validity remain now.
    #[must_use]
    pub fn is_valid_for(&self, required: i64) -> bool {
        self.is_valid_for_at(required, unix_now())
    }

    /// `label : value` lines describing the credential at `now`.
    ///
    /// The short form names subject, issuer, path and time left; `verbose`
    /// adds serial, signature algorithm, validity bounds, key and chain.
    #[must_use]
    pub fn render_at(&self, verbose: bool, now: i64) -> String {
        let mut out = String::new();
        let mut line = |label: &str, value: &dyn std::fmt::Display| {
            let _ = writeln!(out, "{label:<9}: {value}");
        };
        line("subject", &self.subject);
        line("issuer", &self.issuer);
        if verbose {
            line("serial", &self.serial);
            line("sigalg", &self.signature_algorithm);
            line("notbefore", &self.not_before);
            line("notafter", &self.not_after);
            line("key", &if self.has_private_key { "present" } else { "absent" });
            line("chain", &self.chain_len);
        }
        line("path", &self.path.display());
        line("timeleft", &format_duration(self.seconds_left_at(now)));
        out
    }

    /// [`render_at`](Self::render_at) for the current time.
    #[must_use]
    pub fn render(&self, verbose: bool) -> String {
        self.render_at(verbose, unix_now())
    }
}

/// Reads the credential at `path` and summarises its end-entity certificate.
///
/// # Errors
///
/// Returns a [`CredentialError`] when the file cannot be read, is not PEM,
/// has no certificate, or the first certificate does not parse.
#[instrument(level = "debug")]
pub fn inspect_credential(path: &Path) -> Result<CredentialInfo, CredentialError> {
    let bytes = std::fs::read(path).map_err(|source| CredentialError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let blocks = pem::parse_many(&bytes).map_err(|source| CredentialError::Pem {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(blocks = blocks.len(), "read credential");

    let mut certificates = blocks.iter().filter(|b| b.tag() == CERTIFICATE_TAG);
    let leaf = certificates
        .next()
        .ok_or_else(|| CredentialError::NoCertificate {
            path: path.to_path_buf(),
        })?;
    let chain_len = certificates.count();
    let has_private_key = blocks.iter().any(|b| b.tag().ends_with("PRIVATE KEY"));

    let (_, cert) = x509_parser::parse_x509_certificate(leaf.contents()).map_err(|e| {
        CredentialError::Certificate {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    let algorithm = &cert.signature_algorithm.algorithm;
    let signature_algorithm = oid2sn(algorithm, oid_registry())
        .map_or_else(|_| algorithm.to_id_string(), str::to_string);

    Ok(CredentialInfo {
        path: path.to_path_buf(),
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: cert.raw_serial_as_string(),
        signature_algorithm,
        not_before: cert.validity().not_before.timestamp(),
        not_after: cert.validity().not_after.timestamp(),
        has_private_key,
        chain_len,
    })
}

/// Formats seconds as `H:MM:SS`, hours unbounded.
#[must_use]
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}

/// Parses an `H:M` duration into seconds.
///
/// # Errors
///
/// Returns a message when the value is not two non-negative integers
/// separated by a colon, or minutes exceed 59.
pub fn parse_hours_minutes(value: &str) -> Result<i64, String> {
    let invalid = || format!("expected H:M, got {value:?}");
    let (hours, minutes) = value.trim().split_once(':').ok_or_else(invalid)?;
    let hours: i64 = hours.parse().map_err(|_| invalid())?;
    let minutes: i64 = minutes.parse().map_err(|_| invalid())?;
    if hours < 0 || !(0..60).contains(&minutes) {
        return Err(invalid());
    }
    hours
        .checked_mul(3600)
        .and_then(|secs| secs.checked_add(minutes * 60))
        .ok_or_else(invalid)
}
