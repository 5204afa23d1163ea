//! Error types for certificate issuance.

use thiserror::Error;

use crate::cookies::CookieError;
use crate::session::{AuthenticationError, SessionError, TransportError};

/// Why a certificate response could not be turned into a bundle.
///
/// Messages never include the export password.
#[derive(Debug, Error)]
pub enum DecodeFailure {
    /// The SP answered with a non-success status.
    #[error("service provider rejected the request with HTTP {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },

    /// The SP answered with a page instead of a PKCS#12 archive.
    #[error("service provider returned an error page ({content_type}) instead of a certificate")]
    ErrorPage {
        /// Response content type, or `unknown`.
        content_type: String,
    },

    /// The body is not a PKCS#12 archive.
    #[error("response is not a valid PKCS#12 archive: {reason}")]
    Corrupt {
        /// Parser detail.
        reason: String,
    },

    /// The archive MAC does not verify with the password we generated.
    #[error("PKCS#12 integrity check failed for the generated export password")]
    PasswordMismatch,

    /// The archive decoded but lacks a required part.
    #[error("PKCS#12 archive has no {missing}")]
    Incomplete {
        /// Missing part.
        missing: &'static str,
    },
}

/// Errors from [`issue_certificate`](super::issue_certificate) and the
/// scoped session operations.
#[derive(Debug, Error)]
pub enum IssueError {
    /// Cookie lookup or cookie file persistence failed.
    #[error(transparent)]
    Cookie(#[from] CookieError),

    /// The ECP handshake failed or left no session cookie.
    #[error(transparent)]
    Authentication(#[from] AuthenticationError),

    /// Requested lifetime is not a positive finite number of hours.
    #[error("invalid certificate validity: {hours} hours (must be a positive number)")]
    InvalidValidity {
        /// The rejected value.
        hours: f64,
    },

    /// The session could not be opened.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The certificate request could not be sent.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response could not be decoded into a certificate.
    #[error("certificate response could not be decoded: {0}")]
    CertificateDecode(#[from] DecodeFailure),
}

impl IssueError {
    /// Returns `true` when the failure came from authentication.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}
