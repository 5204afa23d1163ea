//! Error types for ECP sessions.

use thiserror::Error;

/// Boxed transport-level cause, so fake sessions can report failures too.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the ECP handshake against the Identity Provider.
#[derive(Debug, Error)]
pub enum AuthenticationError {
    /// The Identity Provider refused the credentials or the SAML exchange.
    #[error("identity provider {endpoint} rejected authentication: {reason}")]
    Rejected {
        /// IdP ECP endpoint.
        endpoint: String,
        /// Reason reported by the IdP or the handshake.
        reason: String,
    },

    /// The IdP or SP could not be reached.
    #[error("network error during ECP authentication with {endpoint}: {source}")]
    Network {
        /// IdP ECP endpoint.
        endpoint: String,
        /// The underlying transport error.
        #[source]
        source: BoxError,
    },

    /// No ECP handshake implementation is available.
    #[error(
        "no ECP authenticator configured for {endpoint}; reuse a stored session cookie or supply an authenticator"
    )]
    Unavailable {
        /// IdP ECP endpoint.
        endpoint: String,
    },

    /// The session has no Identity Provider endpoint to authenticate against.
    #[error("no identity provider endpoint configured (set ECP_IDP or pass --identity-provider)")]
    MissingEndpoint,

    /// Authentication finished but left no session cookie for the SP.
    #[error("authentication against {endpoint} produced no session cookie for {origin}")]
    NoSessionCookie {
        /// IdP ECP endpoint.
        endpoint: String,
        /// SP network location that still lacks a cookie.
        origin: String,
    },
}

/// An HTTP request made through the session failed before a response arrived.
#[derive(Debug, Error)]
#[error("HTTP request to {url} failed: {source}")]
pub struct TransportError {
    /// The URL that was requested.
    pub url: String,
    /// The underlying transport error.
    #[source]
    pub source: BoxError,
}

impl TransportError {
    /// Creates a transport error for `url`.
    pub fn new(url: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }
}

/// Errors that can occur while opening a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
