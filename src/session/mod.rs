//! Authenticated HTTP sessions for the ECP flow.
//!
//! [`EcpSession`] is the contract the credential issuer needs from a session:
//! a shared cookie jar, the ECP handshake, and a form POST. [`HttpSession`] is
//! the reqwest-backed implementation; the SOAP/PAOS handshake itself is
//! plugged in through [`Authenticator`].

mod auth;
mod error;
mod http;

use async_trait::async_trait;
use reqwest::header::HeaderMap;

use crate::cookies::CookieJar;

pub use auth::{AuthRequest, Authenticator, UnconfiguredAuthenticator};
pub use error::{AuthenticationError, BoxError, SessionError, TransportError};
pub use http::{HttpSession, HttpSessionBuilder};

/// Status, content type and body of a response received through a session.
#[derive(Debug, Clone)]
pub struct SessionResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl SessionResponse {
    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An HTTP session able to run the ECP handshake.
#[async_trait]
pub trait EcpSession: Send {
    /// The session's cookie jar, updated by every exchange.
    fn cookies(&self) -> &CookieJar;

    /// The IdP ECP endpoint this session authenticates against, if any.
    fn idp(&self) -> Option<&str>;

    /// Authenticates against the Identity Provider for `url`.
    ///
    /// On success the jar holds a session cookie for `url`'s SP.
    async fn ecp_authenticate(&mut self, url: &str) -> Result<(), AuthenticationError>;

    /// Sends a POST with the given body and headers.
    async fn post(
        &mut self,
        url: &str,
        body: Vec<u8>,
        headers: HeaderMap,
    ) -> Result<SessionResponse, TransportError>;
}
