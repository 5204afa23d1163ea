//! Seam for the external SOAP/PAOS handshake.

use async_trait::async_trait;
use reqwest::Client;

use super::AuthenticationError;

/// Parameters of one ECP authentication attempt.
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    /// IdP ECP endpoint URL.
    pub idp: &'a str,
    /// SP resource that triggers the SAML exchange.
    pub sp_url: &'a str,
    /// Login name, when the IdP needs one.
    pub username: Option<&'a str>,
}

/// Runs the ECP handshake with an Identity Provider.
///
/// `client` has the session's cookie jar installed as its cookie provider,
/// so cookies set during the exchange land in the session automatically.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Performs the handshake.
    ///
    /// # Errors
    ///
    /// Returns [`AuthenticationError`] when the IdP rejects the attempt or
    /// cannot be reached.
    async fn authenticate(
        &self,
        client: &Client,
        request: &AuthRequest<'_>,
    ) -> Result<(), AuthenticationError>;
}

/// Authenticator used when no handshake implementation was supplied.
///
/// Always fails, so only sessions that already hold a cookie can issue
/// certificates.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredAuthenticator;

#[async_trait]
impl Authenticator for UnconfiguredAuthenticator {
    async fn authenticate(
        &self,
        _client: &Client,
        request: &AuthRequest<'_>,
    ) -> Result<(), AuthenticationError> {
        Err(AuthenticationError::Unavailable {
            endpoint: request.idp.to_string(),
        })
    }
}
