//! Certificate issuance over an authenticated ECP session.
//!
//! The flow is: find (or obtain) the SP session cookie, POST a PKCS#12
//! request carrying a fresh CSRF token and export password, then decode the
//! returned archive with that password.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ecpcert_core::config::EcpConfig;
//! use ecpcert_core::issuer::get_certificate;
//! use ecpcert_core::session::UnconfiguredAuthenticator;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EcpConfig::from_env();
//! let bundle = get_certificate(&config, Arc::new(UnconfiguredAuthenticator)).await?;
//! println!("{}", bundle.to_pem());
//! # Ok(())
//! # }
//! ```

mod bundle;
mod error;
mod request;

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::EcpConfig;
use crate::cookies::{Cookie, CookieError, find_session_cookie};
use crate::session::{
    AuthenticationError, Authenticator, EcpSession, HttpSession, SessionResponse, TransportError,
};

pub use bundle::CertificateBundle;
pub use error::{DecodeFailure, IssueError};
pub use request::{CSRF_TOKEN_LEN, CertificateRequest, PASSWORD_PUNCTUATION, lifetime_hours};

/// Returns the session cookie for `url`, authenticating once if needed.
///
/// # Errors
///
/// Returns [`IssueError::Authentication`] when the handshake fails or still
/// leaves no session cookie, and [`IssueError::Cookie`] for an invalid URL.
#[instrument(level = "debug", skip(session))]
pub async fn session_cookie<S>(session: &mut S, url: &str) -> Result<Cookie, IssueError>
where
    S: EcpSession + ?Sized,
{
    match find_session_cookie(session.cookies(), url) {
        Ok(cookie) => return Ok(cookie),
        Err(e) if e.is_not_found() => {
            debug!("no session cookie, authenticating");
        }
        Err(e) => return Err(e.into()),
    }

    session.ecp_authenticate(url).await?;

    match find_session_cookie(session.cookies(), url) {
        Ok(cookie) => Ok(cookie),
        Err(CookieError::NotFound { origin }) => Err(AuthenticationError::NoSessionCookie {
            endpoint: session.idp().unwrap_or("identity provider").to_string(),
            origin,
        }
        .into()),
        Err(e) => Err(e.into()),
    }
}

/// Requests a certificate from the SP at `sp_url` valid for `validity_hours`.
///
/// Fractional hours round up. No step is retried.
///
/// # Errors
///
/// Returns [`IssueError::InvalidValidity`] for a non-positive or non-finite
/// lifetime, [`IssueError::Authentication`] when no session cookie can be
/// obtained, [`IssueError::Transport`] when the POST fails, and
/// [`IssueError::CertificateDecode`] when the response is not a usable
/// PKCS#12 archive.
#[instrument(level = "debug", skip(session))]
pub async fn issue_certificate<S>(
    session: &mut S,
    sp_url: &str,
    validity_hours: f64,
) -> Result<CertificateBundle, IssueError>
where
    S: EcpSession + ?Sized,
{
    let lifetime = lifetime_hours(validity_hours).ok_or(IssueError::InvalidValidity {
        hours: validity_hours,
    })?;

    let cookie = session_cookie(session, sp_url).await?;
    let request = CertificateRequest::generate(lifetime);
    let headers = request
        .headers(&cookie)
        .map_err(|e| TransportError::new(sp_url, e))?;

    info!(sp_url, lifetime_hours = lifetime, "Requesting certificate");
    let response = session
        .post(sp_url, request.form_body().into_bytes(), headers)
        .await?;

    let bundle = decode_response(&response, request.export_password())?;
    info!(chain = bundle.chain().len(), "Certificate issued");
    Ok(bundle)
}

/// Opens a session from `config`, ensures a session cookie for `url`, and
/// closes the session.
///
/// # Errors
///
/// Returns [`IssueError::Session`] if the session cannot be opened, any
/// error of [`session_cookie`], or [`IssueError::Cookie`] if storing cookies
/// on close fails.
pub async fn get_session_cookie(
    config: &EcpConfig,
    url: &str,
    authenticator: Arc<dyn Authenticator>,
) -> Result<Cookie, IssueError> {
    let mut session = HttpSession::from_config(config, authenticator)?;
    let result = session_cookie(&mut session, url).await;
    finish(session, result)
}

/// Opens a session from `config` and requests a certificate from
/// `config.sp_url`.
///
/// The session is closed (storing cookies when configured) whether or not
/// issuance succeeded.
///
/// # Errors
///
/// Returns the issuance error if there is one, otherwise a failure to store
/// cookies on close.
pub async fn get_certificate(
    config: &EcpConfig,
    authenticator: Arc<dyn Authenticator>,
) -> Result<CertificateBundle, IssueError> {
    let mut session = HttpSession::from_config(config, authenticator)?;
    let result = issue_certificate(&mut session, &config.sp_url, config.validity_hours).await;
    finish(session, result)
}

fn finish<T>(session: HttpSession, result: Result<T, IssueError>) -> Result<T, IssueError> {
    let closed = session.close();
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_err)) => {
            warn!(error = %close_err, "Failed to store session cookies");
            Err(e)
        }
    }
}

fn decode_response(
    response: &SessionResponse,
    password: &str,
) -> Result<CertificateBundle, DecodeFailure> {
    if !response.is_success() {
        return Err(DecodeFailure::Rejected {
            status: response.status,
        });
    }
    if looks_like_page(response) {
        return Err(DecodeFailure::ErrorPage {
            content_type: response
                .content_type
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        });
    }
    CertificateBundle::from_pkcs12(&response.body, password)
}

/// HTML or plain-text responses are SP error pages, never archives.
fn looks_like_page(response: &SessionResponse) -> bool {
    let textual = response.content_type.as_deref().is_some_and(|ct| {
        let ct = ct.to_ascii_lowercase();
        ct.starts_with("text/") || ct.contains("html")
    });
    textual || response.body.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'<')
}
