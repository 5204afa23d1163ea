//! Per-issuance request context: CSRF token, export password, lifetime.

use std::fmt;

use rand::Rng;
use rand::rngs::OsRng;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, InvalidHeaderValue};

use crate::cookies::Cookie;

/// Length of the CSRF token.
pub const CSRF_TOKEN_LEN: usize = 10;

/// Punctuation characters used in the export password.
pub const PASSWORD_PUNCTUATION: &[u8] = b"!@#$%^&*()";

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

const PASSWORD_LETTERS: usize = 16;
const PASSWORD_DIGITS: usize = 2;
const PASSWORD_PUNCTUATION_LEN: usize = 2;

/// Form value selecting PKCS#12 output.
const ISSUANCE_MODE: &str = "pkcs12";

/// Ephemeral context for one certificate request. Never persisted.
///
/// The CSRF token and export password are redacted in Debug output.
#[derive(Clone)]
pub struct CertificateRequest {
    csrf_token: String,
    export_password: String,
    lifetime_hours: u64,
}

impl CertificateRequest {
    /// Generates a fresh context from the OS CSPRNG.
    ///
    /// `lifetime_hours` is the already-rounded whole-hour validity.
    #[must_use]
    pub fn generate(lifetime_hours: u64) -> Self {
        let mut rng = OsRng;
        let csrf_token = random_string(&mut rng, CSRF_TOKEN_LEN, ALPHANUMERIC);
        let export_password = [
            random_string(&mut rng, PASSWORD_LETTERS, LETTERS),
            random_string(&mut rng, PASSWORD_DIGITS, DIGITS),
            random_string(&mut rng, PASSWORD_PUNCTUATION_LEN, PASSWORD_PUNCTUATION),
        ]
        .concat();

        Self {
            csrf_token,
            export_password,
            lifetime_hours,
        }
    }

    /// The CSRF token, submitted both as form field and cookie.
    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    /// The PKCS#12 export password. Sensitive, never log.
    #[must_use]
    pub fn export_password(&self) -> &str {
        &self.export_password
    }

    /// Requested lifetime in whole hours.
    #[must_use]
    pub fn lifetime_hours(&self) -> u64 {
        self.lifetime_hours
    }

    /// URL-encoded form body.
    #[must_use]
    pub fn form_body(&self) -> String {
        [
            ("submit", ISSUANCE_MODE.to_string()),
            ("CSRF", self.csrf_token.clone()),
            ("p12password", self.export_password.clone()),
            ("p12lifetime", self.lifetime_hours.to_string()),
        ]
        .iter()
        .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
    }

    /// Request headers: form content type plus the double-submit CSRF cookie
    /// and the SP session cookie.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHeaderValue`] if the session cookie contains bytes
    /// that cannot appear in a header.
    pub fn headers(&self, session_cookie: &Cookie) -> Result<HeaderMap, InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let mut cookie = HeaderValue::from_str(&format!(
            "CSRF={}; {}",
            self.csrf_token,
            session_cookie.header_pair()
        ))?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);
        Ok(headers)
    }
}

impl fmt::Debug for CertificateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateRequest")
            .field("csrf_token", &"[REDACTED]")
            .field("export_password", &"[REDACTED]")
            .field("lifetime_hours", &self.lifetime_hours)
            .finish()
    }
}

/// Rounds a requested validity up to whole hours.
///
/// Returns `None` for non-finite or non-positive input.
#[must_use]
pub fn lifetime_hours(validity_hours: f64) -> Option<u64> {
    if !validity_hours.is_finite() || validity_hours <= 0.0 {
        return None;
    }
    let hours = validity_hours.ceil();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = hours as u64;
    Some(whole)
}

fn random_string(rng: &mut impl Rng, len: usize, charset: &[u8]) -> String {
    (0..len)
        .map(|_| char::from(charset[rng.gen_range(0..charset.len())]))
        .collect()
}
