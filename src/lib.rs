//! ECP Certificate Core Library
//!
//! This library obtains short-lived X.509 credentials from a SAML Service
//! Provider using the Enhanced Client or Proxy (ECP) profile, and keeps the
//! Shibboleth session cookie in a Netscape cookie file between runs so that
//! later requests can skip the Identity Provider round trip.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`config`] - Defaults and environment-derived settings
//! - [`cookies`] - Cookie jar, Netscape file persistence, session cookie lookup
//! - [`session`] - Authenticated HTTP session and the ECP handshake seam
//! - [`issuer`] - PKCS#12 certificate request and decoding
//! - [`credential`] - Inspection of a stored PEM credential

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod cookies;
pub mod credential;
pub mod issuer;
pub mod session;
mod user_agent;

#[cfg(test)]
mod test_fixtures;

// Re-export commonly used types
pub use config::EcpConfig;
pub use cookies::{
    Cookie, CookieError, CookieJar, CookiePersistence, find_session_cookie, has_session_cookie,
    load_cookie_jar,
};
pub use credential::{CredentialError, CredentialInfo, inspect_credential};
pub use issuer::{
    CertificateBundle, DecodeFailure, IssueError, get_certificate, get_session_cookie,
    issue_certificate,
};
pub use session::{
    AuthenticationError, Authenticator, EcpSession, HttpSession, UnconfiguredAuthenticator,
};
