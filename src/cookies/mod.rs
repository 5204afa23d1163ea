//! Cookie storage for ECP sessions.
//!
//! This module provides the in-memory [`CookieJar`] shared with the HTTP
//! client, persistence to Netscape/curl-format cookie files, and lookup of the
//! Shibboleth session cookie that lets a client skip re-authentication.
//!
//! # Example
//!
//! ```no_run
//! use ecpcert_core::cookies::{has_session_cookie, load_cookie_jar};
//!
//! let jar = load_cookie_jar("/tmp/ecpcookie.u1000", false)?;
//! if has_session_cookie(&jar, "https://ecp.cilogon.org/secure/getcert") {
//!     println!("existing session can be reused");
//! }
//! # Ok::<(), ecpcert_core::cookies::CookieError>(())
//! ```

mod error;
mod jar;
mod netscape;
mod record;
mod session;

pub use error::CookieError;
pub use jar::CookieJar;
pub(crate) use jar::unix_now;
pub use netscape::{
    COOKIE_FILE_HEADER, CookiePersistence, LoadOptions, SaveOptions, load_cookie_jar,
};
pub use record::Cookie;
pub use session::{
    SESSION_COOKIE_PREFIX, find_session_cookie, has_session_cookie, network_location,
};
