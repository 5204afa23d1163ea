//! Lookup of the Shibboleth session cookie for a Service Provider.

use tracing::{debug, instrument};
use url::Url;

use super::{Cookie, CookieError, CookieJar};

/// Name prefix of Shibboleth SP session cookies.
pub const SESSION_COOKIE_PREFIX: &str = "_shibsession_";

/// Returns the normalised network location (`host[:port]`) of `url`.
///
/// The host is lowercased and the port is omitted when it is the scheme
/// default, so `https://SP.example.org:443/` yields `sp.example.org`. See
/// [`find_session_cookie`] for how the authority as written is also honoured.
#[must_use]
pub fn network_location(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Returns the session cookie usable for `url`.
///
/// Scans the jar most-recently-inserted first, so a cookie obtained by
/// re-authenticating supersedes a stale one still present in the jar. A match
/// must carry the `_shibsession_` prefix, no expiry, and a domain exactly
/// equal to either the URL's normalised [`network_location`] or its authority
/// as written (userinfo stripped). The latter keeps cookies stored as
/// `sp.example.org:443` usable for `https://sp.example.org:443/...`.
///
/// # Errors
///
/// Returns [`CookieError::NotFound`] when no cookie matches, and
/// [`CookieError::InvalidUrl`] when `url` cannot be parsed.
#[instrument(level = "debug", skip(jar))]
pub fn find_session_cookie(jar: &CookieJar, url: &str) -> Result<Cookie, CookieError> {
    let parsed = Url::parse(url).map_err(|_| CookieError::InvalidUrl {
        url: url.to_string(),
    })?;
    let origin = network_location(&parsed);
    let authority = raw_authority(url);

    let found = jar.find_latest(|cookie| {
        is_session_cookie_for(cookie, &origin)
            || authority.is_some_and(|authority| is_session_cookie_for(cookie, authority))
    });
    match found {
        Some(cookie) => {
            debug!(name = %cookie.name, "found session cookie");
            Ok(cookie)
        }
        None => Err(CookieError::NotFound { origin }),
    }
}

/// Returns `true` if the jar holds a session cookie usable for `url`.
#[must_use]
pub fn has_session_cookie(jar: &CookieJar, url: &str) -> bool {
    find_session_cookie(jar, url).is_ok()
}

/// The `host[:port]` part of `url` exactly as written.
fn raw_authority(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    let authority = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    (!authority.is_empty()).then_some(authority)
}

fn is_session_cookie_for(cookie: &Cookie, origin: &str) -> bool {
    cookie.name.starts_with(SESSION_COOKIE_PREFIX)
        && cookie.domain == origin
        && cookie.expires.is_none()
}
