//! In-memory cookie jar shared between the HTTP client and the cookie file.
//!
//! [`CookieJar`] keeps cookies in insertion order (most recent last) and
//! implements [`reqwest::cookie::CookieStore`] so it can be handed to
//! `reqwest::ClientBuilder::cookie_provider()` for the lifetime of a session.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use tracing::{debug, trace};
use url::Url;

use super::Cookie;

/// Ordered cookie collection keyed by `(domain, path, name)`.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: RwLock<Vec<Cookie>>,
}

impl Clone for CookieJar {
    fn clone(&self) -> Self {
        Self::from_cookies(self.snapshot())
    }
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a jar holding `cookies`, later entries superseding earlier ones.
    #[must_use]
    pub fn from_cookies(cookies: impl IntoIterator<Item = Cookie>) -> Self {
        let jar = Self::new();
        for cookie in cookies {
            jar.insert(cookie);
        }
        jar
    }

    /// Inserts a cookie as the most recent entry.
    ///
    /// An existing cookie with the same domain, path and name is removed
    /// first, so the new one always sorts last.
    pub fn insert(&self, cookie: Cookie) {
        let mut cookies = self.write();
        cookies.retain(|existing| !same_key(existing, &cookie));
        cookies.push(cookie);
    }

    /// Removes the cookie with the given key. Returns `true` if one was removed.
    pub fn remove(&self, domain: &str, path: &str, name: &str) -> bool {
        let mut cookies = self.write();
        let before = cookies.len();
        cookies.retain(|c| !(c.domain == domain && c.path == path && c.name == name));
        cookies.len() != before
    }

    /// Copies every cookie of `other` into this jar, preserving its order.
    pub fn update(&self, other: &CookieJar) {
        for cookie in other.snapshot() {
            self.insert(cookie);
        }
    }

    /// Returns a snapshot of all cookies in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Cookie> {
        self.read().clone()
    }

    /// Returns the most recently inserted cookie matching `predicate`.
    #[must_use]
    pub fn find_latest(&self, predicate: impl Fn(&Cookie) -> bool) -> Option<Cookie> {
        self.read().iter().rev().find(|c| predicate(c)).cloned()
    }

    /// Number of stored cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the jar holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Removes all cookies.
    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Cookie>> {
        self.cookies.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Cookie>> {
        self.cookies.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CookieStore for CookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let now = unix_now();
        for header in cookie_headers {
            let Ok(raw) = header.to_str() else {
                debug!(url = %url, "ignoring non-ASCII Set-Cookie header");
                continue;
            };
            let Some(cookie) = cookie_from_set_cookie(raw, url, now) else {
                debug!(url = %url, "ignoring unparseable or foreign Set-Cookie header");
                continue;
            };
            if cookie.is_expired(now) {
                // Max-Age=0 / past Expires is a deletion request
                self.remove(&cookie.domain, &cookie.path, &cookie.name);
                continue;
            }
            trace!(domain = %cookie.domain, name = %cookie.name, "stored cookie from response");
            self.insert(cookie);
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let now = unix_now();
        let pairs: Vec<String> = self
            .read()
            .iter()
            .filter(|cookie| matches_url(cookie, url, now))
            .map(Cookie::header_pair)
            .collect();
        if pairs.is_empty() {
            return None;
        }
        HeaderValue::from_str(&pairs.join("; ")).ok()
    }
}

/// Current time as Unix seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| i64::try_from(elapsed.as_secs()).ok())
        .unwrap_or(0)
}

fn same_key(a: &Cookie, b: &Cookie) -> bool {
    a.domain == b.domain && a.path == b.path && a.name == b.name
}

/// Builds a [`Cookie`] from a `Set-Cookie` header received from `url`.
///
/// Returns `None` for unparseable headers and for cookies whose `Domain`
/// attribute does not cover the responding host.
fn cookie_from_set_cookie(raw: &str, url: &Url, now: i64) -> Option<Cookie> {
    // `Set-Cookie: token` carries a name and no value
    let pair = raw.split(';').next().unwrap_or_default();
    let valueless = !pair.contains('=');
    let normalized;
    let raw = if valueless {
        normalized = format!("{}={}", pair.trim(), &raw[pair.len()..]);
        normalized.as_str()
    } else {
        raw
    };

    let parsed = ::cookie::Cookie::parse(raw).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();

    let domain = match parsed.domain() {
        Some(attr) => {
            let attr = attr.trim_start_matches('.').to_ascii_lowercase();
            if !host_matches_domain(&host, &attr) {
                return None;
            }
            format!(".{attr}")
        }
        None => host,
    };

    let path = match parsed.path() {
        Some(path) if path.starts_with('/') => path.to_string(),
        _ => default_path(url),
    };

    let expires = parsed
        .max_age()
        .map(|max_age| now.saturating_add(max_age.whole_seconds()))
        .or_else(|| {
            parsed
                .expires()
                .and_then(|expiration| expiration.datetime())
                .map(|datetime| datetime.unix_timestamp())
        });

    let cookie = if valueless {
        Cookie::valueless(domain, parsed.name())
    } else {
        Cookie::new(domain, parsed.name(), parsed.value())
    };

    Some(
        cookie
            .with_path(path)
            .with_secure(parsed.secure().unwrap_or(false))
            .with_expires(expires)
            .with_discard(expires.is_none()),
    )
}

/// RFC 6265 default-path: the request path up to (not including) its last `/`.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

fn host_matches_domain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn matches_url(cookie: &Cookie, url: &Url, now: i64) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };

    let domain_ok = match cookie.domain.strip_prefix('.') {
        Some(base) => host_matches_domain(host, base),
        None => host == cookie.domain || super::network_location(url) == cookie.domain,
    };
    if !domain_ok {
        return false;
    }

    if cookie.secure && url.scheme() != "https" {
        return false;
    }

    path_matches(url.path(), &cookie.path) && !cookie.is_expired(now)
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}
