//! A single stored cookie.

use std::fmt;

/// A single cookie held in a [`CookieJar`](super::CookieJar).
///
/// The value is intentionally redacted in Debug output to prevent
/// accidental logging of session tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct Cookie {
    /// The domain the cookie belongs to (e.g., `.example.org` or `sp.example.org`).
    pub domain: String,
    /// The URL path scope for the cookie.
    pub path: String,
    /// Whether the cookie should only be sent over HTTPS.
    pub secure: bool,
    /// Unix timestamp for expiry, `None` for a session cookie.
    pub expires: Option<i64>,
    /// Cookie name.
    pub name: String,
    /// Cookie value; `None` for a valueless cookie (`Set-Cookie: token`).
    value: Option<String>,
    /// Whether the cookie should be dropped at the end of the run.
    pub discard: bool,
}

impl Cookie {
    /// Creates a non-secure session cookie scoped to `/` on `domain`.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            path: "/".to_string(),
            secure: false,
            expires: None,
            name: name.into(),
            value: Some(value.into()),
            discard: false,
        }
    }

    /// Creates a valueless cookie: only the name is meaningful.
    #[must_use]
    pub fn valueless(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            value: None,
            ..Self::new(domain, name, String::new())
        }
    }

    /// Sets the path scope.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the secure flag.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the expiry timestamp (`None` for a session cookie).
    #[must_use]
    pub fn with_expires(mut self, expires: Option<i64>) -> Self {
        self.expires = expires;
        self
    }

    /// Sets the discard hint.
    #[must_use]
    pub fn with_discard(mut self, discard: bool) -> Self {
        self.discard = discard;
        self
    }

    /// Returns the cookie value, if any.
    ///
    /// Cookie values are sensitive; avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns `true` when the domain is a leading-dot wildcard.
    #[must_use]
    pub fn domain_is_wildcard(&self) -> bool {
        self.domain.starts_with('.')
    }

    /// Returns `true` if the cookie carries an expiry at or before `now`.
    ///
    /// Session cookies (`expires = None`) never expire.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    /// Renders the `name=value` pair sent in a `Cookie` request header.
    ///
    /// Valueless cookies are sent as the bare name.
    #[must_use]
    pub fn header_pair(&self) -> String {
        match &self.value {
            Some(value) => format!("{}={value}", self.name),
            None => self.name.clone(),
        }
    }
}

// Custom Debug impl that redacts the cookie value.
impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &self.value.as_ref().map(|_| "[REDACTED]"))
            .field("discard", &self.discard)
            .finish()
    }
}
