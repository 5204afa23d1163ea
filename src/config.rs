//! Runtime configuration for ECP sessions and certificate issuance.
//!
//! Values resolve in order: built-in defaults, then environment variables
//! (`ECP_IDP`, `ECP_SP_URL`, `ECP_COOKIE_FILE`, `X509_USER_PROXY`), then explicit overrides made
//! by the caller (for the CLI, command-line flags).

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP total request timeout (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default certificate-issuing SP endpoint.
pub const DEFAULT_SP_URL: &str = "https://ecp.cilogon.org/secure/getcert";

/// Default requested certificate lifetime (one week).
pub const DEFAULT_VALIDITY_HOURS: f64 = 168.0;

/// Path appended to a bare IdP host name to reach its ECP endpoint.
const ECP_ENDPOINT_PATH: &str = "/idp/profile/SAML2/SOAP/ECP";

const ENV_IDP: &str = "ECP_IDP";
const ENV_SP_URL: &str = "ECP_SP_URL";
const ENV_COOKIE_FILE: &str = "ECP_COOKIE_FILE";
const ENV_USER_PROXY: &str = "X509_USER_PROXY";

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct EcpConfig {
    /// Identity Provider endpoint (host name or full ECP URL).
    pub idp: Option<String>,
    /// Service Provider URL that issues certificates.
    pub sp_url: String,
    /// Cookie file used to seed (and optionally store) the session jar.
    pub cookie_file: Option<PathBuf>,
    /// Whether cookies are written back to `cookie_file` when the session closes.
    pub store_cookies: bool,
    /// Requested certificate lifetime in hours.
    pub validity_hours: f64,
    /// Login name for the IdP.
    pub username: Option<String>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// HTTP total request timeout in seconds.
    pub read_timeout_secs: u64,
}

impl Default for EcpConfig {
    fn default() -> Self {
        Self {
            idp: None,
            sp_url: DEFAULT_SP_URL.to_string(),
            cookie_file: Some(default_cookie_file(
                env_var_non_empty_os("USER").or_else(|| env_var_non_empty_os("LOGNAME")),
            )),
            store_cookies: false,
            validity_hours: DEFAULT_VALIDITY_HOURS,
            username: None,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

impl EcpConfig {
    /// Defaults overlaid with the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(env_var_non_empty_os)
    }

    /// Defaults overlaid with values from `lookup` (an environment accessor).
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        let mut config = Self::default();
        if let Some(idp) = lookup(ENV_IDP) {
            config.idp = Some(idp.to_string_lossy().into_owned());
        }
        if let Some(sp_url) = lookup(ENV_SP_URL) {
            config.sp_url = sp_url.to_string_lossy().into_owned();
        }
        if let Some(cookie_file) = lookup(ENV_COOKIE_FILE) {
            config.cookie_file = Some(PathBuf::from(cookie_file));
        }
        config
    }
}

/// Expands a bare IdP host name to its SAML2 ECP endpoint URL.
///
/// Values that already carry a scheme are returned unchanged.
#[must_use]
pub fn format_endpoint_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.contains("://") {
        return endpoint.to_string();
    }
    let host = endpoint.trim_end_matches('/');
    format!("https://{host}{ECP_ENDPOINT_PATH}")
}

/// Default cookie file: `<temp dir>/ecpcookie.u<user>`.
fn default_cookie_file(user: Option<OsString>) -> PathBuf {
    let user = user.map_or_else(
        || "unknown".to_string(),
        |user| user.to_string_lossy().into_owned(),
    );
    env::temp_dir().join(format!("ecpcookie.u{user}"))
}

/// Where credentials are written and inspected by default:
/// `$X509_USER_PROXY`, else `<temp dir>/x509up_u<uid>`.
#[must_use]
pub fn default_credential_file() -> PathBuf {
    credential_file_from(env_var_non_empty_os(ENV_USER_PROXY), &current_uid())
}

fn credential_file_from(user_proxy: Option<OsString>, uid: &str) -> PathBuf {
    match user_proxy {
        Some(path) => PathBuf::from(path),
        None => env::temp_dir().join(format!("x509up_u{uid}")),
    }
}

#[cfg(unix)]
fn current_uid() -> String {
    // SAFETY: getuid has no preconditions and cannot fail.
    let uid = unsafe { libc::getuid() };
    uid.to_string()
}

#[cfg(not(unix))]
fn current_uid() -> String {
    env::var("USERNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), OsString::from(*v)))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config_values() {
        let config = EcpConfig::default();
        assert_eq!(config.sp_url, DEFAULT_SP_URL);
        assert!((config.validity_hours - 168.0).abs() < f64::EPSILON);
        assert!(config.idp.is_none());
        assert!(!config.store_cookies);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.read_timeout_secs, 300);
    }

    #[test]
    fn test_from_lookup_overrides_defaults() {
        let config = EcpConfig::from_lookup(lookup_from(&[
            ("ECP_IDP", "login.example.org"),
            ("ECP_SP_URL", "https://sp.example.org/getcert"),
            ("ECP_COOKIE_FILE", "/var/tmp/cookies.txt"),
        ]));
        assert_eq!(config.idp.as_deref(), Some("login.example.org"));
        assert_eq!(config.sp_url, "https://sp.example.org/getcert");
        assert_eq!(config.cookie_file, Some(PathBuf::from("/var/tmp/cookies.txt")));
    }

    #[test]
    fn test_from_lookup_empty_environment_is_default() {
        assert_eq!(EcpConfig::from_lookup(lookup_from(&[])), EcpConfig::default());
    }

    #[test]
    fn test_default_cookie_file_names_user() {
        let path = default_cookie_file(Some(OsString::from("alice")));
        assert_eq!(path.file_name().unwrap(), "ecpcookie.ualice");
        let path = default_cookie_file(None);
        assert_eq!(path.file_name().unwrap(), "ecpcookie.uunknown");
    }

    #[test]
    fn test_credential_file_prefers_user_proxy() {
        let path = credential_file_from(Some(OsString::from("/tmp/proxy.pem")), "1000");
        assert_eq!(path, PathBuf::from("/tmp/proxy.pem"));

        let path = credential_file_from(None, "1000");
        assert_eq!(path, env::temp_dir().join("x509up_u1000"));
    }

    #[test]
    fn test_format_endpoint_url_expands_host() {
        assert_eq!(
            format_endpoint_url("login.example.org"),
            "https://login.example.org/idp/profile/SAML2/SOAP/ECP"
        );
        assert_eq!(
            format_endpoint_url("login.example.org/"),
            "https://login.example.org/idp/profile/SAML2/SOAP/ECP"
        );
    }

    #[test]
    fn test_format_endpoint_url_keeps_full_url() {
        let url = "https://idp.example.org/custom/ECP";
        assert_eq!(format_endpoint_url(url), url);
    }
}
