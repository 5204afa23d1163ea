//! Netscape/curl cookie file persistence.
//!
//! The file format is one header block followed by one line per cookie with
//! seven TAB-separated fields:
//! `domain`, `domain_is_wildcard`, `path`, `secure`, `expires`, `name`, `value`.
//!
//! The format is shared with curl and other HTTP tooling, so output must stay
//! byte-compatible: uppercase `TRUE`/`FALSE`, a literal `0` expiry for session
//! cookies, and an empty name column for valueless cookies.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use super::jar::unix_now;
use super::{Cookie, CookieError, CookieJar};

/// Header block written at the top of every saved cookie file.
pub const COOKIE_FILE_HEADER: &str = "# Netscape HTTP Cookie File\n\
# http://curl.haxx.se/rfc/cookie_spec.html\n\
# This is a generated file!  Do not edit.\n\n";

const HTTPONLY_PREFIX: &str = "#HttpOnly_";
const FIELD_COUNT: usize = 7;

/// First-line marker of a Netscape-format cookie file.
#[allow(clippy::expect_used)]
static MAGIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#( Netscape)? HTTP Cookie File").expect("magic regex is valid") // Static pattern, safe to panic
});

/// Filters applied while reading a cookie file.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Keep cookies marked `discard` (no expiry field in the file).
    pub ignore_discard: bool,
    /// Keep cookies whose expiry is already in the past.
    pub ignore_expires: bool,
}

impl LoadOptions {
    /// Keeps every record in the file.
    #[must_use]
    pub fn keep_all() -> Self {
        Self {
            ignore_discard: true,
            ignore_expires: true,
        }
    }
}

/// Filters applied while writing a cookie file.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Write cookies marked `discard` too.
    pub ignore_discard: bool,
    /// Write cookies whose expiry is already in the past too.
    pub ignore_expires: bool,
}

impl SaveOptions {
    /// Writes every cookie in the jar.
    #[must_use]
    pub fn keep_all() -> Self {
        Self {
            ignore_discard: true,
            ignore_expires: true,
        }
    }
}

/// File persistence capability for a cookie jar.
pub trait CookiePersistence: Sized {
    /// Reads a jar from a Netscape-format cookie file.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::Io`] if the file cannot be read and
    /// [`CookieError::Load`] if it is not a valid cookie file.
    fn load_from(path: &Path, options: LoadOptions) -> Result<Self, CookieError>;

    /// Writes the jar to a Netscape-format cookie file, replacing it.
    ///
    /// # Errors
    ///
    /// Returns [`CookieError::Io`] if the file cannot be written.
    fn save_to(&self, path: &Path, options: SaveOptions) -> Result<(), CookieError>;
}

impl CookiePersistence for CookieJar {
    #[instrument(level = "debug", skip(options))]
    fn load_from(path: &Path, options: LoadOptions) -> Result<Self, CookieError> {
        let file = File::open(path).map_err(|e| CookieError::io(path, e))?;
        let cookies = parse_cookie_file(BufReader::new(file), path, options, unix_now())?;
        debug!(count = cookies.len(), "loaded cookie file");
        Ok(Self::from_cookies(cookies))
    }

    #[instrument(level = "debug", skip(self, options))]
    fn save_to(&self, path: &Path, options: SaveOptions) -> Result<(), CookieError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| CookieError::io(path, e))?;
        }

        let file = File::create(path).map_err(|e| CookieError::io(path, e))?;
        set_owner_only_permissions(path)?;
        let mut writer = BufWriter::new(file);
        let written = write_cookie_file(&mut writer, &self.snapshot(), options, unix_now())
            .and_then(|written| writer.flush().map(|()| written))
            .map_err(|e| CookieError::io(path, e))?;
        debug!(count = written, "saved cookie file");
        Ok(())
    }
}

/// Loads a cookie jar from `path`, keeping every record.
///
/// When `strict` is `false`, a missing, unreadable or malformed file is
/// logged and an empty jar is returned instead of an error.
///
/// # Errors
///
/// Returns [`CookieError::Io`] or [`CookieError::Load`] in strict mode.
pub fn load_cookie_jar(path: impl AsRef<Path>, strict: bool) -> Result<CookieJar, CookieError> {
    let path = path.as_ref();
    match CookieJar::load_from(path, LoadOptions::keep_all()) {
        Ok(jar) => Ok(jar),
        Err(error) if !strict => {
            warn!(
                path = %path.display(),
                error = %error,
                "ignoring unusable cookie file; starting with an empty jar"
            );
            Ok(CookieJar::new())
        }
        Err(error) => Err(error),
    }
}

/// Parses a Netscape-format cookie file.
///
/// Any record with a non-positive or unparseable expiry comes back with
/// `expires = None`.
pub(crate) fn parse_cookie_file(
    reader: impl BufRead,
    path: &Path,
    options: LoadOptions,
    now: i64,
) -> Result<Vec<Cookie>, CookieError> {
    let mut lines = reader.lines();

    let magic = match lines.next() {
        Some(line) => line.map_err(|e| read_error(path, 1, e))?,
        None => String::new(),
    };
    if !MAGIC_PATTERN.is_match(&magic) {
        return Err(CookieError::load(
            path,
            "does not look like a Netscape format cookies file",
        ));
    }

    let mut cookies = Vec::new();
    for (idx, line_result) in lines.enumerate() {
        // Header is line 1
        let line_number = idx + 2;
        let raw = line_result.map_err(|e| read_error(path, line_number, e))?;
        let line = raw.strip_suffix('\r').unwrap_or(&raw);
        let line = line.strip_prefix(HTTPONLY_PREFIX).unwrap_or(line);

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('$') {
            continue;
        }

        let cookie = parse_cookie_line(line)
            .map_err(|reason| CookieError::load(path, format!("line {line_number}: {reason}")))?;

        if !options.ignore_discard && cookie.discard {
            continue;
        }
        if !options.ignore_expires && cookie.is_expired(now) {
            continue;
        }
        cookies.push(cookie);
    }

    Ok(cookies)
}

/// Undecodable bytes make the file malformed; anything else is an IO failure.
fn read_error(path: &Path, line_number: usize, error: io::Error) -> CookieError {
    if error.kind() == io::ErrorKind::InvalidData {
        CookieError::load(path, format!("line {line_number}: not valid UTF-8"))
    } else {
        CookieError::io(path, error)
    }
}

fn parse_cookie_line(line: &str) -> Result<Cookie, String> {
    let fields: Vec<&str> = line.split('\t').collect();
    let &[domain, wildcard, path, secure, expires, name, value] = fields.as_slice() else {
        return Err(format!(
            "expected {FIELD_COUNT} TAB-separated fields, found {}",
            fields.len()
        ));
    };

    let wildcard = wildcard == "TRUE";
    if wildcard != domain.starts_with('.') {
        return Err(format!(
            "domain_is_wildcard is {} but domain is '{domain}'",
            flag(wildcard)
        ));
    }

    let (expires, discard) = if expires.is_empty() {
        (None, true)
    } else {
        (parse_expiry(expires), false)
    };

    let cookie = if name.is_empty() {
        // cookies.txt stores `Set-Cookie: foo` as a nameless cookie
        Cookie::valueless(domain, value)
    } else {
        Cookie::new(domain, name, value)
    };

    Ok(cookie
        .with_path(path)
        .with_secure(secure == "TRUE")
        .with_expires(expires)
        .with_discard(discard))
}

fn parse_expiry(field: &str) -> Option<i64> {
    field.trim().parse::<i64>().ok().filter(|&expires| expires > 0)
}

/// Writes the header block and every cookie that passes `options`.
///
/// Returns the number of cookie lines written.
pub(crate) fn write_cookie_file(
    writer: &mut impl Write,
    cookies: &[Cookie],
    options: SaveOptions,
    now: i64,
) -> io::Result<usize> {
    writer.write_all(COOKIE_FILE_HEADER.as_bytes())?;

    let mut written = 0;
    for cookie in cookies {
        if !options.ignore_discard && cookie.discard {
            continue;
        }
        if !options.ignore_expires && cookie.is_expired(now) {
            continue;
        }
        writeln!(writer, "{}", format_cookie_line(cookie))?;
        written += 1;
    }
    Ok(written)
}

fn format_cookie_line(cookie: &Cookie) -> String {
    // curl reads a blank expiry as malformed, so session cookies get `0`
    let expires = cookie
        .expires
        .map_or_else(|| "0".to_string(), |expires| expires.to_string());

    let (name, value) = match cookie.value() {
        Some(value) => (cookie.name.as_str(), value),
        None => ("", cookie.name.as_str()),
    };

    [
        cookie.domain.as_str(),
        flag(cookie.domain_is_wildcard()),
        cookie.path.as_str(),
        flag(cookie.secure),
        expires.as_str(),
        name,
        value,
    ]
    .join("\t")
}

fn flag(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> Result<(), CookieError> {
    use std::os::unix::fs::PermissionsExt;

    let permissions = fs::Permissions::from_mode(0o600);
    fs::set_permissions(path, permissions).map_err(|e| CookieError::io(path, e))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> Result<(), CookieError> {
    Ok(())
}
