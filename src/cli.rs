//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use ecpcert_core::EcpConfig;

/// Obtain X.509 certificates and session cookies via SAML ECP.
///
/// Ecpcert reuses a stored Shibboleth session cookie when one is available
/// and otherwise authenticates with the Identity Provider first.
#[derive(Parser, Debug)]
#[command(name = "ecpcert")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Request a PKCS#12 certificate and write it as PEM
    Cert(CertArgs),
    /// Print the SP session cookie, authenticating if needed
    Cookie(CookieArgs),
    /// Show subject, issuer and remaining lifetime of a stored credential
    ///
    /// With -v, also shows serial, signature algorithm, validity bounds,
    /// key presence and chain length.
    Info(InfoArgs),
}

/// Options shared by every subcommand.
#[derive(ClapArgs, Debug, Default)]
pub struct SessionArgs {
    /// Identity Provider host name or ECP endpoint URL (env: ECP_IDP)
    #[arg(short = 'i', long)]
    pub identity_provider: Option<String>,

    /// Login name at the Identity Provider
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Netscape cookie file to read (env: ECP_COOKIE_FILE)
    #[arg(short = 'c', long)]
    pub cookie_file: Option<PathBuf>,

    /// Write session cookies back to the cookie file on exit
    #[arg(short = 's', long)]
    pub store_cookies: bool,
}

impl SessionArgs {
    /// Applies the flags on top of environment-derived configuration.
    pub fn apply(&self, config: &mut EcpConfig) {
        if let Some(idp) = &self.identity_provider {
            config.idp = Some(idp.clone());
        }
        if let Some(username) = &self.username {
            config.username = Some(username.clone());
        }
        if let Some(cookie_file) = &self.cookie_file {
            config.cookie_file = Some(cookie_file.clone());
        }
        config.store_cookies |= self.store_cookies;
    }
}

#[derive(ClapArgs, Debug)]
pub struct CertArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Certificate-issuing SP endpoint (env: ECP_SP_URL)
    #[arg(long)]
    pub sp_url: Option<String>,

    /// Requested certificate lifetime in hours (fractions round up)
    #[arg(long, default_value_t = ecpcert_core::config::DEFAULT_VALIDITY_HOURS)]
    pub hours: f64,

    /// Output file for the PEM credential (env: X509_USER_PROXY)
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct CookieArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// SP URL whose session cookie should be printed
    pub url: String,
}

#[derive(ClapArgs, Debug)]
pub struct InfoArgs {
    /// Credential file to inspect (env: X509_USER_PROXY)
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    /// Fail unless the credential stays valid for at least H:M
    #[arg(long, value_name = "H:M", value_parser = ecpcert_core::credential::parse_hours_minutes)]
    pub valid: Option<i64>,
}
