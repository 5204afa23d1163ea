//! CLI entry point for the ecpcert tool.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use ecpcert_core::config::default_credential_file;
use ecpcert_core::credential::format_duration;
use ecpcert_core::{
    EcpConfig, UnconfiguredAuthenticator, get_certificate, get_session_cookie, inspect_credential,
};
use tracing::{debug, info, warn};

mod cli;

use cli::{Args, CertArgs, Command, CookieArgs, InfoArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so `ecpcert cookie` output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match args.command {
        Command::Cert(cert) => run_cert(cert).await,
        Command::Cookie(cookie) => run_cookie(cookie).await,
        Command::Info(info_args) => run_info(&info_args, args.verbose > 0),
    }
}

async fn run_cert(args: CertArgs) -> Result<()> {
    let mut config = EcpConfig::from_env();
    args.session.apply(&mut config);
    if let Some(sp_url) = args.sp_url {
        config.sp_url = sp_url;
    }
    config.validity_hours = args.hours;

    let output = args.file.unwrap_or_else(default_credential_file);
    let bundle = get_certificate(&config, Arc::new(UnconfiguredAuthenticator))
        .await
        .with_context(|| format!("failed to obtain certificate from {}", config.sp_url))?;

    bundle
        .write_pem(&output)
        .with_context(|| format!("failed to write credential to {}", output.display()))?;
    info!(path = %output.display(), "Credential written");
    Ok(())
}

async fn run_cookie(args: CookieArgs) -> Result<()> {
    let mut config = EcpConfig::from_env();
    args.session.apply(&mut config);

    let cookie = get_session_cookie(&config, &args.url, Arc::new(UnconfiguredAuthenticator))
        .await
        .with_context(|| format!("failed to obtain session cookie for {}", args.url))?;
    println!("{}", cookie.header_pair());
    Ok(())
}

fn run_info(args: &InfoArgs, verbose: bool) -> Result<()> {
    let path = args.file.clone().unwrap_or_else(default_credential_file);
    let credential = inspect_credential(&path)
        .with_context(|| format!("failed to inspect credential {}", path.display()))?;
    print!("{}", credential.render(verbose));

    if let Some(required) = args.valid
        && !credential.is_valid_for(required)
    {
        bail!("timeleft is less than required {}", format_duration(required));
    }
    if credential.seconds_left() == 0 {
        warn!(path = %path.display(), "Credential has expired");
    }
    Ok(())
}
