//! CamConnect - PIN login for CamConnect cameras
//!
//! Logs in to the camera with a 4-digit PIN, keeps the session cookie for
//! other tools and enforces the same brute-force lockout as the mobile app.

use anyhow::{bail, Context, Result};
use camconnect_auth::{format_lockout_time, AuthError, SessionManager};
use camconnect_core::AuthConfig;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// CamConnect - authenticate with a camera and manage the session
#[derive(Parser, Debug)]
#[command(name = "camconnect")]
#[command(version, about, long_about = None)]
struct Args {
    /// Camera host (and optional port)
    #[arg(long, default_value = camconnect_core::DEFAULT_DEVICE_HOST)]
    host: String,

    /// Login timeout in seconds
    #[arg(short, long, default_value = "10")]
    timeout: u64,

    /// Path to the session state file (default: ~/.config/camconnect/session.json)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with a 4-digit PIN (read from stdin if omitted)
    Login { pin: Option<String> },
    /// Show authentication and lockout status
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the session cookie for use in other requests
    Cookie,
    /// Clear the stored session
    Logout,
    /// Clear the attempt counter and any lockout
    ResetAttempts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.into())
                .add_directive("hyper=warn".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    debug!("CamConnect v{}", env!("CARGO_PKG_VERSION"));

    let mut config = AuthConfig::new()
        .with_device_host(args.host)
        .with_login_timeout(Duration::from_secs(args.timeout));
    if let Some(path) = args.state_file {
        config = config.with_state_path(path);
    }

    let manager = SessionManager::open(config)
        .await
        .context("Failed to initialize session manager")?;

    match args.command {
        Command::Login { pin } => login(&manager, pin).await,
        Command::Status { json } => {
            let status = manager.session_status().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}", status);
            }
            Ok(())
        }
        Command::Cookie => match manager.session_cookie() {
            Some(cookie) => {
                println!("{}", cookie);
                Ok(())
            }
            None => bail!("Not authenticated"),
        },
        Command::Logout => {
            manager.logout().await;
            info!("Logged out");
            Ok(())
        }
        Command::ResetAttempts => {
            manager.reset_pin_attempts().await;
            info!("PIN attempts and lockout cleared");
            Ok(())
        }
    }
}

async fn login(manager: &SessionManager, pin: Option<String>) -> Result<()> {
    if manager.is_authenticated() {
        info!("Already authenticated");
        return Ok(());
    }

    if !manager.can_attempt_pin().await {
        let lockout = manager.current_lockout_info().await;
        bail!(
            "Too many failed attempts. Try again in {}",
            format_lockout_time(lockout.remaining)
        );
    }

    let pin = match pin {
        Some(pin) => pin,
        None => read_pin()?,
    };

    match manager.authenticate(pin.trim()).await {
        Ok(()) => {
            info!("Logged in to {}", manager.config().login_url());
            Ok(())
        }
        Err(e @ AuthError::LockedOut { .. }) => bail!("{}", e),
        Err(e) => {
            if e.counts_as_attempt() {
                let left = manager
                    .config()
                    .max_pin_attempts
                    .saturating_sub(manager.pin_attempts());
                let lockout = manager.current_lockout_info().await;
                if lockout.is_locked_out {
                    warn!(
                        "Locked out for {} (lockout #{})",
                        format_lockout_time(lockout.remaining),
                        lockout.sequence_count
                    );
                } else {
                    warn!("{} attempt(s) left before lockout", left);
                }
            }
            bail!("Login failed: {}", e)
        }
    }
}

fn read_pin() -> Result<String> {
    eprint!("PIN: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read PIN from stdin")?;
    Ok(line.trim().to_string())
}
