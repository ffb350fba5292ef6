//! `inrelay` -- Gmail to Discord relay for inReach satellite messages.
//!
//! Subcommands:
//!
//! - `inrelay run` -- Start the relay (poll loop + Gateway listener).
//! - `inrelay status` -- Show resolved configuration and diagnostics.
//!
//! # Exit codes
//!
//! The process is designed to run under a supervisor with
//! `Restart=always`:
//!
//! - `0` -- clean exit, including the `/die` command; the supervisor
//!   restarts the relay and the restart IS the reload mechanism.
//! - `10` -- credentials are invalid and polling cannot continue;
//!   a restart will not help until the operator re-authorizes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use inrelay_channels::{DiscordApiClient, DiscordGateway, GmailClient, TokenProvider};
use inrelay_core::{CommandHandler, DedupLedger, ExitIntent, RelayService};
use inrelay_types::config::RelayConfig;
use inrelay_types::message::FilterCriteria;

/// Clean exit. Under `Restart=always` this means "restart me".
const EXIT_RESTART: i32 = 0;

/// Credentials are invalid; restarting without operator action is
/// pointless, but the supervisor backoff keeps the noise bounded.
const EXIT_AUTH: i32 = 10;

/// inReach-to-Discord relay CLI.
#[derive(Parser)]
#[command(name = "inrelay", about = "Gmail to Discord inReach relay", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Start the relay.
    Run {
        /// Config file path (default: ~/.inrelay/config.json).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show resolved configuration and diagnostics.
    Status {
        /// Config file path (default: ~/.inrelay/config.json).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Run { config } => {
            let code = run(config).await?;
            std::process::exit(code);
        }
        Commands::Status { config } => status(config)?,
    }
    Ok(())
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<(PathBuf, RelayConfig)> {
    let path = path.unwrap_or_else(RelayConfig::default_path);
    let config = RelayConfig::load(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    Ok((path, config))
}

/// Start the relay and block until it exits, returning the process
/// exit code.
async fn run(config_path: Option<PathBuf>) -> anyhow::Result<i32> {
    let (path, config) = load_config(config_path)?;
    info!(config = %path.display(), "starting inrelay");

    let discord_token = config
        .discord
        .resolved_token()
        .context("no Discord bot token configured (discord.token or discord.token_env)")?;

    let request_timeout = Duration::from_secs(config.gmail.request_timeout_secs);
    let token_path = config.gmail.expanded_token_path();
    // Only an actual credential problem earns the auth exit code;
    // anything else (e.g. HTTP client construction) is an ordinary
    // startup failure.
    let tokens = match TokenProvider::load(&token_path, request_timeout) {
        Ok(t) => Arc::new(t),
        Err(e) if e.is_fatal() => {
            error!(error = %e, "cannot load Gmail credentials");
            return Ok(EXIT_AUTH);
        }
        Err(e) => return Err(e).context("initializing Gmail credentials"),
    };

    let gmail: Arc<GmailClient> =
        Arc::new(GmailClient::new(&config.gmail, tokens).context("building Gmail client")?);
    let discord = Arc::new(
        DiscordApiClient::new(discord_token.clone(), request_timeout)
            .context("building Discord client")?,
    );
    let ledger = Arc::new(DedupLedger::new());

    // Only mail arriving after this instant is relayed. Anything older
    // was either handled by a previous incarnation or predates the
    // operator's interest.
    let criteria = FilterCriteria {
        senders: config.gmail.senders.clone(),
        subject: config.gmail.subject.clone(),
        cutoff: Utc::now(),
    };

    let relay = RelayService::new(
        gmail,
        discord.clone(),
        ledger,
        criteria,
        Duration::from_secs(config.gmail.poll_interval_secs),
        config.discord.channel_id.clone(),
        config.relay.max_dispatch_attempts,
    );

    let cancel = CancellationToken::new();
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let gateway = DiscordGateway::new(config.discord.clone(), discord_token, command_tx);
    let gateway_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { gateway.run(cancel).await })
    };

    let poll_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { relay.run(cancel).await })
    };

    let handler = CommandHandler::new(discord);

    let code = tokio::select! {
        res = poll_handle => {
            match res {
                Ok(Ok(())) => EXIT_RESTART,
                Ok(Err(e)) => {
                    error!(error = %e, "poll loop stopped on fatal error");
                    EXIT_AUTH
                }
                Err(e) => {
                    error!(error = %e, "poll task panicked");
                    EXIT_RESTART
                }
            }
        }
        intent = handler.run(command_rx, cancel.clone()) => {
            match intent {
                Some(ExitIntent::Restart) => {
                    info!("restart requested by operator command");
                    EXIT_RESTART
                }
                None => EXIT_RESTART,
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            EXIT_RESTART
        }
    };

    cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(5), gateway_handle)
        .await
        .is_err()
    {
        warn!("gateway did not shut down in time");
    }

    Ok(code)
}

/// Print a configuration summary without starting anything.
fn status(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let (path, config) = load_config(config_path)?;

    println!("inrelay status");
    println!("==============");
    println!();
    println!("Config: {}", path.display());
    println!();
    println!("Gmail:");
    println!("  Senders:         {}", config.gmail.senders.join(", "));
    println!("  Subject:         {}", config.gmail.subject);
    println!("  Poll interval:   {}s", config.gmail.poll_interval_secs);
    println!("  Lookback:        {} days", config.gmail.lookback_days);
    let token_path = config.gmail.expanded_token_path();
    let token_state = if token_path.exists() {
        "present"
    } else {
        "MISSING"
    };
    println!(
        "  Token file:      {} ({token_state})",
        token_path.display()
    );
    println!();
    println!("Discord:");
    println!("  Channel:         {}", config.discord.channel_id);
    let token_state = if config.discord.resolved_token().is_some() {
        "configured"
    } else {
        "NOT CONFIGURED"
    };
    println!("  Bot token:       {token_state}");
    if config.discord.allow_from.is_empty() {
        println!("  Allow list:      (everyone)");
    } else {
        println!(
            "  Allow list:      {} user(s)",
            config.discord.allow_from.len()
        );
    }
    println!();
    println!("Relay:");
    println!(
        "  Max dispatch attempts: {}",
        config.relay.max_dispatch_attempts
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_config_flag() {
        let cli = Cli::parse_from(["inrelay", "run", "--config", "/tmp/c.json"]);
        match cli.command {
            Commands::Run { config } => {
                assert_eq!(config, Some(PathBuf::from("/tmp/c.json")));
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn verbose_flag_is_global() {
        let cli = Cli::parse_from(["inrelay", "status", "--verbose"]);
        assert!(cli.verbose);
    }
}
