use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

use habit_sync::server::relay::RelayConfig;
use habit_sync::settings::{SettingsPatch, SettingsStore, SyncStatus};
use habit_sync::sync::client::{ChannelClient, ChannelState, ReconnectPolicy};

#[derive(Parser)]
#[command(name = "habit-sync")]
#[command(
    about = "Settings synchronization relay and client tools for the habit tracker",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the fan-out relay hub
    Relay {
        /// Listening port (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Origin allowed at handshake time, repeatable (overrides the
        /// config file); requests with no Origin header are always accepted
        #[arg(long = "allow-origin", value_name = "ORIGIN")]
        allow_origin: Vec<String>,

        /// JSON config file with `port` and `allowed_origins`
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Connect a local store and print the record after every update
    Watch {
        #[arg(short, long, default_value = "ws://localhost:3000/ws")]
        url: String,
    },

    /// Send one-off settings updates, e.g. `set darkMode=false language=fr`
    Set {
        #[arg(short, long, default_value = "ws://localhost:3000/ws")]
        url: String,

        /// KEY=VALUE pairs from the settings field set
        #[arg(required = true, value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Relay {
            port,
            allow_origin,
            config,
        } => {
            let mut cfg = match config {
                Some(path) => RelayConfig::load(&path).await?,
                None => RelayConfig::default(),
            };
            if let Some(port) = port {
                cfg.port = port;
            }
            if !allow_origin.is_empty() {
                cfg.allowed_origins = allow_origin;
            }

            println!(
                "{} Relay starting at {}",
                "✓".green(),
                format!("ws://0.0.0.0:{}/ws", cfg.port).bright_blue()
            );
            if let Err(err) = habit_sync::server::start(cfg).await {
                eprintln!("{} {err:#}", "✗".red());
                std::process::exit(1);
            }
        }

        Commands::Watch { url } => {
            let store = SettingsStore::new();
            let mut changes = store.subscribe();
            let client = ChannelClient::connect(&url, ReconnectPolicy::default(), store.clone())?;

            if client.wait_settled().await != ChannelState::Connected {
                return Err(anyhow!("could not reach relay at {url}"));
            }
            println!(
                "{} Watching settings updates from {}",
                "✓".green(),
                url.bright_blue()
            );

            loop {
                if changes.changed().await.is_err() {
                    break;
                }
                let snapshot = changes.borrow().clone();
                println!("{}", serde_json::to_string(&snapshot)?);
            }
            client.close();
        }

        Commands::Set { url, fields } => {
            let mut patch = SettingsPatch::default();
            for pair in &fields {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{pair}'"))?;
                patch.set_field(key, value)?;
            }

            let store = SettingsStore::new();
            let mut changes = store.subscribe();
            let client = ChannelClient::connect(&url, ReconnectPolicy::no_retry(), store.clone())?;

            if client.wait_settled().await != ChannelState::Connected {
                return Err(anyhow!("could not reach relay at {url}"));
            }

            let status = store.update(patch);
            // Clear the local optimistic change; the next change we observe
            // is the relay echoing our own event back.
            changes.mark_unchanged();
            match status {
                SyncStatus::Synced => {
                    match tokio::time::timeout(Duration::from_secs(3), changes.changed()).await {
                        Ok(Ok(())) => println!("{} Update broadcast by relay", "✓".green()),
                        _ => println!("{} Update sent (no echo received)", "⚠".yellow()),
                    }
                }
                SyncStatus::NotSynced => {
                    println!("{} Update applied locally only (not synced)", "⚠".yellow())
                }
            }
            client.close();
        }
    }

    Ok(())
}
