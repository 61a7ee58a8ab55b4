//! # Habit Sync - Real-Time Settings Synchronization
//!
//! Keeps a shared settings record consistent across connected clients via a
//! push-based event channel: local-first optimistic updates, a stateless
//! relay that fans every update event out to all connections (the sender
//! included), and bounded reconnection on the client side.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use habit_sync::{ChannelClient, ReconnectPolicy, SettingsPatch, SettingsStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SettingsStore::new();
//!     let client = ChannelClient::connect(
//!         "ws://localhost:3000/ws",
//!         ReconnectPolicy::default(),
//!         store.clone(),
//!     )?;
//!     client.wait_settled().await;
//!
//!     // Applied locally right away, then broadcast to every other client.
//!     store.update(SettingsPatch::dark_mode(false));
//!     Ok(())
//! }
//! ```

pub mod server;
pub mod settings;
pub mod sync;

// Re-export main types for library consumers
pub use server::{Relay, RelayConfig};
pub use settings::{Settings, SettingsPatch, SettingsStore, SyncStatus};
pub use sync::{ChannelClient, ChannelState, ReconnectPolicy, SyncMessage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
