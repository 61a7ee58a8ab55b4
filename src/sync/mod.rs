pub mod client;
pub mod protocol;

pub use client::{ChannelClient, ChannelState, ReconnectPolicy, SyncHandle};
pub use protocol::{SettingsBus, SyncMessage};

// Real-time sync channel: tagged wire messages, the in-process broadcast
// bus the relay fans out through, and the client side of the persistent
// connection (send update events, merge received ones, bounded reconnect).
