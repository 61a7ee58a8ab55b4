pub mod record;
pub mod store;

pub use record::{Settings, SettingsPatch, FIELD_NAMES};
pub use store::{SettingsStore, SyncStatus};

// Local-first settings state: the record and its partial-update patch type,
// plus the per-session store that applies optimistic local updates and
// merges remote events fanned out by the relay.
