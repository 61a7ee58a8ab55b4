use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::settings::{Settings, SettingsPatch};
use crate::sync::client::SyncHandle;

/// Outcome of a local update with respect to cross-client sync. The local
/// store is always updated either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The update event was handed to a connected channel.
    Synced,
    /// No channel, or the channel is offline: the update was applied locally
    /// only and will not reach other clients (no retry queue is kept).
    NotSynced,
}

/// The canonical settings record for one client session.
///
/// Cheaply cloneable handle; all clones share the same record. `read` and
/// `update` are synchronous and infallible, `apply_remote` is the merge
/// entry point for events arriving over the channel.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    settings: RwLock<Settings>,
    channel: RwLock<Option<SyncHandle>>,
    notify: watch::Sender<Settings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let (notify, _) = watch::channel(settings.clone());
        Self {
            inner: Arc::new(StoreInner {
                settings: RwLock::new(settings),
                channel: RwLock::new(None),
                notify,
            }),
        }
    }

    /// Wire the store to a channel client. Until this is called every update
    /// is local-only and reports [`SyncStatus::NotSynced`].
    pub fn attach(&self, handle: SyncHandle) {
        *self.inner.channel.write() = Some(handle);
    }

    /// Snapshot of the current record.
    pub fn read(&self) -> Settings {
        self.inner.settings.read().clone()
    }

    /// Observe every change to the record, local or remote.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.inner.notify.subscribe()
    }

    /// Apply a patch locally first (read-after-write holds regardless of
    /// channel state), then emit it as an update event if the channel is
    /// connected. Never blocks.
    pub fn update(&self, patch: SettingsPatch) -> SyncStatus {
        {
            let mut settings = self.inner.settings.write();
            settings.merge(&patch);
            let _ = self.inner.notify.send(settings.clone());
        }

        let channel = self.inner.channel.read();
        let Some(handle) = channel.as_ref() else {
            tracing::warn!("no channel attached, settings update applied locally only");
            return SyncStatus::NotSynced;
        };
        if handle.emit(patch) {
            SyncStatus::Synced
        } else {
            tracing::warn!("channel offline, settings update applied locally only");
            SyncStatus::NotSynced
        }
    }

    /// Merge an update event received from the relay. Field-wise overwrite,
    /// no timestamp comparison; re-applying our own echoed event is a no-op.
    pub fn apply_remote(&self, patch: &SettingsPatch) {
        let mut settings = self.inner.settings.write();
        settings.merge(patch);
        let _ = self.inner.notify.send(settings.clone());
        tracing::debug!(?patch, "remote settings update merged");
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_after_write_without_channel() {
        let store = SettingsStore::new();
        let status = store.update(SettingsPatch::dark_mode(false));
        assert_eq!(status, SyncStatus::NotSynced);
        assert!(!store.read().dark_mode);
    }

    #[test]
    fn own_echo_does_not_double_toggle() {
        let store = SettingsStore::new();
        let patch = SettingsPatch::dark_mode(false);
        store.update(patch.clone());
        let after_local = store.read();
        // The relay echoes the event back to the sender; merging it again
        // must leave the record unchanged.
        store.apply_remote(&patch);
        assert_eq!(store.read(), after_local);
        assert!(!store.read().dark_mode);
    }

    #[test]
    fn remote_merge_preserves_unrelated_fields() {
        let store = SettingsStore::new();
        store.update(SettingsPatch::language("es"));
        store.apply_remote(&SettingsPatch::push_notifications(false));
        let s = store.read();
        assert_eq!(s.language, "es");
        assert!(!s.push_notifications);
        assert!(s.dark_mode);
    }

    #[test]
    fn clones_share_one_record() {
        let store = SettingsStore::new();
        let other = store.clone();
        store.update(SettingsPatch::auto_sync(false));
        assert!(!other.read().auto_sync);
    }

    #[tokio::test]
    async fn subscribers_see_every_change() {
        let store = SettingsStore::new();
        let mut rx = store.subscribe();
        store.apply_remote(&SettingsPatch::privacy(false));
        rx.changed().await.unwrap();
        assert!(!rx.borrow().privacy);
    }
}
