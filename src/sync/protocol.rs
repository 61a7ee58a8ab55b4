use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::settings::SettingsPatch;

/// Messages exchanged over the channel, tagged by event name:
/// `{"event":"updateSettings","data":{...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum SyncMessage {
    /// Client → relay: announce a local settings change.
    UpdateSettings(SettingsPatch),
    /// Relay → every connected client, the sender included.
    SettingsUpdate(SettingsPatch),
}

/// In-process fan-out bus inside the relay.
///
/// Delivery contract: every live subscriber receives every published patch,
/// in publish order, including the connection that published it. There is
/// no ordering across publishers and no acknowledgement; a patch published
/// with no subscribers is dropped.
#[derive(Clone)]
pub struct SettingsBus {
    tx: broadcast::Sender<Arc<SettingsPatch>>,
}

impl SettingsBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SettingsPatch>> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers. Returns how many were reached.
    pub fn publish(&self, patch: Arc<SettingsPatch>) -> usize {
        self.tx.send(patch).unwrap_or(0)
    }
}

impl Default for SettingsBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_use_wire_names() {
        let msg = SyncMessage::UpdateSettings(SettingsPatch::dark_mode(false));
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"event":"updateSettings","data":{"darkMode":false}}"#
        );

        let parsed: SyncMessage =
            serde_json::from_str(r#"{"event":"settingsUpdate","data":{"language":"fr"}}"#).unwrap();
        assert_eq!(
            parsed,
            SyncMessage::SettingsUpdate(SettingsPatch::language("fr"))
        );
    }

    #[tokio::test]
    async fn bus_reaches_every_subscriber_including_publisher() {
        let bus = SettingsBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let patch = Arc::new(SettingsPatch::privacy(false));
        assert_eq!(bus.publish(patch.clone()), 2);

        assert_eq!(a.recv().await.unwrap(), patch);
        assert_eq!(b.recv().await.unwrap(), patch);
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = SettingsBus::new();
        assert_eq!(bus.publish(Arc::new(SettingsPatch::dark_mode(true))), 0);
    }
}
