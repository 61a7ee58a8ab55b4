use std::time::Duration;

use habit_sync::settings::{SettingsPatch, SettingsStore, SyncStatus};
use habit_sync::sync::client::{ChannelClient, ChannelState, ReconnectPolicy};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn retry_budget_exhausts_to_disconnected() {
    // Grab a port nothing is listening on.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let store = SettingsStore::new();
    let policy = ReconnectPolicy {
        max_attempts: 2,
        delay: Duration::from_millis(50),
    };
    let client = ChannelClient::connect(&format!("ws://{}/ws", addr), policy, store.clone())
        .expect("valid url");

    assert_eq!(client.wait_settled().await, ChannelState::Disconnected);

    // No further automatic attempts: state stays Disconnected.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.state(), ChannelState::Disconnected);

    // Updating while disconnected neither blocks nor throws: local state
    // changes, sync reports not-synced, nothing is queued for later.
    let status = store.update(SettingsPatch::language("fr"));
    assert_eq!(status, SyncStatus::NotSynced);
    assert_eq!(store.read().language, "fr");

    client.close();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_endpoint_is_rejected_up_front() {
    let store = SettingsStore::new();
    let result = ChannelClient::connect("not a url", ReconnectPolicy::no_retry(), store);
    assert!(result.is_err());
}
