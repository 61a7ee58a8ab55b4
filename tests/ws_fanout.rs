use std::time::Duration;

use habit_sync::server::relay::{Relay, RelayConfig};
use habit_sync::settings::{SettingsPatch, SettingsStore, SyncStatus};
use habit_sync::sync::client::{ChannelClient, ChannelState, ReconnectPolicy};
use tokio::time::sleep;

async fn spawn_relay() -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let relay = Relay::new(RelayConfig::default());
    let server = tokio::spawn(async move {
        let _ = relay.serve_on(listener).await;
    });
    (format!("ws://{}/ws", addr), server)
}

fn connect_session(url: &str) -> (SettingsStore, ChannelClient) {
    let store = SettingsStore::new();
    let client = ChannelClient::connect(url, ReconnectPolicy::default(), store.clone())
        .expect("valid url");
    (store, client)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_update_converges_across_three_clients() {
    let (url, server) = spawn_relay().await;

    let (store_a, client_a) = connect_session(&url);
    let (store_b, client_b) = connect_session(&url);
    let (store_c, client_c) = connect_session(&url);

    for client in [&client_a, &client_b, &client_c] {
        assert_eq!(client.wait_settled().await, ChannelState::Connected);
    }

    // All three start from the default record.
    assert!(store_b.read().dark_mode);

    let status = store_a.update(SettingsPatch::dark_mode(false));
    assert_eq!(status, SyncStatus::Synced);
    // Read-after-write on the originator, before any fan-out.
    assert!(!store_a.read().dark_mode);

    let start = std::time::Instant::now();
    loop {
        let done = [&store_a, &store_b, &store_c]
            .iter()
            .all(|s| !s.read().dark_mode);
        if done {
            break;
        }
        assert!(
            start.elapsed() < Duration::from_secs(3),
            "clients did not converge: a={:?} b={:?} c={:?}",
            store_a.read().dark_mode,
            store_b.read().dark_mode,
            store_c.read().dark_mode
        );
        sleep(Duration::from_millis(25)).await;
    }

    // Fields not in the event are untouched everywhere.
    for store in [&store_a, &store_b, &store_c] {
        let s = store.read();
        assert!(s.push_notifications);
        assert_eq!(s.language, "en");
    }

    client_a.close();
    client_b.close();
    client_c.close();
    server.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn echoed_update_leaves_sender_unchanged() {
    let (url, server) = spawn_relay().await;

    let (store, client) = connect_session(&url);
    assert_eq!(client.wait_settled().await, ChannelState::Connected);

    let mut changes = store.subscribe();
    store.update(SettingsPatch::privacy(false));
    let after_local = store.read();

    // Wait for our own echo to come back through the relay and be merged.
    changes.mark_unchanged();
    let _ = tokio::time::timeout(Duration::from_secs(3), changes.changed()).await;

    assert_eq!(store.read(), after_local, "echo must not double-toggle");

    client.close();
    server.abort();
}
