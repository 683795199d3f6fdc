use std::sync::{Arc, Mutex};
use std::time::Duration;

use melcloud_sync::{Event, MelCloudClient};

/// Run with: cargo test --test integration -- --ignored
/// Requires a real account:
///   MELCLOUD_EMAIL=... MELCLOUD_PASSWORD=... cargo test --test integration -- --ignored
#[tokio::test]
#[ignore]
async fn connect_discover_poll() {
    let email = std::env::var("MELCLOUD_EMAIL").expect("MELCLOUD_EMAIL not set");
    let password = std::env::var("MELCLOUD_PASSWORD").expect("MELCLOUD_PASSWORD not set");

    let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(vec![]));
    let events_clone = events.clone();

    let mut client = MelCloudClient::builder(email, password)
        .on_event(move |event| {
            events_clone.lock().unwrap().push(event.clone());
        })
        .build()
        .expect("build failed");

    let devices = client.connect().await.expect("connect failed");
    assert!(!devices.is_empty(), "account should have at least one device");

    let started = client.start().expect("start failed");
    assert!(started > 0, "should poll at least one device");

    // First cycles run immediately after start.
    for _ in 0..30 {
        let done = events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, Event::StateChanged { .. } | Event::Error { .. }))
            .count()
            >= started;
        if done {
            break;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    {
        let captured = events.lock().unwrap();
        assert!(
            captured.iter().any(|e| matches!(e, Event::StateChanged { .. })),
            "should have received a state"
        );
    }

    client.shutdown().await;
}
