mod common;
use common::*;
use growatt_bridge::fields::FIELDS;
use growatt_bridge::mqtt::ChannelData;
use growatt_bridge::publisher::{DiffPublisher, Publisher};
use growatt_bridge::prelude::*;

use std::time::Duration;
use tokio::time::Instant;

fn config(yaml: &str) -> Config {
    Config::from_yaml(yaml).unwrap()
}

async fn recv_message(rx: &mut broadcast::Receiver<ChannelData>) -> mqtt::Message {
    let data = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    match data {
        ChannelData::Message(m) => m,
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn decoded_record_publishes_formatted_fields() {
    let d = Datagram::decode(&Factory::record(), Factory::noon(1)).unwrap();
    let mut p = DiffPublisher::new(config("{}").publisher());

    let messages = p.diff(&d, Instant::now());
    let payload = |key: &str| {
        messages
            .iter()
            .find(|m| m.topic == key)
            .map(|m| m.payload.clone())
            .unwrap()
    };

    assert_eq!(messages.len(), FIELDS.len());
    assert_eq!(payload("pv1_voltage"), "10.0");
    assert_eq!(payload("grid_frequency"), "50.00");
    assert_eq!(payload("temperature"), "53.4");
    assert_eq!(payload("status"), "Normal");
    assert_eq!(payload("fault_code"), "0");
    assert_eq!(payload("total_production"), "100.0");
    assert_eq!(payload("timestamp"), "2024-06-01 12:00:00");
}

#[test]
fn republishing_is_idempotent() {
    let d = Datagram::decode(&Factory::record(), Factory::noon(1)).unwrap();
    let mut p = DiffPublisher::new(config("publisher:\n  min_publish_period: 5\n").publisher());
    let now = Instant::now();

    assert!(!p.diff(&d, now).is_empty());
    assert!(p.diff(&d, now + Duration::from_secs(10)).is_empty());
}

#[test]
fn new_timestamp_alone_is_published() {
    let mut p = DiffPublisher::new(config("{}").publisher());
    let now = Instant::now();
    p.diff(&Datagram::decode(&Factory::record(), Factory::noon(1)).unwrap(), now);

    let later = Datagram::decode(&Factory::record(), Factory::noon(2)).unwrap();
    let messages = p.diff(&later, now);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].topic, "timestamp");
}

#[tokio::test]
async fn loop_sends_changes_to_mqtt_channel() {
    let config = config("mqtt:\n  host: broker\npublisher:\n  interval: 10\n");
    let channels = Channels::new();
    let snapshot = SnapshotCell::default();
    let status = StatusBoard::new();
    let mut rx = channels.to_mqtt.subscribe();

    let publisher = Publisher::new(&config, snapshot.clone(), status.clone(), channels.clone());
    let handle = tokio::spawn(publisher.start());

    // the empty snapshot goes out first, status included
    for _ in 0..FIELDS.len() {
        recv_message(&mut rx).await;
    }

    snapshot.replace(Datagram::decode(&Factory::record(), Factory::noon(1)).unwrap());
    let first = recv_message(&mut rx).await;
    assert_eq!(first.topic, "pv1_voltage");
    assert_eq!(first.payload, "10.0");

    assert_eq!(status.snapshot().publisher, "Data:Normal");
    handle.abort();
}
