#![allow(clippy::unwrap_used)]
// Integration tests for `SimClient` through the `ChannelClient` surface.

use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::time::Instant;

use pvwatch_api::{BundledMetadata, ChannelClient, Data, Error, PvValue, SimClient, SimPv, ValueKind};

// ── Helpers ─────────────────────────────────────────────────────────

const BOUND: Duration = Duration::from_secs(2);

fn setup() -> SimClient {
    let sim = SimClient::new();
    sim.insert(
        "SR:CURRENT",
        SimPv::new(12.345)
            .with_field("EGU", "mA")
            .with_field("HOPR", 500.0),
    );
    sim.insert("MODE", SimPv::new("idle"));
    sim.insert("RO:VAL", SimPv::new(1.0).read_only());
    sim
}

async fn open(sim: &SimClient, name: &str, kind: ValueKind) -> pvwatch_api::ChannelHandle {
    let ch = sim.create_channel(name, kind).unwrap();
    sim.connect(&ch, BOUND).await.unwrap();
    ch
}

// ── Connect / get ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_get_converts_to_channel_type() {
    let sim = setup();

    let ch = open(&sim, "SR:CURRENT", ValueKind::Text).await;
    let value = sim.get(&ch, BOUND).await.unwrap();
    assert_eq!(value.data(), &Data::from("12.345"));
    assert!(value.timestamp().is_some());

    let field = open(&sim, "SR:CURRENT.HOPR", ValueKind::Float64).await;
    assert_eq!(sim.get(&field, BOUND).await.unwrap(), PvValue::plain(500.0));
}

#[tokio::test(start_paused = true)]
async fn test_native_kind_survives_conversion() {
    let sim = setup();
    sim.insert("MBBI:MODE", SimPv::new(2));

    let unconnected = sim.create_channel("MBBI:MODE", ValueKind::Float64).unwrap();
    assert_eq!(sim.native_kind(&unconnected), None);

    let ch = open(&sim, "MBBI:MODE", ValueKind::Float64).await;
    assert_eq!(sim.get(&ch, BOUND).await.unwrap().data(), &Data::Float(2.0));
    assert_eq!(sim.native_kind(&ch), Some(ValueKind::Int32));

    let field = open(&sim, "SR:CURRENT.EGU", ValueKind::Float64).await;
    assert_eq!(sim.native_kind(&field), Some(ValueKind::Text));
}

#[tokio::test(start_paused = true)]
async fn test_get_fails_on_impossible_conversion() {
    let sim = setup();
    let ch = open(&sim, "MODE", ValueKind::Float64).await;

    let result = sim.get(&ch, BOUND).await;
    assert!(
        matches!(result, Err(Error::TypeMismatch { kind: ValueKind::Float64, .. })),
        "expected TypeMismatch, got: {result:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_connect_to_missing_record_times_out() {
    let sim = setup();
    let ch = sim.create_channel("NOPE", ValueKind::Float64).unwrap();

    let start = Instant::now();
    let result = sim.connect(&ch, Duration::from_millis(500)).await;
    assert!(result.unwrap_err().is_timeout());
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_slow_field_exceeds_bound() {
    let sim = SimClient::new();
    sim.insert(
        "A",
        SimPv::new(1.0)
            .with_field("DESC", "slow one")
            .with_field_latency("DESC", Duration::from_secs(3)),
    );
    let ch = sim.create_channel("A.DESC", ValueKind::Text).unwrap();
    assert!(sim.connect(&ch, Duration::from_secs(1)).await.unwrap_err().is_timeout());
}

#[tokio::test(start_paused = true)]
async fn test_control_shape_when_metadata_present() {
    let sim = SimClient::new();
    let meta = BundledMetadata {
        units: Some("mA".into()),
        precision: Some(3),
        ..BundledMetadata::default()
    };
    sim.insert("A", SimPv::new(1.0).with_metadata(meta.clone()));

    let ch = open(&sim, "A", ValueKind::Float64).await;
    let value = sim.get(&ch, BOUND).await.unwrap();
    assert_eq!(value.metadata(), Some(meta));
}

// ── Put ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_put_stores_in_native_type() {
    let sim = setup();
    let ch = open(&sim, "SR:CURRENT", ValueKind::Text).await;

    sim.put(&ch, Data::from("42.5"), BOUND).await.unwrap();
    assert_eq!(sim.value("SR:CURRENT"), Some(Data::Float(42.5)));
}

#[tokio::test(start_paused = true)]
async fn test_put_to_read_only_is_rejected() {
    let sim = setup();
    let ch = open(&sim, "RO:VAL", ValueKind::Float64).await;

    let result = sim.put(&ch, Data::Float(2.0), BOUND).await;
    assert!(matches!(result, Err(Error::WriteRejected { .. })));
    assert_eq!(sim.value("RO:VAL"), Some(Data::Float(1.0)));
}

#[tokio::test(start_paused = true)]
async fn test_put_before_connect_is_disconnected() {
    let sim = setup();
    let ch = sim.create_channel("SR:CURRENT", ValueKind::Float64).unwrap();
    let result = sim.put(&ch, Data::Float(2.0), BOUND).await;
    assert!(matches!(result, Err(Error::Disconnected { .. })));
}

// ── Monitors ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_monitor_delivers_current_then_updates() {
    let sim = setup();
    let ch = open(&sim, "SR:CURRENT", ValueKind::Float64).await;
    let mut monitor = sim.add_monitor(&ch).unwrap();

    assert_eq!(monitor.updates.recv().await.unwrap().data(), &Data::Float(12.345));

    sim.set("SR:CURRENT", 13.0);
    assert_eq!(monitor.updates.recv().await.unwrap().data(), &Data::Float(13.0));

    // Field updates don't reach the main-value monitor.
    sim.set("SR:CURRENT.EGU", "A");
    assert!(monitor.updates.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_closing_channel_ends_its_monitors() {
    let sim = setup();
    let ch = open(&sim, "SR:CURRENT", ValueKind::Float64).await;
    let mut monitor = sim.add_monitor(&ch).unwrap();
    let _ = monitor.updates.recv().await;

    sim.close_channel(&ch).unwrap();
    assert_eq!(sim.open_monitor_count(), 0);
    assert!(monitor.updates.recv().await.is_none());

    let again = sim.close_channel(&ch);
    assert!(matches!(again, Err(Error::UnknownHandle { .. })));
    assert!(sim.close_monitor(&monitor.handle).is_err());
}

#[tokio::test(start_paused = true)]
async fn test_removed_record_drops_monitors() {
    let sim = setup();
    let ch = open(&sim, "MODE", ValueKind::Text).await;
    let mut monitor = sim.add_monitor(&ch).unwrap();
    let _ = monitor.updates.recv().await;

    assert!(sim.remove("MODE"));
    assert!(monitor.updates.recv().await.is_none());
    assert!(matches!(sim.get(&ch, BOUND).await, Err(Error::Disconnected { .. })));
}

// ── Context ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_everything() {
    let sim = setup();
    let _ch = open(&sim, "SR:CURRENT", ValueKind::Float64).await;
    assert_eq!(sim.open_channels(), vec!["SR:CURRENT".to_owned()]);

    sim.shutdown().unwrap();
    sim.shutdown().unwrap();
    assert!(sim.is_shut_down());
    assert!(sim.open_channels().is_empty());
    assert!(matches!(
        sim.create_channel("SR:CURRENT", ValueKind::Float64),
        Err(Error::ContextClosed)
    ));
}
