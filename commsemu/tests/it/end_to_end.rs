use std::sync::Arc;

use commsemu::{
    bus::{LocalBus, TcpBus, TcpPublisher},
    subscribe_link,
    tc::{ImpairmentProfile, QdiscNetemRequest, RecordingShaper},
    wire::sample,
    Coordinator, Dimension, Link, DEFAULT_PREFIX,
};

use crate::eventually;

fn atlas_to_bestla(interfaces: &[&str]) -> Link {
    Link::new("atlas", "bestla", interfaces.iter().map(|i| i.to_string()).collect())
}

fn expected_applies() -> Vec<QdiscNetemRequest> {
    [ImpairmentProfile::new(10.0, 0.0, 0.0), ImpairmentProfile::new(10.0, 50.0, 0.0), ImpairmentProfile::new(10.0, 50.0, 5.0)]
        .into_iter()
        .flat_map(|p| [QdiscNetemRequest::new("vA", p), QdiscNetemRequest::new("vB", p)])
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn local_bus_three_dimensions() {
    let _ = tracing_subscriber::fmt::try_init();

    let bus = LocalBus::new();
    let shaper = RecordingShaper::new();
    let coordinator = Arc::new(Coordinator::new(atlas_to_bestla(&["vA", "vB"]), shaper.clone()));
    subscribe_link(&bus, Arc::clone(&coordinator), DEFAULT_PREFIX).await.unwrap();

    // Published one after another, waiting for each apply, so the order is fixed.
    let samples = [(Dimension::Drop, 0.1), (Dimension::Bandwidth, 50.0), (Dimension::Delay, 5.0)];
    for (n, (dimension, value)) in samples.into_iter().enumerate() {
        let topic = coordinator.link().topic(DEFAULT_PREFIX, dimension);
        assert_eq!(bus.publish(&topic, sample::encode(value)).await, 1);
        eventually("apply", || shaper.len() == 2 * (n + 1)).await;
    }

    assert_eq!(shaper.netem_requests(), expected_applies());
    assert_eq!(coordinator.profile().await, ImpairmentProfile::new(10.0, 50.0, 5.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn tcp_bus_three_dimensions() {
    let _ = tracing_subscriber::fmt::try_init();

    let bus = TcpBus::bind("127.0.0.1:0").await.unwrap();
    let shaper = RecordingShaper::new();
    let coordinator = Arc::new(Coordinator::new(atlas_to_bestla(&["vA", "vB"]), shaper.clone()));
    subscribe_link(&bus, Arc::clone(&coordinator), DEFAULT_PREFIX).await.unwrap();

    let mut publisher = TcpPublisher::connect(bus.local_addr()).await.unwrap();
    let scope = coordinator.link().scope(DEFAULT_PREFIX);
    for (n, (suffix, payload)) in
        [("packet_drop_rate", "0.1"), ("bandwidth", "50"), ("delay", " 5e0\n")].into_iter().enumerate()
    {
        publisher.publish(&format!("{scope}/{suffix}"), payload).await.unwrap();
        eventually("apply", || shaper.len() == 2 * (n + 1)).await;
    }
    publisher.close().await.unwrap();

    assert_eq!(shaper.netem_requests(), expected_applies());
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_and_foreign_samples_are_ignored() {
    let _ = tracing_subscriber::fmt::try_init();

    let bus = LocalBus::new();
    let shaper = RecordingShaper::new();
    let coordinator = Arc::new(Coordinator::new(atlas_to_bestla(&["vA"]), shaper.clone()));
    subscribe_link(&bus, Arc::clone(&coordinator), DEFAULT_PREFIX).await.unwrap();

    let delay = coordinator.link().topic(DEFAULT_PREFIX, Dimension::Delay);
    bus.publish(&delay, "five").await;
    bus.publish(&delay, "").await;
    bus.publish(&delay, "NaN").await;
    assert_eq!(bus.publish("/robot_comms_emu_helper/bestla_to_atlas/delay", "9").await, 0);
    bus.publish(&delay, "3").await;

    eventually("valid sample", || shaper.len() == 1).await;
    assert_eq!(coordinator.profile().await, ImpairmentProfile::new(0.0, 0.0, 3.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_interface_issues_nothing() {
    let _ = tracing_subscriber::fmt::try_init();

    let bus = LocalBus::new();
    let shaper = RecordingShaper::new();
    let coordinator = Arc::new(Coordinator::new(atlas_to_bestla(&["vA", ""]), shaper.clone()));
    subscribe_link(&bus, Arc::clone(&coordinator), DEFAULT_PREFIX).await.unwrap();

    bus.publish(&coordinator.link().topic(DEFAULT_PREFIX, Dimension::Drop), "0.1").await;
    eventually("commit", || coordinator.try_profile().is_some_and(|p| p.drop_percent == 10.0)).await;

    assert!(shaper.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn links_subscribe_once() {
    let bus = LocalBus::new();
    let coordinator = Arc::new(Coordinator::new(atlas_to_bestla(&["vA"]), RecordingShaper::new()));

    subscribe_link(&bus, Arc::clone(&coordinator), DEFAULT_PREFIX).await.unwrap();
    assert!(subscribe_link(&bus, coordinator, DEFAULT_PREFIX).await.is_err());
}
