use std::{sync::Arc, time::Duration};

use tokio::task::JoinSet;

use commsemu::{
    tc::{ImpairmentProfile, RecordingShaper},
    Coordinator, Dimension, Link, Update,
};

fn link(interfaces: &[&str]) -> Link {
    Link::new("atlas", "bestla", interfaces.iter().map(|i| i.to_string()).collect())
}

fn differing_fields(a: &ImpairmentProfile, b: &ImpairmentProfile) -> usize {
    [a.drop_percent != b.drop_percent, a.bandwidth_mbps != b.bandwidth_mbps, a.delay_ms != b.delay_ms]
        .into_iter()
        .filter(|d| *d)
        .count()
}

/// Interleaved updates on all three dimensions end in a state that some serial order of
/// the same updates would have produced.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_linearize() {
    let _ = tracing_subscriber::fmt::try_init();

    let shaper = RecordingShaper::new();
    shaper.set_stall(Some(Duration::from_millis(1)));
    let coordinator = Arc::new(Coordinator::new(link(&["vA"]), shaper.clone()));

    let mut tasks = JoinSet::new();
    for i in 1..=20u32 {
        for dimension in Dimension::ALL {
            let coordinator = Arc::clone(&coordinator);
            let value = match dimension {
                Dimension::Drop => f64::from(i) / 100.0,
                _ => f64::from(i),
            };
            tasks.spawn(async move { coordinator.set(dimension, value).await });
        }
    }

    let mut reports = Vec::new();
    while let Some(update) = tasks.join_next().await {
        match update.unwrap() {
            Update::Applied(report) => reports.push(report.profile),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    let applied: Vec<ImpairmentProfile> = shaper.netem_requests().into_iter().map(|r| r.profile).collect();
    assert_eq!(applied.len(), 60);
    assert_eq!(reports.len(), 60);

    // Every apply differs from its predecessor by exactly the committed dimension.
    assert_eq!(differing_fields(&ImpairmentProfile::default(), &applied[0]), 1);
    for pair in applied.windows(2) {
        assert!(differing_fields(&pair[0], &pair[1]) <= 1, "torn update: {:?} -> {:?}", pair[0], pair[1]);
    }

    // Each caller saw its own post-update state, which is one of the applied states.
    for profile in &reports {
        assert!(applied.contains(profile));
    }

    let last = *applied.last().unwrap();
    assert_eq!(coordinator.profile().await, last);
    assert!((1.0..=20.0).contains(&last.bandwidth_mbps));
    assert!((1.0..=20.0).contains(&last.delay_ms));
}

/// A waiting update commits only after the apply in flight has finished.
#[tokio::test(flavor = "multi_thread")]
async fn apply_holds_the_lock() {
    let _ = tracing_subscriber::fmt::try_init();

    let shaper = RecordingShaper::new();
    shaper.set_stall(Some(Duration::from_millis(100)));
    let coordinator = Arc::new(Coordinator::new(link(&["vA"]), shaper.clone()));

    let slow = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.set_delay(5.0).await })
    };
    crate::eventually("first directive", || shaper.len() == 1).await;

    // The read waits for the in-flight apply and sees its result.
    assert_eq!(coordinator.profile().await.delay_ms, 5.0);
    assert!(slow.await.unwrap().is_applied());

    shaper.set_stall(None);
    let _ = coordinator.set_bandwidth(10.0).await;
    assert_eq!(
        shaper.netem_requests().last().map(|r| r.profile),
        Some(ImpairmentProfile::new(0.0, 10.0, 5.0))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn partial_failure_reports_both_interfaces() {
    let _ = tracing_subscriber::fmt::try_init();

    let shaper = RecordingShaper::new();
    shaper.fail_interface("vA");
    let coordinator = Coordinator::new(link(&["vA", "vB"]), shaper.clone());

    let update = coordinator.set_delay(5.0).await;

    let report = update.report().expect("committed");
    assert!(!update.is_applied());
    assert!(report.outcome("vA").unwrap().result.is_err());
    assert!(report.outcome("vB").unwrap().result.is_ok());
    assert_eq!(shaper.len(), 2);
    // The profile is kept even though vA did not take it.
    assert_eq!(coordinator.profile().await.delay_ms, 5.0);

    shaper.heal_interface("vA");
    assert!(coordinator.reapply().await.is_applied());
}

#[tokio::test(flavor = "multi_thread")]
async fn unchanged_profile_reapplies_identically() {
    let shaper = RecordingShaper::new();
    let coordinator = Coordinator::new(link(&["vA", "vB"]), shaper.clone());

    let _ = coordinator.set_bandwidth(50.0).await;
    let _ = coordinator.reapply().await;

    let lines: Vec<String> = shaper.directives().iter().map(ToString::to_string).collect();
    assert_eq!(lines[0..2], lines[2..4]);
    assert_eq!(lines[1], "tc qdisc replace dev vB root netem delay 0ms loss 0% rate 50mbit");
}
