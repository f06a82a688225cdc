//! Physical-layer monitor metrics regression tests

use super::helpers::*;
use crate::common::Fixture;
use phys_monitor::{ConnectionState, MonitorConfig};
use serial_test::serial;
use std::time::Duration;

fn fixture(name: &str) -> Fixture {
    Fixture::with_config(
        MonitorConfig::builder()
            .name(name)
            .open_retry(Duration::from_millis(100))
            .build(),
    )
}

fn port_state(name: &str) -> Option<f64> {
    gauge_value("port_state", &[("monitor", name)])
}

#[test]
#[serial]
fn monitor_metrics_exist() {
    init_recorder();

    let f = fixture("metrics_exist");
    f.monitor.start();
    f.phys.fail_open();
    f.timers.fire_next();
    f.phys.succeed_open();

    assert_gauge_exists("port_state");
    assert_metric_has_label("port_state", "monitor", "metrics_exist");

    assert_counter_exists("port_state_transitions_total");
    assert_metric_has_label("port_state_transitions_total", "monitor", "metrics_exist");
    assert_metric_has_label("port_state_transitions_total", "from", "Stopped");
    assert_metric_has_label("port_state_transitions_total", "to", "Opening");

    assert_counter_exists("port_open_failures_total");
    assert_metric_has_label("port_open_failures_total", "monitor", "metrics_exist");

    assert_counter_exists("port_open_retries_total");
    assert_metric_has_label("port_open_retries_total", "monitor", "metrics_exist");
}

#[test]
#[serial]
fn port_state_gauge_tracks_each_state() {
    init_recorder();

    let f = fixture("gauge_states");
    assert_eq!(port_state("gauge_states"), Some(0.0));

    f.monitor.start();
    assert_eq!(port_state("gauge_states"), Some(1.0));

    f.phys.succeed_open();
    assert_eq!(port_state("gauge_states"), Some(2.0));

    f.monitor.stop();
    f.phys.complete_close();
    assert_eq!(port_state("gauge_states"), Some(0.0));

    f.monitor.start();
    f.phys.fail_open();
    assert_eq!(port_state("gauge_states"), Some(4.0));
}

#[test]
#[serial]
fn state_codes_are_stable() {
    let codes: Vec<_> = ConnectionState::ALL.iter().map(|s| s.code()).collect();
    assert_eq!(codes, vec![0, 1, 2, 3, 4]);
}

#[test]
#[serial]
fn transition_counter_is_labelled_by_edge() {
    init_recorder();

    let f = fixture("edges");
    f.open();
    f.phys.lose_link();
    f.phys.succeed_open();

    let edge = |from: &str, to: &str| {
        counter_value(
            "port_state_transitions_total",
            &[("monitor", "edges"), ("from", from), ("to", to)],
        )
    };
    assert_eq!(edge("Stopped", "Opening"), 1);
    assert_eq!(edge("Opening", "Open"), 2);
    assert_eq!(edge("Open", "Closed"), 1);
    assert_eq!(edge("Closed", "Opening"), 1);
    assert_eq!(edge("Opening", "Waiting"), 0);
}

#[test]
#[serial]
fn failure_and_retry_counters_increment() {
    init_recorder();

    let f = fixture("retries");
    f.monitor.start();
    for _ in 0..3 {
        f.phys.fail_open();
        f.timers.fire_next();
    }

    assert_eq!(
        counter_value("port_open_failures_total", &[("monitor", "retries")]),
        3
    );
    assert_eq!(
        counter_value("port_open_retries_total", &[("monitor", "retries")]),
        3
    );

    // Stopping cancels the retry; a cancelled timer is not a retry.
    f.phys.fail_open();
    f.monitor.stop();
    assert_eq!(
        counter_value("port_open_retries_total", &[("monitor", "retries")]),
        3
    );
    assert_eq!(
        counter_value("port_open_failures_total", &[("monitor", "retries")]),
        4
    );
}
