use crate::common::{Entry, Fixture, RETRY, Status};
use phys_monitor::ConnectionState::{Closed, Open, Opening, Stopped, Waiting};

#[test]
fn open_success_reaches_open_and_fires_hook_once() {
    let f = Fixture::new();

    f.monitor.start();
    assert_eq!(f.monitor.state(), Opening);
    f.phys.succeed_open();

    assert_eq!(f.monitor.state(), Open);
    assert_eq!(f.journal.states(), vec![Opening, Open]);
    assert_eq!(f.journal.count(Entry::Opened), 1);
    assert_eq!(
        f.journal.entries(),
        vec![
            Entry::Observer(Opening),
            Entry::HookState(Opening),
            Entry::Opened,
            Entry::Observer(Open),
            Entry::HookState(Open),
        ]
    );
}

#[test]
fn open_failure_waits_and_retries_once() {
    let f = Fixture::new();

    f.monitor.start();
    f.phys.fail_open();
    assert_eq!(f.monitor.state(), Waiting);
    assert_eq!(f.timers.scheduled(), 1);
    assert_eq!(f.timers.delays(), vec![RETRY]);
    assert_eq!(f.journal.count(Entry::OpenFailed), 1);

    assert!(f.timers.fire_next());
    assert_eq!(f.monitor.state(), Opening);
    assert_eq!(f.journal.states(), vec![Opening, Waiting, Opening]);
    assert_eq!(f.timers.fired(), 1);
    assert_eq!(f.timers.outstanding(), 0);
    assert_eq!(f.phys.opens(), 2);
}

#[test]
fn link_loss_restarts_automatically() {
    let f = Fixture::new();
    f.open();

    f.phys.lose_link();

    assert_eq!(f.journal.states(), vec![Opening, Open, Closed, Opening]);
    assert_eq!(f.journal.count(Entry::Closed), 1);
    assert_eq!(f.phys.opens(), 2);
    assert!(!f.monitor.is_stopping());
}

#[test]
fn stop_while_open_closes_without_restart() {
    let f = Fixture::new();
    f.open();

    f.monitor.stop();
    assert_eq!(f.monitor.state(), Open);
    assert_eq!(f.phys.status(), Status::Closing);
    assert_eq!(f.phys.closes(), 1);

    f.phys.complete_close();

    assert_eq!(f.journal.states(), vec![Opening, Open, Closed, Stopped]);
    assert_eq!(f.phys.opens(), 1);
}

#[test]
fn stop_while_waiting_cancels_retry() {
    let f = Fixture::new();
    f.waiting();
    assert_eq!(f.timers.outstanding(), 1);

    f.monitor.stop();

    assert_eq!(f.monitor.state(), Stopped);
    assert_eq!(f.timers.outstanding(), 0);
    assert!(!f.timers.fire_next());
    assert_eq!(f.phys.opens(), 1);
    assert_eq!(f.journal.states(), vec![Opening, Waiting, Stopped]);
}

#[test]
fn stop_while_stopped_is_harmless() {
    let f = Fixture::new();

    f.monitor.stop();
    f.monitor.stop();

    assert_eq!(f.monitor.state(), Stopped);
    assert!(f.monitor.is_stopping());
    assert!(f.journal.entries().is_empty());
    assert_eq!(f.phys.closes(), 0);
}

#[test]
fn stop_while_opening_converges_without_retry() {
    let f = Fixture::new();
    f.monitor.start();

    f.monitor.stop();
    assert_eq!(f.monitor.state(), Opening);
    assert_eq!(f.phys.status(), Status::Cancelling);

    f.phys.fail_open();

    assert_eq!(f.monitor.state(), Stopped);
    assert_eq!(f.timers.scheduled(), 0);
    assert_eq!(f.journal.states(), vec![Opening, Stopped]);
    assert_eq!(f.journal.count(Entry::OpenFailed), 1);
}

#[test]
fn retries_forever_at_a_fixed_interval() {
    let f = Fixture::new();
    f.monitor.start();

    for attempt in 1..=25 {
        f.phys.fail_open();
        assert_eq!(f.monitor.state(), Waiting, "attempt {}", attempt);
        assert!(f.timers.fire_next());
        assert_eq!(f.monitor.state(), Opening);
    }

    assert_eq!(f.phys.opens(), 26);
    assert!(f.timers.delays().iter().all(|d| *d == RETRY));
    assert_eq!(f.timers.max_outstanding(), 1);
}
