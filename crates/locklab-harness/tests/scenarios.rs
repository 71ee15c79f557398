//! End-to-end checks of the four scenario drivers against their asserted
//! properties.

use std::time::{Duration, Instant};

use locklab_harness::{
    log, run_deadlock_scenario, run_guarded_withdraw_scenario, run_race_scenario,
    run_singleton_scenario,
};

#[test]
fn singleton_scenario_observes_one_instance() {
    log::init();
    let report = run_singleton_scenario(16).expect("scenario runs");
    assert_eq!(report.observers, 16);
    assert_eq!(report.distinct_addresses, 1);
    assert_eq!(report.constructions, 1);
    assert!(report.holds());
}

#[test]
fn singleton_scenario_with_a_single_accessor() {
    log::init();
    let report = run_singleton_scenario(1).expect("scenario runs");
    assert!(report.holds());
}

// The watchdog bounds singleton construction the same way it bounds the
// deadlock scenario: a hang would surface as TimedOut instead of a hung
// test run.
#[test]
fn singleton_scenario_completes_under_the_watchdog() {
    log::init();
    let outcome = locklab_harness::run_with_deadline("singleton", Duration::from_secs(5), || {
        let report = run_singleton_scenario(32).expect("scenario runs");
        assert!(report.holds());
    })
    .expect("watchdog spawns");
    assert!(outcome.completed());
}

#[test]
fn two_800_withdrawals_against_1000_admit_exactly_one() {
    log::init();
    let report = run_guarded_withdraw_scenario(1_000, &[800, 800]).expect("scenario runs");
    assert_eq!(report.final_balance, 200);
    assert_eq!(report.succeeded, vec![800]);
    assert_eq!(report.rejected, vec![800]);
    assert!(report.holds());
}

#[test]
fn sequentially_affordable_withdrawals_all_succeed() {
    log::init();
    let report = run_guarded_withdraw_scenario(1_000, &[100, 200, 300]).expect("scenario runs");
    assert_eq!(report.final_balance, 400);
    assert_eq!(report.succeeded.len(), 3);
    assert!(report.rejected.is_empty());
    assert!(report.holds());
}

#[test]
fn withdraw_scenario_rejects_invalid_amounts_up_front() {
    log::init();
    let err = run_guarded_withdraw_scenario(1_000, &[100, -5]).unwrap_err();
    assert!(matches!(
        err,
        locklab_error::LockLabError::InvalidAmount { amount: -5 }
    ));
}

#[test]
fn deadlock_scenario_does_not_complete_within_a_generous_timeout() {
    log::init();
    let timeout = Duration::from_secs(2);
    let started = Instant::now();
    let report = run_deadlock_scenario(timeout).expect("scenario runs");

    assert!(
        !report.completed,
        "opposite-order transfers must circular-wait"
    );
    assert!(
        started.elapsed() >= timeout,
        "non-completion must be detected by the deadline, not early"
    );
    assert_eq!(report.timeout_ms, 2_000);
}

#[test]
fn race_scenario_never_exceeds_the_increment_count() {
    log::init();
    let report = run_race_scenario(10_000, 4).expect("scenario runs");
    assert_eq!(report.expected, 10_000);
    assert!(report.observed <= report.expected);
    assert_eq!(report.lost_updates, report.expected - report.observed);
}

// Statistical property: lost updates are near-certain at this contention
// level but not guaranteed on any single run, so retry a bounded number of
// times.
#[test]
fn race_scenario_loses_updates_under_contention() {
    log::init();
    for _ in 0..10 {
        let report = run_race_scenario(10_000, 4).expect("scenario runs");
        if report.observed < report.expected {
            assert!(report.lost_updates > 0);
            return;
        }
    }
    panic!("no lost update observed in 10 runs of 10000 increments");
}

#[test]
fn race_scenario_with_one_worker_is_exact() {
    log::init();
    let report = run_race_scenario(5_000, 1).expect("scenario runs");
    assert_eq!(report.observed, 5_000);
    assert_eq!(report.lost_updates, 0);
}
