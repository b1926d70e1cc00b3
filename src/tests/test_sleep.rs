use std::thread;
use std::time::{Duration, Instant};

use crate::sleep::WaitGate;

#[test]
fn wait_runs_the_full_duration_without_a_cancel() {
    let gate = WaitGate::new();

    let start = Instant::now();
    let cut_short = gate.wait_for(Duration::from_millis(50));
    assert!(!cut_short);
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[test]
fn cancel_ends_the_wait_early() {
    let gate = WaitGate::new();
    let canceller = gate.canceller();

    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        canceller.cancel();
    });

    let start = Instant::now();
    let cut_short = gate.wait_for(Duration::from_secs(5));
    assert!(cut_short);
    assert!(start.elapsed() < Duration::from_secs(5));

    handle.join().expect("cancel thread panicked");
}

#[test]
fn cancel_before_the_wait_is_a_zero_wait() {
    let gate = WaitGate::new();
    gate.canceller().cancel();

    let start = Instant::now();
    assert!(gate.wait_for(Duration::from_secs(5)));
    assert!(start.elapsed() < Duration::from_millis(100));
}
