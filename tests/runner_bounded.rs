//! Bounded runner behavior against real child processes.

use std::process::Command;
use std::time::Duration;
use tessbridge::runner::{InvocationOutcome, deadline_from_secs, run_bounded};

#[test]
fn completed_process_returns_output() {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg("printf hello");
    let outcome = run_bounded(&mut cmd, Some(Duration::from_secs(10))).unwrap();
    match outcome {
        InvocationOutcome::Completed { stdout, .. } => {
            assert_eq!(stdout, b"hello");
        }
        other => panic!("expected Completed, got {other:?}"),
    }
}

#[test]
fn non_zero_exit_is_failed_not_timed_out() {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg("echo boom >&2; exit 3");
    let outcome = run_bounded(&mut cmd, Some(Duration::from_secs(10))).unwrap();
    match outcome {
        InvocationOutcome::Failed {
            exit_code, stderr, ..
        } => {
            assert_eq!(exit_code, Some(3));
            assert!(String::from_utf8_lossy(&stderr).contains("boom"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[test]
fn deadline_overrun_is_timed_out() {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg("sleep 30");
    let outcome = run_bounded(&mut cmd, Some(Duration::from_millis(200))).unwrap();
    match outcome {
        InvocationOutcome::TimedOut { elapsed, .. } => {
            assert!(elapsed >= Duration::from_millis(200));
            assert!(elapsed < Duration::from_secs(5), "kill was not prompt");
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
}

#[test]
fn partial_output_survives_a_timeout() {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg("printf partial; sleep 30");
    let outcome = run_bounded(&mut cmd, Some(Duration::from_millis(200))).unwrap();
    match outcome {
        InvocationOutcome::TimedOut { stdout, .. } => {
            assert_eq!(stdout, b"partial");
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
}

#[test]
fn missing_binary_is_an_error() {
    let mut cmd = Command::new("/definitely/not/a/real/binary");
    assert!(run_bounded(&mut cmd, None).is_err());
}

#[test]
fn zero_seconds_means_no_deadline() {
    assert_eq!(deadline_from_secs(0.0), None);
    assert_eq!(deadline_from_secs(1.5), Some(Duration::from_millis(1500)));
}
