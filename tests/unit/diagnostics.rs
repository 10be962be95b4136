//! Unit tests for diagnostics.rs

use panladder::diagnostics::{diagnostics_enabled, PipelineDiagnostics};
use std::env;

#[test]
fn test_diagnostics_enabled() {
    env::remove_var("PANLADDER_DIAGNOSTICS");
    assert!(!diagnostics_enabled());

    env::set_var("PANLADDER_DIAGNOSTICS", "1");
    assert!(diagnostics_enabled());

    env::set_var("PANLADDER_DIAGNOSTICS", "TRUE");
    assert!(diagnostics_enabled());

    env::set_var("PANLADDER_DIAGNOSTICS", "0");
    assert!(!diagnostics_enabled());

    env::remove_var("PANLADDER_DIAGNOSTICS");
}

#[test]
fn test_counters_accumulate_across_threads() {
    let diag = PipelineDiagnostics::default();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..100 {
                    PipelineDiagnostics::add(&diag.edges_raw, 1);
                }
            });
        }
    });
    assert_eq!(PipelineDiagnostics::get(&diag.edges_raw), 400);
    assert_eq!(PipelineDiagnostics::get(&diag.subproblems_run), 0);
}
