//! End-to-end scheduling example.
//!
//! Demonstrates: build config → calibrate → LinkSimulator → step → read
//! per-UE state → reset with a new policy → repeat.

use harqsim_bench::{reference_profile, reference_simulator};
use harqsim_core::UeId;
use harqsim_engine::{Attempt, LinkSimulator, SchedulerKind};

fn report(sim: &LinkSimulator, label: &str) {
    let m = sim.last_metrics();
    println!(
        "  {label}: delivered={:>8} bits, successes={:>4}, failures={:>4}, exhausted={:>3}, skipped={:>3}",
        m.delivered_bits,
        m.decode_successes,
        m.decode_failures,
        m.total_harq_exhaustions,
        m.out_of_range_skips,
    );
}

fn main() {
    println!("=== harqsim Lockstep Scheduler Example ===\n");

    for kind in SchedulerKind::ALL {
        let config = harqsim_engine::SimConfig {
            scheduler: kind,
            ..reference_profile(42)
        };
        let mut sim = reference_simulator(config).unwrap();

        println!("{kind}: 500 subframes");
        for subframe in 0..500 {
            let outcome = sim.step(None).unwrap();
            if subframe % 100 == 0 {
                let detail = match outcome.attempt {
                    Attempt::OutOfRange => "out of range".to_string(),
                    Attempt::Delivered { tbs } => format!("delivered {tbs} bits"),
                    Attempt::Failed { harq_index } => format!("failed, harq {harq_index}"),
                };
                println!(
                    "  subframe {subframe:>3}: UE {:>2} at CQI {:>2}, {detail}, time={:>5}μs",
                    outcome.ue.0, outcome.cqi.0, outcome.metrics.total_us,
                );
            }
        }
        report(&sim, "totals");
        println!();
    }

    // --- Forced scheduling after a reset ---
    println!("Resetting and forcing UE 0 for 20 subframes...");
    let mut sim = reference_simulator(reference_profile(42)).unwrap();
    sim.reset(99).unwrap();
    for _ in 0..20 {
        sim.step(Some(UeId(0))).unwrap();
    }
    let ue = sim.ue(UeId(0)).unwrap();
    println!(
        "  UE 0: CQI {}, harq index {}, data cursor {}",
        ue.cqi().0,
        ue.harq_index(),
        ue.data_cursor()
    );
    report(&sim, "totals");
}
