//! The reference PHY driving the full simulator: calibrate from a measured
//! AWGN grid, then run every scheduling policy over fading channels.

use harqsim_engine::{Attempt, LinkSimulator, SchedulerKind, SimConfig, UeSnr};
use harqsim_link::{BlerGrid, CalibrationCurve, LinkTable};
use harqsim_phy::{AwgnSweep, PowerDelayProfile, ReferencePhy};

fn measured_curve(config: &SimConfig) -> CalibrationCurve {
    let grid = AwgnSweep {
        snr_range_db: vec![0.0, 30.0],
        blocks_per_point: 10,
        resource_blocks: config.resource_blocks,
        seed: 1,
    }
    .measure(&config.link_table)
    .unwrap();
    config.calibrate(&grid).unwrap()
}

fn config(scheduler: SchedulerKind, seed: u64) -> SimConfig {
    SimConfig {
        nrof_ues: 4,
        scheduler,
        prop_fair_window: 10,
        seed,
        source_buffer_bits: 20_000,
        ue_snr: UeSnr::Fixed(vec![30.0; 4]),
        ..SimConfig::default()
    }
}

#[test]
fn every_policy_respects_harq_and_throughput_bounds() {
    let curve = measured_curve(&config(SchedulerKind::Random, 0));
    for kind in SchedulerKind::ALL {
        let cfg = config(kind, 7);
        let max_harq = cfg.max_harq_transmissions;
        let mut sim = LinkSimulator::new(cfg, curve.clone(), Box::new(ReferencePhy::new())).unwrap();
        for _ in 0..60 {
            let out = sim.step(None).unwrap();
            match out.attempt {
                Attempt::OutOfRange => assert_eq!(out.throughput, 0),
                Attempt::Delivered { tbs } => assert_eq!(out.throughput, tbs),
                Attempt::Failed { harq_index } => {
                    assert_eq!(out.throughput, 0);
                    assert!(harq_index <= max_harq);
                }
            }
            for ue in sim.ues() {
                assert!(ue.harq_index() <= max_harq);
                assert_eq!(ue.soft_buffer().len(), ue.coded_bits().len());
            }
        }
    }
}

#[test]
fn high_snr_link_delivers_data() {
    let cfg = config(SchedulerKind::RoundRobin, 3);
    let curve = measured_curve(&cfg);
    let phy = ReferencePhy::new().with_profile(PowerDelayProfile::itu_pedestrian_a());
    let mut sim = LinkSimulator::new(cfg, curve, Box::new(phy)).unwrap();
    for _ in 0..100 {
        sim.step(None).unwrap();
    }
    let m = sim.last_metrics();
    assert!(m.decode_successes > 0);
    assert!(m.delivered_bits > 0);
}

#[test]
fn reference_runs_are_reproducible() {
    let curve = CalibrationCurve::from_grid(
        &BlerGrid::synthetic(&LinkTable::custom(), BlerGrid::sweep(-10.0, 40.0, 1.0)).unwrap(),
        0.1,
    )
    .unwrap();
    let run = |seed| {
        let mut sim = LinkSimulator::new(
            config(SchedulerKind::MaxRate, seed),
            curve.clone(),
            Box::new(ReferencePhy::new()),
        )
        .unwrap();
        (0..40)
            .map(|_| {
                let o = sim.step(None).unwrap();
                (o.ue, o.cqi, o.throughput)
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(9), run(9));
}
