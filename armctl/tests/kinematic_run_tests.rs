// tests/kinematic_run_tests.rs
//
// End-to-end runs of the engine against the kinematic arm harness with the
// reference agents.

use armctl::agent::{DeadlineFactory, EpsilonGreedyFactory};
use armctl::config::{ActuationMode, Config};
use armctl::engine::Engine;
use armctl::host::SimulationHost;
use armctl::sim::KinematicArmSim;
use armctl::state::AccuracyCounters;

fn run(cfg: Config, ticks: u64) -> (AccuracyCounters, Vec<f32>) {
    let (joint_min, joint_max) = (cfg.joints.joint_min, cfg.joints.joint_max);
    let names = cfg.joints.driven_joint_names().to_vec();
    let mut sim = KinematicArmSim::new(&cfg).with_target_jitter(cfg.agent.seed, 0.1);
    let mut engine = Engine::new(cfg, EpsilonGreedyFactory).unwrap();
    let perception = engine.perception_handle();
    let observer = engine.contact_observer();

    for _ in 0..ticks {
        let now = sim.advance(0.01);
        perception.ingest(&sim.render()).unwrap();
        observer.ingest_contacts(&sim.contacts());
        let report = engine.on_update(&mut sim, now);
        assert!(report.failures.is_empty(), "{:?}", report.failures);
        for name in &names {
            let v = sim.joint(name).unwrap();
            assert!(v >= joint_min && v <= joint_max, "{} = {}", name, v);
        }
    }

    let joints = names.iter().filter_map(|n| sim.joint(n)).collect();
    (engine.counters(), joints)
}

fn quick_config(seed: u64) -> Config {
    let mut cfg = Config::default();
    cfg.episode.animation_steps = 50;
    cfg.agent.seed = seed;
    cfg
}

#[test]
fn episodes_complete_against_the_harness() {
    let (counters, _) = run(quick_config(3), 2000);
    assert!(counters.total_episodes >= 10);
    assert!(counters.successful_episodes <= counters.total_episodes);
}

#[test]
fn seeded_runs_are_deterministic() {
    let a = run(quick_config(11), 1200);
    let b = run(quick_config(11), 1200);
    assert_eq!(a, b);
}

#[test]
fn velocity_actuation_respects_bounds() {
    let mut cfg = quick_config(5);
    cfg.actuation = ActuationMode::Velocity;
    let (counters, _) = run(cfg, 1500);
    assert!(counters.total_episodes > 0);
}

#[test]
fn deadline_wrapped_agent_drives_the_arm() {
    let mut cfg = quick_config(8);
    cfg.agent.inference_timeout_ms = 1000;
    let mut sim = KinematicArmSim::new(&cfg);
    let mut engine = Engine::new(cfg, DeadlineFactory::new(EpsilonGreedyFactory)).unwrap();
    let perception = engine.perception_handle();

    let mut actions = 0;
    for _ in 0..400 {
        let now = sim.advance(0.01);
        perception.ingest(&sim.render()).unwrap();
        let report = engine.on_update(&mut sim, now);
        if report.action.is_some() {
            actions += 1;
        }
    }
    assert!(actions > 0);
    assert!(sim.model_position("tube").is_some());
}
