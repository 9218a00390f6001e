// tests/config_env_tests.rs
//
// Note: These tests manipulate environment variables and must run serially.
// Use `cargo test --test config_env_tests -- --test-threads=1` if flaky.

use armctl::config::{resolve_effective_actuation, ActuationMode, Config, SettingSource};
use std::sync::Mutex;

// Global mutex to serialize tests that touch environment variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const KEYS: &[&str] = &[
    "ARMCTL_ACTUATION",
    "ARMCTL_LOCK_BASE",
    "ARMCTL_MAX_EPISODE_LENGTH",
    "ARMCTL_ANIMATION_STEPS",
    "ARMCTL_REWARD_LOSS",
    "ARMCTL_AGENT_SEED",
];

fn clear_env() {
    for k in KEYS {
        std::env::remove_var(k);
    }
}

#[test]
fn defaults_match_reference_world() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let cfg = Config::from_env_or_default();
    assert_eq!(cfg.actuation, ActuationMode::Position);
    assert_eq!(cfg.episode.max_episode_length, 20);
    assert_eq!(cfg.episode.animation_steps, 1000);
    assert_eq!(cfg.joints.joint_min, -0.75);
    assert_eq!(cfg.joints.joint_max, 2.0);
    assert!(cfg.joints.lock_base);
    assert_eq!(cfg.reward.ground_contact_height, 0.05);
    assert_eq!(cfg.perception.tensor_len(), 64 * 64 * 3);
    assert!(cfg.validate().is_ok());
}

#[test]
fn numeric_overrides_are_applied() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    std::env::set_var("ARMCTL_MAX_EPISODE_LENGTH", "5");
    std::env::set_var("ARMCTL_REWARD_LOSS", "-2.5");
    std::env::set_var("ARMCTL_AGENT_SEED", "42");

    let cfg = Config::from_env_or_default();
    assert_eq!(cfg.episode.max_episode_length, 5);
    assert_eq!(cfg.reward.reward_loss, -2.5);
    assert_eq!(cfg.agent.seed, 42);

    clear_env();
}

#[test]
fn unparsable_values_keep_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    std::env::set_var("ARMCTL_MAX_EPISODE_LENGTH", "twenty");
    std::env::set_var("ARMCTL_LOCK_BASE", "maybe");
    std::env::set_var("ARMCTL_ANIMATION_STEPS", "0");

    let cfg = Config::from_env_or_default();
    assert_eq!(cfg.episode.max_episode_length, 20);
    assert!(cfg.joints.lock_base);
    // zero steps is parsed but floored to one
    assert_eq!(cfg.episode.animation_steps, 1);

    clear_env();
}

#[test]
fn unlocking_base_adds_actions() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    std::env::set_var("ARMCTL_LOCK_BASE", "false");
    let cfg = Config::from_env_or_default();
    assert!(!cfg.joints.lock_base);
    assert_eq!(cfg.joints.num_actions(), 6);

    clear_env();
}

#[test]
fn actuation_precedence_cli_env_default() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();

    let eff = resolve_effective_actuation(None);
    assert_eq!(eff.mode, ActuationMode::Position);
    assert_eq!(eff.source, SettingSource::Default);

    std::env::set_var("ARMCTL_ACTUATION", "velocity");
    let eff = resolve_effective_actuation(None);
    assert_eq!(eff.mode, ActuationMode::Velocity);
    assert_eq!(eff.source, SettingSource::Env);
    assert_eq!(Config::from_env_or_default().actuation, ActuationMode::Velocity);

    let eff = resolve_effective_actuation(Some(ActuationMode::Position));
    assert_eq!(eff.mode, ActuationMode::Position);
    assert_eq!(eff.source, SettingSource::Cli);

    std::env::set_var("ARMCTL_ACTUATION", "torque");
    let eff = resolve_effective_actuation(None);
    assert_eq!(eff.source, SettingSource::Default);

    clear_env();
}
