// src/config.rs
//
// Central configuration for the arm control core.
// Every constant the control loop depends on lives here: joint bounds,
// action deltas, episode and animation lengths, reward magnitudes,
// collision surface names, tensor dimensions and agent hyperparameters.
//
// `Config::default()` reproduces the reference arm world; environment
// overrides are layered on top by `Config::from_env_or_default()`.

use std::env;
use std::fmt;
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Human-readable config version.
    pub version: String,
    /// How actions are turned into joint reference updates.
    pub actuation: ActuationMode,
    /// Joint bounds, deltas and the home pose.
    pub joints: JointConfig,
    /// Episode length, animation and agent warm-up timing.
    pub episode: EpisodeConfig,
    /// Reward magnitudes and the ground-contact threshold.
    pub reward: RewardConfig,
    /// Qualified collision surface names.
    pub collision: CollisionConfig,
    /// Names of scene objects queried for geometry.
    pub scene: SceneConfig,
    /// Policy tensor dimensions.
    pub perception: PerceptionConfig,
    /// Hyperparameters handed to the agent factory.
    pub agent: AgentConfig,
}

/// Actuation mode for agent actions.
///
/// In `Position` mode an action nudges a single joint reference by
/// `action_joint_delta`. In `Velocity` mode an action nudges that joint's
/// velocity by `action_velocity_delta` and every reference integrates its
/// velocity each agent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuationMode {
    Position,
    Velocity,
}

impl ActuationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActuationMode::Position => "position",
            ActuationMode::Velocity => "velocity",
        }
    }

    /// Parse a mode name (case-insensitive). Returns None if unrecognized.
    pub fn parse(s: &str) -> Option<ActuationMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "position" | "pos" | "p" => Some(ActuationMode::Position),
            "velocity" | "vel" | "v" => Some(ActuationMode::Velocity),
            _ => None,
        }
    }
}

/// Source of the effective actuation mode.
///
/// Precedence (highest to lowest): CLI, `ARMCTL_ACTUATION`, config default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    Cli,
    Env,
    Default,
}

impl SettingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingSource::Cli => "cli",
            SettingSource::Env => "env",
            SettingSource::Default => "default",
        }
    }
}

/// Resolved actuation mode with its source, for the startup log line.
#[derive(Debug, Clone, Copy)]
pub struct EffectiveActuation {
    pub mode: ActuationMode,
    pub source: SettingSource,
}

impl EffectiveActuation {
    /// Format: `effective_actuation=<mode> source=<source>`
    pub fn log_startup(&self) {
        info!(
            "effective_actuation={} source={}",
            self.mode.as_str(),
            self.source.as_str()
        );
    }
}

/// Resolve the actuation mode: CLI, then `ARMCTL_ACTUATION`, then default.
pub fn resolve_effective_actuation(cli: Option<ActuationMode>) -> EffectiveActuation {
    if let Some(mode) = cli {
        return EffectiveActuation {
            mode,
            source: SettingSource::Cli,
        };
    }

    if let Ok(raw) = env::var("ARMCTL_ACTUATION") {
        if !raw.is_empty() {
            if let Some(mode) = ActuationMode::parse(&raw) {
                return EffectiveActuation {
                    mode,
                    source: SettingSource::Env,
                };
            }
            warn!("[config] invalid ARMCTL_ACTUATION={:?}; ignoring", raw);
        }
    }

    EffectiveActuation {
        mode: ActuationMode::Position,
        source: SettingSource::Default,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointConfig {
    /// Lower bound for every joint reference (radians).
    pub joint_min: f32,
    /// Upper bound for every joint reference (radians).
    pub joint_max: f32,
    /// Lower bound for joint velocities in velocity actuation.
    pub velocity_min: f32,
    /// Upper bound for joint velocities in velocity actuation.
    pub velocity_max: f32,
    /// Reference change per position action.
    pub action_joint_delta: f32,
    /// Velocity change per velocity action.
    pub action_velocity_delta: f32,
    /// Hold the base joint at zero and control only the remaining joints.
    pub lock_base: bool,
    /// Host joint names, base first.
    pub names: Vec<String>,
    /// Home reference, one entry per reference slot (base unlocked layout).
    pub home: Vec<f32>,
}

impl JointConfig {
    /// Number of joints driven by references.
    pub fn active_dof(&self) -> usize {
        if self.lock_base {
            self.names.len().saturating_sub(1)
        } else {
            self.names.len()
        }
    }

    /// Number of discrete actions (increase/decrease per active joint).
    pub fn num_actions(&self) -> usize {
        self.active_dof() * 2
    }

    /// Home reference truncated to the active DOF.
    pub fn home_reference(&self) -> Vec<f32> {
        (0..self.active_dof())
            .map(|i| self.home.get(i).copied().unwrap_or(0.0))
            .collect()
    }

    /// Host joint names driven by reference slots, in slot order.
    pub fn driven_joint_names(&self) -> &[String] {
        if self.lock_base && !self.names.is_empty() {
            &self.names[1..]
        } else {
            &self.names
        }
    }

    /// Name of the base joint, when one is configured.
    pub fn base_joint_name(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    /// Per-tick step used by the return-to-home animation.
    pub fn animation_step(&self, animation_steps: u32) -> f32 {
        (self.joint_max - self.joint_min) / animation_steps.max(1) as f32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeConfig {
    /// Agent frames per episode before a forced terminal (0 disables).
    pub max_episode_length: u32,
    /// Ticks in one return-to-home animation.
    pub animation_steps: u32,
    /// Repeat the animation instead of handing control to the agent.
    pub loop_animation: bool,
    /// Simulated seconds to wait before constructing the agent.
    pub agent_warmup_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    pub reward_win: f32,
    pub reward_loss: f32,
    /// Gripper minimum height (m) at or below which it counts as touching ground.
    pub ground_contact_height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollisionConfig {
    /// Contacts whose second surface matches this are skipped.
    pub ground_filter: String,
    /// Target object collision surface.
    pub target_surface: String,
    /// Gripper collision surface.
    pub gripper_surface: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    pub world_name: String,
    /// Target prop model name.
    pub target_model: String,
    /// Target link used for the goal position.
    pub target_link: String,
    /// Gripper link name on the arm model.
    pub gripper_link: String,
    pub camera_topic: String,
    pub contact_topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerceptionConfig {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl PerceptionConfig {
    pub fn tensor_len(&self) -> usize {
        self.width * self.height * self.channels
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub optimizer: String,
    pub learning_rate: f32,
    pub replay_memory: usize,
    pub batch_size: usize,
    pub gamma: f32,
    pub eps_start: f32,
    pub eps_end: f32,
    pub eps_decay: u32,
    pub use_lstm: bool,
    pub lstm_size: usize,
    pub allow_random: bool,
    pub debug: bool,
    /// Seed for agents with stochastic exploration.
    pub seed: u64,
    /// Per-call inference budget in milliseconds for `DeadlineAgent`.
    pub inference_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let prefix = "arm_world";
        Config {
            version: "armctl-v0.1.0".to_string(),
            actuation: ActuationMode::Position,
            joints: JointConfig {
                joint_min: -0.75,
                joint_max: 2.0,
                velocity_min: -0.2,
                velocity_max: 0.2,
                action_joint_delta: 0.15,
                action_velocity_delta: 0.1,
                lock_base: true,
                names: vec![
                    "base".to_string(),
                    "joint1".to_string(),
                    "joint2".to_string(),
                ],
                home: vec![0.0, 0.25, 0.0],
            },
            episode: EpisodeConfig {
                max_episode_length: 20,
                animation_steps: 1000,
                loop_animation: false,
                agent_warmup_s: 1.5,
            },
            reward: RewardConfig {
                reward_win: 1.0,
                reward_loss: -1.0,
                ground_contact_height: 0.05,
            },
            collision: CollisionConfig {
                ground_filter: "ground_plane::link::collision".to_string(),
                target_surface: "tube::tube_link::tube_collision".to_string(),
                gripper_surface: "arm::gripperbase::gripper_link".to_string(),
            },
            scene: SceneConfig {
                world_name: prefix.to_string(),
                target_model: "tube".to_string(),
                target_link: "tube_link".to_string(),
                gripper_link: "gripperbase".to_string(),
                camera_topic: format!("/gazebo/{prefix}/camera/link/camera/image"),
                contact_topic: format!("/gazebo/{prefix}/tube/tube_link/my_contact"),
            },
            perception: PerceptionConfig {
                width: 64,
                height: 64,
                channels: 3,
            },
            agent: AgentConfig {
                optimizer: "RMSprop".to_string(),
                learning_rate: 0.001,
                replay_memory: 1000,
                batch_size: 64,
                gamma: 0.9,
                eps_start: 0.9,
                eps_end: 0.05,
                eps_decay: 200,
                use_lstm: true,
                lstm_size: 64,
                allow_random: true,
                debug: false,
                seed: 0,
                inference_timeout_ms: 50,
            },
        }
    }
}

/// Configuration validation failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config validation error in '{}': {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError {
        field,
        message: message.into(),
    }
}

impl Config {
    /// Check the bounds and dimensions the control loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let j = &self.joints;
        if !(j.joint_min < j.joint_max) {
            return Err(invalid(
                "joints.joint_min",
                format!("joint_min {} must be below joint_max {}", j.joint_min, j.joint_max),
            ));
        }
        if !(j.velocity_min < j.velocity_max) {
            return Err(invalid(
                "joints.velocity_min",
                "velocity_min must be below velocity_max",
            ));
        }
        if j.active_dof() == 0 {
            return Err(invalid("joints.names", "at least one joint must be driven"));
        }
        if j.home.len() < j.active_dof() {
            return Err(invalid(
                "joints.home",
                format!(
                    "home pose has {} entries but {} joints are driven",
                    j.home.len(),
                    j.active_dof()
                ),
            ));
        }
        if let Some(h) = j
            .home_reference()
            .iter()
            .find(|h| **h < j.joint_min || **h > j.joint_max)
        {
            return Err(invalid(
                "joints.home",
                format!("home value {} lies outside the joint bounds", h),
            ));
        }
        if self.episode.animation_steps == 0 {
            return Err(invalid("episode.animation_steps", "must be positive"));
        }
        let p = &self.perception;
        if p.width == 0 || p.height == 0 || p.channels == 0 {
            return Err(invalid("perception", "tensor dimensions must be non-zero"));
        }
        if self.reward.reward_loss > 0.0 {
            return Err(invalid(
                "reward.reward_loss",
                "loss reward must be non-positive so shaping penalises distance",
            ));
        }
        Ok(())
    }

    /// Default config with env overrides applied on top.
    ///
    /// Recognised variables:
    ///   - ARMCTL_ACTUATION             (position | velocity)
    ///   - ARMCTL_LOCK_BASE             (bool)
    ///   - ARMCTL_ACTION_JOINT_DELTA    (f32, radians)
    ///   - ARMCTL_ACTION_VELOCITY_DELTA (f32)
    ///   - ARMCTL_MAX_EPISODE_LENGTH    (u32 frames; 0 disables)
    ///   - ARMCTL_ANIMATION_STEPS       (u32 ticks)
    ///   - ARMCTL_LOOP_ANIMATION        (bool)
    ///   - ARMCTL_AGENT_WARMUP_S        (f64 seconds)
    ///   - ARMCTL_REWARD_WIN            (f32)
    ///   - ARMCTL_REWARD_LOSS           (f32)
    ///   - ARMCTL_GROUND_CONTACT        (f32 metres)
    ///   - ARMCTL_LEARNING_RATE         (f32)
    ///   - ARMCTL_AGENT_SEED            (u64)
    ///   - ARMCTL_INFERENCE_TIMEOUT_MS  (u64)
    ///
    /// Any variable that fails to parse is ignored with a warning.
    pub fn from_env_or_default() -> Self {
        let mut cfg = Config::default();

        cfg.actuation = resolve_effective_actuation(None).mode;

        override_bool("ARMCTL_LOCK_BASE", &mut cfg.joints.lock_base);
        override_parsed("ARMCTL_ACTION_JOINT_DELTA", &mut cfg.joints.action_joint_delta);
        override_parsed(
            "ARMCTL_ACTION_VELOCITY_DELTA",
            &mut cfg.joints.action_velocity_delta,
        );
        override_parsed(
            "ARMCTL_MAX_EPISODE_LENGTH",
            &mut cfg.episode.max_episode_length,
        );
        override_parsed("ARMCTL_ANIMATION_STEPS", &mut cfg.episode.animation_steps);
        cfg.episode.animation_steps = cfg.episode.animation_steps.max(1);
        override_bool("ARMCTL_LOOP_ANIMATION", &mut cfg.episode.loop_animation);
        override_parsed("ARMCTL_AGENT_WARMUP_S", &mut cfg.episode.agent_warmup_s);
        override_parsed("ARMCTL_REWARD_WIN", &mut cfg.reward.reward_win);
        override_parsed("ARMCTL_REWARD_LOSS", &mut cfg.reward.reward_loss);
        override_parsed(
            "ARMCTL_GROUND_CONTACT",
            &mut cfg.reward.ground_contact_height,
        );
        override_parsed("ARMCTL_LEARNING_RATE", &mut cfg.agent.learning_rate);
        override_parsed("ARMCTL_AGENT_SEED", &mut cfg.agent.seed);
        override_parsed(
            "ARMCTL_INFERENCE_TIMEOUT_MS",
            &mut cfg.agent.inference_timeout_ms,
        );

        cfg
    }
}

fn override_parsed<T>(key: &str, slot: &mut T)
where
    T: FromStr + fmt::Display,
{
    let Ok(raw) = env::var(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => {
            info!("[config] {key} = {v} (overrode default)");
            *slot = v;
        }
        Err(_) => {
            warn!(
                "[config] could not parse {key} = {:?}; using default {}",
                raw, slot
            );
        }
    }
}

fn override_bool(key: &str, slot: &mut bool) {
    let Ok(raw) = env::var(key) else {
        return;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => *slot = true,
        "0" | "false" | "no" | "off" => *slot = false,
        _ => {
            warn!(
                "[config] could not parse {key} = {:?} as bool; using default {}",
                raw, slot
            );
            return;
        }
    }
    info!("[config] {key} = {} (overrode default)", slot);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.joints.active_dof(), 2);
        assert_eq!(cfg.joints.num_actions(), 4);
        assert_eq!(cfg.joints.home_reference(), vec![0.0, 0.25]);
        assert_eq!(cfg.joints.driven_joint_names(), &["joint1", "joint2"]);
    }

    #[test]
    fn unlocked_base_drives_all_joints() {
        let mut cfg = Config::default();
        cfg.joints.lock_base = false;
        assert_eq!(cfg.joints.active_dof(), 3);
        assert_eq!(cfg.joints.num_actions(), 6);
        assert_eq!(cfg.joints.home_reference(), vec![0.0, 0.25, 0.0]);
        assert_eq!(cfg.joints.driven_joint_names().len(), 3);
    }

    #[test]
    fn animation_step_spans_joint_range() {
        let cfg = Config::default();
        let step = cfg.joints.animation_step(cfg.episode.animation_steps);
        assert!((step - 0.00275).abs() < 1e-6);
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let mut cfg = Config::default();
        cfg.joints.joint_min = 3.0;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.field, "joints.joint_min");
    }

    #[test]
    fn validate_rejects_short_home_pose() {
        let mut cfg = Config::default();
        cfg.joints.lock_base = false;
        cfg.joints.home = vec![0.0, 0.25];
        assert_eq!(cfg.validate().unwrap_err().field, "joints.home");
    }

    #[test]
    fn actuation_names_parse() {
        assert_eq!(ActuationMode::parse("Velocity"), Some(ActuationMode::Velocity));
        assert_eq!(ActuationMode::parse(" pos "), Some(ActuationMode::Position));
        assert_eq!(ActuationMode::parse("torque"), None);
    }

    #[test]
    fn cli_actuation_wins() {
        let eff = resolve_effective_actuation(Some(ActuationMode::Velocity));
        assert_eq!(eff.mode, ActuationMode::Velocity);
        assert_eq!(eff.source, SettingSource::Cli);
    }
}
