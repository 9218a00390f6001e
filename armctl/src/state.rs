// src/state.rs
//
// Episode state owned by the tick thread.
//
// Everything the orchestrator mutates between ticks lives in
// `EpisodeState`: the control mode, the per-episode frame counter, the
// pending reward, and the small accumulators that are cleared at each
// episode boundary. Cross-thread inputs never touch this struct directly;
// they are drained from the perception and collision handoffs instead.

use serde::{Deserialize, Serialize};

/// Which component owns the joint references this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ControlMode {
    /// Scripted return-to-home animation. With `loop_animation` the
    /// animation repeats instead of handing over to the agent.
    ScriptedReset { loop_animation: bool },
    /// The policy agent drives the joints from camera frames.
    AgentDriven,
}

/// Inputs to the control-mode transition function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeEvent {
    /// The return-to-home animation ran to completion.
    AnimationComplete,
    /// A terminal reward ended the episode.
    EpisodeTerminal,
}

impl ControlMode {
    /// Explicit transition function:
    ///
    /// - `ScriptedReset{loop=false} --AnimationComplete--> AgentDriven`
    /// - `ScriptedReset{loop=true}  --AnimationComplete--> ScriptedReset{loop=true}`
    /// - `any --EpisodeTerminal--> ScriptedReset{loop=false}`
    pub fn transition(self, event: ModeEvent) -> ControlMode {
        match (self, event) {
            (ControlMode::ScriptedReset { loop_animation: false }, ModeEvent::AnimationComplete) => {
                ControlMode::AgentDriven
            }
            (_, ModeEvent::EpisodeTerminal) => ControlMode::ScriptedReset {
                loop_animation: false,
            },
            (mode, ModeEvent::AnimationComplete) => mode,
        }
    }

    pub fn is_agent_driven(&self) -> bool {
        matches!(self, ControlMode::AgentDriven)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlMode::ScriptedReset { .. } => "scripted_reset",
            ControlMode::AgentDriven => "agent_driven",
        }
    }
}

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Gripper touched the target object.
    GoalReached,
    /// Gripper dropped to the ground-contact threshold.
    GroundContact,
    /// Episode exceeded its frame budget.
    Timeout,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::GoalReached => "goal_reached",
            TerminationReason::GroundContact => "ground_contact",
            TerminationReason::Timeout => "timeout",
        }
    }
}

/// A reward handed to the agent in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardSubmission {
    pub value: f32,
    pub terminal: bool,
    pub reason: Option<TerminationReason>,
}

/// Reward staged for the submission step of the current tick.
///
/// Once `terminal` is set the value is final for the episode: shaping
/// rewards are refused and a later terminal source only marks the signal
/// pending again without replacing the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardSignal {
    pub value: f32,
    pub pending: bool,
    pub terminal: bool,
    pub reason: Option<TerminationReason>,
}

impl RewardSignal {
    /// Target contact: the win reward always takes the slot.
    pub fn raise_goal(&mut self, reward_win: f32) {
        self.value = reward_win;
        self.pending = true;
        self.terminal = true;
        self.reason = Some(TerminationReason::GoalReached);
    }

    /// Ground contact: loss unless another terminal already set the value.
    pub fn raise_ground_contact(&mut self, reward_loss: f32) {
        if !self.terminal {
            self.value = reward_loss;
            self.reason = Some(TerminationReason::GroundContact);
        }
        self.pending = true;
        self.terminal = true;
    }

    /// Episode budget exhausted: neutral forced terminal.
    pub fn force_timeout(&mut self) {
        if self.terminal {
            return;
        }
        self.value += 0.0;
        self.pending = true;
        self.terminal = true;
        self.reason = Some(TerminationReason::Timeout);
    }

    /// Stage a non-terminal shaping reward. Refused once terminal.
    pub fn shape(&mut self, value: f32) -> bool {
        if self.terminal {
            return false;
        }
        self.value = value;
        self.pending = true;
        true
    }

    /// Consume the pending reward, if any.
    ///
    /// A non-terminal value is cleared on consumption so the next forced
    /// timeout starts from neutral; a terminal value is kept until the
    /// episode is finalized.
    pub fn take(&mut self) -> Option<RewardSubmission> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        let submission = RewardSubmission {
            value: self.value,
            terminal: self.terminal,
            reason: self.reason,
        };
        if !self.terminal {
            self.value = 0.0;
        }
        Some(submission)
    }

    fn clear(&mut self) {
        *self = RewardSignal::default();
    }
}

/// Process-wide win/total tally for one engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccuracyCounters {
    pub successful_episodes: u64,
    pub total_episodes: u64,
}

impl AccuracyCounters {
    /// Count one finalized episode. Returns true when it was a win.
    pub fn record(&mut self, reward: f32, reward_win: f32) -> bool {
        let won = reward >= reward_win;
        if won {
            self.successful_episodes += 1;
        }
        self.total_episodes += 1;
        won
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_episodes == 0 {
            0.0
        } else {
            self.successful_episodes as f64 / self.total_episodes as f64
        }
    }
}

/// Gripper-to-target distance history within one episode.
///
/// Reported in telemetry only; the reward does not read it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceTracker {
    pub last_goal_distance: f32,
    pub avg_goal_delta: f32,
}

impl DistanceTracker {
    /// Record a new distance and return the smoothed delta.
    pub fn update(&mut self, distance: f32) -> f32 {
        let delta = distance - self.last_goal_distance;
        self.avg_goal_delta = self.avg_goal_delta * 0.5 + delta * 0.5;
        self.last_goal_distance = distance;
        self.avg_goal_delta
    }

    pub fn reset(&mut self) {
        *self = DistanceTracker::default();
    }
}

/// Summary of one finalized episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    /// 1-based episode number (equals `total` after counting).
    pub episode: u64,
    pub reward: f32,
    pub won: bool,
    pub reason: Option<TerminationReason>,
    /// Agent frames consumed during the episode.
    pub frames: u32,
    pub successful: u64,
    pub total: u64,
    pub accuracy: f64,
}

impl EpisodeOutcome {
    pub fn label(&self) -> &'static str {
        if self.won {
            "WIN"
        } else {
            "LOSS"
        }
    }

    /// Human-readable progress line printed per finalized episode.
    pub fn progress_line(&self) -> String {
        format!(
            "Current Accuracy:  {:.4} ({:03} of {:03})  (reward={:+.2} {})",
            self.accuracy,
            self.successful,
            self.total,
            self.reward,
            self.label()
        )
    }
}

/// Mutable per-episode state, owned by the tick thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeState {
    pub frame_count: u32,
    pub reward: RewardSignal,
    pub mode: ControlMode,
    /// Per-joint velocity accumulators (velocity actuation only).
    pub velocities: Vec<f32>,
    pub distance: DistanceTracker,
}

impl EpisodeState {
    pub fn new(dof: usize, loop_animation: bool) -> Self {
        Self {
            frame_count: 0,
            reward: RewardSignal::default(),
            mode: ControlMode::ScriptedReset { loop_animation },
            velocities: vec![0.0; dof],
            distance: DistanceTracker::default(),
        }
    }

    pub fn apply(&mut self, event: ModeEvent) {
        self.mode = self.mode.transition(event);
    }

    /// Close the episode after its terminal reward was submitted.
    ///
    /// Switches back to the scripted reset, clears the frame counter and
    /// accumulators, counts the episode, and leaves the reward neutral.
    pub fn finalize(&mut self, counters: &mut AccuracyCounters, reward_win: f32) -> EpisodeOutcome {
        let reward = self.reward.value;
        let reason = self.reward.reason;
        let frames = self.frame_count;

        self.apply(ModeEvent::EpisodeTerminal);
        self.frame_count = 0;
        self.distance.reset();
        self.velocities.iter_mut().for_each(|v| *v = 0.0);

        let won = counters.record(reward, reward_win);
        self.reward.clear();

        EpisodeOutcome {
            episode: counters.total_episodes,
            reward,
            won,
            reason,
            frames,
            successful: counters.successful_episodes,
            total: counters.total_episodes,
            accuracy: counters.accuracy(),
        }
    }
}
