// src/engine.rs
//
// Per-tick orchestrator for the arm:
//
//  - builds the policy agent once the simulation has warmed up,
//  - drains the goal-contact latch raised on the contact thread,
//  - runs the scripted return-to-home animation or one agent step,
//  - writes joint references back to the host,
//  - forces a neutral terminal when the episode runs out of frames,
//  - turns scene geometry into ground-contact or shaping rewards,
//  - submits at most one reward per tick and finalizes terminal episodes.
//
// The engine is single-threaded and never blocks on the producers; the
// perception and collision handles it gives out are the only shared state.

use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::actions::{apply_action, decode_action};
use crate::agent::{AgentFactory, PolicyAgent};
use crate::collision::{CollisionObserver, ContactSignal};
use crate::config::{Config, ConfigError};
use crate::error::ControlError;
use crate::host::SimulationHost;
use crate::logging::{EventSink, NoopSink};
use crate::perception::{PerceptionBuffer, PerceptionTensor, PixelConverter, PlanarBgrConverter};
use crate::reward::{GeometryReward, RewardShaper, SceneSample};
use crate::state::{
    AccuracyCounters, ControlMode, EpisodeOutcome, EpisodeState, ModeEvent, RewardSubmission,
};
use crate::trajectory::{TrajectoryController, TrajectoryEvent};
use crate::types::{JointReference, SimTime};

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub sim_time: SimTime,
    /// Mode at the end of the tick.
    pub mode: ControlMode,
    pub agent_ready: bool,
    pub had_new_frame: bool,
    pub frame_count: u32,
    /// Raw action returned by the agent, valid or not.
    pub action: Option<i64>,
    /// Joint references were written to the host.
    pub actuated: bool,
    #[serde(skip)]
    pub trajectory: Option<TrajectoryEvent>,
    /// A goal contact was applied this tick.
    pub goal_contact: bool,
    pub reward: Option<RewardSubmission>,
    pub goal_distance: Option<f32>,
    pub avg_goal_delta: Option<f32>,
    pub finalized: Option<EpisodeOutcome>,
    #[serde(skip)]
    pub failures: Vec<ControlError>,
}

impl TickReport {
    /// Report for a tick that did nothing.
    pub fn inert(tick: u64, sim_time: SimTime, mode: ControlMode) -> Self {
        Self {
            tick,
            sim_time,
            mode,
            agent_ready: false,
            had_new_frame: false,
            frame_count: 0,
            action: None,
            actuated: false,
            trajectory: None,
            goal_contact: false,
            reward: None,
            goal_distance: None,
            avg_goal_delta: None,
            finalized: None,
            failures: Vec::new(),
        }
    }
}

pub struct Engine<F: AgentFactory, S: EventSink = NoopSink> {
    cfg: Config,
    factory: F,
    sink: S,
    agent: Option<Box<dyn PolicyAgent>>,
    tensor: Option<PerceptionTensor>,
    converter: Box<dyn PixelConverter>,
    perception: PerceptionBuffer,
    collision: CollisionObserver,
    trajectory: TrajectoryController,
    shaper: RewardShaper,
    reference: JointReference,
    home: Vec<f32>,
    state: EpisodeState,
    counters: AccuracyCounters,
    tick: u64,
    creation_failures: u64,
}

impl<F: AgentFactory> Engine<F, NoopSink> {
    pub fn new(cfg: Config, factory: F) -> Result<Self, ConfigError> {
        Engine::with_sink(cfg, factory, NoopSink)
    }
}

impl<F: AgentFactory, S: EventSink> Engine<F, S> {
    pub fn with_sink(cfg: Config, factory: F, sink: S) -> Result<Self, ConfigError> {
        cfg.validate()?;

        let home = cfg.joints.home_reference();
        let reference = JointReference::new(&home, cfg.joints.joint_min, cfg.joints.joint_max);
        let trajectory = TrajectoryController::new(
            cfg.joints.animation_step(cfg.episode.animation_steps),
            cfg.episode.animation_steps,
        );
        let collision =
            CollisionObserver::new(cfg.collision.clone(), Arc::new(ContactSignal::default()));
        let state = EpisodeState::new(cfg.joints.active_dof(), cfg.episode.loop_animation);
        collision.signal().set_agent_driven(state.mode.is_agent_driven());

        Ok(Self {
            shaper: RewardShaper::new(&cfg.reward),
            factory,
            sink,
            agent: None,
            tensor: None,
            converter: Box::new(PlanarBgrConverter),
            perception: PerceptionBuffer::new(),
            collision,
            trajectory,
            reference,
            home,
            state,
            counters: AccuracyCounters::default(),
            tick: 0,
            creation_failures: 0,
            cfg,
        })
    }

    pub fn with_converter(mut self, converter: Box<dyn PixelConverter>) -> Self {
        self.converter = converter;
        self
    }

    /// Handle for the host's image callback.
    pub fn perception_handle(&self) -> PerceptionBuffer {
        self.perception.clone()
    }

    /// Observer for the host's contact callback.
    pub fn contact_observer(&self) -> CollisionObserver {
        self.collision.clone()
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn mode(&self) -> ControlMode {
        self.state.mode
    }

    pub fn counters(&self) -> AccuracyCounters {
        self.counters
    }

    pub fn reference(&self) -> &JointReference {
        &self.reference
    }

    pub fn has_agent(&self) -> bool {
        self.agent.is_some()
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn sync_mode_mirror(&self) {
        self.collision
            .signal()
            .set_agent_driven(self.state.mode.is_agent_driven());
    }

    fn ensure_agent(&mut self, sim_time: SimTime, report: &mut TickReport) -> bool {
        if self.agent.is_some() {
            return true;
        }
        if sim_time <= self.cfg.episode.agent_warmup_s {
            return false;
        }

        match self.factory.create(
            &self.cfg.agent,
            self.cfg.joints.num_actions(),
            self.cfg.perception,
        ) {
            Ok(agent) => {
                info!(
                    "[engine] agent {} ready at t={:.3}s ({} actions, {}x{}x{} input)",
                    agent.version(),
                    sim_time,
                    self.cfg.joints.num_actions(),
                    self.cfg.perception.width,
                    self.cfg.perception.height,
                    self.cfg.perception.channels
                );
                self.agent = Some(agent);
                self.tensor = Some(PerceptionTensor::new(self.cfg.perception));
                true
            }
            Err(err) => {
                if self.creation_failures == 0 {
                    warn!("[engine] {}", err);
                } else {
                    debug!("[engine] {} (attempt {})", err, self.creation_failures + 1);
                }
                self.creation_failures += 1;
                report.failures.push(err);
                false
            }
        }
    }

    /// Run one simulation tick.
    pub fn on_update<H: SimulationHost + ?Sized>(
        &mut self,
        host: &mut H,
        sim_time: SimTime,
    ) -> TickReport {
        self.tick += 1;
        let mut report = TickReport::inert(self.tick, sim_time, self.state.mode);

        if !self.ensure_agent(sim_time, &mut report) {
            self.sink.log_tick(&report);
            return report;
        }
        report.agent_ready = true;

        // Goal contact raised on the contact thread since the last tick.
        if let Some(contact) = self.collision.signal().drain() {
            if self.state.mode.is_agent_driven() {
                debug!(
                    "[engine] goal contact {} <-> {}",
                    contact.collision1, contact.collision2
                );
                self.state.reward.raise_goal(self.cfg.reward.reward_win);
                report.goal_contact = true;
            } else {
                debug!("[engine] discarded goal contact latched before reset");
            }
        }

        let had_new_frame = self.perception.is_ready() && self.state.mode.is_agent_driven();
        report.had_new_frame = had_new_frame;

        match self.state.mode {
            ControlMode::ScriptedReset { .. } => self.step_animation(host, &mut report),
            ControlMode::AgentDriven if had_new_frame => self.step_agent(&mut report),
            ControlMode::AgentDriven => {}
        }

        if report.actuated {
            self.write_joints(host);
        }

        let max_frames = self.cfg.episode.max_episode_length;
        if max_frames > 0 && self.state.frame_count > max_frames && !self.state.reward.terminal {
            info!(
                "[engine] episode exceeded {} frames; forcing end of episode",
                max_frames
            );
            self.state.reward.force_timeout();
        }

        if had_new_frame && !self.state.reward.pending {
            self.evaluate_geometry(host, &mut report);
        }

        self.submit_and_finalize(&mut report);

        report.mode = self.state.mode;
        report.frame_count = self.state.frame_count;
        self.sink.log_tick(&report);
        report
    }

    fn step_animation<H: SimulationHost + ?Sized>(&mut self, host: &mut H, report: &mut TickReport) {
        let event = self.trajectory.step(&mut self.reference, &self.home);
        report.actuated = true;
        report.trajectory = Some(event);

        match event {
            TrajectoryEvent::Midpoint => {
                host.reset_model_dynamics(&self.cfg.scene.target_model);
            }
            TrajectoryEvent::Complete => {
                self.state.apply(ModeEvent::AnimationComplete);
                self.sync_mode_mirror();
                if self.state.mode.is_agent_driven() {
                    info!("[engine] reset animation complete; agent driving");
                }
            }
            TrajectoryEvent::InProgress => {}
        }
    }

    fn step_agent(&mut self, report: &mut TickReport) {
        self.state.frame_count += 1;

        let (Some(agent), Some(tensor)) = (self.agent.as_mut(), self.tensor.as_mut()) else {
            return;
        };

        if let Err(err) = self.perception.take_into(tensor, self.converter.as_ref()) {
            warn!("[engine] {}", err);
            report.failures.push(err);
            return;
        }

        let raw = match agent.select_action(tensor) {
            Ok(a) => a,
            Err(err) => {
                warn!("[engine] {}", err);
                report.failures.push(err);
                return;
            }
        };
        report.action = Some(raw);

        let dof = self.cfg.joints.active_dof();
        match decode_action(raw, dof) {
            Ok(action) => {
                apply_action(
                    action,
                    self.cfg.actuation,
                    &self.cfg.joints,
                    &mut self.reference,
                    &mut self.state.velocities,
                );
                report.actuated = true;
            }
            Err(err) => {
                warn!("[engine] {}", err);
                report.failures.push(err);
            }
        }
    }

    fn write_joints<H: SimulationHost + ?Sized>(&self, host: &mut H) {
        if self.cfg.joints.lock_base {
            if let Some(base) = self.cfg.joints.base_joint_name() {
                host.set_joint_position(base, 0.0);
            }
        }
        for (name, value) in self
            .cfg
            .joints
            .driven_joint_names()
            .iter()
            .zip(self.reference.as_slice())
        {
            host.set_joint_position(name, *value);
        }
    }

    fn evaluate_geometry<H: SimulationHost + ?Sized>(&mut self, host: &H, report: &mut TickReport) {
        let sample = match SceneSample::query(host, &self.cfg.scene) {
            Ok(s) => s,
            Err(err) => {
                warn!("[engine] {}", err);
                report.failures.push(err);
                return;
            }
        };

        match self.shaper.evaluate(&sample, self.state.frame_count) {
            GeometryReward::GroundContact => {
                info!("[engine] ground contact; ending episode");
                self.state.reward.raise_ground_contact(self.cfg.reward.reward_loss);
            }
            outcome => {
                if let GeometryReward::Shaping { value } = outcome {
                    self.state.reward.shape(value);
                }
                let distance = sample.goal_distance();
                let avg = self.state.distance.update(distance);
                report.goal_distance = Some(distance);
                report.avg_goal_delta = Some(avg);
            }
        }
    }

    fn submit_and_finalize(&mut self, report: &mut TickReport) {
        let Some(submission) = self.state.reward.take() else {
            return;
        };
        report.reward = Some(submission);

        if let Some(agent) = self.agent.as_mut() {
            if let Err(err) = agent.submit_reward(submission.value, submission.terminal) {
                warn!("[engine] {}", err);
                report.failures.push(err);
            }
        }

        if submission.terminal {
            let outcome = self
                .state
                .finalize(&mut self.counters, self.cfg.reward.reward_win);
            self.trajectory.reset();
            self.sync_mode_mirror();
            info!("{}", outcome.progress_line());
            self.sink.log_episode(&outcome);
            report.finalized = Some(outcome);
        }
    }
}
