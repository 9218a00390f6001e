// src/agent.rs
//
// Policy agent interface and reference agents.
//
// Design:
// - PolicyAgent: maps a perception tensor to a discrete action and
//   receives the reward for it. Learning internals live behind this trait.
// - AgentFactory: builds an agent from hyperparameters once the engine has
//   finished warming up.
// - EpsilonGreedyAgent: seeded exploration with per-action value estimates.
// - DeadlineAgent: runs another agent on a worker thread and bounds the
//   time the tick thread waits for an action.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{AgentConfig, PerceptionConfig};
use crate::error::ControlError;
use crate::perception::PerceptionTensor;

pub const EPSILON_GREEDY_VERSION: &str = "epsilon-greedy-v1";

/// Learning agent driven by the engine.
///
/// Neither call may panic on bad input; failures are returned and the
/// engine carries on with the next tick.
pub trait PolicyAgent: Send {
    /// Short version string for logs and telemetry.
    fn version(&self) -> &str;

    /// Pick an action in `[0, num_actions)` for the current frame.
    fn select_action(&mut self, tensor: &PerceptionTensor) -> Result<i64, ControlError>;

    /// Reward for the most recent action. `terminal` closes the episode.
    fn submit_reward(&mut self, reward: f32, terminal: bool) -> Result<(), ControlError>;
}

/// Builds policy agents.
pub trait AgentFactory {
    fn create(
        &self,
        cfg: &AgentConfig,
        num_actions: usize,
        input: PerceptionConfig,
    ) -> Result<Box<dyn PolicyAgent>, ControlError>;
}

impl<F> AgentFactory for F
where
    F: Fn(&AgentConfig, usize, PerceptionConfig) -> Result<Box<dyn PolicyAgent>, ControlError>,
{
    fn create(
        &self,
        cfg: &AgentConfig,
        num_actions: usize,
        input: PerceptionConfig,
    ) -> Result<Box<dyn PolicyAgent>, ControlError> {
        self(cfg, num_actions, input)
    }
}

/// Epsilon-greedy agent over a table of per-action values.
///
/// The exploration rate decays from `eps_start` to `eps_end` with time
/// constant `eps_decay` selections. Values move toward each reward at
/// `learning_rate`. The frame contents do not influence the choice.
pub struct EpsilonGreedyAgent {
    rng: ChaCha8Rng,
    values: Vec<f32>,
    input_len: usize,
    eps_start: f32,
    eps_end: f32,
    eps_decay: f32,
    learning_rate: f32,
    allow_random: bool,
    debug: bool,
    steps: u64,
    episodes: u64,
    last_action: Option<usize>,
}

impl EpsilonGreedyAgent {
    pub fn new(
        cfg: &AgentConfig,
        num_actions: usize,
        input: PerceptionConfig,
    ) -> Result<Self, ControlError> {
        if num_actions == 0 {
            return Err(ControlError::AgentCreation(
                "agent needs at least one action".to_string(),
            ));
        }
        if !(cfg.learning_rate > 0.0 && cfg.learning_rate <= 1.0) {
            return Err(ControlError::AgentCreation(format!(
                "learning rate {} outside (0, 1]",
                cfg.learning_rate
            )));
        }
        if input.tensor_len() == 0 {
            return Err(ControlError::AgentCreation(
                "input tensor has no elements".to_string(),
            ));
        }

        Ok(Self {
            rng: ChaCha8Rng::seed_from_u64(cfg.seed),
            values: vec![0.0; num_actions],
            input_len: input.tensor_len(),
            eps_start: cfg.eps_start,
            eps_end: cfg.eps_end,
            eps_decay: cfg.eps_decay.max(1) as f32,
            learning_rate: cfg.learning_rate,
            allow_random: cfg.allow_random,
            debug: cfg.debug,
            steps: 0,
            episodes: 0,
            last_action: None,
        })
    }

    /// Current exploration probability.
    pub fn epsilon(&self) -> f32 {
        self.eps_end + (self.eps_start - self.eps_end) * (-(self.steps as f32) / self.eps_decay).exp()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    fn greedy(&self) -> usize {
        let mut best = 0;
        for (i, v) in self.values.iter().enumerate() {
            if *v > self.values[best] {
                best = i;
            }
        }
        best
    }
}

impl PolicyAgent for EpsilonGreedyAgent {
    fn version(&self) -> &str {
        EPSILON_GREEDY_VERSION
    }

    fn select_action(&mut self, tensor: &PerceptionTensor) -> Result<i64, ControlError> {
        if tensor.len() != self.input_len {
            return Err(ControlError::Inference(format!(
                "input tensor has {} elements, expected {}",
                tensor.len(),
                self.input_len
            )));
        }

        let eps = self.epsilon();
        self.steps += 1;
        let action = if self.allow_random && self.rng.gen::<f32>() < eps {
            self.rng.gen_range(0..self.values.len())
        } else {
            self.greedy()
        };
        if self.debug {
            debug!("[agent] step={} eps={:.3} action={}", self.steps, eps, action);
        }
        self.last_action = Some(action);
        Ok(action as i64)
    }

    fn submit_reward(&mut self, reward: f32, terminal: bool) -> Result<(), ControlError> {
        if !reward.is_finite() {
            return Err(ControlError::Inference(format!(
                "non-finite reward {}",
                reward
            )));
        }
        if let Some(a) = self.last_action {
            self.values[a] += self.learning_rate * (reward - self.values[a]);
        }
        if terminal {
            self.last_action = None;
            self.episodes += 1;
        }
        Ok(())
    }
}

/// Factory for [`EpsilonGreedyAgent`].
#[derive(Debug, Default, Clone, Copy)]
pub struct EpsilonGreedyFactory;

impl AgentFactory for EpsilonGreedyFactory {
    fn create(
        &self,
        cfg: &AgentConfig,
        num_actions: usize,
        input: PerceptionConfig,
    ) -> Result<Box<dyn PolicyAgent>, ControlError> {
        Ok(Box::new(EpsilonGreedyAgent::new(cfg, num_actions, input)?))
    }
}

enum Request {
    Select { seq: u64, tensor: PerceptionTensor },
    Reward { reward: f32, terminal: bool },
}

struct Reply {
    seq: u64,
    result: Result<i64, ControlError>,
}

/// Latency-bounded wrapper around another agent.
///
/// The inner agent runs on a dedicated worker thread. `select_action`
/// waits at most `budget` for an answer; on timeout it reports
/// `ControlError::Inference` and keeps failing fast until the late answer
/// has arrived, which is then discarded. Rewards are queued to the worker
/// in order and never block.
pub struct DeadlineAgent {
    version: String,
    budget: Duration,
    requests: Sender<Request>,
    replies: Receiver<Reply>,
    seq: u64,
    in_flight: Option<u64>,
}

impl DeadlineAgent {
    pub fn new(mut inner: Box<dyn PolicyAgent>, budget: Duration) -> Result<Self, ControlError> {
        let version = format!("deadline({})", inner.version());
        let (requests, request_rx) = mpsc::channel::<Request>();
        let (reply_tx, replies) = mpsc::channel::<Reply>();

        thread::Builder::new()
            .name("armctl-agent".to_string())
            .spawn(move || {
                while let Ok(request) = request_rx.recv() {
                    match request {
                        Request::Select { seq, tensor } => {
                            let result = inner.select_action(&tensor);
                            if reply_tx.send(Reply { seq, result }).is_err() {
                                break;
                            }
                        }
                        Request::Reward { reward, terminal } => {
                            if let Err(err) = inner.submit_reward(reward, terminal) {
                                warn!("[agent] {}", err);
                            }
                        }
                    }
                }
            })
            .map_err(|e| ControlError::AgentCreation(format!("failed to spawn agent worker: {}", e)))?;

        Ok(Self {
            version,
            budget,
            requests,
            replies,
            seq: 0,
            in_flight: None,
        })
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    fn drain_late_replies(&mut self) {
        while let Ok(reply) = self.replies.try_recv() {
            if Some(reply.seq) == self.in_flight {
                debug!("[agent] discarded late reply for request {}", reply.seq);
                self.in_flight = None;
            }
        }
    }
}

impl PolicyAgent for DeadlineAgent {
    fn version(&self) -> &str {
        &self.version
    }

    fn select_action(&mut self, tensor: &PerceptionTensor) -> Result<i64, ControlError> {
        self.drain_late_replies();
        if let Some(seq) = self.in_flight {
            return Err(ControlError::Inference(format!(
                "request {} still running past its {} ms budget",
                seq,
                self.budget.as_millis()
            )));
        }

        self.seq += 1;
        let seq = self.seq;
        self.requests
            .send(Request::Select {
                seq,
                tensor: tensor.clone(),
            })
            .map_err(|_| ControlError::Inference("agent worker stopped".to_string()))?;

        loop {
            match self.replies.recv_timeout(self.budget) {
                Ok(reply) if reply.seq == seq => return reply.result,
                Ok(_) => continue,
                Err(RecvTimeoutError::Timeout) => {
                    self.in_flight = Some(seq);
                    return Err(ControlError::Inference(format!(
                        "timed out after {} ms",
                        self.budget.as_millis()
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ControlError::Inference("agent worker stopped".to_string()));
                }
            }
        }
    }

    fn submit_reward(&mut self, reward: f32, terminal: bool) -> Result<(), ControlError> {
        self.requests
            .send(Request::Reward { reward, terminal })
            .map_err(|_| ControlError::Inference("agent worker stopped".to_string()))
    }
}

/// Wraps every agent built by `inner` in a [`DeadlineAgent`] using
/// `AgentConfig::inference_timeout_ms` as the budget.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeadlineFactory<F> {
    inner: F,
}

impl<F: AgentFactory> DeadlineFactory<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F: AgentFactory> AgentFactory for DeadlineFactory<F> {
    fn create(
        &self,
        cfg: &AgentConfig,
        num_actions: usize,
        input: PerceptionConfig,
    ) -> Result<Box<dyn PolicyAgent>, ControlError> {
        let inner = self.inner.create(cfg, num_actions, input)?;
        let budget = Duration::from_millis(cfg.inference_timeout_ms.max(1));
        Ok(Box::new(DeadlineAgent::new(inner, budget)?))
    }
}
