//! armctl core library.
//!
//! Decision and control core for a reinforcement-learning robotic arm.
//! Camera frames become actions through a policy agent; contacts and scene
//! geometry become rewards that close the learning loop. The binary
//! (`src/main.rs`) drives the engine against a kinematic arm harness.
//!
//! # Architecture
//!
//! - **Perception** (`perception`): single-slot frame handoff from the
//!   host's image thread, plus conversion into the policy tensor.
//! - **Collision** (`collision`): contact filtering on the host's contact
//!   thread; raises a goal latch.
//! - **Trajectory** (`trajectory`): scripted return-to-home between
//!   episodes.
//! - **Engine** (`engine`): per-tick orchestration of modes, actions,
//!   rewards and episode bookkeeping (`state`, `reward`, `actions`).
//! - **Agent** (`agent`): policy trait, factory and reference agents.
//! - **Host** (`host`, `sim`): simulator abstraction and the kinematic
//!   harness.

pub mod actions;
pub mod agent;
pub mod collision;
pub mod config;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod host;
pub mod logging;
pub mod perception;
pub mod reward;
pub mod sim;
pub mod state;
pub mod telemetry;
pub mod trajectory;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use agent::{
    AgentFactory, DeadlineAgent, DeadlineFactory, EpsilonGreedyAgent, EpsilonGreedyFactory,
    PolicyAgent,
};
pub use config::{ActuationMode, Config};
pub use engine::{Engine, TickReport};
pub use error::ControlError;
pub use host::SimulationHost;
pub use logging::{EventSink, JsonlSink, NoopSink};
pub use perception::{PerceptionBuffer, PerceptionTensor, PixelConverter, PlanarBgrConverter};
pub use sim::KinematicArmSim;
pub use state::{ControlMode, EpisodeOutcome, TerminationReason};
pub use types::{Contact, ImageFrame, JointReference};
