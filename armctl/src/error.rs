// src/error.rs
//
// Error taxonomy for the control core.
//
// None of these are fatal to the process: the engine records them in the
// tick report, logs them, and carries on with the next tick.

use std::fmt;

/// Kind of scene object the engine looks up through the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneObjectKind {
    /// The target prop the gripper should touch.
    Target,
    /// The gripper link of the arm.
    Gripper,
}

impl SceneObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneObjectKind::Target => "target",
            SceneObjectKind::Gripper => "gripper",
        }
    }
}

/// Errors raised by the perception, agent and reward paths.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// Camera frame with an unsupported pixel depth.
    Format { bits_per_pixel: u32 },
    /// Camera frame whose byte count or stride does not fit its dimensions.
    FrameSize {
        width: u32,
        height: u32,
        step: u32,
        bytes: usize,
    },
    /// Staging buffer could not be sized for an incoming frame.
    Allocation { bytes: usize },
    /// Staged frame could not be converted into the policy tensor layout.
    Conversion { message: String },
    /// Policy agent could not be constructed.
    AgentCreation(String),
    /// Policy agent failed (or timed out) while selecting an action.
    Inference(String),
    /// Policy agent returned an action outside `[0, num_actions)`.
    InvalidAction { action: i64, num_actions: usize },
    /// Target or gripper could not be found in the scene.
    MissingSceneObject { kind: SceneObjectKind, name: String },
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Format { bits_per_pixel } => write!(
                f,
                "expected 24bpp packed RGB frame from camera, got {} bpp",
                bits_per_pixel
            ),
            ControlError::FrameSize {
                width,
                height,
                step,
                bytes,
            } => write!(
                f,
                "camera frame {}x{} with stride {} does not fit {} bytes",
                width, height, step, bytes
            ),
            ControlError::Allocation { bytes } => {
                write!(f, "failed to allocate {} byte frame staging buffer", bytes)
            }
            ControlError::Conversion { message } => {
                write!(f, "failed to convert staged frame: {}", message)
            }
            ControlError::AgentCreation(msg) => write!(f, "failed to create agent: {}", msg),
            ControlError::Inference(msg) => {
                write!(f, "failed to generate agent's next action: {}", msg)
            }
            ControlError::InvalidAction {
                action,
                num_actions,
            } => write!(
                f,
                "agent selected invalid action {} (valid range 0..{})",
                action, num_actions
            ),
            ControlError::MissingSceneObject { kind, name } => {
                write!(f, "failed to find {} '{}'", kind.as_str(), name)
            }
        }
    }
}

impl std::error::Error for ControlError {}

impl ControlError {
    /// Short stable tag used in telemetry records.
    pub fn tag(&self) -> &'static str {
        match self {
            ControlError::Format { .. } => "format",
            ControlError::FrameSize { .. } => "frame_size",
            ControlError::Allocation { .. } => "allocation",
            ControlError::Conversion { .. } => "conversion",
            ControlError::AgentCreation(_) => "agent_creation",
            ControlError::Inference(_) => "inference",
            ControlError::InvalidAction { .. } => "invalid_action",
            ControlError::MissingSceneObject { .. } => "missing_scene_object",
        }
    }
}
