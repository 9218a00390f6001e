// src/types.rs
//
// Common shared types for the arm control core: joint references and the
// two inbound message payloads (camera frames and contact pairs).

use serde::{Deserialize, Serialize};

/// Simulated time in seconds, as reported by the host's update event.
pub type SimTime = f64;

/// Ordered joint targets, one per controlled degree of freedom.
///
/// Every mutation goes through [`JointReference::set`] or
/// [`JointReference::nudge`], which clamp into `[min, max]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointReference {
    values: Vec<f32>,
    min: f32,
    max: f32,
}

impl JointReference {
    /// Build a reference from initial values, clamping each into bounds.
    pub fn new(initial: &[f32], min: f32, max: f32) -> Self {
        Self {
            values: initial.iter().map(|v| v.clamp(min, max)).collect(),
            min,
            max,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, joint: usize) -> Option<f32> {
        self.values.get(joint).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// Set a joint, clamped. Returns true when the value hit a bound.
    pub fn set(&mut self, joint: usize, value: f32) -> bool {
        let Some(slot) = self.values.get_mut(joint) else {
            return false;
        };
        let clamped = value.clamp(self.min, self.max);
        *slot = clamped;
        clamped != value
    }

    /// Add `delta` to a joint, clamped. Returns true when the value hit a bound.
    pub fn nudge(&mut self, joint: usize, delta: f32) -> bool {
        match self.get(joint) {
            Some(current) => self.set(joint, current + delta),
            None => false,
        }
    }

    pub fn within_bounds(&self) -> bool {
        self.values.iter().all(|v| *v >= self.min && *v <= self.max)
    }
}

/// Raw camera frame as delivered by the host's image topic.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes.
    pub step: u32,
    /// Packed pixel bytes, `step * height` long.
    pub data: Vec<u8>,
}

impl ImageFrame {
    /// Packed frame with a stride of `width * bytes_per_pixel`.
    pub fn packed(width: u32, height: u32, bytes_per_pixel: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            step: width.saturating_mul(bytes_per_pixel),
            data,
        }
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        if self.width == 0 {
            0
        } else {
            self.step / self.width
        }
    }
}

/// One collision pair reported by the contact sensor, surfaces named by
/// their qualified `model::link::collision` path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub collision1: String,
    pub collision2: String,
}

impl Contact {
    pub fn new(collision1: impl Into<String>, collision2: impl Into<String>) -> Self {
        Self {
            collision1: collision1.into(),
            collision2: collision2.into(),
        }
    }
}
