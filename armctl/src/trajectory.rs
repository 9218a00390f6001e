// src/trajectory.rs
//
// Scripted return-to-home animation that runs between episodes.

use crate::types::JointReference;

/// What a single animation step reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryEvent {
    InProgress,
    /// Halfway point; the engine resets the target's dynamics here.
    Midpoint,
    /// Animation finished; the counter has wrapped to zero.
    Complete,
}

#[derive(Debug, Clone)]
pub struct TrajectoryController {
    step: f32,
    animation_steps: u32,
    counter: u32,
}

impl TrajectoryController {
    /// `step` is the per-tick joint movement, normally
    /// `(joint_max - joint_min) / animation_steps`.
    pub fn new(step: f32, animation_steps: u32) -> Self {
        Self {
            step: step.abs(),
            animation_steps: animation_steps.max(1),
            counter: 0,
        }
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Move every joint one step toward `home` and advance the counter.
    ///
    /// A joint within one step of home lands exactly on it. Joints past the
    /// end of `home` are left alone.
    pub fn step(&mut self, reference: &mut JointReference, home: &[f32]) -> TrajectoryEvent {
        for (joint, target) in home.iter().enumerate().take(reference.len()) {
            let Some(current) = reference.get(joint) else {
                continue;
            };
            let diff = target - current;
            let next = if diff.abs() <= self.step {
                *target
            } else {
                current + self.step.copysign(diff)
            };
            reference.set(joint, next);
        }

        self.counter += 1;
        if self.counter > self.animation_steps {
            self.counter = 0;
            TrajectoryEvent::Complete
        } else if self.counter == self.animation_steps / 2 {
            TrajectoryEvent::Midpoint
        } else {
            TrajectoryEvent::InProgress
        }
    }

    pub fn reset(&mut self) {
        self.counter = 0;
    }
}
