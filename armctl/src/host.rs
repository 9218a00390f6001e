// src/host.rs
//
// Simulation host abstraction + a fixed-geometry host used by tests.
//
// The engine never talks to a physics engine directly. Joint commands go
// out and geometry queries come back through `SimulationHost`; the
// kinematic harness in `sim.rs` and `StaticHost` below both implement it.

use std::collections::BTreeMap;

use crate::geometry::{Aabb, Vec3};

/// Outbound joint commands and geometry queries against the simulator.
///
/// Lookups return `None` when the named object does not exist.
pub trait SimulationHost {
    /// Command a joint to a reference position (radians).
    fn set_joint_position(&mut self, joint: &str, value: f32);

    /// World-space bounding box of a whole model.
    fn model_bounding_box(&self, model: &str) -> Option<Aabb>;

    /// World-space bounding box of a link on the arm.
    fn link_bounding_box(&self, link: &str) -> Option<Aabb>;

    /// World-space centre of gravity of a link on the arm.
    fn link_center_of_gravity(&self, link: &str) -> Option<Vec3>;

    /// World-space origin of a model.
    fn model_position(&self, model: &str) -> Option<Vec3>;

    /// Zero the velocities of a model so it settles before the next episode.
    fn reset_model_dynamics(&mut self, model: &str);
}

/// Host with hand-set geometry that records every command it receives.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    /// Last commanded position per joint.
    pub joints: BTreeMap<String, f32>,
    /// Number of `set_joint_position` calls.
    pub joint_writes: u64,
    pub models: BTreeMap<String, (Aabb, Vec3)>,
    pub links: BTreeMap<String, (Aabb, Vec3)>,
    /// Models whose dynamics were reset, in call order.
    pub dynamics_resets: Vec<String>,
}

impl StaticHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, name: &str, bbox: Aabb, position: Vec3) -> Self {
        self.models.insert(name.to_string(), (bbox, position));
        self
    }

    pub fn with_link(mut self, name: &str, bbox: Aabb, cog: Vec3) -> Self {
        self.links.insert(name.to_string(), (bbox, cog));
        self
    }

    /// Move a link, keeping its centre of gravity at the box centre.
    pub fn place_link(&mut self, name: &str, bbox: Aabb) {
        self.links.insert(name.to_string(), (bbox, bbox.center()));
    }

    pub fn joint(&self, name: &str) -> Option<f32> {
        self.joints.get(name).copied()
    }
}

impl SimulationHost for StaticHost {
    fn set_joint_position(&mut self, joint: &str, value: f32) {
        self.joints.insert(joint.to_string(), value);
        self.joint_writes += 1;
    }

    fn model_bounding_box(&self, model: &str) -> Option<Aabb> {
        self.models.get(model).map(|(b, _)| *b)
    }

    fn link_bounding_box(&self, link: &str) -> Option<Aabb> {
        self.links.get(link).map(|(b, _)| *b)
    }

    fn link_center_of_gravity(&self, link: &str) -> Option<Vec3> {
        self.links.get(link).map(|(_, c)| *c)
    }

    fn model_position(&self, model: &str) -> Option<Vec3> {
        self.models.get(model).map(|(_, p)| *p)
    }

    fn reset_model_dynamics(&mut self, model: &str) {
        self.dynamics_resets.push(model.to_string());
    }
}
