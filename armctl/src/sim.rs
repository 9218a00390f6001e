// src/sim.rs
//
// Kinematic arm harness implementing `SimulationHost`.
//
// Stands in for the physics simulator in the binary and in tests:
//  - a base yaw joint plus a planar shoulder/elbow pair,
//  - joints follow their commands instantly (no dynamics),
//  - a box-shaped target prop standing on the ground,
//  - side-view 24-bit RGB camera frames,
//  - contact batches for gripper/target and ground touches.
//
// Geometry is deliberately coarse: links are points, the gripper is a
// small cube at the end of the second link.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::Config;
use crate::geometry::{Aabb, Vec3};
use crate::host::SimulationHost;
use crate::types::{Contact, ImageFrame, SimTime};

pub const SHOULDER_HEIGHT: f32 = 0.3;
pub const UPPER_ARM_LENGTH: f32 = 0.4;
pub const FOREARM_LENGTH: f32 = 0.4;
pub const GRIPPER_HALF_EXTENT: f32 = 0.03;

/// Camera view window in world coordinates (x right, z up).
const VIEW_X: (f32, f32) = (-0.3, 1.1);
const VIEW_Z: (f32, f32) = (0.0, 1.4);

#[derive(Debug, Clone)]
pub struct KinematicArmSim {
    joint_names: Vec<String>,
    joints: BTreeMap<String, f32>,
    arm_model: String,
    target_model: String,
    gripper_link: String,
    target_surface: String,
    gripper_surface: String,
    ground_surface: String,
    target_home: Vec3,
    target_position: Vec3,
    target_half: Vec3,
    jitter: f32,
    rng: ChaCha8Rng,
    time: SimTime,
    camera_width: u32,
    camera_height: u32,
    dynamics_resets: u64,
}

impl KinematicArmSim {
    pub fn new(cfg: &Config) -> Self {
        let target_home = Vec3::new(0.6, 0.0, 0.0);
        Self {
            joint_names: cfg.joints.names.clone(),
            joints: cfg.joints.names.iter().map(|n| (n.clone(), 0.0)).collect(),
            arm_model: "arm".to_string(),
            target_model: cfg.scene.target_model.clone(),
            gripper_link: cfg.scene.gripper_link.clone(),
            target_surface: cfg.collision.target_surface.clone(),
            gripper_surface: cfg.collision.gripper_surface.clone(),
            ground_surface: cfg.collision.ground_filter.clone(),
            target_home,
            target_position: target_home,
            target_half: Vec3::new(0.04, 0.04, 0.1),
            jitter: 0.0,
            rng: ChaCha8Rng::seed_from_u64(0),
            time: 0.0,
            camera_width: 64,
            camera_height: 64,
            dynamics_resets: 0,
        }
    }

    /// Move the target along x by up to `amplitude` on every dynamics reset.
    pub fn with_target_jitter(mut self, seed: u64, amplitude: f32) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.jitter = amplitude.abs();
        self
    }

    pub fn with_camera(mut self, width: u32, height: u32) -> Self {
        self.camera_width = width.max(1);
        self.camera_height = height.max(1);
        self
    }

    pub fn with_target_position(mut self, position: Vec3) -> Self {
        self.target_home = position;
        self.target_position = position;
        self
    }

    pub fn time(&self) -> SimTime {
        self.time
    }

    /// Advance simulated time and return the new time.
    pub fn advance(&mut self, dt: SimTime) -> SimTime {
        self.time += dt;
        self.time
    }

    pub fn joint(&self, name: &str) -> Option<f32> {
        self.joints.get(name).copied()
    }

    pub fn dynamics_resets(&self) -> u64 {
        self.dynamics_resets
    }

    fn angle(&self, slot: usize) -> f32 {
        self.joint_names
            .get(slot)
            .and_then(|n| self.joints.get(n))
            .copied()
            .unwrap_or(0.0)
    }

    /// Elbow and gripper positions from the current joint angles.
    ///
    /// Shoulder and elbow angles are measured from vertical; the base
    /// rotates the arm plane about z.
    pub fn forward_kinematics(&self) -> (Vec3, Vec3) {
        let yaw = self.angle(0);
        let q1 = self.angle(1);
        let q2 = self.angle(2);

        let reach1 = UPPER_ARM_LENGTH * q1.sin();
        let elbow_z = SHOULDER_HEIGHT + UPPER_ARM_LENGTH * q1.cos();
        let reach2 = reach1 + FOREARM_LENGTH * (q1 + q2).sin();
        let grip_z = elbow_z + FOREARM_LENGTH * (q1 + q2).cos();

        let elbow = Vec3::new(reach1 * yaw.cos(), reach1 * yaw.sin(), elbow_z);
        let gripper = Vec3::new(reach2 * yaw.cos(), reach2 * yaw.sin(), grip_z);
        (elbow, gripper)
    }

    pub fn gripper_box(&self) -> Aabb {
        let (_, g) = self.forward_kinematics();
        Aabb::around(
            g,
            Vec3::new(GRIPPER_HALF_EXTENT, GRIPPER_HALF_EXTENT, GRIPPER_HALF_EXTENT),
        )
    }

    pub fn target_box(&self) -> Aabb {
        let p = self.target_position;
        Aabb::around(
            Vec3::new(p.x, p.y, p.z + self.target_half.z),
            self.target_half,
        )
    }

    /// Contacts the sensor on the target would report right now.
    ///
    /// The target always rests on the ground; the gripper adds a target
    /// contact when the boxes overlap and a ground contact at floor level.
    pub fn contacts(&self) -> Vec<Contact> {
        let mut out = vec![Contact::new(&self.target_surface, &self.ground_surface)];
        let grip = self.gripper_box();
        if grip.intersects(&self.target_box()) {
            out.push(Contact::new(&self.target_surface, &self.gripper_surface));
        }
        if grip.min.z <= 0.0 {
            out.push(Contact::new(&self.gripper_surface, &self.ground_surface));
        }
        out
    }

    fn to_pixel(&self, p: Vec3) -> (i64, i64) {
        let w = self.camera_width as f32;
        let h = self.camera_height as f32;
        let u = (p.x - VIEW_X.0) / (VIEW_X.1 - VIEW_X.0) * w;
        let v = (1.0 - (p.z - VIEW_Z.0) / (VIEW_Z.1 - VIEW_Z.0)) * h;
        (u.floor() as i64, v.floor() as i64)
    }

    /// Side-view RGB frame: grey floor, red target, white links, blue gripper.
    pub fn render(&self) -> ImageFrame {
        let (w, h) = (self.camera_width as usize, self.camera_height as usize);
        let mut data = vec![0u8; w * h * 3];

        let fill = |data: &mut [u8], min: (i64, i64), max: (i64, i64), rgb: [u8; 3]| {
            let x0 = min.0.clamp(0, w as i64 - 1) as usize;
            let x1 = max.0.clamp(0, w as i64 - 1) as usize;
            let y0 = min.1.clamp(0, h as i64 - 1) as usize;
            let y1 = max.1.clamp(0, h as i64 - 1) as usize;
            for y in y0.min(y1)..=y0.max(y1) {
                for x in x0.min(x1)..=x0.max(x1) {
                    let i = (y * w + x) * 3;
                    data[i..i + 3].copy_from_slice(&rgb);
                }
            }
        };

        let (_, floor_y) = self.to_pixel(Vec3::new(0.0, 0.0, 0.0));
        fill(&mut data, (0, floor_y), (w as i64 - 1, h as i64 - 1), [90, 90, 90]);

        let t = self.target_box();
        fill(
            &mut data,
            self.to_pixel(Vec3::new(t.min.x, 0.0, t.max.z)),
            self.to_pixel(Vec3::new(t.max.x, 0.0, t.min.z)),
            [200, 30, 30],
        );

        let shoulder = Vec3::new(0.0, 0.0, SHOULDER_HEIGHT);
        let (elbow, gripper) = self.forward_kinematics();
        for (a, b) in [(shoulder, elbow), (elbow, gripper)] {
            for k in 0..=16 {
                let s = k as f32 / 16.0;
                let p = Vec3::new(a.x + (b.x - a.x) * s, 0.0, a.z + (b.z - a.z) * s);
                let px = self.to_pixel(p);
                fill(&mut data, px, px, [230, 230, 230]);
            }
        }

        let g = self.gripper_box();
        fill(
            &mut data,
            self.to_pixel(Vec3::new(g.min.x, 0.0, g.max.z)),
            self.to_pixel(Vec3::new(g.max.x, 0.0, g.min.z)),
            [40, 80, 220],
        );

        ImageFrame::packed(self.camera_width, self.camera_height, 3, data)
    }
}

impl SimulationHost for KinematicArmSim {
    fn set_joint_position(&mut self, joint: &str, value: f32) {
        if let Some(slot) = self.joints.get_mut(joint) {
            *slot = value;
        }
    }

    fn model_bounding_box(&self, model: &str) -> Option<Aabb> {
        if model == self.target_model {
            Some(self.target_box())
        } else {
            None
        }
    }

    fn link_bounding_box(&self, link: &str) -> Option<Aabb> {
        if link == self.gripper_link {
            Some(self.gripper_box())
        } else {
            None
        }
    }

    fn link_center_of_gravity(&self, link: &str) -> Option<Vec3> {
        if link == self.gripper_link {
            Some(self.forward_kinematics().1)
        } else {
            None
        }
    }

    fn model_position(&self, model: &str) -> Option<Vec3> {
        if model == self.target_model {
            Some(self.target_position)
        } else if model == self.arm_model {
            Some(Vec3::default())
        } else {
            None
        }
    }

    fn reset_model_dynamics(&mut self, model: &str) {
        if model != self.target_model {
            return;
        }
        self.dynamics_resets += 1;
        let dx = if self.jitter > 0.0 {
            self.rng.gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };
        self.target_position = Vec3::new(
            self.target_home.x + dx,
            self.target_home.y,
            self.target_home.z,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> KinematicArmSim {
        KinematicArmSim::new(&Config::default())
    }

    #[test]
    fn straight_up_arm_is_vertical() {
        let s = sim();
        let (elbow, gripper) = s.forward_kinematics();
        assert!(elbow.x.abs() < 1e-6);
        assert!((gripper.z - (SHOULDER_HEIGHT + UPPER_ARM_LENGTH + FOREARM_LENGTH)).abs() < 1e-5);
    }

    #[test]
    fn folded_arm_touches_ground() {
        let mut s = sim();
        s.set_joint_position("joint1", 1.6);
        s.set_joint_position("joint2", 1.6);
        let grip = s.gripper_box();
        assert!(grip.min.z <= 0.05);
        let cfg = Config::default();
        assert!(s
            .contacts()
            .iter()
            .any(|c| c.collision1 == cfg.collision.gripper_surface
                && c.collision2 == cfg.collision.ground_filter));
    }

    #[test]
    fn gripper_over_target_reports_goal_contact() {
        let cfg = Config::default();
        let mut s = sim();
        // place the target right under the gripper
        let (_, g) = s.forward_kinematics();
        s = s.with_target_position(Vec3::new(g.x, g.y, g.z - 0.15));
        assert!(s
            .contacts()
            .iter()
            .any(|c| c.collision2 == cfg.collision.gripper_surface));
    }

    #[test]
    fn render_is_24bpp() {
        let frame = sim().render();
        assert_eq!(frame.width, 64);
        assert_eq!(frame.bytes_per_pixel(), 3);
        assert_eq!(frame.data.len(), 64 * 64 * 3);
        assert!(frame.data.iter().any(|b| *b == 200));
    }

    #[test]
    fn jitter_is_seeded() {
        let mut a = sim().with_target_jitter(7, 0.1);
        let mut b = sim().with_target_jitter(7, 0.1);
        a.reset_model_dynamics("tube");
        b.reset_model_dynamics("tube");
        assert_eq!(a.model_position("tube"), b.model_position("tube"));
        assert_eq!(a.dynamics_resets(), 1);
        let x = a.model_position("tube").unwrap().x;
        assert!((0.5..=0.7).contains(&x));
    }
}
