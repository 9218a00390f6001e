// src/reward.rs
//
// Geometry-based reward evaluation.
//
// Each agent frame that did not already produce a reward samples the
// scene and turns it into one of:
// - a terminal loss when the gripper has dropped to the ground threshold;
// - a non-positive shaping reward proportional to the gripper's offset
//   from the target along the world x axis (from the second frame on).

use serde::{Deserialize, Serialize};

use crate::config::{RewardConfig, SceneConfig};
use crate::error::{ControlError, SceneObjectKind};
use crate::geometry::{box_distance, Aabb, Vec3};
use crate::host::SimulationHost;

/// Geometry read from the host for one reward evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneSample {
    pub target_box: Aabb,
    pub target_position: Vec3,
    pub gripper_box: Aabb,
    pub gripper_cog: Vec3,
}

impl SceneSample {
    /// Query the target model and the gripper link.
    pub fn query<H: SimulationHost + ?Sized>(
        host: &H,
        scene: &SceneConfig,
    ) -> Result<SceneSample, ControlError> {
        let missing = |kind: SceneObjectKind, name: &str| ControlError::MissingSceneObject {
            kind,
            name: name.to_string(),
        };

        let target_box = host
            .model_bounding_box(&scene.target_model)
            .ok_or_else(|| missing(SceneObjectKind::Target, &scene.target_model))?;
        let target_position = host
            .model_position(&scene.target_model)
            .ok_or_else(|| missing(SceneObjectKind::Target, &scene.target_model))?;
        let gripper_box = host
            .link_bounding_box(&scene.gripper_link)
            .ok_or_else(|| missing(SceneObjectKind::Gripper, &scene.gripper_link))?;
        let gripper_cog = host
            .link_center_of_gravity(&scene.gripper_link)
            .ok_or_else(|| missing(SceneObjectKind::Gripper, &scene.gripper_link))?;

        Ok(SceneSample {
            target_box,
            target_position,
            gripper_box,
            gripper_cog,
        })
    }

    /// Box-to-box gap between gripper and target.
    pub fn goal_distance(&self) -> f32 {
        box_distance(&self.gripper_box, &self.target_box)
    }
}

/// Outcome of a geometry evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryReward {
    /// Gripper at or below the ground threshold: terminal loss.
    GroundContact,
    /// Non-terminal shaping reward.
    Shaping { value: f32 },
    /// First agent frame of the episode; nothing to report yet.
    Settling,
}

#[derive(Debug, Clone)]
pub struct RewardShaper {
    reward_loss: f32,
    ground_contact_height: f32,
}

impl RewardShaper {
    pub fn new(cfg: &RewardConfig) -> Self {
        Self {
            reward_loss: cfg.reward_loss,
            ground_contact_height: cfg.ground_contact_height,
        }
    }

    pub fn evaluate(&self, sample: &SceneSample, frame_count: u32) -> GeometryReward {
        if sample.gripper_box.min.z <= self.ground_contact_height {
            return GeometryReward::GroundContact;
        }
        if frame_count > 1 {
            let offset = (sample.gripper_cog.x - sample.target_position.x).abs();
            return GeometryReward::Shaping {
                value: self.reward_loss * offset,
            };
        }
        GeometryReward::Settling
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::host::StaticHost;

    fn sample(gripper_min_z: f32, gripper_x: f32) -> SceneSample {
        let gripper_box = Aabb::new(
            Vec3::new(gripper_x - 0.05, -0.05, gripper_min_z),
            Vec3::new(gripper_x + 0.05, 0.05, gripper_min_z + 0.1),
        );
        SceneSample {
            target_box: Aabb::around(Vec3::new(1.0, 0.0, 0.1), Vec3::new(0.05, 0.05, 0.1)),
            target_position: Vec3::new(1.0, 0.0, 0.0),
            gripper_box,
            gripper_cog: gripper_box.center(),
        }
    }

    #[test]
    fn ground_contact_wins_over_shaping() {
        let shaper = RewardShaper::new(&Config::default().reward);
        assert_eq!(shaper.evaluate(&sample(0.03, 0.2), 5), GeometryReward::GroundContact);
        assert_eq!(shaper.evaluate(&sample(0.05, 0.2), 1), GeometryReward::GroundContact);
    }

    #[test]
    fn shaping_is_scaled_x_offset() {
        let shaper = RewardShaper::new(&Config::default().reward);
        match shaper.evaluate(&sample(0.5, 0.6), 2) {
            GeometryReward::Shaping { value } => assert!((value - -0.4).abs() < 1e-5),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(shaper.evaluate(&sample(0.5, 0.6), 1), GeometryReward::Settling);
    }

    #[test]
    fn query_reports_missing_gripper() {
        let scene = Config::default().scene;
        let s = sample(0.5, 0.0);
        let host = StaticHost::new().with_model(&scene.target_model, s.target_box, s.target_position);
        let err = SceneSample::query(&host, &scene).unwrap_err();
        assert_eq!(
            err,
            ControlError::MissingSceneObject {
                kind: SceneObjectKind::Gripper,
                name: "gripperbase".to_string()
            }
        );
    }
}
