// src/actions.rs
//
// Discrete action encoding for the arm and its application to the joint
// references.
//
// The policy outputs an integer in `[0, 2 * dof)`:
// - `joint = action / 2`
// - odd actions decrease the joint, even actions increase it.
//
// In position actuation the action nudges that joint's reference. In
// velocity actuation it nudges the joint's velocity and every reference
// then integrates its velocity; a joint pinned at a bound stops.

use serde::{Deserialize, Serialize};

use crate::config::{ActuationMode, JointConfig};
use crate::error::ControlError;
use crate::types::JointReference;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
}

impl Direction {
    pub fn sign(&self) -> f32 {
        match self {
            Direction::Increase => 1.0,
            Direction::Decrease => -1.0,
        }
    }
}

/// Decoded action: which joint and which way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointAction {
    pub joint: usize,
    pub direction: Direction,
}

impl JointAction {
    pub fn encode(&self) -> i64 {
        let offset = match self.direction {
            Direction::Increase => 0,
            Direction::Decrease => 1,
        };
        (self.joint * 2 + offset) as i64
    }
}

/// Decode a raw policy output for an arm with `dof` driven joints.
pub fn decode_action(action: i64, dof: usize) -> Result<JointAction, ControlError> {
    let num_actions = dof * 2;
    if action < 0 || action as u64 >= num_actions as u64 {
        return Err(ControlError::InvalidAction {
            action,
            num_actions,
        });
    }
    let action = action as usize;
    let direction = if action % 2 == 1 {
        Direction::Decrease
    } else {
        Direction::Increase
    };
    Ok(JointAction {
        joint: action / 2,
        direction,
    })
}

/// Apply a decoded action in the given actuation mode.
///
/// `velocities` must hold one entry per reference slot; it is only read
/// and written in velocity mode.
pub fn apply_action(
    action: JointAction,
    mode: ActuationMode,
    joints: &JointConfig,
    reference: &mut JointReference,
    velocities: &mut [f32],
) {
    match mode {
        ActuationMode::Position => {
            reference.nudge(action.joint, action.direction.sign() * joints.action_joint_delta);
        }
        ActuationMode::Velocity => {
            if let Some(v) = velocities.get_mut(action.joint) {
                let next = *v + action.direction.sign() * joints.action_velocity_delta;
                *v = next.clamp(joints.velocity_min, joints.velocity_max);
            }
            for (joint, v) in velocities.iter_mut().enumerate().take(reference.len()) {
                if reference.nudge(joint, *v) {
                    *v = 0.0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn joints() -> JointConfig {
        Config::default().joints
    }

    #[test]
    fn decode_maps_joint_and_direction() {
        assert_eq!(
            decode_action(0, 2).unwrap(),
            JointAction {
                joint: 0,
                direction: Direction::Increase
            }
        );
        assert_eq!(
            decode_action(3, 2).unwrap(),
            JointAction {
                joint: 1,
                direction: Direction::Decrease
            }
        );
        assert_eq!(decode_action(3, 2).unwrap().encode(), 3);
    }

    #[test]
    fn decode_rejects_out_of_range() {
        assert_eq!(
            decode_action(4, 2),
            Err(ControlError::InvalidAction {
                action: 4,
                num_actions: 4
            })
        );
        assert!(decode_action(-1, 2).is_err());
    }

    #[test]
    fn position_action_moves_one_delta() {
        let j = joints();
        let mut r = JointReference::new(&[0.0, 0.0], j.joint_min, j.joint_max);
        let mut v = [0.0; 2];
        apply_action(decode_action(0, 2).unwrap(), ActuationMode::Position, &j, &mut r, &mut v);
        assert!((r.get(0).unwrap() - 0.15).abs() < 1e-6);
        assert_eq!(r.get(1), Some(0.0));
    }

    #[test]
    fn position_action_clamps_at_min() {
        let j = joints();
        let mut r = JointReference::new(&[j.joint_min, 0.0], j.joint_min, j.joint_max);
        let mut v = [0.0; 2];
        apply_action(decode_action(1, 2).unwrap(), ActuationMode::Position, &j, &mut r, &mut v);
        assert_eq!(r.get(0), Some(j.joint_min));
    }

    #[test]
    fn velocity_action_integrates_and_stops_at_bound() {
        let j = joints();
        let mut r = JointReference::new(&[1.95, 0.0], j.joint_min, j.joint_max);
        let mut v = [0.0; 2];
        let up = decode_action(0, 2).unwrap();

        apply_action(up, ActuationMode::Velocity, &j, &mut r, &mut v);
        assert!((v[0] - 0.1).abs() < 1e-6);
        // 1.95 + 0.1 overshoots the upper bound
        assert_eq!(r.get(0), Some(j.joint_max));
        assert_eq!(v[0], 0.0);

        apply_action(up, ActuationMode::Velocity, &j, &mut r, &mut v);
        apply_action(up, ActuationMode::Velocity, &j, &mut r, &mut v);
        apply_action(up, ActuationMode::Velocity, &j, &mut r, &mut v);
        assert!(v[0] <= j.velocity_max);
        assert!(r.within_bounds());
    }
}
