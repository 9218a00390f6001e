// src/geometry.rs
//
// Minimal world-space geometry used by the reward path: points and
// axis-aligned bounding boxes as reported by the simulation host.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Axis-aligned bounding box in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box of the given half extents centred on `center`.
    pub fn around(center: Vec3, half: Vec3) -> Self {
        Self {
            min: Vec3::new(center.x - half.x, center.y - half.y, center.z - half.z),
            max: Vec3::new(center.x + half.x, center.y + half.y, center.z + half.z),
        }
    }

    pub fn center(&self) -> Vec3 {
        Vec3::new(
            0.5 * (self.min.x + self.max.x),
            0.5 * (self.min.y + self.max.y),
            0.5 * (self.min.z + self.max.z),
        )
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// Euclidean gap between two boxes; zero when they overlap.
pub fn box_distance(a: &Aabb, b: &Aabb) -> f32 {
    fn axis_gap(a_min: f32, a_max: f32, b_min: f32, b_max: f32) -> f32 {
        if b_max < a_min {
            b_max - a_min
        } else if b_min > a_max {
            b_min - a_max
        } else {
            0.0
        }
    }

    let dx = axis_gap(a.min.x, a.max.x, b.min.x, b.max.x);
    let dy = axis_gap(a.min.y, a.max.y, b.min.y, b.max.y);
    let dz = axis_gap(a.min.z, a.max.z, b.min.z, b.max.z);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_boxes_have_zero_distance() {
        let a = Aabb::around(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let b = Aabb::around(Vec3::new(0.5, 0.5, 0.5), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(box_distance(&a, &b), 0.0);
        assert!(a.intersects(&b));
    }

    #[test]
    fn separated_boxes_measure_the_gap() {
        let a = Aabb::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        let b = Aabb::new(Vec3::new(4.0, 5.0, 0.0), Vec3::new(5.0, 6.0, 1.0));
        // gaps of 3 on x and 4 on y
        assert!((box_distance(&a, &b) - 5.0).abs() < 1e-6);
        assert!((box_distance(&b, &a) - 5.0).abs() < 1e-6);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn center_is_midpoint() {
        let b = Aabb::new(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 4.0, 4.0));
        assert_eq!(b.center(), Vec3::new(0.0, 2.0, 3.0));
    }
}
