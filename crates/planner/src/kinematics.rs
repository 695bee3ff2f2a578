//! Kinematics: the fixed Cartesian mapping from millimeters to stepper axes.
//!
//! The original supports only independent X/Y/Z lead-screw axes; there is no
//! CoreXY-style coupled transform here, matching the "no >3-axis kinematics"
//! scope of this controller.

use crate::CartesianPoint;

#[cfg(not(feature = "std"))]
use libm::sqrtf;
#[cfg(feature = "std")]
fn sqrtf(x: f32) -> f32 {
    x.sqrt()
}

/// Translates Cartesian millimeter coordinates into stepper-space distances.
pub trait Kinematics {
    const AXES: usize;

    /// Stepper position, in steps, for a given Cartesian point.
    fn cartesian_to_steps(&self, point: CartesianPoint) -> [i64; 3];

    /// Euclidean length of a Cartesian move, in millimeters. The planner uses
    /// this (not the stepper-space distance) to size the trapezoid, matching
    /// the original's `millimeters_of_travel` computed from the Cartesian
    /// delta, never from the step delta.
    fn cartesian_distance(&self, from: CartesianPoint, to: CartesianPoint) -> f32 {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let dz = to.z - from.z;
        sqrtf(dx * dx + dy * dy + dz * dz)
    }
}

/// Independent X/Y/Z lead-screw axes; each stepper maps directly to one
/// Cartesian axis.
#[derive(Debug, Clone, Copy)]
pub struct CartesianKinematics {
    pub steps_per_mm: [f32; 3],
}

impl Kinematics for CartesianKinematics {
    const AXES: usize = 3;

    fn cartesian_to_steps(&self, point: CartesianPoint) -> [i64; 3] {
        [
            (point.x * self.steps_per_mm[0]).round() as i64,
            (point.y * self.steps_per_mm[1]).round() as i64,
            (point.z * self.steps_per_mm[2]).round() as i64,
        ]
    }
}
