use ptv_core::nalgebra::Point3;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// An axis aligned box in world coordinates that bounds where particles can be.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Volume {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Volume {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// Whether the point lies inside the box or on its boundary.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (0..3).all(|axis| self.min[axis] <= point[axis] && point[axis] <= self.max[axis])
    }

    pub fn is_valid(&self) -> bool {
        (0..3).all(|axis| {
            self.min[axis].is_finite()
                && self.max[axis].is_finite()
                && self.min[axis] <= self.max[axis]
        })
    }
}

/// The settings for the correspondence search.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CorrespondenceSettings {
    /// The largest distance between the rays of two targets, in world units, for them
    /// to be considered views of the same particle.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_epipolar_tolerance")
    )]
    pub epipolar_tolerance: f64,
    /// The smallest number of cameras that must agree on a particle.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_min_cameras"))]
    pub min_cameras: usize,
    /// Triangulated points outside of this volume are discarded.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub volume: Option<Volume>,
}

impl Default for CorrespondenceSettings {
    fn default() -> Self {
        Self {
            epipolar_tolerance: default_epipolar_tolerance(),
            min_cameras: default_min_cameras(),
            volume: None,
        }
    }
}

fn default_epipolar_tolerance() -> f64 {
    0.5
}

fn default_min_cameras() -> usize {
    2
}
