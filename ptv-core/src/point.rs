use crate::{FrameIndex, TargetRef};
use nalgebra::Point3;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A triangulated 3d position formed from geometrically consistent targets across two or more cameras.
///
/// The targets are referenced, not owned. At most one target per camera contributes to a point,
/// and the references are sorted by camera.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Candidate3DPoint {
    pub frame: FrameIndex,
    pub position: Point3<f64>,
    pub targets: Vec<TargetRef>,
    /// The root mean square distance of `position` from the rays it was triangulated from.
    pub residual: f64,
}

impl Candidate3DPoint {
    /// The cameras that observed this point, in ascending order.
    pub fn cameras(&self) -> impl Iterator<Item = usize> + '_ {
        self.targets.iter().map(|target| target.camera)
    }

    /// The target this point uses on `camera`, if any.
    pub fn target_on(&self, camera: usize) -> Option<TargetRef> {
        self.targets
            .iter()
            .copied()
            .find(|target| target.camera == camera)
    }
}

/// Identifies a [`Candidate3DPoint`] by its frame and its index in that frame's point list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PointRef {
    pub frame: FrameIndex,
    pub index: usize,
}
