use derive_more::{AsMut, AsRef, From, Into};
use nalgebra::{IsometryMatrix3, Point3, Rotation3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// This contains a world pose, which is a pose of the world relative to the camera.
/// This maps world points into [camera coordinates](https://en.wikipedia.org/wiki/Camera_resectioning#Extrinsic_parameters)
/// where the positive X axis is right, the positive Y axis is down, and the positive Z axis
/// is forwards from the optical center of the camera.
///
/// The unit of distance is whatever the calibration was expressed in (typically millimeters).
#[derive(Debug, Clone, Copy, PartialEq, AsMut, AsRef, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct WorldToCamera(pub IsometryMatrix3<f64>);

impl WorldToCamera {
    /// Creates a pose with no change in position or orientation.
    pub fn identity() -> Self {
        Self(IsometryMatrix3::identity())
    }

    /// Create the pose from rotation and translation.
    pub fn from_parts(translation: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self(IsometryMatrix3::from_parts(translation.into(), rotation))
    }

    /// Creates the pose of a camera sitting at `eye` in world coordinates and looking at `target`.
    ///
    /// `down` is the world direction that should appear as down (+Y) on the image.
    /// It must not be parallel to the viewing direction.
    pub fn looking_at(eye: Point3<f64>, target: Point3<f64>, down: Vector3<f64>) -> Self {
        // `face_towards` maps +Z onto the viewing direction and +Y towards `down`.
        let camera_to_world = Rotation3::face_towards(&(target - eye), &down);
        let rotation = camera_to_world.inverse();
        Self::from_parts(-(rotation * eye.coords), rotation)
    }

    /// Retrieve the isometry.
    pub fn isometry(self) -> IsometryMatrix3<f64> {
        self.0
    }

    /// Maps a world point into the camera's frame of reference.
    pub fn transform(&self, point: Point3<f64>) -> Point3<f64> {
        self.0 * point
    }

    /// Maps a direction in the camera's frame of reference into world coordinates.
    pub fn direction_to_world(&self, direction: Vector3<f64>) -> Vector3<f64> {
        self.0.rotation.inverse() * direction
    }

    /// The position of the optical center in world coordinates.
    pub fn optical_center(&self) -> Point3<f64> {
        self.0.inverse() * Point3::origin()
    }

    /// Checks that all the components of the pose are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.0.rotation.matrix().iter().all(|n| n.is_finite())
            && self.0.translation.vector.iter().all(|n| n.is_finite())
    }
}
