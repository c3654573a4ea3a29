use crate::{ImagePoint, KeyPoint, Ray};
use nalgebra::Point3;

/// Allows conversion between a point in the observation volume and a point on a camera image.
///
/// Implementors account for everything between the sensor and the particle: the lens
/// (intrinsics and distortion), the pose of the camera and any refractive interfaces
/// along the line of sight.
pub trait CameraModel {
    /// Projects a point in world coordinates onto the image in pixel coordinates.
    ///
    /// Since this might not be possible (the point may be behind the camera, or no
    /// refracted path may exist), this operation is fallible.
    fn project(&self, point: Point3<f64>) -> Option<KeyPoint>;

    /// Extracts the ray in world coordinates along which the light that hit the
    /// given pixel travelled inside the observation medium.
    ///
    /// The ray may fail to exist, for instance on total internal reflection.
    fn backproject<P>(&self, point: P) -> Option<Ray>
    where
        P: ImagePoint;
}
