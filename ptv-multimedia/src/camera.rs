use crate::{CameraIntrinsicsK1Distortion, Multimedia, NormalizedKeyPoint};
use nalgebra::{Point3, UnitVector3};
use ptv_core::{CameraModel, ImagePoint, KeyPoint, Ray, WorldToCamera};

/// A fully calibrated camera of a PTV rig.
///
/// This combines the lens ([`CameraIntrinsicsK1Distortion`]), the pose of the camera in the
/// world ([`WorldToCamera`]) and the refractive interfaces between the camera and the
/// observation medium ([`Multimedia`]).
///
/// The model is immutable once built. A new calibration replaces the camera as a whole.
#[derive(Debug, Clone, PartialEq)]
pub struct MultimediaCamera {
    id: usize,
    intrinsics: CameraIntrinsicsK1Distortion,
    pose: WorldToCamera,
    multimedia: Multimedia,
}

impl MultimediaCamera {
    /// Builds the camera, validating that every parameter is usable.
    pub fn new(
        id: usize,
        intrinsics: CameraIntrinsicsK1Distortion,
        pose: WorldToCamera,
        multimedia: Multimedia,
    ) -> Result<Self, String> {
        if !intrinsics.is_valid() {
            return Err("intrinsics must be finite with positive focal lengths".to_owned());
        }
        if !pose.is_finite() {
            return Err("pose is not finite".to_owned());
        }
        multimedia.validate()?;
        let camera = Self {
            id,
            intrinsics,
            pose,
            multimedia,
        };
        if !camera.multimedia.is_homogeneous() {
            let center = camera.pose.optical_center();
            if camera.multimedia.normal.dot(&center.coords) <= camera.multimedia.offset {
                return Err("optical center is not in front of the first interface".to_owned());
            }
        }
        Ok(camera)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn intrinsics(&self) -> &CameraIntrinsicsK1Distortion {
        &self.intrinsics
    }

    pub fn pose(&self) -> WorldToCamera {
        self.pose
    }

    pub fn multimedia(&self) -> &Multimedia {
        &self.multimedia
    }

    /// The position of the optical center in world coordinates.
    pub fn optical_center(&self) -> Point3<f64> {
        self.pose.optical_center()
    }

    /// The line of sight leaving the optical center through `point`, in world coordinates.
    ///
    /// This is the direction before any refraction takes place.
    pub fn line_of_sight<P>(&self, point: P) -> Option<UnitVector3<f64>>
    where
        P: ImagePoint,
    {
        let bearing = self.intrinsics.calibrate(point).bearing_unnormalized();
        UnitVector3::try_new(self.pose.direction_to_world(bearing), f64::EPSILON)
    }
}

impl CameraModel for MultimediaCamera {
    fn project(&self, point: Point3<f64>) -> Option<KeyPoint> {
        let center = self.optical_center();
        let sight = self.multimedia.line_of_sight(center, point)?;
        let camera_point = self.pose.transform(center + sight.into_inner());
        let normalized = NormalizedKeyPoint::from_camera_point(camera_point.coords)?;
        self.intrinsics.uncalibrate(normalized)
    }

    fn backproject<P>(&self, point: P) -> Option<Ray>
    where
        P: ImagePoint,
    {
        let sight = self.line_of_sight(point)?;
        self.multimedia.trace(self.optical_center(), sight)
    }
}
