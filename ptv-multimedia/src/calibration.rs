use crate::{
    CameraIntrinsics, CameraIntrinsicsK1Distortion, Layer, Multimedia, MultimediaCamera,
};
use nalgebra::{Point2, Rotation3, UnitVector3, Vector2, Vector3};
use ptv_core::WorldToCamera;
use thiserror::Error;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The smallest rig that can triangulate anything.
pub const MIN_CAMERAS: usize = 2;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
    #[error("at least 2 cameras are required, but {0} were configured")]
    InsufficientCameras(usize),
}

/// The refractive interfaces as they are written in a calibration file.
///
/// `normal` does not need to be normalized.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MultimediaParameters {
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_index"))]
    pub n_air: f64,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub layers: Vec<Layer>,
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_index"))]
    pub n_medium: f64,
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_normal"))]
    pub normal: [f64; 3],
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub offset: f64,
}

impl Default for MultimediaParameters {
    fn default() -> Self {
        Self {
            n_air: default_index(),
            layers: vec![],
            n_medium: default_index(),
            normal: default_normal(),
            offset: 0.0,
        }
    }
}

impl MultimediaParameters {
    pub fn to_multimedia(&self) -> Result<Multimedia, CalibrationError> {
        let normal = Vector3::from(self.normal);
        let normal = if normal.iter().all(|n| n.is_finite()) {
            UnitVector3::try_new(normal, f64::EPSILON)
        } else {
            None
        }
        .ok_or_else(|| {
            CalibrationError::InvalidCalibration(
                "interface normal must be a finite non-zero vector".to_owned(),
            )
        })?;
        let multimedia = Multimedia {
            n_air: self.n_air,
            layers: self.layers.clone(),
            n_medium: self.n_medium,
            normal,
            offset: self.offset,
        };
        multimedia
            .validate()
            .map_err(CalibrationError::InvalidCalibration)?;
        Ok(multimedia)
    }
}

fn default_index() -> f64 {
    1.0
}

fn default_normal() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

/// The calibration of one camera as it is written in a calibration file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraParameters {
    /// Focal lengths in pixels along X and Y.
    pub focals: [f64; 2],
    /// Principal point in pixels.
    pub principal_point: [f64; 2],
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub skew: f64,
    /// The K1 radial distortion coefficient.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub k1: f64,
    /// Rotation of the world into the camera frame as a Rodrigues (axis-angle) vector.
    pub rotation: [f64; 3],
    /// Translation of the world into the camera frame.
    pub translation: [f64; 3],
}

impl CameraParameters {
    /// Extracts the parameters of an existing camera.
    pub fn from_camera(camera: &MultimediaCamera) -> Self {
        let intrinsics = camera.intrinsics();
        let isometry = camera.pose().isometry();
        let rotation = isometry.rotation.scaled_axis();
        let translation = isometry.translation.vector;
        Self {
            focals: [intrinsics.pinhole.focals.x, intrinsics.pinhole.focals.y],
            principal_point: [
                intrinsics.pinhole.principal_point.x,
                intrinsics.pinhole.principal_point.y,
            ],
            skew: intrinsics.pinhole.skew,
            k1: intrinsics.k1,
            rotation: [rotation.x, rotation.y, rotation.z],
            translation: [translation.x, translation.y, translation.z],
        }
    }

    pub fn intrinsics(&self) -> CameraIntrinsicsK1Distortion {
        CameraIntrinsicsK1Distortion::new(
            CameraIntrinsics {
                focals: Vector2::from(self.focals),
                principal_point: Point2::from(self.principal_point),
                skew: self.skew,
            },
            self.k1,
        )
    }

    pub fn pose(&self) -> WorldToCamera {
        WorldToCamera::from_parts(
            Vector3::from(self.translation),
            Rotation3::new(Vector3::from(self.rotation)),
        )
    }
}

/// The contents of a calibration file: the shared interfaces and every camera of the rig.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CalibrationParameters {
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub multimedia: MultimediaParameters,
    pub cameras: Vec<CameraParameters>,
}

/// The calibrated camera rig of an experiment.
///
/// A camera's id is its position in the rig.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    cameras: Vec<MultimediaCamera>,
}

impl Calibration {
    /// Creates a rig from already built cameras.
    pub fn new(cameras: Vec<MultimediaCamera>) -> Result<Self, CalibrationError> {
        if cameras.len() < MIN_CAMERAS {
            return Err(CalibrationError::InsufficientCameras(cameras.len()));
        }
        Ok(Self { cameras })
    }

    /// Builds and validates every camera of a calibration file.
    pub fn from_parameters(parameters: &CalibrationParameters) -> Result<Self, CalibrationError> {
        let multimedia = parameters.multimedia.to_multimedia()?;
        let cameras = parameters
            .cameras
            .iter()
            .enumerate()
            .map(|(id, camera)| {
                let all_finite = camera
                    .focals
                    .iter()
                    .chain(&camera.principal_point)
                    .chain(&camera.rotation)
                    .chain(&camera.translation)
                    .chain([camera.skew, camera.k1].iter())
                    .all(|n| n.is_finite());
                if !all_finite {
                    return Err(CalibrationError::InvalidCalibration(format!(
                        "camera {} has non-finite parameters",
                        id
                    )));
                }
                MultimediaCamera::new(id, camera.intrinsics(), camera.pose(), multimedia.clone())
                    .map_err(|reason| {
                        CalibrationError::InvalidCalibration(format!("camera {}: {}", id, reason))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(cameras)
    }

    pub fn cameras(&self) -> &[MultimediaCamera] {
        &self.cameras
    }

    pub fn camera(&self, id: usize) -> Option<&MultimediaCamera> {
        self.cameras.get(id)
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}
