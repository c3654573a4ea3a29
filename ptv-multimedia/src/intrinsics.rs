use derive_more::{AsMut, AsRef, Deref, DerefMut, From, Into};
use nalgebra::{Point2, Vector2, Vector3};
use ptv_core::{ImagePoint, KeyPoint};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Image coordinates with the principal point, focal lengths, skew and lens distortion removed.
///
/// A normalized point `(x, y)` is where the line of sight crosses the plane `z = 1` in camera
/// coordinates, before any refraction happens.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, AsMut, AsRef, Deref, DerefMut, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct NormalizedKeyPoint(pub Point2<f64>);

impl NormalizedKeyPoint {
    /// The direction of the line of sight in camera coordinates, with unit depth.
    pub fn bearing_unnormalized(self) -> Vector3<f64> {
        Vector3::new(self.0.x, self.0.y, 1.0)
    }

    /// Central projection of a point given in camera coordinates.
    ///
    /// Returns `None` unless the point lies in front of the camera.
    pub fn from_camera_point(point: Vector3<f64>) -> Option<Self> {
        (point.z > 0.0).then(|| Self(Point2::new(point.x / point.z, point.y / point.z)))
    }
}

/// The linear part of a camera's interior orientation.
///
/// `focals` and `principal_point` are in pixels. `skew` couples the image y axis into x.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsics {
    pub focals: Vector2<f64>,
    pub principal_point: Point2<f64>,
    pub skew: f64,
}

impl CameraIntrinsics {
    /// Removes the principal point, skew and focal lengths from a pixel position.
    ///
    /// ```
    /// use ptv_core::KeyPoint;
    /// use ptv_multimedia::CameraIntrinsics;
    /// use nalgebra::{Vector2, Point2};
    /// let intrinsics = CameraIntrinsics {
    ///     focals: Vector2::new(1200.0, 1180.0),
    ///     principal_point: Point2::new(640.0, 512.0),
    ///     skew: 0.4,
    /// };
    /// let pixel = KeyPoint(Point2::new(100.5, 900.25));
    /// let back = intrinsics.uncalibrate(intrinsics.calibrate(pixel));
    /// assert!((pixel.0 - back.0).norm() < 1e-9);
    /// ```
    pub fn calibrate<P>(&self, point: P) -> NormalizedKeyPoint
    where
        P: ImagePoint,
    {
        let pixel = point.image_point();
        let y = (pixel.y - self.principal_point.y) / self.focals.y;
        let x = (pixel.x - self.principal_point.x - self.skew * y) / self.focals.x;
        NormalizedKeyPoint(Point2::new(x, y))
    }

    /// Maps a normalized point back onto the sensor.
    pub fn uncalibrate(&self, normalized: NormalizedKeyPoint) -> KeyPoint {
        let NormalizedKeyPoint(p) = normalized;
        KeyPoint(Point2::new(
            self.principal_point.x + self.focals.x * p.x + self.skew * p.y,
            self.principal_point.y + self.focals.y * p.y,
        ))
    }

    /// Every parameter is finite and both focal lengths are positive.
    pub fn is_valid(&self) -> bool {
        self.focals.iter().all(|&f| f.is_finite() && f > 0.0)
            && self.principal_point.iter().all(|n| n.is_finite())
            && self.skew.is_finite()
    }
}

/// Pinhole intrinsics plus a single radial distortion coefficient.
///
/// A distorted normalized point `d` corresponds to the ideal point `d / (1 + k1 |d|²)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CameraIntrinsicsK1Distortion {
    pub pinhole: CameraIntrinsics,
    pub k1: f64,
}

impl CameraIntrinsicsK1Distortion {
    pub fn new(pinhole: CameraIntrinsics, k1: f64) -> Self {
        Self { pinhole, k1 }
    }

    /// Converts a pixel position into an undistorted normalized point.
    ///
    /// ```
    /// use ptv_core::KeyPoint;
    /// use ptv_multimedia::{CameraIntrinsics, CameraIntrinsicsK1Distortion};
    /// use nalgebra::{Vector2, Point2};
    /// let pinhole = CameraIntrinsics {
    ///     focals: Vector2::new(1200.0, 1180.0),
    ///     principal_point: Point2::new(640.0, 512.0),
    ///     skew: 0.0,
    /// };
    /// let intrinsics = CameraIntrinsicsK1Distortion::new(pinhole, -0.08);
    /// let pixel = KeyPoint(Point2::new(1100.0, 80.0));
    /// let back = intrinsics.uncalibrate(intrinsics.calibrate(pixel)).unwrap();
    /// assert!((pixel.0 - back.0).norm() < 1e-6);
    /// ```
    pub fn calibrate<P>(&self, point: P) -> NormalizedKeyPoint
    where
        P: ImagePoint,
    {
        let NormalizedKeyPoint(distorted) = self.pinhole.calibrate(point);
        let scale = 1.0 + self.k1 * distorted.coords.norm_squared();
        NormalizedKeyPoint(distorted / scale)
    }

    /// Applies the distortion and maps the result onto the sensor.
    ///
    /// With `u` the ideal point, the distorted point is `s u` where `s` solves
    /// `k1 |u|² s² - s + 1 = 0`. Points too far out for a real root give `None`.
    pub fn uncalibrate(&self, normalized: NormalizedKeyPoint) -> Option<KeyPoint> {
        let NormalizedKeyPoint(ideal) = normalized;
        let a = self.k1 * ideal.coords.norm_squared();
        if a == 0.0 {
            return Some(self.pinhole.uncalibrate(normalized));
        }
        let discriminant = 1.0 - 4.0 * a;
        if discriminant < 0.0 {
            return None;
        }
        // The root that tends to 1 as the distortion vanishes.
        let scale = (1.0 - discriminant.sqrt()) / (2.0 * a);
        Some(self.pinhole.uncalibrate(NormalizedKeyPoint(ideal * scale)))
    }

    pub fn is_valid(&self) -> bool {
        self.pinhole.is_valid() && self.k1.is_finite()
    }
}

impl From<CameraIntrinsics> for CameraIntrinsicsK1Distortion {
    fn from(pinhole: CameraIntrinsics) -> Self {
        Self::new(pinhole, 0.0)
    }
}
