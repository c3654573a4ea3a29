use nalgebra::{Point3, UnitVector3, Vector3};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// A half-line in world coordinates along which light travelled towards a camera.
///
/// For cameras looking through refractive interfaces, the origin is the point where the
/// light crossed the last interface and the direction is the direction inside the medium.
/// For a camera in a homogeneous medium, the origin is the optical center.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: UnitVector3<f64>,
}

impl Ray {
    pub fn new(origin: Point3<f64>, direction: UnitVector3<f64>) -> Self {
        Self { origin, direction }
    }

    /// Normalizes `direction`, returning `None` if it has no length or is not finite.
    pub fn try_new(origin: Point3<f64>, direction: Vector3<f64>) -> Option<Self> {
        if !origin.iter().chain(direction.iter()).all(|n| n.is_finite()) {
            return None;
        }
        UnitVector3::try_new(direction, f64::EPSILON).map(|direction| Self { origin, direction })
    }

    /// The point `distance` along the ray from its origin.
    pub fn at(&self, distance: f64) -> Point3<f64> {
        self.origin + self.direction.into_inner() * distance
    }

    /// The perpendicular distance from the line supporting this ray to `point`.
    pub fn distance_to_point(&self, point: Point3<f64>) -> f64 {
        let delta = point - self.origin;
        (delta - self.direction.into_inner() * self.direction.dot(&delta)).norm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn distance_to_point_is_perpendicular() {
        let ray = Ray::try_new(Point3::new(1.0, 2.0, 3.0), Vector3::new(0.0, 0.0, 5.0)).unwrap();
        assert_relative_eq!(ray.distance_to_point(Point3::new(4.0, 6.0, -10.0)), 5.0);
        assert_relative_eq!(ray.at(2.0), Point3::new(1.0, 2.0, 5.0));
    }

    #[test]
    fn degenerate_direction_is_rejected() {
        assert!(Ray::try_new(Point3::origin(), Vector3::zeros()).is_none());
        assert!(Ray::try_new(Point3::new(f64::NAN, 0.0, 0.0), Vector3::z()).is_none());
    }
}
