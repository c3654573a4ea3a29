use nalgebra::{Point3, UnitVector3, Vector3};
use ptv_core::Ray;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Iterations of the bisection that solves for the refracted line of sight.
///
/// Each iteration halves the bracket on the sine of the incidence angle,
/// so this is enough to exhaust `f64` precision.
const PROJECTION_ITERATIONS: usize = 128;

/// A flat slab of a transparent material between the cameras and the observation medium.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Layer {
    /// Refractive index of the slab.
    pub index: f64,
    /// Thickness of the slab along the interface normal.
    pub thickness: f64,
}

/// The optical path between a camera and the particles, made of parallel planar interfaces.
///
/// The camera sits in a medium with refractive index `n_air`. The light then crosses every
/// [`Layer`] in order before reaching the observation medium with index `n_medium`.
///
/// The first interface is the plane `normal · x = offset`. Every layer shifts the next interface
/// by its thickness against `normal`, so `normal` must point from the observation medium
/// towards the cameras.
///
/// ```text
///        O  camera (n_air)
///         \
///   -------\------------- normal · x = offset
///           \   layer 0 (glass)
///   ---------\----------- normal · x = offset - thickness
///             |  medium (water)
///             p
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Multimedia {
    pub n_air: f64,
    pub layers: Vec<Layer>,
    pub n_medium: f64,
    pub normal: UnitVector3<f64>,
    pub offset: f64,
}

impl Default for Multimedia {
    fn default() -> Self {
        Self::homogeneous()
    }
}

impl Multimedia {
    /// A single medium with index `1.0` everywhere, where light travels in straight lines.
    pub fn homogeneous() -> Self {
        Self {
            n_air: 1.0,
            layers: vec![],
            n_medium: 1.0,
            normal: Vector3::z_axis(),
            offset: 0.0,
        }
    }

    /// The classic air, glass, water arrangement with the glass wall facing `+normal`.
    pub fn air_glass_water(
        normal: UnitVector3<f64>,
        offset: f64,
        glass_index: f64,
        glass_thickness: f64,
        water_index: f64,
    ) -> Self {
        Self {
            n_air: 1.0,
            layers: vec![Layer {
                index: glass_index,
                thickness: glass_thickness,
            }],
            n_medium: water_index,
            normal,
            offset,
        }
    }

    /// True when no refraction happens along any line of sight.
    pub fn is_homogeneous(&self) -> bool {
        self.layers.iter().all(|layer| layer.index == self.n_air) && self.n_medium == self.n_air
    }

    /// The offset of the interface between the last layer and the observation medium.
    pub fn medium_offset(&self) -> f64 {
        self.offset - self.layers.iter().map(|layer| layer.thickness).sum::<f64>()
    }

    /// Checks the model for non-finite or non-physical values, describing the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let indices = std::iter::once(self.n_air)
            .chain(self.layers.iter().map(|layer| layer.index))
            .chain(std::iter::once(self.n_medium));
        for index in indices {
            if !index.is_finite() || index <= 0.0 {
                return Err(format!("refractive index {} is not a positive number", index));
            }
        }
        for layer in &self.layers {
            if !layer.thickness.is_finite() || layer.thickness < 0.0 {
                return Err(format!(
                    "layer thickness {} is not a non-negative number",
                    layer.thickness
                ));
            }
        }
        if !self.offset.is_finite() || !self.normal.iter().all(|n| n.is_finite()) {
            return Err("interface plane is not finite".to_owned());
        }
        Ok(())
    }

    /// The refractive indices along the path, from the camera to the medium, paired with the
    /// offset of the interface the light crosses to enter them.
    fn crossings(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        let mut offset = self.offset;
        self.layers
            .iter()
            .map(|layer| (layer.index, layer.thickness))
            .chain(std::iter::once((self.n_medium, 0.0)))
            .map(move |(index, thickness)| {
                let entry = offset;
                offset -= thickness;
                (index, entry)
            })
    }

    /// Traces the line of sight leaving `origin` in `direction` through every interface.
    ///
    /// Returns the ray inside the observation medium. Fails when the line of sight never reaches
    /// the medium or is totally internally reflected on the way.
    pub fn trace(&self, origin: Point3<f64>, direction: UnitVector3<f64>) -> Option<Ray> {
        if self.is_homogeneous() {
            return Some(Ray::new(origin, direction));
        }
        let normal = self.normal.into_inner();
        let mut origin = origin;
        let mut direction = direction.into_inner();
        let mut from = self.n_air;
        for (to, offset) in self.crossings() {
            let approach = normal.dot(&direction);
            let height = normal.dot(&origin.coords) - offset;
            if approach >= 0.0 || height < 0.0 {
                return None;
            }
            origin += direction * (height / -approach);
            direction = refract(direction, normal, from / to)?;
            from = to;
        }
        Ray::try_new(origin, direction)
    }

    /// Finds the direction in which a camera at `center` must look to see `point` through the interfaces.
    ///
    /// The path of the light stays in the plane spanned by the interface normal and the two points, so
    /// only the incidence angle at the first interface is unknown. The horizontal distance covered by the
    /// path grows monotonically with that angle, which is solved for by bisection on its sine.
    pub fn line_of_sight(&self, center: Point3<f64>, point: Point3<f64>) -> Option<UnitVector3<f64>> {
        if self.is_homogeneous() {
            return UnitVector3::try_new(point - center, f64::EPSILON);
        }
        let normal = self.normal.into_inner();
        let height = normal.dot(&center.coords) - self.offset;
        let depth = self.medium_offset() - normal.dot(&point.coords);
        if height <= 0.0 || depth <= 0.0 {
            return None;
        }

        let delta = point - center;
        let radial = delta - normal * normal.dot(&delta);
        let distance = radial.norm();
        if distance <= f64::EPSILON * delta.norm() {
            return Some(-self.normal);
        }

        // Every segment of the path: the refractive index it travels in and its extent along the normal.
        let segments: Vec<(f64, f64)> = std::iter::once((self.n_air, height))
            .chain(self.layers.iter().map(|layer| (layer.index, layer.thickness)))
            .chain(std::iter::once((self.n_medium, depth)))
            .collect();
        let covered = |sine: f64| -> f64 {
            segments
                .iter()
                .map(|&(index, extent)| {
                    let s = sine * self.n_air / index;
                    extent * s / (1.0 - s * s).sqrt()
                })
                .sum()
        };

        // Beyond this the light cannot enter one of the segments at all.
        let limit = segments
            .iter()
            .map(|&(index, _)| index / self.n_air)
            .fold(1.0f64, f64::min);
        let (mut low, mut high) = (0.0f64, limit * (1.0 - f64::EPSILON));
        if covered(high) < distance {
            return None;
        }
        for _ in 0..PROJECTION_ITERATIONS {
            let mid = 0.5 * (low + high);
            if mid <= low || mid >= high {
                break;
            }
            if covered(mid) < distance {
                low = mid;
            } else {
                high = mid;
            }
        }
        let sine = 0.5 * (low + high);
        let cosine = (1.0 - sine * sine).sqrt();
        UnitVector3::try_new(radial / distance * sine - normal * cosine, f64::EPSILON)
    }
}

/// Refracts `direction` at an interface with unit `normal` facing the incoming light.
///
/// `eta` is the ratio of the refractive index before the interface to the one after it.
/// Returns `None` on total internal reflection.
pub fn refract(direction: Vector3<f64>, normal: Vector3<f64>, eta: f64) -> Option<Vector3<f64>> {
    let direction = direction.normalize();
    let cos_incident = -normal.dot(&direction);
    let sin2_transmitted = eta * eta * (1.0 - cos_incident * cos_incident);
    if sin2_transmitted > 1.0 {
        return None;
    }
    let cos_transmitted = (1.0 - sin2_transmitted).sqrt();
    Some(direction * eta + normal * (eta * cos_incident - cos_transmitted))
}
