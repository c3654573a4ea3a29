use ptv_core::{
    nalgebra::{zero, Matrix3, Point3, Vector3},
    Ray,
};

/// The minimum distance between two rays.
///
/// Only the half-lines in front of the ray origins count, so rays whose supporting lines cross
/// behind the cameras are as far apart as their origins allow. Two rays from different cameras are
/// epipolar-consistent when this is small, which means they may both be looking at the same particle.
///
/// ```
/// use ptv_core::{nalgebra::{Point3, Vector3}, Ray};
/// use ptv_geom::ray_distance;
///
/// let a = Ray::try_new(Point3::new(0.0, 0.0, 0.0), Vector3::x()).unwrap();
/// let b = Ray::try_new(Point3::new(5.0, 3.0, -1.0), Vector3::z()).unwrap();
/// assert!((ray_distance(&a, &b) - 3.0).abs() < 1e-12);
///
/// // The lines cross at the origin, but only behind both rays.
/// let c = Ray::try_new(Point3::new(3.0, 0.0, 0.0), Vector3::x()).unwrap();
/// let d = Ray::try_new(Point3::new(0.0, 4.0, 0.0), Vector3::y()).unwrap();
/// assert!((ray_distance(&c, &d) - 5.0).abs() < 1e-12);
/// ```
pub fn ray_distance(a: &Ray, b: &Ray) -> f64 {
    let (da, db) = (a.direction.into_inner(), b.direction.into_inner());
    let w = a.origin - b.origin;
    // The gap between `a.at(s)` and `b.at(t)` is `w + s da - t db`.
    let gap = |s: f64, t: f64| (w + da * s - db * t).norm();
    let cos = da.dot(&db);
    let (wa, wb) = (da.dot(&w), db.dot(&w));
    let denominator = 1.0 - cos * cos;
    if denominator > f64::EPSILON {
        let s = (cos * wb - wa) / denominator;
        let t = (wb - cos * wa) / denominator;
        if s >= 0.0 && t >= 0.0 {
            return gap(s, t);
        }
    }
    // Otherwise the closest approach starts at one of the origins.
    gap(0.0, wb.max(0.0)).min(gap((-wa).max(0.0), 0.0))
}

/// The result of triangulating a set of rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangulation {
    pub point: Point3<f64>,
    /// The root mean square distance of `point` from the rays.
    pub residual: f64,
}

/// Finds the point minimizing the total squared distance to two or more rays.
///
/// Every ray contributes the projector `I - d dᵀ` onto the plane orthogonal to its direction `d`.
/// The squared distance of a point `x` from the ray is `(x - o)ᵀ (I - d dᵀ) (x - o)`, so summing over
/// every ray and setting the gradient to zero gives the 3x3 linear system
/// `Σ (I - d dᵀ) x = Σ (I - d dᵀ) o`. The system is solved through a symmetric eigen decomposition,
/// which also exposes the degenerate case where all rays are parallel (an eigenvalue close to zero).
///
/// ```
/// use ptv_core::{nalgebra::{Point3, Vector3}, Ray};
/// use ptv_geom::RayTriangulator;
///
/// let point = Point3::new(0.3, 0.1, 2.0);
/// let a = Ray::try_new(Point3::new(-1.0, 0.0, 0.0), point - Point3::new(-1.0, 0.0, 0.0)).unwrap();
/// let b = Ray::try_new(Point3::new(1.0, 0.5, 0.0), point - Point3::new(1.0, 0.5, 0.0)).unwrap();
/// let triangulated = RayTriangulator::new().triangulate([a, b]).unwrap();
/// assert!((triangulated.point - point).norm() < 1e-9);
/// assert!(triangulated.residual < 1e-9);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct RayTriangulator {
    epsilon: f64,
    max_iterations: usize,
}

impl RayTriangulator {
    /// Creates a `RayTriangulator` with default values.
    ///
    /// Same as calling [`Default::default`].
    pub fn new() -> Self {
        Default::default()
    }

    /// Set the epsilon used in the symmetric eigen solver and as the smallest
    /// eigenvalue considered non-degenerate.
    ///
    /// Default is `1e-12`.
    #[must_use]
    pub fn epsilon(self, epsilon: f64) -> Self {
        Self { epsilon, ..self }
    }

    /// Set the maximum number of iterations for the symmetric eigen solver.
    ///
    /// Default is `1000`.
    #[must_use]
    pub fn max_iterations(self, max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..self
        }
    }

    /// Triangulates the rays.
    ///
    /// Fails if there are fewer than two rays, if they are all parallel, or if the point lies
    /// behind the origin of any of them.
    pub fn triangulate<I>(&self, rays: I) -> Option<Triangulation>
    where
        I: IntoIterator<Item = Ray>,
        I::IntoIter: Clone,
    {
        let rays = rays.into_iter();
        if rays.clone().count() < 2 {
            return None;
        }

        let mut a: Matrix3<f64> = zero();
        let mut b: Vector3<f64> = zero();
        for ray in rays.clone() {
            let d = ray.direction.into_inner();
            // Set up the least squares problem.
            let projector = Matrix3::identity() - d * d.transpose();
            a += projector;
            b += projector * ray.origin.coords;
        }

        let se = a.try_symmetric_eigen(self.epsilon, self.max_iterations)?;
        let smallest = se
            .eigenvalues
            .iter()
            .copied()
            .min_by_key(|&n| float_ord::FloatOrd(n))?;
        if smallest <= self.epsilon {
            return None;
        }
        let inverse_eigenvalues = Matrix3::from_diagonal(&se.eigenvalues.map(|n| n.recip()));
        let solution =
            se.eigenvectors * inverse_eigenvalues * se.eigenvectors.transpose() * b;
        if !solution.iter().all(|n| n.is_finite()) {
            return None;
        }
        let point = Point3::from(solution);
        if rays
            .clone()
            .any(|ray| ray.direction.dot(&(point - ray.origin)) < -self.epsilon)
        {
            return None;
        }

        let (sum_squares, count) = rays.fold((0.0, 0usize), |(sum, count), ray| {
            (sum + ray.distance_to_point(point).powi(2), count + 1)
        });
        Some(Triangulation {
            point,
            residual: (sum_squares / count as f64).sqrt(),
        })
    }
}

impl Default for RayTriangulator {
    fn default() -> Self {
        Self {
            epsilon: 1e-12,
            max_iterations: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ray_through(origin: Point3<f64>, target: Point3<f64>) -> Ray {
        Ray::try_new(origin, target - origin).unwrap()
    }

    #[test]
    fn parallel_rays_do_not_triangulate() {
        let a = Ray::try_new(Point3::new(0.0, 0.0, 0.0), Vector3::z()).unwrap();
        let b = Ray::try_new(Point3::new(1.0, 0.0, 0.0), Vector3::z()).unwrap();
        assert!(RayTriangulator::new().triangulate([a, b]).is_none());
        assert_relative_eq!(ray_distance(&a, &b), 1.0);
    }

    #[test]
    fn single_ray_does_not_triangulate() {
        let a = Ray::try_new(Point3::origin(), Vector3::z()).unwrap();
        assert!(RayTriangulator::new().triangulate([a]).is_none());
    }

    #[test]
    fn skew_rays_meet_halfway() {
        let a = Ray::try_new(Point3::new(0.0, 0.0, 1.0), Vector3::x()).unwrap();
        let b = Ray::try_new(Point3::new(0.0, 0.0, -1.0), Vector3::y()).unwrap();
        let triangulated = RayTriangulator::new().triangulate([a, b]).unwrap();
        assert_relative_eq!(triangulated.point, Point3::origin(), epsilon = 1e-9);
        assert_relative_eq!(triangulated.residual, 1.0, epsilon = 1e-9);
        assert_relative_eq!(ray_distance(&a, &b), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn rays_diverging_forward_are_far_apart() {
        // The lines meet 4000 units behind both origins.
        let a = ray_through(Point3::new(-200.0, 0.0, 0.0), Point3::new(-225.0, 0.0, 500.0));
        let b = ray_through(Point3::new(200.0, 0.0, 0.0), Point3::new(225.0, 0.0, 500.0));
        assert_relative_eq!(ray_distance(&a, &b), 400.0, epsilon = 1e-9);
        assert!(RayTriangulator::new().triangulate([a, b]).is_none());
    }

    #[test]
    fn parallel_rays_facing_away_measure_from_origins() {
        let a = Ray::try_new(Point3::new(0.0, 0.0, 0.0), Vector3::z()).unwrap();
        let b = Ray::try_new(Point3::new(3.0, 0.0, -4.0), -Vector3::z()).unwrap();
        assert_relative_eq!(ray_distance(&a, &b), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn many_rays_recover_point() {
        let point = Point3::new(12.0, -7.0, 480.0);
        let rays: Vec<Ray> = [
            Point3::new(-300.0, 0.0, 0.0),
            Point3::new(300.0, 20.0, 0.0),
            Point3::new(0.0, 300.0, 10.0),
            Point3::new(0.0, -300.0, -5.0),
        ]
        .iter()
        .map(|&origin| ray_through(origin, point))
        .collect();
        let triangulated = RayTriangulator::new().triangulate(rays.iter().copied()).unwrap();
        assert_relative_eq!(triangulated.point, point, epsilon = 1e-8);
        assert!(triangulated.residual < 1e-8);
    }
}
