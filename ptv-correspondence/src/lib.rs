//! # PTV Correspondence
//!
//! Finds the particles that several cameras saw at the same time.
//!
//! Every target is backprojected into a [`Ray`]. Two targets of different cameras are
//! epipolar-consistent when their rays pass closer than the epipolar tolerance. A set of targets,
//! at most one per camera, in which every pair is consistent is a candidate particle. Candidates are
//! accepted greedily: those seen by more cameras go first, then those with the lowest total pairwise
//! ray distance, then the lexicographically smallest `(camera, target)` sequence. A candidate is
//! only accepted if none of its targets were claimed by an earlier one, so every target contributes
//! to at most one [`Candidate3DPoint`].

mod graph;
mod settings;

pub use settings::*;

use float_ord::FloatOrd;
use graph::ConsistencyGraph;
use log::*;
use ptv_core::{Candidate3DPoint, CameraModel, FrameIndex, Ray, Target, TargetRef};
use ptv_geom::RayTriangulator;
use std::cmp::Reverse;
use std::collections::HashSet;
use thiserror::Error;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CorrespondenceError {
    #[error("at least 2 cameras are required, but {0} were configured")]
    InsufficientCameras(usize),
    #[error("targets were given for {found} cameras, but {expected} are configured")]
    CameraCountMismatch { expected: usize, found: usize },
    #[error("invalid correspondence settings: {0}")]
    InvalidSettings(String),
}

/// A set of consistent targets that has not been accepted yet.
struct Tuple {
    targets: Vec<TargetRef>,
    rays: Vec<Ray>,
    cost: f64,
}

/// Matches the targets of all cameras at one frame and triangulates them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrespondenceEngine {
    settings: CorrespondenceSettings,
    triangulator: RayTriangulator,
}

impl CorrespondenceEngine {
    pub fn new(settings: CorrespondenceSettings) -> Result<Self, CorrespondenceError> {
        validate(&settings)?;
        Ok(Self {
            settings,
            triangulator: RayTriangulator::new(),
        })
    }

    /// Replaces the triangulator used for accepted tuples.
    #[must_use]
    pub fn triangulator(self, triangulator: RayTriangulator) -> Self {
        Self {
            triangulator,
            ..self
        }
    }

    pub fn settings(&self) -> &CorrespondenceSettings {
        &self.settings
    }

    /// Finds the particles seen by the cameras at `frame`.
    ///
    /// `targets[i]` are the targets detected on `cameras[i]`. A camera without targets simply
    /// does not take part. Targets that are not consistent with enough other cameras produce no
    /// point, so an empty result is a normal outcome.
    pub fn find<C, T>(
        &self,
        cameras: &[C],
        targets: &[T],
        frame: FrameIndex,
    ) -> Result<Vec<Candidate3DPoint>, CorrespondenceError>
    where
        C: CameraModel + Sync,
        T: AsRef<[Target]> + Sync,
    {
        if cameras.len() < 2 {
            return Err(CorrespondenceError::InsufficientCameras(cameras.len()));
        }
        if targets.len() != cameras.len() {
            return Err(CorrespondenceError::CameraCountMismatch {
                expected: cameras.len(),
                found: targets.len(),
            });
        }

        let rays = backproject(cameras, targets);
        let graph = ConsistencyGraph::build(&rays, self.settings.epipolar_tolerance);
        let mut tuples: Vec<Tuple> = graph
            .cliques(self.settings.min_cameras)
            .into_iter()
            .filter_map(|(nodes, cost)| {
                let tuple_rays = nodes
                    .iter()
                    .map(|&(camera, position)| rays[camera][position])
                    .collect::<Option<Vec<Ray>>>()?;
                Some(Tuple {
                    targets: nodes
                        .iter()
                        .map(|&(camera, position)| targets[camera].as_ref()[position].reference())
                        .collect(),
                    rays: tuple_rays,
                    cost,
                })
            })
            .collect();
        debug!(
            "Frame {}: {} candidate tuples over at least {} cameras",
            frame,
            tuples.len(),
            self.settings.min_cameras
        );

        tuples.sort_by(|a, b| {
            (Reverse(a.targets.len()), FloatOrd(a.cost), &a.targets).cmp(&(
                Reverse(b.targets.len()),
                FloatOrd(b.cost),
                &b.targets,
            ))
        });

        let mut claimed: HashSet<TargetRef> = HashSet::new();
        let mut points = vec![];
        for tuple in tuples {
            if tuple.targets.iter().any(|target| claimed.contains(target)) {
                continue;
            }
            let triangulation = match self.triangulator.triangulate(tuple.rays.iter().copied()) {
                Some(triangulation) => triangulation,
                None => {
                    trace!("Tuple {:?} does not triangulate", tuple.targets);
                    continue;
                }
            };
            if let Some(volume) = &self.settings.volume {
                if !volume.contains(&triangulation.point) {
                    trace!(
                        "Tuple {:?} triangulates outside the volume at {:?}",
                        tuple.targets,
                        triangulation.point
                    );
                    continue;
                }
            }
            claimed.extend(tuple.targets.iter().copied());
            points.push(Candidate3DPoint {
                frame,
                position: triangulation.point,
                targets: tuple.targets,
                residual: triangulation.residual,
            });
        }
        info!("Frame {}: {} particles triangulated", frame, points.len());
        Ok(points)
    }
}

fn validate(settings: &CorrespondenceSettings) -> Result<(), CorrespondenceError> {
    if !(settings.epipolar_tolerance.is_finite() && settings.epipolar_tolerance > 0.0) {
        return Err(CorrespondenceError::InvalidSettings(format!(
            "epipolar tolerance must be positive, got {}",
            settings.epipolar_tolerance
        )));
    }
    if settings.min_cameras < 2 {
        return Err(CorrespondenceError::InvalidSettings(format!(
            "a particle must be seen by at least 2 cameras, got {}",
            settings.min_cameras
        )));
    }
    match settings.volume {
        Some(volume) if !volume.is_valid() => Err(CorrespondenceError::InvalidSettings(
            "observation volume must have finite, ordered corners".to_owned(),
        )),
        _ => Ok(()),
    }
}

fn backproject<C, T>(cameras: &[C], targets: &[T]) -> Vec<Vec<Option<Ray>>>
where
    C: CameraModel + Sync,
    T: AsRef<[Target]> + Sync,
{
    let backproject_camera = |(camera, targets): (&C, &T)| -> Vec<Option<Ray>> {
        targets
            .as_ref()
            .iter()
            .map(|target| camera.backproject(*target))
            .collect()
    };
    #[cfg(feature = "rayon")]
    return cameras
        .par_iter()
        .zip(targets.par_iter())
        .map(backproject_camera)
        .collect();
    #[cfg(not(feature = "rayon"))]
    return cameras
        .iter()
        .zip(targets.iter())
        .map(backproject_camera)
        .collect();
}
