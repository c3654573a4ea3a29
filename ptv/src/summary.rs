use ptv_core::{Candidate3DPoint, FrameIndex};
use ptv_track::{Trajectory, TrajectoryId, TrajectoryStatus};
use serde::{Deserialize, Serialize};

/// A triangulated particle as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceSummary {
    /// The cameras whose targets formed the particle, in ascending order.
    pub cameras_used: Vec<usize>,
    pub position: [f64; 3],
    pub residual: f64,
}

impl From<&Candidate3DPoint> for CorrespondenceSummary {
    fn from(point: &Candidate3DPoint) -> Self {
        Self {
            cameras_used: point.cameras().collect(),
            position: point.position.coords.into(),
            residual: point.residual,
        }
    }
}

/// One position of a [`TrajectorySummary`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub frame: FrameIndex,
    pub position: [f64; 3],
}

/// A read-only snapshot of a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    pub id: TrajectoryId,
    pub status: TrajectoryStatus,
    pub points: Vec<TrajectoryPoint>,
}

impl TrajectorySummary {
    pub fn first_frame(&self) -> Option<FrameIndex> {
        self.points.first().map(|point| point.frame)
    }

    pub fn last_frame(&self) -> Option<FrameIndex> {
        self.points.last().map(|point| point.frame)
    }
}

impl From<&Trajectory> for TrajectorySummary {
    fn from(trajectory: &Trajectory) -> Self {
        Self {
            id: trajectory.id(),
            status: trajectory.status(),
            points: trajectory
                .points()
                .iter()
                .map(|point| TrajectoryPoint {
                    frame: point.frame(),
                    position: point.position.coords.into(),
                })
                .collect(),
        }
    }
}

/// The image positions of the particles that were seen by the same number of cameras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceGroup {
    /// How many cameras saw each particle of the group.
    pub cameras: usize,
    /// `positions[camera][i]` is where `camera` saw particle `i` of the group, if it took part.
    pub positions: Vec<Vec<Option<(f64, f64)>>>,
}

/// The trajectories as drawn on the image of one camera.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryProjection {
    pub camera: usize,
    /// The first position of every trajectory.
    pub heads: Vec<(f64, f64)>,
    /// The positions between the first and the last.
    pub tails: Vec<(f64, f64)>,
    /// The last position of every trajectory longer than one point.
    pub ends: Vec<(f64, f64)>,
}
