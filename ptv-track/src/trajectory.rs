use derive_more::{Display, From, Into};
use ptv_core::{nalgebra::Point3, nalgebra::Vector3, FrameIndex, PointRef};

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Identifies a trajectory. Ids are handed out in creation order starting from zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct TrajectoryId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum TrajectoryStatus {
    /// Still searching for its next particle.
    Active,
    /// Went unmatched for longer than the gap tolerance. Never extended again.
    Terminated,
}

/// A particle of a trajectory at one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct TrackedPoint {
    /// The candidate point this was linked to.
    pub point: PointRef,
    pub position: Point3<f64>,
    /// The cost of the link from the previous point, `None` for the first point.
    pub link_cost: Option<f64>,
}

impl TrackedPoint {
    pub fn frame(&self) -> FrameIndex {
        self.point.frame
    }
}

/// A link between two consecutive points of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryLink {
    pub from: PointRef,
    pub to: PointRef,
    pub cost: f64,
}

/// A chain of candidate points believed to be the same particle.
///
/// Frames strictly increase along the chain. Frames may be skipped, but never more than
/// the gap tolerance in a row.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Trajectory {
    id: TrajectoryId,
    points: Vec<TrackedPoint>,
    status: TrajectoryStatus,
}

impl Trajectory {
    pub(crate) fn new(id: TrajectoryId, first: TrackedPoint) -> Self {
        Self {
            id,
            points: vec![first],
            status: TrajectoryStatus::Active,
        }
    }

    pub(crate) fn push(&mut self, point: TrackedPoint) {
        self.points.push(point);
    }

    pub(crate) fn terminate(&mut self) {
        self.status = TrajectoryStatus::Terminated;
    }

    pub fn id(&self) -> TrajectoryId {
        self.id
    }

    pub fn status(&self) -> TrajectoryStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == TrajectoryStatus::Active
    }

    pub fn points(&self) -> &[TrackedPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always `false`, a trajectory starts with a point.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> &TrackedPoint {
        // Never empty.
        &self.points[self.points.len() - 1]
    }

    pub fn first_frame(&self) -> FrameIndex {
        self.points[0].frame()
    }

    pub fn last_frame(&self) -> FrameIndex {
        self.last().frame()
    }

    pub fn links(&self) -> impl Iterator<Item = TrajectoryLink> + '_ {
        self.points.windows(2).map(|pair| TrajectoryLink {
            from: pair[0].point,
            to: pair[1].point,
            cost: pair[1].link_cost.unwrap_or_default(),
        })
    }

    /// Displacement per frame between the last two points, if there are two.
    pub fn velocity(&self) -> Option<Vector3<f64>> {
        let [previous, last] = match self.points.len() {
            0 | 1 => return None,
            n => [&self.points[n - 2], &self.points[n - 1]],
        };
        let frames = (last.frame() - previous.frame()) as f64;
        Some((last.position - previous.position) / frames)
    }

    /// Where the particle is expected to be at `frame`.
    ///
    /// This extrapolates linearly from the last two points, or stays at the last point
    /// when there is only one.
    pub fn predict(&self, frame: FrameIndex) -> Point3<f64> {
        let last = self.last();
        match self.velocity() {
            Some(velocity) => {
                last.position + velocity * frame.saturating_sub(last.frame()) as f64
            }
            None => last.position,
        }
    }
}
