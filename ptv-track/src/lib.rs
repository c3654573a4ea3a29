//! # PTV Track
//!
//! Links the particles triangulated at each frame into [`Trajectory`]s.
//!
//! The [`Tracker`] is a state machine that consumes frames in strictly increasing order. At every
//! frame each active trajectory predicts where its particle should be and looks for the particles
//! within the search radius of that prediction. The cost of a link grows with the distance from
//! the prediction and with the change of direction it implies. All possible links of the frame are
//! accepted greedily from the cheapest, so no particle is claimed twice and no trajectory takes two
//! particles. Particles that nobody claimed start new trajectories, and trajectories that went
//! without a particle for more than the gap tolerance are terminated for good.

mod settings;
mod trajectory;

pub use settings::*;
pub use trajectory::*;

use float_ord::FloatOrd;
use log::*;
use ptv_core::{nalgebra::Point3, Candidate3DPoint, FrameIndex, PointRef};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackError {
    #[error("frame {frame} was given after frame {last}, frames must strictly increase")]
    OutOfOrder { last: FrameIndex, frame: FrameIndex },
    #[error("tracking was cancelled before frame {frame}")]
    Cancelled { frame: FrameIndex },
    #[error("invalid tracker settings: {0}")]
    InvalidSettings(String),
}

/// What happened to the trajectories during one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub frame: FrameIndex,
    pub extended: Vec<TrajectoryId>,
    pub created: Vec<TrajectoryId>,
    pub terminated: Vec<TrajectoryId>,
}

/// A possible link from a trajectory to a point of the current frame.
#[derive(Debug, Clone, Copy)]
struct Link {
    cost: f64,
    trajectory: usize,
    point: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tracker {
    settings: TrackerSettings,
    trajectories: Vec<Trajectory>,
    last_frame: Option<FrameIndex>,
}

impl Tracker {
    pub fn new(settings: TrackerSettings) -> Result<Self, TrackError> {
        if !(settings.search_radius.is_finite() && settings.search_radius > 0.0) {
            return Err(TrackError::InvalidSettings(format!(
                "search radius must be positive, got {}",
                settings.search_radius
            )));
        }
        if !(settings.angle_weight.is_finite() && settings.angle_weight >= 0.0) {
            return Err(TrackError::InvalidSettings(format!(
                "angle weight must not be negative, got {}",
                settings.angle_weight
            )));
        }
        Ok(Self {
            settings,
            trajectories: vec![],
            last_frame: None,
        })
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Every trajectory created so far, active or terminated, in creation order.
    pub fn trajectories(&self) -> &[Trajectory] {
        &self.trajectories
    }

    pub fn trajectory(&self, id: TrajectoryId) -> Option<&Trajectory> {
        self.trajectories.get(id.0)
    }

    pub fn active(&self) -> impl Iterator<Item = &Trajectory> + '_ {
        self.trajectories.iter().filter(|t| t.is_active())
    }

    /// The last frame that was linked, if any.
    pub fn last_frame(&self) -> Option<FrameIndex> {
        self.last_frame
    }

    /// Links the points of `frame` to the active trajectories.
    ///
    /// `points[i]` becomes [`PointRef`] `{ frame, index: i }`. Fails only when `frame` does not
    /// come after the last linked frame, in which case nothing is changed.
    pub fn step(
        &mut self,
        frame: FrameIndex,
        points: &[Candidate3DPoint],
    ) -> Result<StepReport, TrackError> {
        if let Some(last) = self.last_frame {
            if frame <= last {
                return Err(TrackError::OutOfOrder { last, frame });
            }
        }
        let mut report = StepReport {
            frame,
            ..Default::default()
        };

        // Trajectories that have already missed too many frames before this one do not search.
        for trajectory in self.trajectories.iter_mut().filter(|t| t.is_active()) {
            if frame - trajectory.last_frame() - 1 > self.settings.gap_tolerance {
                trajectory.terminate();
                report.terminated.push(trajectory.id());
            }
        }

        let mut links = self.links(frame, points);
        links.sort_by_key(|link| (FloatOrd(link.cost), link.trajectory, link.point));
        let mut trajectory_claimed = vec![false; self.trajectories.len()];
        let mut point_claimed = vec![false; points.len()];
        for link in links {
            if trajectory_claimed[link.trajectory] || point_claimed[link.point] {
                continue;
            }
            trajectory_claimed[link.trajectory] = true;
            point_claimed[link.point] = true;
            let trajectory = &mut self.trajectories[link.trajectory];
            trace!(
                "Trajectory {} takes point {} of frame {} at cost {}",
                trajectory.id(),
                link.point,
                frame,
                link.cost
            );
            trajectory.push(TrackedPoint {
                point: PointRef {
                    frame,
                    index: link.point,
                },
                position: points[link.point].position,
                link_cost: Some(link.cost),
            });
            report.extended.push(trajectory.id());
        }

        for (trajectory, claimed) in self.trajectories.iter_mut().zip(trajectory_claimed) {
            if trajectory.is_active()
                && !claimed
                && frame - trajectory.last_frame() > self.settings.gap_tolerance
            {
                trajectory.terminate();
                report.terminated.push(trajectory.id());
            }
        }

        for (index, point) in points.iter().enumerate() {
            if point_claimed[index] {
                continue;
            }
            let id = TrajectoryId(self.trajectories.len());
            self.trajectories.push(Trajectory::new(
                id,
                TrackedPoint {
                    point: PointRef { frame, index },
                    position: point.position,
                    link_cost: None,
                },
            ));
            report.created.push(id);
        }

        self.last_frame = Some(frame);
        debug!(
            "Frame {}: {} extended, {} created, {} terminated",
            frame,
            report.extended.len(),
            report.created.len(),
            report.terminated.len()
        );
        Ok(report)
    }

    /// Links a whole sequence of frames, checking `cancel` before every frame.
    ///
    /// A cancelled run leaves every frame linked before the cancellation in place.
    pub fn track<'a, I>(&mut self, frames: I, cancel: &AtomicBool) -> Result<&[Trajectory], TrackError>
    where
        I: IntoIterator<Item = (FrameIndex, &'a [Candidate3DPoint])>,
    {
        for (frame, points) in frames {
            if cancel.load(Ordering::Relaxed) {
                info!("Tracking cancelled before frame {}", frame);
                return Err(TrackError::Cancelled { frame });
            }
            self.step(frame, points)?;
        }
        info!(
            "Tracked {} trajectories, {} still active",
            self.trajectories.len(),
            self.active().count()
        );
        Ok(&self.trajectories)
    }

    /// Every link from an active trajectory to a point within the search radius of its prediction.
    fn links(&self, frame: FrameIndex, points: &[Candidate3DPoint]) -> Vec<Link> {
        let radius = self.settings.search_radius;
        let mut links = vec![];
        for (trajectory_index, trajectory) in self.trajectories.iter().enumerate() {
            if !trajectory.is_active() {
                continue;
            }
            let predicted = trajectory.predict(frame);
            for (point_index, point) in points.iter().enumerate() {
                let distance = (point.position - predicted).norm();
                if distance > radius {
                    continue;
                }
                let cost = distance / radius
                    + self.settings.angle_weight * self.turn(trajectory, frame, point.position);
                links.push(Link {
                    cost,
                    trajectory: trajectory_index,
                    point: point_index,
                });
            }
        }
        links
    }

    /// How much moving to `position` at `frame` turns the trajectory, from `0` (straight on)
    /// to `1` (reversing).
    fn turn(&self, trajectory: &Trajectory, frame: FrameIndex, position: Point3<f64>) -> f64 {
        let last = trajectory.last();
        let velocity = match trajectory.velocity() {
            Some(velocity) => velocity,
            None => return 0.0,
        };
        let step = (position - last.position) / (frame - last.frame()) as f64;
        let norms = velocity.norm() * step.norm();
        if norms <= f64::EPSILON {
            return 0.0;
        }
        let cos = (velocity.dot(&step) / norms).clamp(-1.0, 1.0);
        (1.0 - cos) / 2.0
    }
}
