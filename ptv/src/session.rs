use crate::settings::read_json;
use crate::{
    CorrespondenceGroup, CorrespondenceSummary, Error, FileSequence, ImageSource, PtvSettings,
    TrajectoryProjection, TrajectorySummary, CALIBRATION_FILE, PARAMETERS_FILE,
};
use derive_more::Display;
use log::*;
use image::GrayImage;
use ptv_core::{Candidate3DPoint, CameraModel, FrameIndex, Target};
use ptv_correspondence::CorrespondenceEngine;
use ptv_detect::{highpass, Detections, TargetDetector};
use ptv_multimedia::{Calibration, CalibrationParameters};
use ptv_track::{TrackedPoint, Tracker};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SessionState {
    /// No experiment is loaded.
    #[display(fmt = "uninitialized")]
    Uninitialized,
    /// An experiment is loaded and its frames can be processed.
    #[display(fmt = "initialized")]
    Initialized,
}

/// The stages of the pipeline, in the order they run for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub enum Stage {
    #[display(fmt = "detection")]
    Detection,
    #[display(fmt = "correspondence")]
    Correspondence,
    #[display(fmt = "tracking")]
    Tracking,
}

struct Experiment {
    calibration: Calibration,
    settings: PtvSettings,
    source: Box<dyn ImageSource>,
    detector: TargetDetector,
    engine: CorrespondenceEngine,
    tracker: Tracker,
    frame: FrameIndex,
    targets: BTreeMap<FrameIndex, Vec<Vec<Target>>>,
    points: BTreeMap<FrameIndex, Vec<Candidate3DPoint>>,
}

impl Experiment {
    fn image(&self, camera: usize, frame: FrameIndex) -> Result<GrayImage, Error> {
        self.source
            .image(camera, frame)
            .map_err(|source| Error::Image {
                frame,
                camera,
                source,
            })
    }

    fn detect(&self, frame: FrameIndex) -> Result<Vec<Vec<Target>>, Error> {
        let detect_camera = |camera: usize| -> Result<Detections, Error> {
            let image = self.image(camera, frame)?;
            Ok(self.detector.detect(&image, camera, frame))
        };
        #[cfg(feature = "rayon")]
        let detections = (0..self.calibration.len())
            .into_par_iter()
            .map(detect_camera)
            .collect::<Result<Vec<_>, _>>()?;
        #[cfg(not(feature = "rayon"))]
        let detections = (0..self.calibration.len())
            .map(detect_camera)
            .collect::<Result<Vec<_>, _>>()?;
        let targets: Vec<Vec<Target>> = detections.iter().map(Detections::to_vec).collect();
        info!(
            "Frame {}: detected {:?} targets per camera",
            frame,
            targets.iter().map(Vec::len).collect::<Vec<_>>()
        );
        Ok(targets)
    }

    fn correspond(
        &self,
        frame: FrameIndex,
        targets: &[Vec<Target>],
    ) -> Result<Vec<Candidate3DPoint>, Error> {
        Ok(self
            .engine
            .find(self.calibration.cameras(), targets, frame)?)
    }

    fn check_frame(&self, frame: FrameIndex) -> Result<(), Error> {
        let range = self.settings.sequence;
        if range.contains(frame) {
            Ok(())
        } else {
            Err(Error::FrameOutOfRange {
                frame,
                first: range.first,
                last: range.last,
            })
        }
    }

    fn require_points(&self, frame: FrameIndex) -> Result<&[Candidate3DPoint], Error> {
        self.points
            .get(&frame)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::StageNotReady {
                frame,
                stage: Stage::Correspondence,
                reason: "correspondences have not been found".to_owned(),
            })
    }

    fn require_targets(&self, frame: FrameIndex) -> Result<&[Vec<Target>], Error> {
        self.targets
            .get(&frame)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::StageNotReady {
                frame,
                stage: Stage::Correspondence,
                reason: "particles have not been detected".to_owned(),
            })
    }
}

/// The state of one experiment being processed.
///
/// The session moves from [`SessionState::Uninitialized`] to [`SessionState::Initialized`] when an
/// experiment is loaded. From there the stages run for the current frame in order: detection,
/// correspondence and tracking. Detection and correspondence results are cached per frame, so
/// calling a stage again for a frame it already processed returns the cached result. Calling a stage
/// before the one it depends on fails with [`Error::StageNotReady`].
#[derive(Default)]
pub struct Session {
    experiment: Option<Experiment>,
}

impl Session {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn state(&self) -> SessionState {
        match self.experiment {
            Some(_) => SessionState::Initialized,
            None => SessionState::Uninitialized,
        }
    }

    /// Loads the experiment in `directory`, replacing any previous one, and returns the number of cameras.
    ///
    /// The directory holds `parameters.json` with the [`PtvSettings`] and `calibration.json` with the
    /// [`CalibrationParameters`]. Images are read with one file name pattern per camera, relative
    /// to the directory.
    pub fn initialize(&mut self, directory: impl AsRef<Path>) -> Result<usize, Error> {
        let directory = directory.as_ref();
        self.reset();
        info!("Loading experiment from {}", directory.display());
        let settings: PtvSettings = read_json(&directory.join(PARAMETERS_FILE))?;
        let parameters: CalibrationParameters = read_json(&directory.join(CALIBRATION_FILE))?;
        let calibration = Calibration::from_parameters(&parameters)?;
        if settings.images.len() != calibration.len() {
            return Err(Error::Settings(format!(
                "{} image patterns were given for {} cameras",
                settings.images.len(),
                calibration.len()
            )));
        }
        let source = FileSequence::new(directory, settings.images.clone());
        self.initialize_with(calibration, settings, source)
    }

    /// Starts processing an experiment whose parts are already loaded, replacing any previous one.
    ///
    /// Returns the number of cameras.
    pub fn initialize_with(
        &mut self,
        calibration: Calibration,
        settings: PtvSettings,
        source: impl ImageSource + 'static,
    ) -> Result<usize, Error> {
        self.reset();
        settings.validate()?;
        let engine = CorrespondenceEngine::new(settings.correspondence)?;
        let tracker = Tracker::new(settings.tracker)?;
        let cameras = calibration.len();
        info!(
            "Initialized experiment with {} cameras, frames {} to {}",
            cameras, settings.sequence.first, settings.sequence.last
        );
        self.experiment = Some(Experiment {
            calibration,
            detector: settings.detector,
            frame: settings.sequence.first,
            settings,
            source: Box::new(source),
            engine,
            tracker,
            targets: BTreeMap::new(),
            points: BTreeMap::new(),
        });
        Ok(cameras)
    }

    /// Discards the experiment and every cached result.
    pub fn reset(&mut self) {
        if self.experiment.take().is_some() {
            info!("Session reset");
        }
    }

    pub fn calibration(&self) -> Result<&Calibration, Error> {
        Ok(&self.experiment()?.calibration)
    }

    pub fn settings(&self) -> Result<&PtvSettings, Error> {
        Ok(&self.experiment()?.settings)
    }

    pub fn tracker(&self) -> Result<&Tracker, Error> {
        Ok(&self.experiment()?.tracker)
    }

    /// The frame the stages currently run on.
    pub fn frame(&self) -> Result<FrameIndex, Error> {
        Ok(self.experiment()?.frame)
    }

    /// Makes `frame` the current frame. It must lie in the sequence range of the settings.
    pub fn set_frame(&mut self, frame: FrameIndex) -> Result<(), Error> {
        let experiment = self.experiment_mut()?;
        experiment.check_frame(frame)?;
        experiment.frame = frame;
        Ok(())
    }

    /// Moves on to the next frame and returns it.
    ///
    /// Fails without moving at the last frame of the sequence.
    pub fn next_frame(&mut self) -> Result<FrameIndex, Error> {
        let experiment = self.experiment_mut()?;
        let next = experiment.frame + 1;
        experiment.check_frame(next)?;
        experiment.frame = next;
        Ok(next)
    }

    /// The targets detected at `frame`, per camera, if detection ran for it.
    pub fn targets(&self, frame: FrameIndex) -> Option<&[Vec<Target>]> {
        self.experiment
            .as_ref()?
            .targets
            .get(&frame)
            .map(Vec::as_slice)
    }

    /// The particles triangulated at `frame`, if correspondence ran for it.
    pub fn points(&self, frame: FrameIndex) -> Option<&[Candidate3DPoint]> {
        self.experiment
            .as_ref()?
            .points
            .get(&frame)
            .map(Vec::as_slice)
    }

    /// Detects the targets of every camera at the current frame and returns their positions per camera.
    pub fn detect_particles(&mut self) -> Result<Vec<Vec<(f64, f64)>>, Error> {
        let experiment = self.experiment_mut()?;
        let frame = experiment.frame;
        if !experiment.targets.contains_key(&frame) {
            let targets = experiment.detect(frame)?;
            experiment.targets.insert(frame, targets);
        } else {
            debug!("Frame {}: reusing detected targets", frame);
        }
        Ok(experiment.targets[&frame]
            .iter()
            .map(|targets| {
                targets
                    .iter()
                    .map(|target| (target.position.x, target.position.y))
                    .collect()
            })
            .collect())
    }

    /// Matches the targets of the current frame across cameras and triangulates them.
    ///
    /// Detection must have run for the frame.
    pub fn find_correspondences(&mut self) -> Result<Vec<CorrespondenceSummary>, Error> {
        let experiment = self.experiment_mut()?;
        let frame = experiment.frame;
        if !experiment.points.contains_key(&frame) {
            let points = experiment.correspond(frame, experiment.require_targets(frame)?)?;
            experiment.points.insert(frame, points);
        } else {
            debug!("Frame {}: reusing triangulated particles", frame);
        }
        Ok(experiment.points[&frame]
            .iter()
            .map(CorrespondenceSummary::from)
            .collect())
    }

    /// Links the particles of the current frame into the trajectories.
    ///
    /// Correspondence must have run for the frame, and frames must be tracked in increasing order.
    /// Returns `true` when the frame was linked now and `false` when it had already been linked.
    pub fn track_particles(&mut self) -> Result<bool, Error> {
        let experiment = self.experiment_mut()?;
        let frame = experiment.frame;
        if experiment.tracker.last_frame() == Some(frame) {
            debug!("Frame {}: already tracked", frame);
            return Ok(false);
        }
        let points = experiment
            .points
            .get(&frame)
            .ok_or_else(|| Error::StageNotReady {
                frame,
                stage: Stage::Tracking,
                reason: "correspondences have not been found".to_owned(),
            })?;
        experiment.tracker.step(frame, points)?;
        Ok(true)
    }

    /// The images of the current frame as the detector sees them.
    ///
    /// They are highpass filtered when the detector settings ask for it and returned unchanged
    /// otherwise.
    pub fn apply_highpass(&self) -> Result<Vec<GrayImage>, Error> {
        let experiment = self.experiment()?;
        let frame = experiment.frame;
        (0..experiment.calibration.len())
            .map(|camera| -> Result<GrayImage, Error> {
                let image = experiment.image(camera, frame)?;
                Ok(match experiment.detector.highpass_size {
                    Some(size) => highpass(&image, size),
                    None => image,
                })
            })
            .collect()
    }

    /// The particles of the current frame on every camera image, grouped by how many cameras saw
    /// them, the largest groups first.
    ///
    /// Correspondence must have run for the frame.
    pub fn correspondence_groups(&self) -> Result<Vec<CorrespondenceGroup>, Error> {
        let experiment = self.experiment()?;
        let frame = experiment.frame;
        let points = experiment.require_points(frame)?;
        let targets = experiment.require_targets(frame)?;
        let mut sizes: Vec<usize> = points.iter().map(|point| point.targets.len()).collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        sizes.dedup();
        Ok(sizes
            .into_iter()
            .map(|size| {
                let members: Vec<&Candidate3DPoint> = points
                    .iter()
                    .filter(|point| point.targets.len() == size)
                    .collect();
                let positions = (0..experiment.calibration.len())
                    .map(|camera| {
                        members
                            .iter()
                            .map(|point| {
                                let reference = point.target_on(camera)?;
                                let target = targets.get(camera)?.get(reference.target)?;
                                Some((target.position.x, target.position.y))
                            })
                            .collect()
                    })
                    .collect();
                CorrespondenceGroup {
                    cameras: size,
                    positions,
                }
            })
            .collect())
    }

    /// Every trajectory projected onto the image of each camera.
    ///
    /// Positions a camera cannot see are left out of its projection.
    pub fn trajectory_projections(&self) -> Result<Vec<TrajectoryProjection>, Error> {
        let experiment = self.experiment()?;
        let trajectories = experiment.tracker.trajectories();
        Ok(experiment
            .calibration
            .cameras()
            .iter()
            .map(|camera| {
                let project = |point: &TrackedPoint| {
                    camera
                        .project(point.position)
                        .map(|keypoint| (keypoint.x, keypoint.y))
                };
                let mut projection = TrajectoryProjection {
                    camera: camera.id(),
                    ..Default::default()
                };
                for trajectory in trajectories {
                    if let Some((head, rest)) = trajectory.points().split_first() {
                        projection.heads.extend(project(head));
                        if let Some((end, middle)) = rest.split_last() {
                            projection.tails.extend(middle.iter().filter_map(&project));
                            projection.ends.extend(project(end));
                        }
                    }
                }
                projection
            })
            .collect())
    }

    /// A snapshot of every trajectory, active or terminated.
    pub fn get_trajectories(&self) -> Result<Vec<TrajectorySummary>, Error> {
        Ok(self
            .experiment()?
            .tracker
            .trajectories()
            .iter()
            .map(TrajectorySummary::from)
            .collect())
    }

    /// Runs every stage over the whole frame range of the settings.
    ///
    /// Frames are detected one after the other with the cameras in parallel, then the
    /// correspondences of all frames are found in parallel, then the frames are tracked in order.
    /// `cancel` is checked before every frame of detection and of tracking. Frames already processed
    /// keep their cached results, and a cancelled or failed run keeps everything finished before it.
    /// The current frame is left at the last frame of the range.
    pub fn process_sequence(&mut self, cancel: &AtomicBool) -> Result<(), Error> {
        let experiment = self.experiment_mut()?;
        let range = experiment.settings.sequence;
        info!("Processing frames {} to {}", range.first, range.last);

        for frame in range.frames() {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled { frame });
            }
            if !experiment.targets.contains_key(&frame) {
                let targets = experiment.detect(frame)?;
                experiment.targets.insert(frame, targets);
            }
        }

        let pending: Vec<FrameIndex> = range
            .frames()
            .filter(|frame| !experiment.points.contains_key(frame))
            .collect();
        let correspond = |&frame: &FrameIndex| -> Result<(FrameIndex, Vec<Candidate3DPoint>), Error> {
            let targets = experiment.require_targets(frame)?;
            Ok((frame, experiment.correspond(frame, targets)?))
        };
        #[cfg(feature = "rayon")]
        let found = pending.par_iter().map(correspond).collect::<Vec<_>>();
        #[cfg(not(feature = "rayon"))]
        let found = pending.iter().map(correspond).collect::<Vec<_>>();
        // Frames that succeeded are kept even if another frame failed.
        let mut failure = None;
        for result in found {
            match result {
                Ok((frame, points)) => {
                    experiment.points.insert(frame, points);
                }
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        let start = match experiment.tracker.last_frame() {
            Some(last) => last + 1,
            None => range.first,
        };
        let frames = (start.max(range.first)..=range.last).filter_map(|frame| {
            experiment
                .points
                .get(&frame)
                .map(|points| (frame, points.as_slice()))
        });
        experiment.tracker.track(frames, cancel)?;
        experiment.frame = range.last;
        Ok(())
    }

    fn experiment(&self) -> Result<&Experiment, Error> {
        self.experiment.as_ref().ok_or(Error::NotInitialized)
    }

    fn experiment_mut(&mut self) -> Result<&mut Experiment, Error> {
        self.experiment.as_mut().ok_or(Error::NotInitialized)
    }
}
