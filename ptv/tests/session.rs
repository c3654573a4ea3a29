use approx::assert_relative_eq;
use image::{GrayImage, Luma};
use ptv::camera::{
    Calibration, CalibrationParameters, CameraParameters, Layer, MultimediaCamera,
    MultimediaParameters,
};
use ptv::nalgebra::{Point3, Vector3};
use ptv::track::TrajectoryStatus;
use ptv::{
    CameraModel, Error, MemorySequence, PtvSettings, SequenceRange, Session, SessionState, Stage,
    CALIBRATION_FILE, PARAMETERS_FILE,
};
use std::sync::atomic::AtomicBool;

const WIDTH: u32 = 1024;
const HEIGHT: u32 = 1024;
const FRAMES: usize = 5;

fn tank() -> MultimediaParameters {
    MultimediaParameters {
        n_air: 1.0,
        layers: vec![Layer {
            index: 1.5,
            thickness: 8.0,
        }],
        n_medium: 1.33,
        normal: [0.0, 0.0, 1.0],
        offset: 0.0,
    }
}

/// Three cameras above a water tank, looking down at the particles.
fn calibration_parameters() -> CalibrationParameters {
    let multimedia = tank().to_multimedia().unwrap();
    let look_at = Point3::new(0.0, 0.0, -50.0);
    let cameras = [
        Point3::new(250.0, 0.0, 500.0),
        Point3::new(-200.0, 220.0, 500.0),
        Point3::new(-200.0, -220.0, 520.0),
    ]
    .iter()
    .enumerate()
    .map(|(id, &eye)| {
        let pose = ptv::WorldToCamera::looking_at(eye, look_at, Vector3::y());
        let intrinsics = ptv::camera::CameraIntrinsics {
            focals: ptv::nalgebra::Vector2::new(1000.0, 1000.0),
            principal_point: ptv::nalgebra::Point2::new(512.0, 512.0),
            skew: 0.0,
        };
        let camera = MultimediaCamera::new(id, intrinsics.into(), pose, multimedia.clone()).unwrap();
        CameraParameters::from_camera(&camera)
    })
    .collect();
    CalibrationParameters {
        multimedia: tank(),
        cameras,
    }
}

/// Four particles moving with the same constant velocity, 15 units apart.
fn particles(frame: usize) -> Vec<Point3<f64>> {
    let offset = Vector3::new(1.0, 0.5, 0.0) * frame as f64;
    [
        Point3::new(-15.0, -15.0, -40.0),
        Point3::new(15.0, -15.0, -55.0),
        Point3::new(-15.0, 15.0, -60.0),
        Point3::new(15.0, 15.0, -45.0),
    ]
    .iter()
    .map(|particle| particle + offset)
    .collect()
}

/// Splats every particle bilinearly on its four nearest pixels so that the centroid is exact.
fn render(camera: &MultimediaCamera, particles: &[Point3<f64>]) -> GrayImage {
    let mut image = GrayImage::new(WIDTH, HEIGHT);
    for &particle in particles {
        let keypoint = camera.project(particle).unwrap();
        let (x0, y0) = (keypoint.x.floor(), keypoint.y.floor());
        let (fx, fy) = (keypoint.x - x0, keypoint.y - y0);
        for (dx, dy, weight) in [
            (0, 0, (1.0 - fx) * (1.0 - fy)),
            (1, 0, fx * (1.0 - fy)),
            (0, 1, (1.0 - fx) * fy),
            (1, 1, fx * fy),
        ] {
            let (x, y) = (x0 as u32 + dx, y0 as u32 + dy);
            image.put_pixel(x, y, Luma([(250.0 * weight).round() as u8]));
        }
    }
    image
}

fn settings() -> PtvSettings {
    let mut settings = PtvSettings::default();
    settings.detector.threshold = 0;
    settings.correspondence.epipolar_tolerance = 0.5;
    settings.tracker.search_radius = 2.0;
    settings.sequence = SequenceRange::new(0, FRAMES - 1);
    settings
}

fn memory_experiment() -> (Calibration, MemorySequence) {
    let calibration = Calibration::from_parameters(&calibration_parameters()).unwrap();
    let mut images = MemorySequence::new();
    for frame in 0..FRAMES {
        for camera in calibration.cameras() {
            images.insert(camera.id(), frame, render(camera, &particles(frame)));
        }
    }
    (calibration, images)
}

fn initialized_session() -> Session {
    let _ = pretty_env_logger::try_init();
    let (calibration, images) = memory_experiment();
    let mut session = Session::new();
    assert_eq!(session.initialize_with(calibration, settings(), images).unwrap(), 3);
    session
}

#[test]
fn stages_run_in_order_for_a_frame() {
    let mut session = initialized_session();
    assert_eq!(session.state(), SessionState::Initialized);
    assert_eq!(session.frame().unwrap(), 0);

    let positions = session.detect_particles().unwrap();
    assert_eq!(positions.len(), 3);
    assert!(positions.iter().all(|camera| camera.len() == 4));

    let found = session.find_correspondences().unwrap();
    assert_eq!(found.len(), 4);
    for point in &found {
        assert_eq!(point.cameras_used, vec![0, 1, 2]);
        let position = Point3::from(point.position);
        let nearest = particles(0)
            .iter()
            .map(|particle| (particle - position).norm())
            .fold(f64::INFINITY, f64::min);
        assert!(nearest < 0.05, "{:?} is {} from every particle", position, nearest);
    }

    assert!(session.track_particles().unwrap());
    let trajectories = session.get_trajectories().unwrap();
    assert_eq!(trajectories.len(), 4);
    assert!(trajectories.iter().all(|t| t.points.len() == 1));
}

#[test]
fn later_stages_need_their_prerequisites() {
    let mut session = initialized_session();
    assert!(matches!(
        session.find_correspondences(),
        Err(Error::StageNotReady {
            frame: 0,
            stage: Stage::Correspondence,
            ..
        })
    ));
    assert!(matches!(
        session.track_particles(),
        Err(Error::StageNotReady {
            frame: 0,
            stage: Stage::Tracking,
            ..
        })
    ));
    session.detect_particles().unwrap();
    assert!(matches!(
        session.track_particles(),
        Err(Error::StageNotReady {
            stage: Stage::Tracking,
            ..
        })
    ));
}

#[test]
fn repeated_calls_return_cached_results() {
    let mut session = initialized_session();
    let first_targets = session.detect_particles().unwrap();
    let first = session.find_correspondences().unwrap();
    assert_eq!(session.detect_particles().unwrap(), first_targets);
    assert_eq!(session.find_correspondences().unwrap(), first);

    assert!(session.track_particles().unwrap());
    assert!(!session.track_particles().unwrap());
    assert_eq!(session.get_trajectories().unwrap().len(), 4);
}

#[test]
fn frames_are_tracked_in_order() {
    let mut session = initialized_session();
    for frame in 0..3 {
        session.set_frame(frame).unwrap();
        session.detect_particles().unwrap();
        session.find_correspondences().unwrap();
        assert!(session.track_particles().unwrap());
    }
    session.set_frame(1).unwrap();
    assert!(matches!(
        session.track_particles(),
        Err(Error::StageNotReady {
            frame: 1,
            stage: Stage::Tracking,
            ..
        })
    ));
    assert_eq!(session.next_frame().unwrap(), 2);
    assert_eq!(session.next_frame().unwrap(), 3);
    session.detect_particles().unwrap();
    session.find_correspondences().unwrap();
    assert!(session.track_particles().unwrap());
    let trajectories = session.get_trajectories().unwrap();
    assert_eq!(trajectories.len(), 4);
    assert!(trajectories.iter().all(|t| t.points.len() == 4));
}

#[test]
fn frames_stay_inside_the_sequence() {
    let mut session = initialized_session();
    assert!(matches!(
        session.set_frame(FRAMES),
        Err(Error::FrameOutOfRange {
            frame: FRAMES,
            first: 0,
            last: 4,
        })
    ));
    assert_eq!(session.frame().unwrap(), 0);
    session.set_frame(FRAMES - 1).unwrap();
    assert!(matches!(
        session.next_frame(),
        Err(Error::FrameOutOfRange { .. })
    ));
    assert_eq!(session.frame().unwrap(), FRAMES - 1);
}

#[test]
fn correspondences_are_grouped_by_camera_count() {
    let mut session = initialized_session();
    session.detect_particles().unwrap();
    assert!(matches!(
        session.correspondence_groups(),
        Err(Error::StageNotReady {
            stage: Stage::Correspondence,
            ..
        })
    ));
    session.find_correspondences().unwrap();

    let groups = session.correspondence_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].cameras, 3);
    assert_eq!(groups[0].positions.len(), 3);
    let calibration = session.calibration().unwrap();
    for (camera, positions) in calibration.cameras().iter().zip(&groups[0].positions) {
        assert_eq!(positions.len(), 4);
        for &(x, y) in positions.iter().map(|position| position.as_ref().unwrap()) {
            let nearest = particles(0)
                .iter()
                .map(|&particle| {
                    let keypoint = camera.project(particle).unwrap();
                    (keypoint.x - x).hypot(keypoint.y - y)
                })
                .fold(f64::INFINITY, f64::min);
            assert!(nearest < 0.1, "({}, {}) is {} px from every particle", x, y, nearest);
        }
    }
}

#[test]
fn trajectories_are_projected_on_every_camera() {
    let mut session = initialized_session();
    session.process_sequence(&AtomicBool::new(false)).unwrap();
    let projections = session.trajectory_projections().unwrap();
    assert_eq!(projections.len(), 3);
    let calibration = session.calibration().unwrap();
    for (camera, projection) in calibration.cameras().iter().zip(&projections) {
        assert_eq!(projection.camera, camera.id());
        assert_eq!(projection.heads.len(), 4);
        assert_eq!(projection.tails.len(), 4 * (FRAMES - 2));
        assert_eq!(projection.ends.len(), 4);
        for (points, frame) in [(&projection.heads, 0), (&projection.ends, FRAMES - 1)] {
            for &(x, y) in points {
                let nearest = particles(frame)
                    .iter()
                    .map(|&particle| {
                        let keypoint = camera.project(particle).unwrap();
                        (keypoint.x - x).hypot(keypoint.y - y)
                    })
                    .fold(f64::INFINITY, f64::min);
                assert!(nearest < 0.5, "frame {} ({}, {}) is {} px off", frame, x, y, nearest);
            }
        }
    }
}

#[test]
fn highpass_images_follow_the_detector_settings() {
    let (calibration, _) = memory_experiment();
    let mut images = MemorySequence::new();
    for camera in 0..calibration.len() {
        let mut image = GrayImage::from_pixel(64, 48, Luma([100]));
        image.put_pixel(30, 20, Luma([220]));
        images.insert(camera, 0, image);
    }

    let mut session = Session::new();
    session
        .initialize_with(calibration.clone(), settings(), images.clone())
        .unwrap();
    let unfiltered = session.apply_highpass().unwrap();
    assert_eq!(unfiltered.len(), 3);
    assert!(unfiltered.iter().all(|image| image.get_pixel(0, 0) == &Luma([100])));

    let mut filtered_settings = settings();
    filtered_settings.detector.highpass_size = Some(9);
    session
        .initialize_with(calibration, filtered_settings, images)
        .unwrap();
    let filtered = session.apply_highpass().unwrap();
    assert_eq!(filtered.len(), 3);
    for image in &filtered {
        assert_eq!(image.dimensions(), (64, 48));
        assert_eq!(image.get_pixel(0, 0), &Luma([0]));
        assert!(image.get_pixel(30, 20)[0] > 100);
    }

    session.set_frame(1).unwrap();
    assert!(matches!(
        session.apply_highpass(),
        Err(Error::Image { frame: 1, .. })
    ));
}

#[test]
fn whole_sequence_links_every_particle() {
    let mut session = initialized_session();
    session.process_sequence(&AtomicBool::new(false)).unwrap();
    assert_eq!(session.frame().unwrap(), FRAMES - 1);
    for frame in 0..FRAMES {
        assert_eq!(session.points(frame).unwrap().len(), 4);
        assert_eq!(session.targets(frame).unwrap().len(), 3);
    }
    let trajectories = session.get_trajectories().unwrap();
    assert_eq!(trajectories.len(), 4);
    for trajectory in &trajectories {
        assert_eq!(trajectory.status, TrajectoryStatus::Active);
        assert_eq!(trajectory.first_frame(), Some(0));
        assert_eq!(trajectory.last_frame(), Some(FRAMES - 1));
        let first = Point3::from(trajectory.points[0].position);
        let last = Point3::from(trajectory.points[FRAMES - 1].position);
        let travelled = (last - first) / (FRAMES - 1) as f64;
        assert_relative_eq!(travelled, Vector3::new(1.0, 0.5, 0.0), epsilon = 0.05);
    }
}

#[test]
fn cancelled_sequence_keeps_nothing_half_done() {
    let mut session = initialized_session();
    let result = session.process_sequence(&AtomicBool::new(true));
    assert!(matches!(result, Err(Error::Cancelled { frame: 0 })));
    assert!(session.targets(0).is_none());
    assert!(session.get_trajectories().unwrap().is_empty());
}

#[test]
fn missing_images_are_reported_with_their_frame() {
    let (calibration, _) = memory_experiment();
    let mut session = Session::new();
    session
        .initialize_with(calibration, settings(), MemorySequence::new())
        .unwrap();
    session.set_frame(2).unwrap();
    assert!(matches!(
        session.detect_particles(),
        Err(Error::Image { frame: 2, .. })
    ));
    assert!(session.targets(2).is_none());
}

#[test]
fn empty_images_are_not_an_error() {
    let (calibration, _) = memory_experiment();
    let mut images = MemorySequence::new();
    for camera in 0..calibration.len() {
        images.insert(camera, 0, GrayImage::new(WIDTH, HEIGHT));
    }
    let mut session = Session::new();
    session.initialize_with(calibration, settings(), images).unwrap();
    let positions = session.detect_particles().unwrap();
    assert!(positions.iter().all(Vec::is_empty));
    assert!(session.find_correspondences().unwrap().is_empty());
    assert!(session.track_particles().unwrap());
    assert!(session.get_trajectories().unwrap().is_empty());
}

#[test]
fn uninitialized_session_refuses_every_stage() {
    let mut session = Session::new();
    assert_eq!(session.state(), SessionState::Uninitialized);
    assert!(matches!(session.detect_particles(), Err(Error::NotInitialized)));
    assert!(matches!(session.get_trajectories(), Err(Error::NotInitialized)));

    let mut session = initialized_session();
    session.detect_particles().unwrap();
    session.reset();
    assert_eq!(session.state(), SessionState::Uninitialized);
    assert!(session.targets(0).is_none());
}

#[test]
fn experiment_directory_is_loaded_from_disk() {
    let _ = pretty_env_logger::try_init();
    let directory = tempfile::tempdir().unwrap();
    let parameters = calibration_parameters();
    let calibration = Calibration::from_parameters(&parameters).unwrap();
    let mut settings = settings();
    settings.sequence = SequenceRange::new(0, 1);
    settings.images = (0..calibration.len())
        .map(|camera| format!("cam{}.{{frame}}.png", camera))
        .collect();
    for frame in 0..2 {
        for camera in calibration.cameras() {
            render(camera, &particles(frame))
                .save(directory.path().join(format!("cam{}.{}.png", camera.id(), frame)))
                .unwrap();
        }
    }
    serde_json::to_writer_pretty(
        std::fs::File::create(directory.path().join(PARAMETERS_FILE)).unwrap(),
        &settings,
    )
    .unwrap();
    serde_json::to_writer_pretty(
        std::fs::File::create(directory.path().join(CALIBRATION_FILE)).unwrap(),
        &parameters,
    )
    .unwrap();

    let mut session = Session::new();
    assert_eq!(session.initialize(directory.path()).unwrap(), 3);
    assert_eq!(session.settings().unwrap(), &settings);
    session.process_sequence(&AtomicBool::new(false)).unwrap();
    let trajectories = session.get_trajectories().unwrap();
    assert_eq!(trajectories.len(), 4);
    assert!(trajectories.iter().all(|t| t.points.len() == 2));
}

#[test]
fn broken_experiments_fail_to_initialize() {
    let directory = tempfile::tempdir().unwrap();
    let mut session = Session::new();
    assert!(matches!(
        session.initialize(directory.path()),
        Err(Error::Io { .. })
    ));

    std::fs::write(directory.path().join(PARAMETERS_FILE), "{}").unwrap();
    let mut parameters = calibration_parameters();
    parameters.cameras.truncate(1);
    serde_json::to_writer(
        std::fs::File::create(directory.path().join(CALIBRATION_FILE)).unwrap(),
        &parameters,
    )
    .unwrap();
    assert!(matches!(
        session.initialize(directory.path()),
        Err(Error::InsufficientCameras(1))
    ));

    let mut parameters = calibration_parameters();
    parameters.cameras[1].focals[0] = -5.0;
    serde_json::to_writer(
        std::fs::File::create(directory.path().join(CALIBRATION_FILE)).unwrap(),
        &parameters,
    )
    .unwrap();
    assert!(matches!(
        session.initialize(directory.path()),
        Err(Error::InvalidCalibration(_))
    ));

    std::fs::write(directory.path().join(CALIBRATION_FILE), "{ \"cameras\": 3 }").unwrap();
    assert!(matches!(
        session.initialize(directory.path()),
        Err(Error::Parse { .. })
    ));
    assert_eq!(session.state(), SessionState::Uninitialized);
}
