use crate::{source::SourceError, Stage};
use ptv_core::FrameIndex;
use ptv_correspondence::CorrespondenceError;
use ptv_detect::DetectorError;
use ptv_multimedia::CalibrationError;
use ptv_track::TrackError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
    #[error("at least 2 cameras are required, but {0} were configured")]
    InsufficientCameras(usize),
    #[error("{stage} is not ready for frame {frame}: {reason}")]
    StageNotReady {
        frame: FrameIndex,
        stage: Stage,
        reason: String,
    },
    #[error("frame {frame} is outside the sequence {first} to {last}")]
    FrameOutOfRange {
        frame: FrameIndex,
        first: FrameIndex,
        last: FrameIndex,
    },
    #[error("the session has not been initialized")]
    NotInitialized,
    #[error("failed to load the image of camera {camera} at frame {frame}")]
    Image {
        frame: FrameIndex,
        camera: usize,
        #[source]
        source: SourceError,
    },
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid settings: {0}")]
    Settings(String),
    #[error("processing was cancelled before frame {frame}")]
    Cancelled { frame: FrameIndex },
}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        match e {
            CalibrationError::InvalidCalibration(reason) => Self::InvalidCalibration(reason),
            CalibrationError::InsufficientCameras(count) => Self::InsufficientCameras(count),
        }
    }
}

impl From<CorrespondenceError> for Error {
    fn from(e: CorrespondenceError) -> Self {
        match e {
            CorrespondenceError::InsufficientCameras(count) => Self::InsufficientCameras(count),
            CorrespondenceError::CameraCountMismatch { .. }
            | CorrespondenceError::InvalidSettings(_) => Self::Settings(e.to_string()),
        }
    }
}

impl From<DetectorError> for Error {
    fn from(e: DetectorError) -> Self {
        Self::Settings(e.to_string())
    }
}

impl From<TrackError> for Error {
    fn from(e: TrackError) -> Self {
        match e {
            TrackError::OutOfOrder { last, frame } => Self::StageNotReady {
                frame,
                stage: Stage::Tracking,
                reason: format!("frame {} was already tracked", last),
            },
            TrackError::Cancelled { frame } => Self::Cancelled { frame },
            TrackError::InvalidSettings(_) => Self::Settings(e.to_string()),
        }
    }
}
