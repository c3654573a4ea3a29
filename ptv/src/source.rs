use image::{GrayImage, ImageError};
use ptv_core::FrameIndex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The placeholder replaced by the frame index in image name patterns.
pub const FRAME_PLACEHOLDER: &str = "{frame}";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no image for camera {camera} at frame {frame}")]
    Missing { camera: usize, frame: FrameIndex },
    #[error("failed to open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
}

/// Provides the camera images of an experiment.
///
/// Images of different cameras are requested in parallel.
pub trait ImageSource: Send + Sync {
    fn image(&self, camera: usize, frame: FrameIndex) -> Result<GrayImage, SourceError>;
}

/// Images stored on disk, one file name pattern per camera.
///
/// `"cam1/img.{frame}.png"` resolves to `cam1/img.10002.png` at frame `10002`.
/// Relative patterns are resolved against `directory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSequence {
    directory: PathBuf,
    patterns: Vec<String>,
}

impl FileSequence {
    pub fn new(directory: impl Into<PathBuf>, patterns: Vec<String>) -> Self {
        Self {
            directory: directory.into(),
            patterns,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// The file holding the image of `camera` at `frame`.
    pub fn path(&self, camera: usize, frame: FrameIndex) -> Option<PathBuf> {
        let pattern = self.patterns.get(camera)?;
        Some(
            self.directory
                .join(pattern.replace(FRAME_PLACEHOLDER, &frame.to_string())),
        )
    }
}

impl ImageSource for FileSequence {
    fn image(&self, camera: usize, frame: FrameIndex) -> Result<GrayImage, SourceError> {
        let path = self
            .path(camera, frame)
            .ok_or(SourceError::Missing { camera, frame })?;
        match image::open(&path) {
            Ok(image) => Ok(image.to_luma8()),
            Err(source) => Err(SourceError::Open { path, source }),
        }
    }
}

/// Images held in memory, for tests and for callers that acquire images themselves.
#[derive(Debug, Clone, Default)]
pub struct MemorySequence {
    images: HashMap<(usize, FrameIndex), GrayImage>,
}

impl MemorySequence {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, camera: usize, frame: FrameIndex, image: GrayImage) {
        self.images.insert((camera, frame), image);
    }

    #[must_use]
    pub fn with(mut self, camera: usize, frame: FrameIndex, image: GrayImage) -> Self {
        self.insert(camera, frame, image);
        self
    }
}

impl ImageSource for MemorySequence {
    fn image(&self, camera: usize, frame: FrameIndex) -> Result<GrayImage, SourceError> {
        self.images
            .get(&(camera, frame))
            .cloned()
            .ok_or(SourceError::Missing { camera, frame })
    }
}
