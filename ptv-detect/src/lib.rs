//! # PTV Detect
//!
//! Turns a camera image into the [`Target`]s left on it by particles.
//!
//! The image is optionally highpass filtered to remove uneven illumination, thresholded, and the
//! pixels above the threshold are grouped into connected blobs. Blobs that are too small, too large
//! or too faint are rejected and the survivors become targets at their intensity weighted centroid.
//!
//! ```
//! use image::{GrayImage, Luma};
//! use ptv_detect::TargetDetector;
//!
//! let mut image = GrayImage::new(16, 16);
//! image.put_pixel(4, 7, Luma([200]));
//! image.put_pixel(5, 7, Luma([200]));
//!
//! let detections = TargetDetector::default().detect(&image, 0, 0);
//! let targets = detections.to_vec();
//! assert_eq!(targets.len(), 1);
//! assert_eq!(targets[0].position.x, 4.5);
//! ```

mod blobs;
mod highpass;

pub use highpass::highpass;

use blobs::{label_blobs, Blob};
use image::GrayImage;
use imageproc::region_labelling::Connectivity;
use log::*;
use ptv_core::{FrameIndex, Target};
use thiserror::Error;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("minimum blob size {min} exceeds maximum blob size {max}")]
    InvalidSizeBounds { min: u32, max: u32 },
    #[error("highpass filter size must be at least 3 pixels, got {0}")]
    InvalidHighpassSize(u32),
}

/// Which neighbours of a pixel belong to the same blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde-serialize", serde(rename_all = "lowercase"))]
pub enum BlobConnectivity {
    /// Only the pixels sharing an edge.
    Four,
    /// The pixels sharing an edge or a corner.
    Eight,
}

impl Default for BlobConnectivity {
    fn default() -> Self {
        Self::Eight
    }
}

impl From<BlobConnectivity> for Connectivity {
    fn from(connectivity: BlobConnectivity) -> Self {
        match connectivity {
            BlobConnectivity::Four => Connectivity::Four,
            BlobConnectivity::Eight => Connectivity::Eight,
        }
    }
}

/// Contains the configuration parameters of the target detector.
///
/// The most important parameter is `threshold`. [`TargetDetector::new`] sets it and leaves all other
/// parameters default. The default threshold is `40`.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct TargetDetector {
    /// Pixels strictly brighter than this gray level are part of a blob.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_threshold"))]
    pub threshold: u8,
    /// Smallest accepted blob in pixels.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_min_pixels"))]
    pub min_pixels: u32,
    /// Largest accepted blob in pixels.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_max_pixels"))]
    pub max_pixels: u32,
    /// Smallest accepted sum of the gray values of a blob.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub min_sum_gray: u64,
    /// Side of the box filter used to estimate the background. No filtering when `None`.
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub highpass_size: Option<u32>,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub connectivity: BlobConnectivity,
}

impl TargetDetector {
    /// This convenience constructor is provided for the very common case
    /// that the threshold needs to be modified.
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.min_pixels > self.max_pixels {
            return Err(DetectorError::InvalidSizeBounds {
                min: self.min_pixels,
                max: self.max_pixels,
            });
        }
        match self.highpass_size {
            Some(size) if size < 3 => Err(DetectorError::InvalidHighpassSize(size)),
            _ => Ok(()),
        }
    }

    /// Finds the targets of one camera image.
    ///
    /// An image without any pixel above the threshold (or without any pixel at all)
    /// produces empty [`Detections`].
    pub fn detect(&self, image: &GrayImage, camera: usize, frame: FrameIndex) -> Detections {
        let blobs = if image.width() == 0 || image.height() == 0 {
            vec![]
        } else {
            match self.highpass_size {
                Some(size) => {
                    trace!("Highpass filtering camera {} with size {}.", camera, size);
                    label_blobs(
                        &highpass(image, size),
                        self.threshold,
                        self.connectivity.into(),
                    )
                }
                None => label_blobs(image, self.threshold, self.connectivity.into()),
            }
        };
        let labelled = blobs.len();
        let blobs: Vec<Blob> = blobs
            .into_iter()
            .filter(|blob| self.accepts(blob))
            .collect();
        debug!(
            "Camera {} frame {}: {} blobs above threshold {}, {} accepted",
            camera,
            frame,
            labelled,
            self.threshold,
            blobs.len()
        );
        Detections {
            camera,
            frame,
            blobs,
        }
    }

    /// Finds the targets of every camera image of a frame.
    ///
    /// The image at position `i` is taken by camera `i`. With the `rayon` feature the
    /// cameras are processed in parallel.
    pub fn detect_all(&self, images: &[GrayImage], frame: FrameIndex) -> Vec<Detections> {
        #[cfg(feature = "rayon")]
        let detections: Vec<Detections> = images
            .par_iter()
            .enumerate()
            .map(|(camera, image)| self.detect(image, camera, frame))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let detections: Vec<Detections> = images
            .iter()
            .enumerate()
            .map(|(camera, image)| self.detect(image, camera, frame))
            .collect();
        info!(
            "Detected {} targets on {} cameras at frame {}",
            detections.iter().map(Detections::len).sum::<usize>(),
            detections.len(),
            frame
        );
        detections
    }

    fn accepts(&self, blob: &Blob) -> bool {
        (self.min_pixels..=self.max_pixels).contains(&blob.pixel_count)
            && blob.sum_gray >= self.min_sum_gray
    }
}

impl Default for TargetDetector {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            min_pixels: default_min_pixels(),
            max_pixels: default_max_pixels(),
            min_sum_gray: 0,
            highpass_size: None,
            connectivity: BlobConnectivity::default(),
        }
    }
}

fn default_threshold() -> u8 {
    40
}

fn default_min_pixels() -> u32 {
    1
}

fn default_max_pixels() -> u32 {
    100
}

/// The accepted blobs of one camera image.
///
/// Targets are produced on demand by [`Detections::iter`], which may be called any number of
/// times and always yields the same targets in image scan order.
#[derive(Debug, Clone, PartialEq)]
pub struct Detections {
    camera: usize,
    frame: FrameIndex,
    blobs: Vec<Blob>,
}

impl Detections {
    pub fn camera(&self) -> usize {
        self.camera
    }

    pub fn frame(&self) -> FrameIndex {
        self.frame
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn iter(&self) -> Targets<'_> {
        Targets {
            detections: self,
            blobs: self.blobs.iter().enumerate(),
        }
    }

    pub fn to_vec(&self) -> Vec<Target> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a Detections {
    type Item = Target;
    type IntoIter = Targets<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the targets of [`Detections`].
#[derive(Debug, Clone)]
pub struct Targets<'a> {
    detections: &'a Detections,
    blobs: std::iter::Enumerate<std::slice::Iter<'a, Blob>>,
}

impl<'a> Iterator for Targets<'a> {
    type Item = Target;

    fn next(&mut self) -> Option<Target> {
        let (index, blob) = self.blobs.next()?;
        Some(Target {
            camera: self.detections.camera,
            frame: self.detections.frame,
            index,
            position: blob.centroid(),
            pixel_count: blob.pixel_count,
            sum_gray: blob.sum_gray,
            bounds: blob.bounds,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.blobs.size_hint()
    }
}

impl<'a> ExactSizeIterator for Targets<'a> {}
