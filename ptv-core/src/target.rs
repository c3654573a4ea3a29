use crate::{FrameIndex, ImagePoint};
use nalgebra::Point2;

#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// Inclusive pixel bounds of a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    /// A box that covers exactly one pixel.
    pub fn pixel(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    /// Grows the box to also cover the pixel `(x, y)`.
    pub fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// A detected 2d particle image (blob) in one camera at one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Target {
    /// The camera the target was detected on (its index in the calibration).
    pub camera: usize,
    /// The frame the target was detected on.
    pub frame: FrameIndex,
    /// The position of the target in the detection scan order of its image.
    ///
    /// Only used as a stable identifier and tie-break.
    pub index: usize,
    /// Intensity weighted centroid in pixel coordinates.
    pub position: Point2<f64>,
    /// Number of pixels in the blob.
    pub pixel_count: u32,
    /// Sum of the gray values of the blob.
    pub sum_gray: u64,
    pub bounds: BoundingBox,
}

impl Target {
    /// The reference that identifies this target within its frame.
    pub fn reference(&self) -> TargetRef {
        TargetRef {
            camera: self.camera,
            target: self.index,
        }
    }
}

impl ImagePoint for Target {
    fn image_point(&self) -> Point2<f64> {
        self.position
    }
}

/// Identifies a [`Target`] within a frame: the camera and the target's scan order index.
///
/// Ordering is lexicographic by camera and then target, which is used as the final tie-break
/// whenever two otherwise equal choices must be ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct TargetRef {
    pub camera: usize,
    pub target: usize,
}

impl TargetRef {
    pub fn new(camera: usize, target: usize) -> Self {
        Self { camera, target }
    }
}
