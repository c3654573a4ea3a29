use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use ptv_core::{nalgebra::Point2, BoundingBox};

/// The moments of one connected component of above-threshold pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Blob {
    pub pixel_count: u32,
    pub sum_gray: u64,
    pub sum_x: u64,
    pub sum_y: u64,
    pub bounds: BoundingBox,
}

impl Blob {
    fn new(x: u32, y: u32) -> Self {
        Self {
            pixel_count: 0,
            sum_gray: 0,
            sum_x: 0,
            sum_y: 0,
            bounds: BoundingBox::pixel(x, y),
        }
    }

    fn add(&mut self, x: u32, y: u32, gray: u8) {
        let gray = u64::from(gray);
        self.pixel_count += 1;
        self.sum_gray += gray;
        self.sum_x += gray * u64::from(x);
        self.sum_y += gray * u64::from(y);
        self.bounds.include(x, y);
    }

    /// Intensity weighted centroid.
    ///
    /// Falls back to the center of the bounding box when the blob has no intensity at all,
    /// which only happens with a zero threshold and a black blob.
    pub fn centroid(&self) -> Point2<f64> {
        if self.sum_gray == 0 {
            return Point2::new(
                (self.bounds.min_x + self.bounds.max_x) as f64 / 2.0,
                (self.bounds.min_y + self.bounds.max_y) as f64 / 2.0,
            );
        }
        let sum = self.sum_gray as f64;
        Point2::new(self.sum_x as f64 / sum, self.sum_y as f64 / sum)
    }
}

/// Labels the pixels strictly brighter than `threshold` into connected components
/// and accumulates their moments.
///
/// Blobs are returned in the order their first pixel appears in a row-major scan.
pub(crate) fn label_blobs(image: &GrayImage, threshold: u8, connectivity: Connectivity) -> Vec<Blob> {
    let mask = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if image.get_pixel(x, y).0[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let labels = connected_components(&mask, connectivity, Luma([0u8]));

    // Maps component labels onto blob indices in scan order.
    let mut order: Vec<Option<usize>> = vec![];
    let mut blobs: Vec<Blob> = vec![];
    for (x, y, &Luma([label])) in labels.enumerate_pixels() {
        if label == 0 {
            continue;
        }
        let label = label as usize;
        if order.len() <= label {
            order.resize(label + 1, None);
        }
        let index = *order[label].get_or_insert_with(|| {
            blobs.push(Blob::new(x, y));
            blobs.len() - 1
        });
        blobs[index].add(x, y, image.get_pixel(x, y).0[0]);
    }
    blobs
}
