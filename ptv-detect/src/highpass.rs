use image::{GrayImage, Luma};
use imageproc::filter::box_filter;

/// Removes the slowly varying background of a particle image.
///
/// The background is estimated with a `size` x `size` box filter and subtracted from the image.
/// Pixels darker than their background are clamped to zero. A size below `3` leaves the image unchanged.
pub fn highpass(image: &GrayImage, size: u32) -> GrayImage {
    if size < 3 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }
    let radius = size / 2;
    let background = box_filter(image, radius, radius);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let Luma([value]) = *image.get_pixel(x, y);
        let Luma([background]) = *background.get_pixel(x, y);
        Luma([value.saturating_sub(background)])
    })
}
