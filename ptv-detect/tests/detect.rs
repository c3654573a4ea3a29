use approx::assert_relative_eq;
use image::{GrayImage, Luma};
use ptv_detect::{BlobConnectivity, DetectorError, TargetDetector};

/// Draws a small particle image with a bright core and a dimmer cross around it.
fn draw_particle(image: &mut GrayImage, x: u32, y: u32) {
    image.put_pixel(x, y, Luma([220]));
    for (dx, dy) in [(1i32, 0i32), (-1, 0), (0, 1), (0, -1)] {
        image.put_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32, Luma([120]));
    }
}

#[test]
fn all_background_image_has_no_targets() {
    let _ = pretty_env_logger::try_init();
    let image = GrayImage::from_pixel(64, 48, Luma([30]));
    let detections = TargetDetector::default().detect(&image, 0, 3);
    assert!(detections.is_empty());
    assert_eq!(detections.iter().count(), 0);
}

#[test]
fn empty_image_has_no_targets() {
    let image = GrayImage::new(0, 0);
    assert!(TargetDetector::default().detect(&image, 1, 0).is_empty());
}

#[test]
fn symmetric_particle_is_found_at_its_center() {
    let mut image = GrayImage::new(32, 32);
    draw_particle(&mut image, 10, 20);
    let targets = TargetDetector::default().detect(&image, 2, 7).to_vec();
    assert_eq!(targets.len(), 1);
    let target = targets[0];
    assert_eq!(target.camera, 2);
    assert_eq!(target.frame, 7);
    assert_eq!(target.index, 0);
    assert_eq!(target.pixel_count, 5);
    assert_eq!(target.sum_gray, 220 + 4 * 120);
    assert_relative_eq!(target.position.x, 10.0);
    assert_relative_eq!(target.position.y, 20.0);
    assert_eq!((target.bounds.width(), target.bounds.height()), (3, 3));
}

#[test]
fn centroid_is_intensity_weighted() {
    let mut image = GrayImage::new(8, 8);
    image.put_pixel(2, 2, Luma([100]));
    image.put_pixel(3, 2, Luma([200]));
    image.put_pixel(4, 2, Luma([100]));
    image.put_pixel(5, 2, Luma([200]));
    let targets = TargetDetector::default().detect(&image, 0, 0).to_vec();
    assert_eq!(targets.len(), 1);
    assert_relative_eq!(targets[0].position.x, (200.0 + 600.0 + 400.0 + 1000.0) / 600.0);
    assert_relative_eq!(targets[0].position.y, 2.0);
}

#[test]
fn size_bounds_reject_blobs() {
    let mut image = GrayImage::new(32, 32);
    // A single hot pixel, a particle and a large reflection.
    image.put_pixel(1, 1, Luma([255]));
    draw_particle(&mut image, 10, 10);
    for x in 18..26 {
        for y in 18..26 {
            image.put_pixel(x, y, Luma([180]));
        }
    }
    let detector = TargetDetector {
        min_pixels: 2,
        max_pixels: 20,
        ..TargetDetector::default()
    };
    let targets = detector.detect(&image, 0, 0).to_vec();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].pixel_count, 5);
    // Indices are dense over the accepted targets.
    assert_eq!(targets[0].index, 0);
}

#[test]
fn faint_blobs_are_rejected_by_summed_gray() {
    let mut image = GrayImage::new(16, 16);
    image.put_pixel(3, 3, Luma([50]));
    draw_particle(&mut image, 10, 10);
    let detector = TargetDetector {
        min_sum_gray: 100,
        ..TargetDetector::default()
    };
    let targets = detector.detect(&image, 0, 0).to_vec();
    assert_eq!(targets.len(), 1);
    assert_relative_eq!(targets[0].position.x, 10.0);
}

#[test]
fn highpass_removes_uneven_illumination() {
    // A bright gradient that crosses the threshold on its right half, with the
    // particle sitting in the bright part.
    let mut image = GrayImage::from_fn(64, 16, |x, _| Luma([(x * 2) as u8]));
    draw_particle(&mut image, 45, 8);
    let plain = TargetDetector::new(60).detect(&image, 0, 0);
    assert!(plain.is_empty());

    let filtered = TargetDetector {
        highpass_size: Some(9),
        ..TargetDetector::new(60)
    }
    .detect(&image, 0, 0)
    .to_vec();
    assert_eq!(filtered.len(), 1);
    assert_relative_eq!(filtered[0].position.x, 45.0, epsilon = 0.5);
    assert_relative_eq!(filtered[0].position.y, 8.0, epsilon = 0.5);
}

#[test]
fn iteration_is_restartable() {
    let mut image = GrayImage::new(32, 32);
    draw_particle(&mut image, 5, 5);
    draw_particle(&mut image, 20, 9);
    draw_particle(&mut image, 12, 25);
    let detections = TargetDetector::default().detect(&image, 0, 0);
    let first: Vec<_> = detections.iter().collect();
    let second: Vec<_> = (&detections).into_iter().collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    let order: Vec<_> = first.iter().map(|t| t.position.y as u32).collect();
    assert_eq!(order, vec![5, 9, 25]);
}

#[test]
fn four_connectivity_splits_diagonal_pixels() {
    let mut image = GrayImage::new(8, 8);
    image.put_pixel(2, 2, Luma([200]));
    image.put_pixel(3, 3, Luma([200]));
    let eight = TargetDetector::default().detect(&image, 0, 0);
    let four = TargetDetector {
        connectivity: BlobConnectivity::Four,
        ..TargetDetector::default()
    }
    .detect(&image, 0, 0);
    assert_eq!(eight.len(), 1);
    assert_eq!(four.len(), 2);
}

#[test]
fn detect_all_keeps_camera_order() {
    let mut busy = GrayImage::new(16, 16);
    draw_particle(&mut busy, 4, 4);
    draw_particle(&mut busy, 11, 11);
    let quiet = GrayImage::new(16, 16);
    let detections = TargetDetector::default().detect_all(&[busy, quiet], 4);
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].camera(), 0);
    assert_eq!(detections[0].len(), 2);
    assert_eq!(detections[1].camera(), 1);
    assert!(detections[1].is_empty());
    assert!(detections.iter().all(|d| d.frame() == 4));
}

#[test]
fn validation_rejects_inconsistent_settings() {
    let detector = TargetDetector {
        min_pixels: 10,
        max_pixels: 5,
        ..TargetDetector::default()
    };
    assert_eq!(
        detector.validate(),
        Err(DetectorError::InvalidSizeBounds { min: 10, max: 5 })
    );
    let detector = TargetDetector {
        highpass_size: Some(1),
        ..TargetDetector::default()
    };
    assert_eq!(detector.validate(), Err(DetectorError::InvalidHighpassSize(1)));
    assert_eq!(TargetDetector::default().validate(), Ok(()));
}
