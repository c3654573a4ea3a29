//! # `ptv`
//!
//! Batteries-included multi-camera 3d particle tracking velocimetry.
//!
//! A PTV experiment films a seeded flow with several calibrated cameras at once. For every frame the
//! particles are detected on each camera image, matched across cameras and triangulated into 3d
//! points, and the points are linked from frame to frame into trajectories. The [`Session`] runs
//! these stages for one experiment at a time and caches what every stage produced.
//!
//! ```no_run
//! use ptv::Session;
//!
//! let mut session = Session::new();
//! let cameras = session.initialize("experiments/tank").unwrap();
//! println!("{} cameras", cameras);
//! session.detect_particles().unwrap();
//! session.find_correspondences().unwrap();
//! session.track_particles().unwrap();
//! for trajectory in session.get_trajectories().unwrap() {
//!     println!("{:?}", trajectory);
//! }
//! ```
//!
//! The stages are also available on their own:
//!
//! ## Modules
//! * [`camera`] - camera models looking through refractive interfaces, and their calibration
//! * [`geom`] - ray geometry and triangulation
//! * [`detect`] - particle detection on camera images
//! * [`correspondence`] - matching particles across cameras
//! * [`track`] - linking particles into trajectories

mod error;
mod session;
mod settings;
mod source;
mod summary;

pub use error::*;
pub use ptv_core::*;
pub use session::*;
pub use settings::{PtvSettings, SequenceRange, CALIBRATION_FILE, PARAMETERS_FILE};
pub use source::*;
pub use summary::*;

/// Camera models and calibration
pub mod camera {
    pub use ptv_multimedia::*;
}

/// Computational geometry
pub mod geom {
    pub use ptv_geom::*;
}

/// Particle detection
pub mod detect {
    pub use ptv_detect::*;
}

/// Correspondence search across cameras
pub mod correspondence {
    pub use ptv_correspondence::*;
}

/// Particle tracking across frames
pub mod track {
    pub use ptv_track::*;
}
