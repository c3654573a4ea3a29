//! This crate plugs into `ptv-core` and provides the calibration model of a PTV camera rig:
//! pinhole cameras with radial distortion that observe the particles through one or more
//! planar refractive interfaces (the "multimedia" model, for instance air, a glass wall and water).
//! It can be used to convert image coordinates into rays inside the observation medium, and
//! to convert backwards from 3d points in the medium to image coordinates, using the
//! [`ptv_core::CameraModel`] trait.

mod calibration;
mod camera;
mod intrinsics;
mod multimedia;

pub use calibration::*;
pub use camera::*;
pub use intrinsics::*;
pub use multimedia::*;
