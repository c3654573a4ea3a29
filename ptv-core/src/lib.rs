//! # PTV Core
//!
//! This library provides the common abstractions and types for 3d particle tracking velocimetry (PTV).
//! All the crates in the workspace that produce or consume particle observations depend on this crate.
//! This includes things like the camera model trait, image points, detected targets, rays in the
//! observation volume and triangulated candidate points. The crate is kept deliberately small so that
//! every stage of the pipeline (detection, correspondence, tracking) can share one vocabulary.
//!
//! ## Pipeline vocabulary
//!
//! A PTV experiment images a volume of seeded fluid with several calibrated cameras at once.
//! Each camera image is reduced to a list of [`Target`]s, the 2d blobs left by particles on the
//! sensor. Every [`Target`] can be turned into a [`Ray`] by a [`CameraModel`]. The ray starts where
//! the light left the last refractive interface and points into the observation medium. Rays from
//! different cameras that pass close to each other probably saw the same particle, and their
//! closest point is a [`Candidate3DPoint`].
//!
//! - `p` the particle we are trying to locate
//! - `a` the target of the particle on camera A
//! - `b` the target of the particle on camera B
//! - `O` the optical center of a camera
//! - `~` the interface between the air and the medium (for instance a glass wall of a water tank)
//!
//! ```text
//!      O                   O
//!       \                 /
//!        a               b
//!         \             /
//!   ~~~~~~~~\~~~~~~~~~~~/~~~~~~~~~
//!            |         /
//!             |      /
//!              |   /
//!               p
//! ```
//!
//! The rays bend at the interface, which is why the camera model produces a full [`Ray`]
//! (origin and direction) rather than only a bearing out of the optical center.

mod camera;
mod keypoint;
mod point;
mod pose;
mod ray;
mod target;

pub use camera::*;
pub use keypoint::*;
pub use nalgebra;
pub use point::*;
pub use pose::*;
pub use ray::*;
pub use target::*;

/// The index of a frame in an image sequence.
pub type FrameIndex = usize;
