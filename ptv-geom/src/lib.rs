//! This crate contains computational geometry algorithms on [`ptv_core::Ray`]s:
//! measuring how close two lines of sight pass to each other and locating the point that
//! best agrees with several of them.

pub mod triangulation;

pub use triangulation::*;
