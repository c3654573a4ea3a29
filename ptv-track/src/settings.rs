#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The settings for linking particles between frames.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TrackerSettings {
    /// The largest distance, in world units, between the predicted position of a trajectory
    /// and a particle it may be linked to.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_search_radius"))]
    pub search_radius: f64,
    /// The most consecutive frames a trajectory may go without a particle before it is terminated.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_gap_tolerance"))]
    pub gap_tolerance: usize,
    /// How much a change of direction adds to the link cost, relative to travelling the whole search radius.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_angle_weight"))]
    pub angle_weight: f64,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            search_radius: default_search_radius(),
            gap_tolerance: default_gap_tolerance(),
            angle_weight: default_angle_weight(),
        }
    }
}

fn default_search_radius() -> f64 {
    2.0
}

fn default_gap_tolerance() -> usize {
    2
}

fn default_angle_weight() -> f64 {
    0.5
}
