use crate::Error;
use ptv_core::FrameIndex;
use ptv_correspondence::{CorrespondenceEngine, CorrespondenceSettings};
use ptv_detect::TargetDetector;
use ptv_track::{Tracker, TrackerSettings};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;

/// The file in an experiment directory holding the [`PtvSettings`].
pub const PARAMETERS_FILE: &str = "parameters.json";
/// The file in an experiment directory holding the calibration of the cameras.
pub const CALIBRATION_FILE: &str = "calibration.json";

/// The frames of an experiment, both ends included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SequenceRange {
    #[serde(default)]
    pub first: FrameIndex,
    #[serde(default)]
    pub last: FrameIndex,
}

impl SequenceRange {
    pub fn new(first: FrameIndex, last: FrameIndex) -> Self {
        Self { first, last }
    }

    pub fn frames(&self) -> std::ops::RangeInclusive<FrameIndex> {
        self.first..=self.last
    }

    pub fn contains(&self, frame: FrameIndex) -> bool {
        self.frames().contains(&frame)
    }
}

/// The settings for the whole pipeline.
///
/// Every field may be left out of a parameters file and takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PtvSettings {
    #[serde(default)]
    pub detector: TargetDetector,
    #[serde(default)]
    pub correspondence: CorrespondenceSettings,
    #[serde(default)]
    pub tracker: TrackerSettings,
    #[serde(default)]
    pub sequence: SequenceRange,
    /// One image file name pattern per camera, see [`crate::FileSequence`].
    #[serde(default)]
    pub images: Vec<String>,
}

impl PtvSettings {
    /// Reads the settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        read_json(path.as_ref())
    }

    /// Checks every stage's settings once, so the stages never see bad values.
    pub fn validate(&self) -> Result<(), Error> {
        self.detector.validate()?;
        CorrespondenceEngine::new(self.correspondence)?;
        Tracker::new(self.tracker)?;
        if self.sequence.first > self.sequence.last {
            return Err(Error::Settings(format!(
                "sequence starts at frame {} but ends at frame {}",
                self.sequence.first, self.sequence.last
            )));
        }
        Ok(())
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let file = std::fs::File::open(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| Error::Parse {
        path: path.to_owned(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let settings: PtvSettings = serde_json::from_str(
            r#"{ "detector": { "threshold": 12 }, "tracker": { "gap_tolerance": 4 } }"#,
        )
        .unwrap();
        assert_eq!(settings.detector.threshold, 12);
        assert_eq!(settings.detector.max_pixels, TargetDetector::default().max_pixels);
        assert_eq!(settings.tracker.gap_tolerance, 4);
        assert_eq!(settings.tracker.search_radius, 2.0);
        assert_eq!(settings.correspondence, CorrespondenceSettings::default());
        assert!(settings.images.is_empty());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn connectivity_is_lowercase() {
        let settings: PtvSettings =
            serde_json::from_str(r#"{ "detector": { "connectivity": "four" } }"#).unwrap();
        assert_eq!(
            settings.detector.connectivity,
            ptv_detect::BlobConnectivity::Four
        );
    }

    #[test]
    fn validation_catches_every_stage() {
        let mut settings = PtvSettings::default();
        settings.correspondence.min_cameras = 1;
        assert!(matches!(settings.validate(), Err(Error::Settings(_))));

        let mut settings = PtvSettings::default();
        settings.tracker.search_radius = -1.0;
        assert!(matches!(settings.validate(), Err(Error::Settings(_))));

        let mut settings = PtvSettings::default();
        settings.sequence = SequenceRange::new(5, 2);
        assert!(matches!(settings.validate(), Err(Error::Settings(_))));

        let mut settings = PtvSettings::default();
        settings.detector.min_pixels = 1000;
        assert!(matches!(settings.validate(), Err(Error::Settings(_))));
    }
}
