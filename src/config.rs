use crate::error::{Error, Result};
use crate::imgproc::OutputRange;
use crate::shapes::region::IouMode;

/// How a crop window is grown out of a set of keypoints.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDerivation {
    /// Offset as a fraction of the keypoint bounds, applied before squaring
    pub shift: [f64; 2],
    pub enlarge: f64,
    /// Keypoints whose direction gets rotated to point straight up
    pub rotation_keypoints: (usize, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    pub max_subjects: usize,
    /// Frames the detector may be skipped before it is forced to run again.
    /// `None` keeps tracking for as long as every subject stays in view.
    pub max_continuous_checks: Option<usize>,
    pub presence_threshold: f32,
    /// Candidate regions overlapping the tracked one by more than this are
    /// dropped in favour of the tracked one
    pub iou_threshold: f64,
    pub iou_mode: IouMode,
    /// Used on the frame a detection arrives
    pub fresh: RegionDerivation,
    /// Used to derive the next frame's region from predicted landmarks
    pub tracked: RegionDerivation,
    /// Landmarks kept on the tracked region; all of them when unset
    pub retained_keypoints: Option<Vec<usize>>,
    pub annotations: Vec<(String, Vec<usize>)>,
    pub input_range: OutputRange,
}

const HAND_PALM_LANDMARKS: [usize; 7] = [0, 5, 9, 13, 17, 1, 2];
// Indices into HAND_PALM_LANDMARKS: wrist and middle finger base
const HAND_ROTATION_KEYPOINTS: (usize, usize) = (0, 2);

const HAND_ANNOTATIONS: [(&str, &[usize]); 6] = [
    ("thumb", &[1, 2, 3, 4]),
    ("indexFinger", &[5, 6, 7, 8]),
    ("middleFinger", &[9, 10, 11, 12]),
    ("ringFinger", &[13, 14, 15, 16]),
    ("pinky", &[17, 18, 19, 20]),
    ("palmBase", &[0]),
];

// BlazeFace keypoints: mouth center to nose tip
const FACE_DETECTION_ROTATION_KEYPOINTS: (usize, usize) = (3, 2);
// Face mesh: nose tip to the point between the eyes
const FACE_MESH_ROTATION_KEYPOINTS: (usize, usize) = (1, 168);

const FACE_ANNOTATIONS: [(&str, &[usize]); 4] = [
    ("midwayBetweenEyes", &[168]),
    ("noseTip", &[1]),
    ("leftCheek", &[425]),
    ("rightCheek", &[205]),
];

fn annotations(groups: &[(&str, &[usize])]) -> Vec<(String, Vec<usize>)> {
    groups
        .iter()
        .map(|(name, idxs)| (name.to_string(), idxs.to_vec()))
        .collect()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_subjects: 1,
            max_continuous_checks: None,
            presence_threshold: 0.8,
            iou_threshold: 0.8,
            iou_mode: IouMode::Clamped,
            fresh: RegionDerivation {
                shift: [0., 0.],
                enlarge: 1.5,
                rotation_keypoints: (0, 1),
            },
            tracked: RegionDerivation {
                shift: [0., -0.1],
                enlarge: 1.5,
                rotation_keypoints: (0, 1),
            },
            retained_keypoints: None,
            annotations: Vec::new(),
            input_range: OutputRange::ZeroToOne,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_subjects == 0 {
            return Err(Error::InvalidInput(
                "max_subjects must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Palm detector followed by a 21 point hand landmark model.
    pub fn hand() -> Self {
        Self {
            fresh: RegionDerivation {
                shift: [0., -0.4],
                enlarge: 3.,
                rotation_keypoints: HAND_ROTATION_KEYPOINTS,
            },
            tracked: RegionDerivation {
                shift: [0., -0.1],
                enlarge: 1.65,
                rotation_keypoints: HAND_ROTATION_KEYPOINTS,
            },
            retained_keypoints: Some(HAND_PALM_LANDMARKS.to_vec()),
            annotations: annotations(&HAND_ANNOTATIONS),
            ..Default::default()
        }
    }

    /// Face detector followed by a 468 point face mesh model.
    pub fn face() -> Self {
        Self {
            max_continuous_checks: Some(5),
            presence_threshold: 0.9,
            fresh: RegionDerivation {
                shift: [0., 0.],
                enlarge: 1.5,
                rotation_keypoints: FACE_DETECTION_ROTATION_KEYPOINTS,
            },
            tracked: RegionDerivation {
                shift: [0., 0.],
                enlarge: 1.5,
                rotation_keypoints: FACE_MESH_ROTATION_KEYPOINTS,
            },
            annotations: annotations(&FACE_ANNOTATIONS),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert!(TrackerConfig::default().validate().is_ok());
        assert!(TrackerConfig::hand().validate().is_ok());
        assert!(TrackerConfig::face().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_subjects() {
        let config = TrackerConfig {
            max_subjects: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_hand_rotation_keypoints_are_retained() {
        let config = TrackerConfig::hand();
        let retained = config.retained_keypoints.unwrap();
        let (from, to) = config.tracked.rotation_keypoints;
        // wrist and middle finger base
        assert_eq!((retained[from], retained[to]), (0, 9));
    }
}
