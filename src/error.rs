use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed frame or tensor handed to the pipeline
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A region with no area reached a crop
    #[error("Degenerate region: {width}x{height}")]
    DegenerateRegion { width: f64, height: f64 },

    #[error("Cannot compute bounds of an empty point set")]
    EmptyPointSet,

    /// A configured keypoint index is outside the keypoints provided
    #[error("Keypoint {index} requested but only {len} available")]
    MissingKeypoint { index: usize, len: usize },

    /// Detector or landmark model failure, passed through untouched
    #[error(transparent)]
    ExternalModel(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
