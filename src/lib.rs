pub mod config;
pub mod error;
pub mod imgproc;
pub mod pipeline;
pub mod shapes;

pub use config::{RegionDerivation, TrackerConfig};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, Subject};
