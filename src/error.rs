//! Error types for the visual acuity library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `OpenCV` operation failed
    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// YAML (de)serialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Display pixel pitch missing or not positive
    #[error("Pixel pitch unavailable: {0}")]
    PitchUnavailable(String),

    /// Too few confirmed calibration samples
    #[error("Insufficient calibration data: {captured} samples captured, {required} required")]
    InsufficientData {
        /// Samples confirmed by the operator
        captured: usize,
        /// Minimum the solver needs
        required: usize,
    },

    /// Calibration solve did not converge or produced a non-finite focal length
    #[error("Calibration solve failed: {0}")]
    SolveFailed(String),

    /// Camera could not be opened or read
    #[error("Camera unavailable: {0}")]
    CameraUnavailable(String),

    /// Landmark helper failed to start or answer
    #[error("Landmark provider error: {0}")]
    LandmarkProvider(String),

    /// Recommendation text service failed
    #[error("Recommendation service error: {0}")]
    Recommendation(String),

    /// Quit requested by the operator
    #[error("Session cancelled by operator")]
    Cancelled,
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
