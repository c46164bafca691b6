//! Configuration management for the visual acuity test

use crate::{
    calibration::PatternGeometry,
    constants::{
        AVERAGE_FACE_WIDTH_M, DEFAULT_CALIBRATION_SAMPLES, DEFAULT_FOCAL_LENGTH_PX, DEFAULT_HELPER_REPLY_TIMEOUT_MS,
        DEFAULT_HELPER_STARTUP_TIMEOUT_MS, DEFAULT_NO_INPUT_TIMEOUT_MS,
        DEFAULT_PATTERN_COLS, DEFAULT_PATTERN_ROWS, DEFAULT_SAMPLE_INTERVAL_MS, DEFAULT_SCREEN_DIAGONAL_IN,
        DEFAULT_SQUARE_SIZE_M, DEFAULT_STABILITY_MS, DEFAULT_WINDOW_MS, MIN_BASELINE_PX, MIN_CALIBRATION_SAMPLES,
        MIN_FACE_WIDTH_PX, MIN_VISIBLE_PX, REFERENCE_DISTANCE_M,
    },
    distance::DistanceEstimator,
    optotype::{OptotypeScaler, PixelPitch},
    voting::VotingConfig,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera configuration
    pub camera: CameraConfig,

    /// Physical screen geometry
    pub screen: ScreenConfig,

    /// Distance estimation
    pub distance: DistanceConfig,

    /// Optotype size floors
    pub optotype: OptotypeConfig,

    /// Stability voting timing
    pub voting: VotingSettings,

    /// Chessboard calibration
    pub calibration: CalibrationConfig,

    /// External landmark helper
    pub landmarks: LandmarkConfig,

    /// Report output
    pub report: ReportConfig,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Webcam index
    pub index: i32,

    /// Mirror frames horizontally
    pub mirror: bool,

    /// Replay still images from this directory instead of a webcam
    pub frames_dir: Option<PathBuf>,

    /// Restart the replay when the last image is reached
    pub loop_frames: bool,
}

/// Physical screen geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Diagonal size in inches
    pub diagonal_in: f64,

    /// Horizontal resolution
    pub width_px: u32,

    /// Vertical resolution
    pub height_px: u32,

    /// Open the test window full screen
    pub fullscreen: bool,
}

/// Distance estimation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    /// Assumed real face width in meters
    pub real_face_width_m: f64,

    /// Focal length used when the camera has no calibration
    pub default_focal_length_px: f64,

    /// Test distance at which baselines are computed, and the fallback distance
    pub reference_distance_m: f64,

    /// Face widths at or below this are ignored
    pub min_face_width_px: f64,
}

/// Optotype size floors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptotypeConfig {
    /// Smallest baseline size
    pub min_baseline_px: u32,

    /// Smallest size after rescaling
    pub min_visible_px: u32,
}

/// Stability voting timing in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingSettings {
    /// Sampling window
    pub window_ms: u64,

    /// Persistence needed for confirmation
    pub stability_ms: u64,

    /// Idle time before the no-input notice
    pub no_input_timeout_ms: u64,

    /// Pause between samples
    pub sample_interval_ms: u64,
}

/// Chessboard calibration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Inner corners per row
    pub pattern_cols: u32,

    /// Inner corners per column
    pub pattern_rows: u32,

    /// Square edge in meters
    pub square_size_m: f64,

    /// Frames to collect
    pub target_samples: usize,

    /// Per-camera focal length store
    pub store_path: PathBuf,
}

/// External landmark helper process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkConfig {
    /// Helper executable
    pub command: Option<String>,

    /// Helper arguments
    pub args: Vec<String>,

    /// Wait for the helper's ready line
    pub startup_timeout_ms: u64,

    /// Wait for each detection reply
    pub reply_timeout_ms: u64,
}

/// Report output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Root folder for per-subject results
    pub results_dir: PathBuf,
}

impl Default for LandmarkConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            startup_timeout_ms: DEFAULT_HELPER_STARTUP_TIMEOUT_MS,
            reply_timeout_ms: DEFAULT_HELPER_REPLY_TIMEOUT_MS,
        }
    }
}

impl LandmarkConfig {
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    #[must_use]
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            mirror: true,
            frames_dir: None,
            loop_frames: true,
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            diagonal_in: DEFAULT_SCREEN_DIAGONAL_IN,
            width_px: 1920,
            height_px: 1080,
            fullscreen: false,
        }
    }
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            real_face_width_m: AVERAGE_FACE_WIDTH_M,
            default_focal_length_px: DEFAULT_FOCAL_LENGTH_PX,
            reference_distance_m: REFERENCE_DISTANCE_M,
            min_face_width_px: MIN_FACE_WIDTH_PX,
        }
    }
}

impl Default for OptotypeConfig {
    fn default() -> Self {
        Self {
            min_baseline_px: MIN_BASELINE_PX,
            min_visible_px: MIN_VISIBLE_PX,
        }
    }
}

impl Default for VotingSettings {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            stability_ms: DEFAULT_STABILITY_MS,
            no_input_timeout_ms: DEFAULT_NO_INPUT_TIMEOUT_MS,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            pattern_cols: DEFAULT_PATTERN_COLS,
            pattern_rows: DEFAULT_PATTERN_ROWS,
            square_size_m: DEFAULT_SQUARE_SIZE_M,
            target_samples: DEFAULT_CALIBRATION_SAMPLES,
            store_path: PathBuf::from("camera_focals.yaml"),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Display pixel pitch from the screen section
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an invalid diagonal or resolution
    pub fn pixel_pitch(&self) -> Result<PixelPitch> {
        PixelPitch::from_screen(self.screen.diagonal_in, self.screen.width_px, self.screen.height_px)
    }

    /// Optotype scaler for the configured screen
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an invalid screen geometry
    pub fn optotype_scaler(&self) -> Result<OptotypeScaler> {
        Ok(OptotypeScaler::new(Some(self.pixel_pitch()?))
            .with_reference_distance(self.distance.reference_distance_m)
            .with_floors(self.optotype.min_baseline_px, self.optotype.min_visible_px))
    }

    /// Distance estimator using `focal_length_px` from the calibration store
    #[must_use]
    pub fn distance_estimator(&self, focal_length_px: Option<f64>) -> DistanceEstimator {
        DistanceEstimator::new(focal_length_px)
            .with_real_face_width(self.distance.real_face_width_m)
            .with_defaults(self.distance.default_focal_length_px, self.distance.reference_distance_m)
            .with_min_face_width(self.distance.min_face_width_px)
    }

    /// Voting controller timing
    #[must_use]
    pub fn voting_config(&self) -> VotingConfig {
        VotingConfig {
            window: Duration::from_millis(self.voting.window_ms),
            stability: Duration::from_millis(self.voting.stability_ms),
            no_input_timeout: Duration::from_millis(self.voting.no_input_timeout_ms),
        }
    }

    /// Largest optotype the screen can show, its shorter side
    #[must_use]
    pub fn max_optotype_px(&self) -> u32 {
        self.screen.width_px.min(self.screen.height_px).max(1)
    }

    /// Pause between gesture samples
    #[must_use]
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.voting.sample_interval_ms)
    }

    /// Calibration pattern
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an invalid pattern
    pub fn pattern_geometry(&self) -> Result<PatternGeometry> {
        PatternGeometry::new(
            self.calibration.pattern_cols,
            self.calibration.pattern_rows,
            self.calibration.square_size_m,
        )
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        // Screen geometry feeds the pixel pitch
        self.pixel_pitch()?;

        // Distance model
        let positive = |value: f64| value.is_finite() && value > 0.0;
        if !positive(self.distance.real_face_width_m) {
            return Err(Error::ConfigError("Real face width must be positive".to_string()));
        }
        if !positive(self.distance.default_focal_length_px) {
            return Err(Error::ConfigError("Default focal length must be positive".to_string()));
        }
        if !positive(self.distance.reference_distance_m) {
            return Err(Error::ConfigError("Reference distance must be positive".to_string()));
        }
        if !self.distance.min_face_width_px.is_finite() || self.distance.min_face_width_px < 0.0 {
            return Err(Error::ConfigError(
                "Minimum face width must be zero or positive".to_string(),
            ));
        }

        // Voting timing
        if self.voting.window_ms == 0 {
            return Err(Error::ConfigError("Voting window must be greater than 0".to_string()));
        }
        if self.voting.stability_ms < self.voting.window_ms {
            return Err(Error::ConfigError(
                "Stability threshold must be at least one voting window".to_string(),
            ));
        }
        if self.voting.sample_interval_ms == 0 || self.voting.sample_interval_ms > self.voting.window_ms {
            return Err(Error::ConfigError(
                "Sample interval must be between 1 ms and the voting window".to_string(),
            ));
        }

        // Calibration
        self.pattern_geometry()?;
        if self.calibration.target_samples < MIN_CALIBRATION_SAMPLES {
            return Err(Error::ConfigError(format!(
                "Calibration needs at least {MIN_CALIBRATION_SAMPLES} samples"
            )));
        }

        if matches!(&self.landmarks.command, Some(command) if command.trim().is_empty()) {
            return Err(Error::ConfigError("Landmark helper command is empty".to_string()));
        }
        if self.landmarks.startup_timeout_ms == 0 || self.landmarks.reply_timeout_ms == 0 {
            return Err(Error::ConfigError("Landmark helper timeouts must be positive".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Visual Acuity Test Configuration

# Camera
camera:
  index: 0
  mirror: true
  # frames_dir: "recordings/session1"
  loop_frames: true

# Physical screen used to show the optotypes
screen:
  diagonal_in: 15.0
  width_px: 1920
  height_px: 1080
  fullscreen: false

# Monocular distance estimation
distance:
  real_face_width_m: 0.16
  default_focal_length_px: 700.0
  reference_distance_m: 1.0
  min_face_width_px: 0.000001

# Optotype size floors
optotype:
  min_baseline_px: 8
  min_visible_px: 5

# Gesture stability voting (milliseconds)
voting:
  window_ms: 500
  stability_ms: 1500
  no_input_timeout_ms: 10000
  sample_interval_ms: 50

# Chessboard calibration
calibration:
  pattern_cols: 9
  pattern_rows: 6
  square_size_m: 0.025
  target_samples: 15
  store_path: "camera_focals.yaml"

# External hand/face landmark helper
landmarks:
  # command: "python3"
  args: []
  startup_timeout_ms: 30000
  reply_timeout_ms: 2000

# Reports
report:
  results_dir: "results"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.voting.stability_ms, 1500);
        assert_eq!(config.calibration.pattern_cols, 9);
        assert!(config.landmarks.command.is_none());
        assert_eq!(config.landmarks.reply_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("screen:\n  diagonal_in: 24.0\n").unwrap();
        assert!((config.screen.diagonal_in - 24.0).abs() < f64::EPSILON);
        assert_eq!(config.screen.width_px, 1920);
        assert_eq!(config.voting.window_ms, 500);
    }

    #[test]
    fn test_round_trip_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config.camera.index = 2;
        config.to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.camera.index, 2);
    }

    #[test]
    fn test_invalid_screen_rejected() {
        let mut config = Config::default();
        config.screen.diagonal_in = 0.0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

        let mut config = Config::default();
        config.screen.width_px = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_voting_rejected() {
        let mut config = Config::default();
        config.voting.stability_ms = 100;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.voting.sample_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_helper_timeout_rejected() {
        let mut config = Config::default();
        config.landmarks.reply_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(msg)) if msg.contains("timeouts")));
    }

    #[test]
    fn test_max_optotype_is_shorter_screen_side() {
        let mut config = Config::default();
        assert_eq!(config.max_optotype_px(), 1080);
        config.screen.width_px = 800;
        config.screen.height_px = 1280;
        assert_eq!(config.max_optotype_px(), 800);
    }

    #[test]
    fn test_derived_components() {
        let config = Config::default();
        assert_eq!(config.voting_config(), VotingConfig::default());
        assert_eq!(config.pattern_geometry().unwrap(), PatternGeometry::default());
        assert!((config.distance_estimator(None).focal_length_px() - 700.0).abs() < f64::EPSILON);
        assert!(config.optotype_scaler().is_ok());
    }
}
