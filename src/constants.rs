//! Constants used throughout the application

/// Assumed real-world average face width in meters
pub const AVERAGE_FACE_WIDTH_M: f64 = 0.16;

/// Focal length used when no calibration is stored for the camera
pub const DEFAULT_FOCAL_LENGTH_PX: f64 = 700.0;

/// Standard test distance in meters; baseline sizes are computed here
pub const REFERENCE_DISTANCE_M: f64 = 1.0;

/// Face widths below this are treated as no measurement
pub const MIN_FACE_WIDTH_PX: f64 = 1e-6;

/// Visual angle of the finest (10/10) optotype, in degrees (5 arc minutes)
pub const FINEST_VISUAL_ANGLE_DEG: f64 = 5.0 / 60.0;

/// Minimum legible baseline optotype size
pub const MIN_BASELINE_PX: u32 = 8;

/// Minimum visible optotype size after rescaling
pub const MIN_VISIBLE_PX: u32 = 5;

/// Millimeters per inch
pub const MM_PER_INCH: f64 = 25.4;

/// Default screen diagonal when none is configured
pub const DEFAULT_SCREEN_DIAGONAL_IN: f64 = 15.0;

/// Number of landmarks in a hand landmark set
pub const NUM_HAND_LANDMARKS: usize = 21;

/// Stability window length
pub const DEFAULT_WINDOW_MS: u64 = 500;

/// Time a window-vote must persist before it is confirmed
pub const DEFAULT_STABILITY_MS: u64 = 1500;

/// Time without a usable vote before the no-input notice is shown
pub const DEFAULT_NO_INPUT_TIMEOUT_MS: u64 = 10_000;

/// Pause between gesture samples
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 50;

/// Chessboard inner corners per row
pub const DEFAULT_PATTERN_COLS: u32 = 9;

/// Chessboard inner corners per column
pub const DEFAULT_PATTERN_ROWS: u32 = 6;

/// Chessboard square edge in meters
pub const DEFAULT_SQUARE_SIZE_M: f64 = 0.025;

/// Calibration frames to collect
pub const DEFAULT_CALIBRATION_SAMPLES: usize = 15;

/// Fewest calibration frames the solver accepts
pub const MIN_CALIBRATION_SAMPLES: usize = 3;

/// Time the landmark helper may take to load its models
pub const DEFAULT_HELPER_STARTUP_TIMEOUT_MS: u64 = 30_000;

/// Time the landmark helper may take to answer one frame
pub const DEFAULT_HELPER_REPLY_TIMEOUT_MS: u64 = 2_000;

/// Numeric precision epsilon
pub const EPSILON: f64 = 1e-10;
