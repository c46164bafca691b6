//! Camera calibration from a planar chessboard.
//!
//! The operator holds a printed chessboard in front of the camera and
//! confirms frames where the pattern was found. Once enough samples are
//! collected the intrinsics are solved and the focal length is stored per
//! camera, overwriting any earlier profile for the same camera.

/// Intrinsic solver (homographies, closed form, Levenberg-Marquardt)
pub mod solver;

/// Chessboard corner detection through `OpenCV`
#[cfg(feature = "opencv")]
pub mod chessboard;

use crate::{
    camera::Frame,
    constants::{DEFAULT_CALIBRATION_SAMPLES, DEFAULT_PATTERN_COLS, DEFAULT_PATTERN_ROWS, DEFAULT_SQUARE_SIZE_M,
        MIN_CALIBRATION_SAMPLES},
    Error, Result,
};
use log::{info, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use solver::CalibrationSolution;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Inner-corner grid and square size of the printed pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternGeometry {
    /// Inner corners per row
    pub cols: u32,
    /// Inner corners per column
    pub rows: u32,
    /// Edge length of one square in meters
    pub square_size_m: f64,
}

impl PatternGeometry {
    /// Create a pattern description
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a grid smaller than 2x2 or a non-positive square size
    pub fn new(cols: u32, rows: u32, square_size_m: f64) -> Result<Self> {
        if cols < 2 || rows < 2 {
            return Err(Error::ConfigError(format!(
                "Calibration pattern needs at least 2x2 inner corners, got {cols}x{rows}"
            )));
        }
        if !square_size_m.is_finite() || square_size_m <= 0.0 {
            return Err(Error::ConfigError(format!("Invalid square size: {square_size_m}")));
        }
        Ok(Self {
            cols,
            rows,
            square_size_m,
        })
    }

    /// Number of inner corners
    #[must_use]
    pub fn corner_count(&self) -> usize {
        (self.cols as usize) * (self.rows as usize)
    }

    /// Planar object points (z = 0), row by row, matching detector order
    #[must_use]
    pub fn object_points(&self) -> Vec<Point2<f64>> {
        (0..self.rows)
            .flat_map(|j| {
                (0..self.cols).map(move |i| {
                    Point2::new(f64::from(i) * self.square_size_m, f64::from(j) * self.square_size_m)
                })
            })
            .collect()
    }
}

impl Default for PatternGeometry {
    fn default() -> Self {
        Self {
            cols: DEFAULT_PATTERN_COLS,
            rows: DEFAULT_PATTERN_ROWS,
            square_size_m: DEFAULT_SQUARE_SIZE_M,
        }
    }
}

/// Stored focal length for one camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Camera identity, e.g. `camera_0`
    pub camera_id: String,
    /// Horizontal focal length in pixels
    pub focal_length_px: f64,
}

/// Finds the calibration pattern in a frame
pub trait PatternDetector {
    /// Corner positions in pixels, in row-major pattern order, or `None` if
    /// the full pattern is not visible
    ///
    /// # Errors
    ///
    /// Returns an error only when the detector itself fails
    fn detect(&mut self, frame: &Frame, geometry: &PatternGeometry) -> Result<Option<Vec<Point2<f64>>>>;
}

/// Persistence for focal lengths keyed by camera identity
pub trait CalibrationStore {
    /// Focal length stored for `camera_id`, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read
    fn load(&self, camera_id: &str) -> Result<Option<f64>>;

    /// Store a focal length, replacing any previous value for the camera
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written
    fn save(&mut self, camera_id: &str, focal_length_px: f64) -> Result<()>;
}

/// Calibration store backed by a YAML map file
#[derive(Debug, Clone)]
pub struct YamlCalibrationStore {
    path: PathBuf,
}

impl YamlCalibrationStore {
    /// Use the file at `path`; it is created on first save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, f64>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_yaml::from_str(&contents)?)
    }
}

impl CalibrationStore for YamlCalibrationStore {
    fn load(&self, camera_id: &str) -> Result<Option<f64>> {
        Ok(self.read_all()?.get(camera_id).copied())
    }

    fn save(&mut self, camera_id: &str, focal_length_px: f64) -> Result<()> {
        let mut profiles = self.read_all()?;
        profiles.insert(camera_id.to_string(), focal_length_px);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_yaml::to_string(&profiles)?)?;
        info!(
            "Saved focal length {:.2}px for {} to {}",
            focal_length_px,
            camera_id,
            self.path.display()
        );
        Ok(())
    }
}

/// Calibration store that lives only as long as the process
#[derive(Debug, Clone, Default)]
pub struct MemoryCalibrationStore {
    profiles: HashMap<String, f64>,
}

impl MemoryCalibrationStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalibrationStore for MemoryCalibrationStore {
    fn load(&self, camera_id: &str) -> Result<Option<f64>> {
        Ok(self.profiles.get(camera_id).copied())
    }

    fn save(&mut self, camera_id: &str, focal_length_px: f64) -> Result<()> {
        self.profiles.insert(camera_id.to_string(), focal_length_px);
        Ok(())
    }
}

/// Accumulates confirmed pattern views and solves for the focal length
#[derive(Debug, Clone)]
pub struct CameraCalibrator {
    geometry: PatternGeometry,
    object_points: Vec<Point2<f64>>,
    target_samples: usize,
    views: Vec<Vec<Point2<f64>>>,
}

impl CameraCalibrator {
    /// Calibrator for `geometry` collecting up to `target_samples` views
    #[must_use]
    pub fn new(geometry: PatternGeometry, target_samples: usize) -> Self {
        Self {
            geometry,
            object_points: geometry.object_points(),
            target_samples: target_samples.max(MIN_CALIBRATION_SAMPLES),
            views: Vec::new(),
        }
    }

    /// Pattern being calibrated against
    #[must_use]
    pub fn geometry(&self) -> &PatternGeometry {
        &self.geometry
    }

    /// Confirmed samples so far
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.views.len()
    }

    /// Samples requested before solving
    #[must_use]
    pub fn target_samples(&self) -> usize {
        self.target_samples
    }

    /// Whether the target sample count is reached
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.views.len() >= self.target_samples
    }

    /// Add one operator-confirmed view and return the new sample count
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the corner count does not match the pattern
    pub fn add_sample(&mut self, corners: Vec<Point2<f64>>) -> Result<usize> {
        if corners.len() != self.object_points.len() {
            return Err(Error::InvalidInput(format!(
                "Expected {} corners, got {}",
                self.object_points.len(),
                corners.len()
            )));
        }
        self.views.push(corners);
        info!("Captured calibration sample {}/{}", self.views.len(), self.target_samples);
        Ok(self.views.len())
    }

    /// Solve the intrinsics from the confirmed samples
    ///
    /// # Errors
    ///
    /// Returns `InsufficientData` below the minimum sample count and
    /// `SolveFailed` when the optimization does not produce a valid result
    pub fn solve(&self) -> Result<CalibrationSolution> {
        if self.views.len() < MIN_CALIBRATION_SAMPLES {
            return Err(Error::InsufficientData {
                captured: self.views.len(),
                required: MIN_CALIBRATION_SAMPLES,
            });
        }
        solver::calibrate(&self.object_points, &self.views)
    }

    /// Solve and persist the focal length for `camera_id`
    ///
    /// # Errors
    ///
    /// Propagates solve failures and store write errors; nothing is stored on failure
    pub fn finish(&self, camera_id: &str, store: &mut dyn CalibrationStore) -> Result<CalibrationProfile> {
        let solution = match self.solve() {
            Ok(solution) => solution,
            Err(e) => {
                warn!("Calibration for {camera_id} failed: {e}");
                return Err(e);
            }
        };

        let focal_length_px = solution.intrinsics.fx;
        info!(
            "Calibration for {} complete: focal length {:.2}px, RMS error {:.3}px over {} samples",
            camera_id,
            focal_length_px,
            solution.rms_error_px,
            self.views.len()
        );
        store.save(camera_id, focal_length_px)?;
        Ok(CalibrationProfile {
            camera_id: camera_id.to_string(),
            focal_length_px,
        })
    }
}

impl Default for CameraCalibrator {
    fn default() -> Self {
        Self::new(PatternGeometry::default(), DEFAULT_CALIBRATION_SAMPLES)
    }
}
