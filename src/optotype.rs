//! Optotype sizing from clinical visual angles and tumbling-E rendering.
//!
//! Baseline sizes are computed once at the reference distance from the
//! visual angle of each Snellen row and the display's physical pixel pitch.
//! Every new distance measurement rescales all levels from those baselines
//! by `measured / reference`, which keeps the size ratio between levels
//! fixed no matter where the subject sits.

use crate::{
    acuity::AcuityTable,
    constants::{
        FINEST_VISUAL_ANGLE_DEG, MIN_BASELINE_PX, MIN_VISIBLE_PX, MM_PER_INCH, REFERENCE_DISTANCE_M,
    },
    direction::Direction,
    utils::safe_cast::round_to_u32,
    Error, Result,
};
use image::{GrayImage, Luma};
use log::{info, warn};

/// Physical size of one display pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelPitch {
    mm_per_pixel: f64,
}

impl PixelPitch {
    /// Wrap a known pitch in millimeters per pixel
    ///
    /// # Errors
    ///
    /// Returns `PitchUnavailable` when the pitch is not a positive finite number
    pub fn new(mm_per_pixel: f64) -> Result<Self> {
        if mm_per_pixel.is_finite() && mm_per_pixel > 0.0 {
            Ok(Self { mm_per_pixel })
        } else {
            Err(Error::PitchUnavailable(format!("mm_per_pixel must be positive, got {mm_per_pixel}")))
        }
    }

    /// Derive the pitch from the screen diagonal and its resolution
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a non-positive diagonal or an empty resolution
    pub fn from_screen(diagonal_in: f64, width_px: u32, height_px: u32) -> Result<Self> {
        if !diagonal_in.is_finite() || diagonal_in <= 0.0 {
            return Err(Error::ConfigError(format!(
                "Screen diagonal must be a positive number of inches, got {diagonal_in}"
            )));
        }
        if width_px == 0 || height_px == 0 {
            return Err(Error::ConfigError(format!(
                "Screen resolution must be non-zero, got {width_px}x{height_px}"
            )));
        }

        let diagonal_px = f64::from(width_px).hypot(f64::from(height_px));
        let dpi = diagonal_px / diagonal_in;
        let mm_per_pixel = MM_PER_INCH / dpi;
        info!("Screen diagonal {diagonal_in}in, DPI={dpi:.2}, mm_per_pixel={mm_per_pixel:.4}");
        Self::new(mm_per_pixel)
    }

    /// Millimeters per pixel
    #[must_use]
    pub fn mm_per_pixel(self) -> f64 {
        self.mm_per_pixel
    }
}

/// Computes and rescales optotype pixel sizes for an acuity table
#[derive(Debug, Clone)]
pub struct OptotypeScaler {
    pitch: Option<PixelPitch>,
    reference_distance_m: f64,
    min_baseline_px: u32,
    min_visible_px: u32,
}

impl OptotypeScaler {
    /// Create a scaler with the clinical defaults
    #[must_use]
    pub fn new(pitch: Option<PixelPitch>) -> Self {
        Self {
            pitch,
            reference_distance_m: REFERENCE_DISTANCE_M,
            min_baseline_px: MIN_BASELINE_PX,
            min_visible_px: MIN_VISIBLE_PX,
        }
    }

    /// Override the distance at which baselines are defined
    #[must_use]
    pub fn with_reference_distance(mut self, reference_distance_m: f64) -> Self {
        self.reference_distance_m = reference_distance_m;
        self
    }

    /// Override the legible and visible floors
    #[must_use]
    pub fn with_floors(mut self, min_baseline_px: u32, min_visible_px: u32) -> Self {
        self.min_baseline_px = min_baseline_px.max(MIN_BASELINE_PX);
        self.min_visible_px = min_visible_px.max(MIN_VISIBLE_PX);
        self
    }

    /// Distance at which baselines are defined
    #[must_use]
    pub fn reference_distance_m(&self) -> f64 {
        self.reference_distance_m
    }

    /// Optotype height in millimeters for a size ratio at a given distance
    #[must_use]
    pub fn optotype_height_mm(size_ratio: f64, distance_m: f64) -> f64 {
        let angle_deg = FINEST_VISUAL_ANGLE_DEG * size_ratio;
        let height_m = 2.0 * distance_m * (angle_deg.to_radians() / 2.0).tan();
        height_m * 1000.0
    }

    /// Compute every level's baseline size at the reference distance
    ///
    /// # Errors
    ///
    /// Returns `PitchUnavailable` when no usable pixel pitch is configured
    pub fn compute_baselines(&self, table: &mut AcuityTable) -> Result<()> {
        let pitch = self
            .pitch
            .ok_or_else(|| Error::PitchUnavailable("mm_per_pixel not set".to_string()))?;
        if !pitch.mm_per_pixel().is_finite() || pitch.mm_per_pixel() <= 0.0 {
            return Err(Error::PitchUnavailable(format!(
                "mm_per_pixel must be positive, got {}",
                pitch.mm_per_pixel()
            )));
        }
        if !self.reference_distance_m.is_finite() || self.reference_distance_m <= 0.0 {
            return Err(Error::ConfigError(format!(
                "Reference distance must be positive, got {}",
                self.reference_distance_m
            )));
        }

        for level in table.levels_mut() {
            let height_mm = Self::optotype_height_mm(level.fraction().size_ratio(), self.reference_distance_m);
            let px = round_to_u32(height_mm / pitch.mm_per_pixel())?.max(self.min_baseline_px);
            level.set_baseline(px);
            info!(
                "Level {} baseline set to {}px (height {:.2} mm)",
                level.label(),
                px,
                height_mm
            );
        }
        Ok(())
    }

    /// Rescale every level to a newly measured distance.
    ///
    /// Returns `false` and leaves sizes untouched when the distance is not a
    /// positive finite number.
    pub fn rescale(&self, table: &mut AcuityTable, measured_distance_m: f64) -> bool {
        if !measured_distance_m.is_finite() || measured_distance_m <= 0.0 {
            warn!("Measured distance {measured_distance_m} invalid; skipping optotype rescale");
            return false;
        }

        let scale = measured_distance_m / self.reference_distance_m;
        info!("Scale factor: {scale:.2}");

        for level in table.levels_mut() {
            let baseline = level.baseline_px().max(1);
            let px = round_to_u32(f64::from(baseline) * scale)
                .unwrap_or(u32::MAX)
                .max(self.min_visible_px);
            level.set_current(px);
            info!(
                "Level {} adjusted from baseline {}px to {}px",
                level.label(),
                baseline,
                level.current_px()
            );
        }
        true
    }
}

/// Render a tumbling-E of `size_px` with its arms pointing in `direction`.
///
/// The letter is drawn black on white on a 5x5 stroke grid, so sizes that
/// are not multiples of five get slightly uneven strokes.
#[must_use]
pub fn render_optotype(size_px: u32, direction: Direction) -> GrayImage {
    let size = size_px.max(MIN_VISIBLE_PX);
    GrayImage::from_fn(size, size, |x, y| {
        // Cell coordinates on the 5x5 grid; u64 avoids overflow on huge sizes
        let cx = (u64::from(x) * 5 / u64::from(size)).min(4);
        let cy = (u64::from(y) * 5 / u64::from(size)).min(4);
        let arm_row = |c: u64| c % 2 == 0;
        let ink = match direction {
            Direction::Right => cx == 0 || arm_row(cy),
            Direction::Left => cx == 4 || arm_row(cy),
            Direction::Up => cy == 4 || arm_row(cx),
            Direction::Down => cy == 0 || arm_row(cx),
        };
        if ink {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    })
}
