//! Monocular subject distance from the detected face width.
//!
//! Uses the pinhole relation `distance = real_width * focal_px / width_px`.
//! Missing detections never fail: the estimator falls back to the standard
//! test distance instead.

use crate::{
    constants::{AVERAGE_FACE_WIDTH_M, DEFAULT_FOCAL_LENGTH_PX, MIN_FACE_WIDTH_PX, REFERENCE_DISTANCE_M},
    landmarks::FaceBox,
};
use log::{info, warn};

/// Pinhole-model distance estimator
#[derive(Debug, Clone)]
pub struct DistanceEstimator {
    real_face_width_m: f64,
    focal_length_px: Option<f64>,
    default_focal_length_px: f64,
    fallback_distance_m: f64,
    min_face_width_px: f64,
}

impl DistanceEstimator {
    /// Create an estimator; `focal_length_px` is the stored calibration, if any
    #[must_use]
    pub fn new(focal_length_px: Option<f64>) -> Self {
        Self {
            real_face_width_m: AVERAGE_FACE_WIDTH_M,
            focal_length_px,
            default_focal_length_px: DEFAULT_FOCAL_LENGTH_PX,
            fallback_distance_m: REFERENCE_DISTANCE_M,
            min_face_width_px: MIN_FACE_WIDTH_PX,
        }
    }

    /// Override the assumed real face width
    #[must_use]
    pub fn with_real_face_width(mut self, real_face_width_m: f64) -> Self {
        self.real_face_width_m = real_face_width_m;
        self
    }

    /// Override the default focal length and fallback distance
    #[must_use]
    pub fn with_defaults(mut self, default_focal_length_px: f64, fallback_distance_m: f64) -> Self {
        self.default_focal_length_px = default_focal_length_px;
        self.fallback_distance_m = fallback_distance_m;
        self
    }

    /// Override the smallest face width treated as a measurement
    #[must_use]
    pub fn with_min_face_width(mut self, min_face_width_px: f64) -> Self {
        self.min_face_width_px = min_face_width_px;
        self
    }

    /// Replace the stored focal length, e.g. after recalibration
    pub fn set_focal_length(&mut self, focal_length_px: Option<f64>) {
        self.focal_length_px = focal_length_px;
    }

    /// Focal length in use: the stored one when valid, else the default
    #[must_use]
    pub fn focal_length_px(&self) -> f64 {
        match self.focal_length_px {
            Some(focal) if focal.is_finite() && focal > 0.0 => focal,
            _ => self.default_focal_length_px,
        }
    }

    /// Distance returned whenever there is nothing to measure
    #[must_use]
    pub fn fallback_distance_m(&self) -> f64 {
        self.fallback_distance_m
    }

    /// Distance for a face of `face_width_px` pixels
    #[must_use]
    pub fn estimate_from_width(&self, face_width_px: f64) -> f64 {
        if !face_width_px.is_finite() || face_width_px <= self.min_face_width_px {
            warn!("Detected face width {face_width_px} too small; using default distance");
            return self.fallback_distance_m;
        }

        if self.focal_length_px.is_none() {
            info!(
                "No calibration stored; using default focal length {}px",
                self.default_focal_length_px
            );
        }

        let distance = (self.real_face_width_m * self.focal_length_px()) / face_width_px;
        info!("Measured distance: {distance:.2} meters");
        distance
    }

    /// Distance for an optional face detection in a frame of `frame_width` pixels
    #[must_use]
    pub fn estimate(&self, face: Option<&FaceBox>, frame_width: u32) -> f64 {
        match face {
            Some(face) => self.estimate_from_width(face.width_px(frame_width)),
            None => {
                info!("No face detected, using default distance");
                self.fallback_distance_m
            }
        }
    }
}

impl Default for DistanceEstimator {
    fn default() -> Self {
        Self::new(None)
    }
}
