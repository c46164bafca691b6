use super::{PatternDetector, PatternGeometry};
use crate::{camera::Frame, utils::safe_cast::u32_to_i32, Result};
use log::debug;
use nalgebra::Point2;
use opencv::{
    calib3d,
    core::{Mat, Point2f, Size, TermCriteria, TermCriteria_Type, Vector, CV_8UC1},
    imgproc,
    prelude::*,
};

/// Chessboard detector with sub-pixel corner refinement
#[derive(Debug, Clone, Copy, Default)]
pub struct ChessboardDetector;

impl ChessboardDetector {
    /// Create a detector
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn gray_mat(frame: &Frame) -> Result<Mat> {
        let gray = image::imageops::grayscale(frame.image());
        let rows = u32_to_i32(gray.height())?;
        let cols = u32_to_i32(gray.width())?;
        let mut mat = Mat::zeros(rows, cols, CV_8UC1)?.to_mat()?;
        mat.data_bytes_mut()?.copy_from_slice(gray.as_raw());
        Ok(mat)
    }
}

impl PatternDetector for ChessboardDetector {
    fn detect(&mut self, frame: &Frame, geometry: &PatternGeometry) -> Result<Option<Vec<Point2<f64>>>> {
        let gray = Self::gray_mat(frame)?;
        let pattern_size = Size::new(u32_to_i32(geometry.cols)?, u32_to_i32(geometry.rows)?);

        let mut corners = Vector::<Point2f>::new();
        let found = calib3d::find_chessboard_corners(
            &gray,
            pattern_size,
            &mut corners,
            calib3d::CALIB_CB_ADAPTIVE_THRESH | calib3d::CALIB_CB_NORMALIZE_IMAGE,
        )?;
        if !found || corners.len() != geometry.corner_count() {
            debug!("Chessboard not found in frame");
            return Ok(None);
        }

        let criteria = TermCriteria::new(
            TermCriteria_Type::EPS as i32 + TermCriteria_Type::MAX_ITER as i32,
            30,
            0.001,
        )?;
        imgproc::corner_sub_pix(&gray, &mut corners, Size::new(11, 11), Size::new(-1, -1), criteria)?;

        Ok(Some(
            corners
                .iter()
                .map(|p| Point2::new(f64::from(p.x), f64::from(p.y)))
                .collect(),
        ))
    }
}
