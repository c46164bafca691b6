use super::{fit_to_canvas, key_from_code, DisplaySurface, KeyEvent, Screen};
use crate::{
    utils::safe_cast::{f64_to_i32_clamp, u32_to_i32},
    Result,
};
use opencv::{
    core::{Mat, Point, Rect, Scalar, CV_8UC1},
    highgui::{self, WINDOW_NORMAL},
    imgproc::{self, FONT_HERSHEY_SIMPLEX, LINE_8},
    prelude::*,
};
use std::time::Duration;

const WINDOW_NAME: &str = "Visual Acuity Test";
const MARGIN: u32 = 80;

/// Full-screen capable `OpenCV` window
pub struct HighguiDisplay {
    width: u32,
    height: u32,
}

impl HighguiDisplay {
    /// Open the window with a `width` x `height` canvas
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be created
    pub fn open(width: u32, height: u32, fullscreen: bool) -> Result<Self> {
        highgui::named_window(WINDOW_NAME, WINDOW_NORMAL)?;
        if fullscreen {
            highgui::set_window_property(
                WINDOW_NAME,
                highgui::WND_PROP_FULLSCREEN,
                f64::from(highgui::WINDOW_FULLSCREEN),
            )?;
        } else {
            highgui::resize_window(WINDOW_NAME, u32_to_i32(width)?, u32_to_i32(height)?)?;
        }
        Ok(Self { width, height })
    }

    fn draw_text(canvas: &mut Mat, text: &str, origin: Point, scale: f64, shade: f64) -> Result<()> {
        imgproc::put_text(
            canvas,
            text,
            origin,
            FONT_HERSHEY_SIMPLEX,
            scale,
            Scalar::all(shade),
            2,
            LINE_8,
            false,
        )?;
        Ok(())
    }

    fn draw_optotype(&self, canvas: &mut Mat, optotype: &image::GrayImage) -> Result<()> {
        let fitted = fit_to_canvas(
            optotype,
            self.width.saturating_sub(MARGIN).max(1),
            self.height.saturating_sub(2 * MARGIN).max(1),
        );
        let (w, h) = fitted.dimensions();
        let x = u32_to_i32((self.width - w) / 2)?;
        let y = u32_to_i32((self.height - h) / 2)?;

        let mut glyph = Mat::zeros(u32_to_i32(h)?, u32_to_i32(w)?, CV_8UC1)?.to_mat()?;
        glyph.data_bytes_mut()?.copy_from_slice(fitted.as_raw());

        let mut roi = Mat::roi_mut(canvas, Rect::new(x, y, u32_to_i32(w)?, u32_to_i32(h)?))?;
        glyph.copy_to(&mut roi)?;
        Ok(())
    }
}

impl DisplaySurface for HighguiDisplay {
    fn present(&mut self, screen: &Screen) -> Result<()> {
        let rows = u32_to_i32(self.height)?;
        let cols = u32_to_i32(self.width)?;
        let mut canvas = Mat::new_rows_cols_with_default(rows, cols, CV_8UC1, Scalar::all(255.0))?;

        if let Some(optotype) = &screen.optotype {
            self.draw_optotype(&mut canvas, optotype)?;
        }

        for (i, line) in screen.lines.iter().enumerate() {
            // Lines past the bottom edge are pinned to it
            #[allow(clippy::cast_precision_loss)]
            let y = f64_to_i32_clamp(30.0 * (i as f64 + 1.0), 0, rows - 1);
            Self::draw_text(&mut canvas, line, Point::new(10, y), 0.8, 0.0)?;
        }
        if let Some(status) = &screen.status {
            Self::draw_text(&mut canvas, status, Point::new(100, rows - 60), 0.9, 60.0)?;
        }
        if let Some(notice) = &screen.notice {
            Self::draw_text(&mut canvas, notice, Point::new(100, rows - 20), 0.9, 0.0)?;
        }

        highgui::imshow(WINDOW_NAME, &canvas)?;
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyEvent>> {
        let delay = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX).max(1);
        let code = highgui::wait_key_ex(delay)?;
        Ok(key_from_code(code))
    }
}

impl Drop for HighguiDisplay {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(WINDOW_NAME);
    }
}
