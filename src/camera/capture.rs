use super::{CameraSource, Frame};
use crate::{Error, Result};
use image::RgbImage;
use log::{info, warn};
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE},
};

/// Webcam source backed by `OpenCV`'s `VideoCapture`
pub struct WebcamSource {
    index: i32,
    mirror: bool,
    capture: VideoCapture,
}

impl WebcamSource {
    /// Open the webcam at `index`; `mirror` flips frames horizontally
    ///
    /// # Errors
    ///
    /// Returns `CameraUnavailable` if the device cannot be opened
    pub fn open(index: i32, mirror: bool) -> Result<Self> {
        let capture = Self::open_capture(index)?;
        Ok(Self { index, mirror, capture })
    }

    fn open_capture(index: i32) -> Result<VideoCapture> {
        info!("Opening camera {}", index);
        let mut capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(Error::CameraUnavailable(format!("Unable to open camera {index}")));
        }

        // Reduce buffer size for lower latency
        if let Err(e) = capture.set(CAP_PROP_BUFFERSIZE, 1.0) {
            warn!("Could not set camera buffer size: {}", e);
        }
        Ok(capture)
    }

    fn mat_to_frame(&self, bgr: &Mat) -> Result<Frame> {
        let mut oriented = Mat::default();
        if self.mirror {
            opencv::core::flip(bgr, &mut oriented, 1)?;
        } else {
            oriented = bgr.try_clone()?;
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&oriented, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let width = u32::try_from(rgb.cols()).map_err(|_| Error::InvalidInput("Negative frame width".to_string()))?;
        let height = u32::try_from(rgb.rows()).map_err(|_| Error::InvalidInput("Negative frame height".to_string()))?;
        let data = rgb.data_bytes()?.to_vec();
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| Error::InvalidInput(format!("Frame buffer does not match {width}x{height}")))?;
        Ok(Frame::new(image))
    }
}

impl CameraSource for WebcamSource {
    fn camera_id(&self) -> String {
        format!("camera_{}", self.index)
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .map_err(|e| Error::CameraUnavailable(format!("Camera {} read failed: {e}", self.index)))?;
        if !grabbed || frame.empty() {
            return Err(Error::CameraUnavailable(format!(
                "Unable to read frame from camera {}",
                self.index
            )));
        }
        self.mat_to_frame(&frame)
    }

    fn release(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("Failed to release camera {}: {}", self.index, e);
        } else {
            info!("Camera {} released", self.index);
        }
    }

    fn reopen(&mut self) -> Result<()> {
        self.capture = Self::open_capture(self.index)?;
        Ok(())
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        let _ = self.capture.release();
    }
}
