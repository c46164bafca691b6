//! Camera sources and the frame type passed through the pipeline.

/// Replay camera over a directory of still images
pub mod sequence;

/// Live webcam capture through `OpenCV`
#[cfg(feature = "opencv")]
pub mod capture;

use crate::Result;
use image::RgbImage;

/// One captured video frame in RGB order
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap an RGB image
    #[must_use]
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Blank frame of the given size, mostly useful in tests
    #[must_use]
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(RgbImage::new(width, height))
    }

    /// Frame width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Frame height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying image
    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Raw interleaved RGB bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Mirror the frame horizontally, so the subject sees themselves as in a mirror
    #[must_use]
    pub fn mirrored(self) -> Self {
        Self::new(image::imageops::flip_horizontal(&self.image))
    }

    /// Centred square crop with side `min(width, height)`.
    ///
    /// Landmarks normalized on a square frame have the same scale on both
    /// axes, so angles measured on them match angles in pixel space.
    #[must_use]
    pub fn center_square(self) -> Self {
        let (width, height) = self.image.dimensions();
        let side = width.min(height);
        if width == height {
            return self;
        }
        let x = (width - side) / 2;
        let y = (height - side) / 2;
        Self::new(image::imageops::crop_imm(&self.image, x, y, side, side).to_image())
    }
}

/// A source of frames owned exclusively by the running session
pub trait CameraSource {
    /// Stable identity used to key calibration profiles
    fn camera_id(&self) -> String;

    /// Grab the next frame
    ///
    /// # Errors
    ///
    /// Returns `CameraUnavailable` when the device cannot deliver a frame
    fn read_frame(&mut self) -> Result<Frame>;

    /// Release the device handle
    fn release(&mut self);

    /// Reopen the device after a release, giving the next subject a clean capture state
    ///
    /// # Errors
    ///
    /// Returns `CameraUnavailable` when the device cannot be reopened
    fn reopen(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_mirrored_frame() {
        let mut image = RgbImage::new(4, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        let frame = Frame::new(image).mirrored();
        assert_eq!(frame.image().get_pixel(3, 0), &Rgb([255, 0, 0]));
        assert_eq!(frame.image().get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_center_square_crop() {
        let mut image = RgbImage::new(640, 480);
        image.put_pixel(80, 0, Rgb([0, 255, 0]));
        image.put_pixel(559, 479, Rgb([0, 0, 255]));
        let square = Frame::new(image).center_square();
        assert_eq!((square.width(), square.height()), (480, 480));
        assert_eq!(square.image().get_pixel(0, 0), &Rgb([0, 255, 0]));
        assert_eq!(square.image().get_pixel(479, 479), &Rgb([0, 0, 255]));

        let portrait = Frame::blank(300, 500).center_square();
        assert_eq!((portrait.width(), portrait.height()), (300, 300));
        let square = Frame::blank(7, 7).center_square();
        assert_eq!((square.width(), square.height()), (7, 7));
    }

    #[test]
    fn test_frame_bytes() {
        let frame = Frame::blank(3, 2);
        assert_eq!(frame.as_bytes().len(), 3 * 2 * 3);
        assert_eq!((frame.width(), frame.height()), (3, 2));
    }
}
