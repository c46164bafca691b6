//! Hand and face landmark types and the landmark provider seam.
//!
//! Landmark detection itself is done by an external collaborator. All
//! coordinates are normalized to the frame: `x` grows to the right, `y`
//! grows downward, both in `0.0..=1.0` for points inside the frame.

/// Landmark helper process speaking a line-oriented JSON protocol
pub mod subprocess;

use crate::{camera::Frame, constants::NUM_HAND_LANDMARKS, Error, Result};
use serde::{Deserialize, Serialize};

/// Hand landmark indices (`MediaPipe` hand model convention)
#[allow(dead_code)]
pub mod hand_index {
    pub const WRIST: usize = 0;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_TIP: usize = 20;
}

/// Normalized 2D point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    /// Horizontal coordinate, 0 at the left edge
    pub x: f64,
    /// Vertical coordinate, 0 at the top edge
    pub y: f64,
}

impl Point2 {
    /// Create a point
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The four pointing fingers, in vote order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finger {
    /// Index finger
    Index,
    /// Middle finger
    Middle,
    /// Ring finger
    Ring,
    /// Little finger
    Pinky,
}

impl Finger {
    /// Evaluation order; earlier fingers win vote ties
    pub const VOTE_ORDER: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    /// Landmark indices of the base joint (MCP) and the tip
    #[must_use]
    pub fn joints(self) -> (usize, usize) {
        match self {
            Self::Index => (hand_index::INDEX_FINGER_MCP, hand_index::INDEX_FINGER_TIP),
            Self::Middle => (hand_index::MIDDLE_FINGER_MCP, hand_index::MIDDLE_FINGER_TIP),
            Self::Ring => (hand_index::RING_FINGER_MCP, hand_index::RING_FINGER_TIP),
            Self::Pinky => (hand_index::PINKY_MCP, hand_index::PINKY_TIP),
        }
    }
}

/// Full set of 21 hand landmarks
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    points: [Point2; NUM_HAND_LANDMARKS],
}

impl HandLandmarks {
    /// Build from exactly 21 points
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for any other point count
    pub fn from_points(points: &[Point2]) -> Result<Self> {
        let points: [Point2; NUM_HAND_LANDMARKS] = points.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "Expected {} hand landmarks, got {}",
                NUM_HAND_LANDMARKS,
                points.len()
            ))
        })?;
        Ok(Self { points })
    }

    /// All landmarks in model order
    #[must_use]
    pub fn points(&self) -> &[Point2; NUM_HAND_LANDMARKS] {
        &self.points
    }

    /// Base joint and tip of a finger
    #[must_use]
    pub fn finger(&self, finger: Finger) -> (Point2, Point2) {
        let (base, tip) = finger.joints();
        (self.points[base], self.points[tip])
    }

    /// Mean of all landmark positions
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn centroid(&self) -> Point2 {
        let n = NUM_HAND_LANDMARKS as f64;
        let (sx, sy) = self
            .points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2::new(sx / n, sy / n)
    }
}

/// Normalized face bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Width as a fraction of frame width
    pub width: f64,
    /// Height as a fraction of frame height
    pub height: f64,
}

impl FaceBox {
    /// Create a face box
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Whether a point lies inside the box, edges included
    #[must_use]
    pub fn contains(&self, point: Point2) -> bool {
        (self.x..=self.x + self.width).contains(&point.x) && (self.y..=self.y + self.height).contains(&point.y)
    }

    /// Box width in pixels for a frame of the given width
    #[must_use]
    pub fn width_px(&self, frame_width: u32) -> f64 {
        self.width * f64::from(frame_width)
    }
}

/// Detections for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkFrame {
    /// First detected hand, if any
    pub hand: Option<HandLandmarks>,
    /// First detected face, if any
    pub face: Option<FaceBox>,
}

/// External landmark detector.
///
/// Finding nothing is `Ok(None)`, never an error; errors are reserved for a
/// detector that cannot run at all.
pub trait LandmarkProvider {
    /// Detect at most one hand
    ///
    /// # Errors
    ///
    /// Returns `LandmarkProvider` if the detector fails to run
    fn detect_hand(&mut self, frame: &Frame) -> Result<Option<HandLandmarks>>;

    /// Detect at most one face
    ///
    /// # Errors
    ///
    /// Returns `LandmarkProvider` if the detector fails to run
    fn detect_face(&mut self, frame: &Frame) -> Result<Option<FaceBox>>;

    /// Detect hand and face together
    ///
    /// # Errors
    ///
    /// Returns `LandmarkProvider` if the detector fails to run
    fn detect(&mut self, frame: &Frame) -> Result<LandmarkFrame> {
        Ok(LandmarkFrame {
            hand: self.detect_hand(frame)?,
            face: self.detect_face(frame)?,
        })
    }
}

/// Provider that never detects anything; answers then come from the keyboard
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLandmarkProvider;

impl LandmarkProvider for NullLandmarkProvider {
    fn detect_hand(&mut self, _frame: &Frame) -> Result<Option<HandLandmarks>> {
        Ok(None)
    }

    fn detect_face(&mut self, _frame: &Frame) -> Result<Option<FaceBox>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_at(x: f64, y: f64) -> HandLandmarks {
        HandLandmarks::from_points(&[Point2::new(x, y); NUM_HAND_LANDMARKS]).unwrap()
    }

    #[test]
    fn test_hand_requires_21_points() {
        assert!(HandLandmarks::from_points(&[Point2::default(); 20]).is_err());
        assert!(HandLandmarks::from_points(&[Point2::default(); 22]).is_err());
        assert!(HandLandmarks::from_points(&[Point2::default(); 21]).is_ok());
    }

    #[test]
    fn test_centroid() {
        let mut points = [Point2::new(0.5, 0.5); NUM_HAND_LANDMARKS];
        points[0] = Point2::new(0.5 + 2.1, 0.5);
        let hand = HandLandmarks::from_points(&points).unwrap();
        let centroid = hand.centroid();
        assert!((centroid.x - 0.6).abs() < 1e-12);
        assert!((centroid.y - 0.5).abs() < 1e-12);

        assert_eq!(hand_at(0.2, 0.3).centroid(), Point2::new(0.2, 0.3));
    }

    #[test]
    fn test_finger_joints() {
        let mut points = [Point2::default(); NUM_HAND_LANDMARKS];
        points[hand_index::RING_FINGER_MCP] = Point2::new(0.1, 0.2);
        points[hand_index::RING_FINGER_TIP] = Point2::new(0.3, 0.4);
        let hand = HandLandmarks::from_points(&points).unwrap();
        assert_eq!(hand.finger(Finger::Ring), (Point2::new(0.1, 0.2), Point2::new(0.3, 0.4)));
    }

    #[test]
    fn test_face_box_contains() {
        let face = FaceBox::new(0.3, 0.2, 0.4, 0.5);
        assert!(face.contains(Point2::new(0.5, 0.4)));
        assert!(face.contains(Point2::new(0.3, 0.2)));
        assert!(face.contains(Point2::new(0.7, 0.7)));
        assert!(!face.contains(Point2::new(0.71, 0.4)));
        assert!(!face.contains(Point2::new(0.5, 0.1)));
        assert!((face.width_px(640) - 256.0).abs() < 1e-9);
    }
}
