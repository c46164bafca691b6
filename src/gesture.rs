//! Gesture classification from one frame's hand and face landmarks.
//!
//! Each pointing finger votes for the direction of the vector from its base
//! joint to its tip. The angle uses the math convention with the image y axis
//! flipped, so a finger pointing at the top of the frame reads 90 degrees.
//! A hand whose centroid sits inside the detected face box is ignored: people
//! often touch or gesture near their face without meaning to answer.
//!
//! Angles are only true to pixel space when both axes share one scale, so
//! landmarks must come from a square frame (see [`Frame::center_square`]).
//!
//! [`Frame::center_square`]: crate::camera::Frame::center_square

use crate::{
    direction::{majority, Direction, DirectionSample},
    landmarks::{FaceBox, Finger, HandLandmarks, LandmarkFrame, Point2},
};
use log::debug;

/// Minimum base-to-tip length for a finger to vote
const MIN_FINGER_LENGTH: f64 = 1e-9;

/// Converts landmarks into a direction sample
#[derive(Debug, Clone, Copy, Default)]
pub struct GestureClassifier;

impl GestureClassifier {
    /// Create a classifier
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Angle of the vector from `base` to `tip` in degrees, `0..360`
    #[must_use]
    pub fn pointing_angle(base: Point2, tip: Point2) -> f64 {
        let dx = tip.x - base.x;
        let dy = tip.y - base.y;
        (-dy).atan2(dx).to_degrees().rem_euclid(360.0)
    }

    /// Direction a single finger points, if it has a measurable length
    #[must_use]
    pub fn finger_direction(hand: &HandLandmarks, finger: Finger) -> Option<Direction> {
        let (base, tip) = hand.finger(finger);
        if (tip.x - base.x).hypot(tip.y - base.y) < MIN_FINGER_LENGTH {
            return None;
        }
        Direction::from_angle(Self::pointing_angle(base, tip))
    }

    /// Whether the hand overlaps the subject's own face
    #[must_use]
    pub fn hand_over_face(hand: &HandLandmarks, face: Option<&FaceBox>) -> bool {
        face.is_some_and(|face| face.contains(hand.centroid()))
    }

    /// Classify one frame
    #[must_use]
    pub fn classify(&self, landmarks: &LandmarkFrame) -> DirectionSample {
        let hand = landmarks.hand.as_ref()?;

        if Self::hand_over_face(hand, landmarks.face.as_ref()) {
            debug!("Hand centroid inside face box; ignoring frame");
            return None;
        }

        let direction = majority(
            Finger::VOTE_ORDER
                .iter()
                .filter_map(|&finger| Self::finger_direction(hand, finger)),
        );
        debug!("Finger vote: {:?}", direction);
        direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_HAND_LANDMARKS;

    /// Hand centered at (0.2, 0.8) with every finger pointing at `angles[i]` degrees
    fn hand_with_angles(angles: [f64; 4]) -> HandLandmarks {
        let mut points = [Point2::new(0.2, 0.8); NUM_HAND_LANDMARKS];
        for (finger, angle) in Finger::VOTE_ORDER.iter().zip(angles) {
            let (base, tip) = finger.joints();
            let rad = angle.to_radians();
            points[base] = Point2::new(0.2, 0.8);
            points[tip] = Point2::new(0.2 + 0.1 * rad.cos(), 0.8 - 0.1 * rad.sin());
        }
        HandLandmarks::from_points(&points).unwrap()
    }

    fn classify(hand: HandLandmarks, face: Option<FaceBox>) -> DirectionSample {
        GestureClassifier::new().classify(&LandmarkFrame { hand: Some(hand), face })
    }

    #[test]
    fn test_cardinal_gestures() {
        assert_eq!(classify(hand_with_angles([0.0; 4]), None), Some(Direction::Right));
        assert_eq!(classify(hand_with_angles([90.0; 4]), None), Some(Direction::Up));
        assert_eq!(classify(hand_with_angles([180.0; 4]), None), Some(Direction::Left));
        assert_eq!(classify(hand_with_angles([270.0; 4]), None), Some(Direction::Down));
    }

    #[test]
    fn test_sector_boundaries() {
        let cases = [
            (44.0, Direction::Right),
            (46.0, Direction::Up),
            (134.0, Direction::Up),
            (136.0, Direction::Left),
            (224.0, Direction::Left),
            (226.0, Direction::Down),
            (314.0, Direction::Down),
            (316.0, Direction::Right),
        ];
        for (angle, expected) in cases {
            assert_eq!(classify(hand_with_angles([angle; 4]), None), Some(expected), "angle {angle}");
        }
    }

    #[test]
    fn test_pointing_angle_flips_y() {
        // Tip above the base in image coordinates points up
        let angle = GestureClassifier::pointing_angle(Point2::new(0.5, 0.5), Point2::new(0.5, 0.3));
        assert!((angle - 90.0).abs() < 1e-9);
        let angle = GestureClassifier::pointing_angle(Point2::new(0.5, 0.5), Point2::new(0.5, 0.7));
        assert!((angle - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_majority_of_fingers() {
        let hand = hand_with_angles([180.0, 90.0, 180.0, 0.0]);
        assert_eq!(classify(hand, None), Some(Direction::Left));
    }

    #[test]
    fn test_tie_goes_to_index_finger() {
        let hand = hand_with_angles([270.0, 0.0, 0.0, 270.0]);
        assert_eq!(classify(hand, None), Some(Direction::Down));

        let hand = hand_with_angles([90.0, 180.0, 0.0, 270.0]);
        assert_eq!(classify(hand, None), Some(Direction::Up));
    }

    #[test]
    fn test_hand_over_face_is_ignored() {
        let face = FaceBox::new(0.1, 0.7, 0.3, 0.3);
        for angles in [[0.0; 4], [90.0; 4], [180.0; 4], [270.0; 4]] {
            assert_eq!(classify(hand_with_angles(angles), Some(face)), None);
        }
    }

    #[test]
    fn test_face_elsewhere_does_not_block() {
        let face = FaceBox::new(0.5, 0.1, 0.3, 0.4);
        assert_eq!(classify(hand_with_angles([0.0; 4]), Some(face)), Some(Direction::Right));
    }

    #[test]
    fn test_no_hand() {
        let frame = LandmarkFrame {
            hand: None,
            face: Some(FaceBox::new(0.1, 0.1, 0.2, 0.2)),
        };
        assert_eq!(GestureClassifier::new().classify(&frame), None);
    }

    /// Hand drawn in pixels on a `width` x `height` frame, normalized on the
    /// centred square crop the way landmarks reach the classifier
    fn hand_on_square_crop(width: f64, height: f64, angle: f64) -> HandLandmarks {
        let side = width.min(height);
        let (x0, y0) = ((width - side) / 2.0, (height - side) / 2.0);
        let normalize = |x: f64, y: f64| Point2::new((x - x0) / side, (y - y0) / side);
        let rad = angle.to_radians();
        let (bx, by) = (200.0, 300.0);
        let mut points = [normalize(bx, by); NUM_HAND_LANDMARKS];
        for finger in Finger::VOTE_ORDER {
            let (_, tip) = finger.joints();
            points[tip] = normalize(bx + 60.0 * rad.cos(), by - 60.0 * rad.sin());
        }
        HandLandmarks::from_points(&points).unwrap()
    }

    #[test]
    fn test_wide_frame_angles_keep_their_sector() {
        let cases = [
            (40.0, Direction::Right),
            (50.0, Direction::Up),
            (140.0, Direction::Left),
            (320.0, Direction::Right),
        ];
        for (angle, expected) in cases {
            assert_eq!(classify(hand_on_square_crop(640.0, 480.0, angle), None), Some(expected), "angle {angle}");
        }

        // Normalizing each axis by its own frame size skews 40 degrees to 48
        let (base, tip) = (Point2::new(200.0 / 640.0, 300.0 / 480.0), Point2::new(245.96 / 640.0, 261.43 / 480.0));
        assert!(GestureClassifier::pointing_angle(base, tip) > 45.0);
    }

    #[test]
    fn test_collapsed_fingers_abstain() {
        let hand = HandLandmarks::from_points(&[Point2::new(0.5, 0.5); NUM_HAND_LANDMARKS]).unwrap();
        assert_eq!(classify(hand, None), None);
    }
}
