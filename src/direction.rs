//! Cardinal directions shared by the optotype, the gesture classifier and
//! the voting controller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four directions a tumbling-E optotype can face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// 0 degrees
    Right,
    /// 90 degrees
    Up,
    /// 180 degrees
    Left,
    /// 270 degrees
    Down,
}

impl Direction {
    /// All directions in counter-clockwise order starting at 0 degrees
    pub const ALL: [Direction; 4] = [Direction::Right, Direction::Up, Direction::Left, Direction::Down];

    /// Angle in degrees, math convention
    #[must_use]
    pub fn degrees(self) -> u16 {
        match self {
            Self::Right => 0,
            Self::Up => 90,
            Self::Left => 180,
            Self::Down => 270,
        }
    }

    /// Quantize an angle into one of four 90 degree sectors centered on the
    /// cardinals. Lower sector bounds are inclusive: 45 is `Up`, 315 is `Right`.
    #[must_use]
    pub fn from_angle(angle_deg: f64) -> Option<Self> {
        if !angle_deg.is_finite() {
            return None;
        }
        let angle = angle_deg.rem_euclid(360.0);
        let direction = if !(45.0..315.0).contains(&angle) {
            Self::Right
        } else if angle < 135.0 {
            Self::Up
        } else if angle < 225.0 {
            Self::Left
        } else {
            Self::Down
        };
        Some(direction)
    }

    /// Human readable label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Right => "Right",
            Self::Up => "Up",
            Self::Left => "Left",
            Self::Down => "Down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-frame gesture reading; `None` means no usable gesture this frame
pub type DirectionSample = Option<Direction>;

/// Most frequent value; ties go to the value seen first.
pub fn majority<T, I>(values: I) -> Option<T>
where
    T: Copy + PartialEq,
    I: IntoIterator<Item = T>,
{
    let mut counts: Vec<(T, usize)> = Vec::with_capacity(4);
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinal_angles() {
        assert_eq!(Direction::from_angle(0.0), Some(Direction::Right));
        assert_eq!(Direction::from_angle(90.0), Some(Direction::Up));
        assert_eq!(Direction::from_angle(180.0), Some(Direction::Left));
        assert_eq!(Direction::from_angle(270.0), Some(Direction::Down));
        assert_eq!(Direction::from_angle(360.0), Some(Direction::Right));
    }

    #[test]
    fn test_sector_boundaries() {
        assert_eq!(Direction::from_angle(44.0), Some(Direction::Right));
        assert_eq!(Direction::from_angle(45.0), Some(Direction::Up));
        assert_eq!(Direction::from_angle(46.0), Some(Direction::Up));
        assert_eq!(Direction::from_angle(134.0), Some(Direction::Up));
        assert_eq!(Direction::from_angle(136.0), Some(Direction::Left));
        assert_eq!(Direction::from_angle(224.0), Some(Direction::Left));
        assert_eq!(Direction::from_angle(226.0), Some(Direction::Down));
        assert_eq!(Direction::from_angle(314.0), Some(Direction::Down));
        assert_eq!(Direction::from_angle(316.0), Some(Direction::Right));
        assert_eq!(Direction::from_angle(-10.0), Some(Direction::Right));
        assert_eq!(Direction::from_angle(f64::NAN), None);
    }

    #[test]
    fn test_degrees_round_trip() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_angle(f64::from(direction.degrees())), Some(direction));
        }
    }

    #[test]
    fn test_majority() {
        assert_eq!(majority([1, 2, 2, 3]), Some(2));
        assert_eq!(majority(Vec::<i32>::new()), None);
        // Tie: first seen wins
        assert_eq!(majority([Direction::Up, Direction::Left, Direction::Left, Direction::Up]), Some(Direction::Up));
        assert_eq!(majority([3, 1, 2]), Some(3));
    }
}
