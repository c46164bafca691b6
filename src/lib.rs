//! Visual acuity test library for self-paced, gesture-answered eye exams.
//!
//! The library provides the measurement and interaction core of the test:
//! - Camera calibration from a chessboard, stored per camera
//! - Monocular distance estimation from the detected face width
//! - Optotype sizing from clinical visual-angle rules, rescaled to distance
//! - Direction classification from hand landmarks
//! - Stability voting that turns noisy per-frame readings into one answer
//! - Per-eye trial sequencing and scoring
//!
//! Hand and face detection are supplied by an external landmark provider.
//! Live webcam capture, chessboard detection and the on-screen window use
//! `OpenCV` and are enabled with the `opencv` feature.
//!
//! # Examples
//!
//! ## Sizing optotypes
//!
//! ```
//! use visual_acuity::{acuity::AcuityTable, optotype::{OptotypeScaler, PixelPitch}};
//!
//! # fn main() -> visual_acuity::Result<()> {
//! // 15.6" 1920x1080 laptop screen
//! let pitch = PixelPitch::from_screen(15.6, 1920, 1080)?;
//! let scaler = OptotypeScaler::new(Some(pitch));
//!
//! let mut table = AcuityTable::clinical();
//! scaler.compute_baselines(&mut table)?;
//!
//! // Subject measured at 2 m: every optotype doubles
//! scaler.rescale(&mut table, 2.0);
//! for level in table.levels() {
//!     println!("{}: {}px", level.label(), level.current_px());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Voting on gestures
//!
//! ```
//! use std::time::{Duration, Instant};
//! use visual_acuity::{direction::Direction, voting::{StabilityVoter, VotingConfig}};
//!
//! let start = Instant::now();
//! let mut voter = StabilityVoter::new(VotingConfig::default(), start);
//!
//! // A gesture held steadily for 1.5 s is confirmed
//! let mut answer = None;
//! for i in 1..=40u32 {
//!     answer = voter.tick(start + Duration::from_millis(50) * i, Some(Direction::Up));
//!     if answer.is_some() {
//!         break;
//!     }
//! }
//! assert_eq!(answer, Some(Direction::Up));
//! ```

/// Snellen acuity levels and the clinical level table
pub mod acuity;

/// Main application module
pub mod app;

/// Chessboard camera calibration and per-camera focal length storage
pub mod calibration;

/// Camera sources and frames
pub mod camera;

/// Time source for the sampling loop
pub mod clock;

/// Configuration management
pub mod config;

/// Constants used throughout the application
pub mod constants;

/// Cardinal directions and majority voting
pub mod direction;

/// Display surfaces and key input
pub mod display;

/// Subject distance estimation
pub mod distance;

/// Error types and result handling
pub mod error;

/// Gesture classification from landmarks
pub mod gesture;

/// Hand and face landmarks and the landmark provider seam
pub mod landmarks;

/// Optotype sizing and rendering
pub mod optotype;

/// Post-test recommendation text
pub mod recommendation;

/// Session summaries and saved reports
pub mod report;

/// Subject and session context
pub mod session;

/// Per-eye trial sequencing
pub mod trial;

/// Numeric conversion helpers
pub mod utils;

/// Stability voting state machine
pub mod voting;

pub use error::{Error, Result};
