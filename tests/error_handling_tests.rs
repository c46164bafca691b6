//! Error handling tests for all modules


use tempfile::TempDir;
use test_helpers::{test_app_config, FakeCamera, ObservingDisplay};
use visual_acuity::{
    acuity::{AcuityLevel, AcuityTable},
    app::AcuityApp,
    calibration::{CameraCalibrator, CalibrationStore, MemoryCalibrationStore, PatternGeometry, YamlCalibrationStore},
    camera::{sequence::ImageSequenceCamera, Frame},
    clock::ManualClock,
    config::Config,
    direction::Direction,
    display::KeyEvent,
    landmarks::{FaceBox, HandLandmarks, LandmarkProvider, NullLandmarkProvider},
    optotype::{OptotypeScaler, PixelPitch},
    session::Subject,
    Error, Result,
};

/// Provider whose detector has crashed
struct BrokenProvider;

impl LandmarkProvider for BrokenProvider {
    fn detect_hand(&mut self, _frame: &Frame) -> Result<Option<HandLandmarks>> {
        Err(Error::LandmarkProvider("helper exited".to_string()))
    }

    fn detect_face(&mut self, _frame: &Frame) -> Result<Option<FaceBox>> {
        Err(Error::LandmarkProvider("helper exited".to_string()))
    }
}

#[test]
fn test_invalid_config_rejected_before_test() {
    let results_dir = TempDir::new().unwrap();
    let mut config = test_app_config(results_dir.path());
    config.config.screen.diagonal_in = 0.0;
    let (camera, log) = FakeCamera::new();

    let result = AcuityApp::new(
        config,
        Box::new(camera),
        Box::new(NullLandmarkProvider),
        Box::new(ObservingDisplay::new().0),
        Box::new(ManualClock::new()),
        Box::new(MemoryCalibrationStore::new()),
    );
    assert!(matches!(result, Err(Error::ConfigError(_))));
    assert_eq!(log.borrow().reads, 0);
}

#[test]
fn test_config_validation_errors() {
    let mut config = Config::default();
    config.voting.window_ms = 0;
    assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

    let mut config = Config::default();
    config.voting.stability_ms = 100;
    assert!(matches!(config.validate(), Err(Error::ConfigError(msg)) if msg.contains("Stability")));

    let mut config = Config::default();
    config.calibration.target_samples = 2;
    assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

    let mut config = Config::default();
    config.calibration.pattern_cols = 1;
    assert!(matches!(config.validate(), Err(Error::ConfigError(_))));

    let mut config = Config::default();
    config.landmarks.command = Some("  ".to_string());
    assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
}

#[test]
fn test_config_file_errors() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(Config::from_file(dir.path().join("missing.yaml")), Err(Error::Io(_))));

    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "screen: [not, a, map]").unwrap();
    assert!(matches!(Config::from_file(&path), Err(Error::ConfigError(_))));
}

#[test]
fn test_landmark_failure_counts_as_no_detection() {
    let results_dir = TempDir::new().unwrap();
    let (camera, _log) = FakeCamera::new();
    let (display, screen) = ObservingDisplay::new();
    let mut display = display;
    for _ in 0..28 {
        display = display.key_after(3, KeyEvent::Direction(Direction::Left));
    }

    let mut app = AcuityApp::new(
        test_app_config(results_dir.path()),
        Box::new(camera),
        Box::new(BrokenProvider),
        Box::new(display),
        Box::new(ManualClock::new()),
        Box::new(MemoryCalibrationStore::new()),
    )
    .unwrap();

    let outcome = app.run_cycle().unwrap();
    assert!((outcome.distance_m - 1.0).abs() < 1e-9);
    assert_eq!(outcome.results[1].trials.len(), 14);
    assert_eq!(screen.borrow().notices, 0);
}

#[test]
fn test_subject_validation() {
    assert!(matches!(Subject::new("", "Doe", "30"), Err(Error::InvalidInput(_))));
    assert!(matches!(Subject::new("Jane", "   ", "30"), Err(Error::InvalidInput(_))));
    assert!(matches!(Subject::new("Jane", "Doe", "thirty"), Err(Error::InvalidInput(_))));
    assert!(matches!(Subject::new("Jane", "Doe", "-4"), Err(Error::InvalidInput(_))));
    assert_eq!(Subject::new(" Jane ", "Doe", " 30 ").unwrap().age, 30);
}

#[test]
fn test_level_label_errors() {
    assert!(AcuityLevel::new("10/0").is_err());
    assert!(AcuityLevel::new("ten/20").is_err());
    assert!(AcuityLevel::new("10").is_err());
    assert!(AcuityTable::from_labels(["10/20", "bogus"]).is_err());
}

#[test]
fn test_missing_pitch_errors() {
    let scaler = OptotypeScaler::new(None);
    let mut table = AcuityTable::clinical();
    assert!(matches!(scaler.compute_baselines(&mut table), Err(Error::PitchUnavailable(_))));
    assert!(matches!(PixelPitch::new(-0.2), Err(Error::PitchUnavailable(_))));
}

#[test]
fn test_frame_sequence_errors() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(ImageSequenceCamera::open(dir.path(), false), Err(Error::CameraUnavailable(_))));
    assert!(matches!(
        ImageSequenceCamera::open(dir.path().join("absent"), false),
        Err(Error::CameraUnavailable(_))
    ));
}

#[test]
fn test_calibration_errors() {
    let geometry = PatternGeometry::new(4, 3, 0.03).unwrap();
    let mut calibrator = CameraCalibrator::new(geometry, 3);
    let mut store = MemoryCalibrationStore::new();

    assert!(matches!(
        calibrator.finish("camera_0", &mut store),
        Err(Error::InsufficientData { captured: 0, required: 3 })
    ));
    assert!(store.load("camera_0").unwrap().is_none());

    let short = vec![nalgebra::Point2::new(1.0, 1.0); 5];
    assert!(matches!(calibrator.add_sample(short), Err(Error::InvalidInput(_))));
    assert_eq!(calibrator.sample_count(), 0);

    assert!(matches!(PatternGeometry::new(1, 5, 0.02), Err(Error::ConfigError(_))));
    assert!(matches!(PatternGeometry::new(5, 4, 0.0), Err(Error::ConfigError(_))));
}

#[test]
fn test_calibration_store_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("focals.yaml");
    std::fs::write(&path, "[1, 2").unwrap();
    assert!(matches!(YamlCalibrationStore::new(&path).load("camera_0"), Err(Error::Yaml(_))));

    // A directory cannot be written as the store file
    let mut store = YamlCalibrationStore::new(dir.path());
    assert!(store.save("camera_0", 700.0).is_err());
}
