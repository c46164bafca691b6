//! Main application module for the visual acuity test.
//!
//! One cycle runs: optional calibration, distance measurement, optotype
//! rescaling, the left and right eye tests, the recommendation and the
//! report. The camera is released and reopened between cycles so the next
//! subject starts from a clean capture state.

use crate::{
    acuity::AcuityTable,
    calibration::{CalibrationProfile, CalibrationStore, CameraCalibrator, PatternDetector},
    camera::CameraSource,
    clock::Clock,
    config::Config,
    direction::Direction,
    display::{DisplaySurface, KeyEvent, Screen},
    distance::DistanceEstimator,
    gesture::GestureClassifier,
    landmarks::{LandmarkFrame, LandmarkProvider},
    optotype::{render_optotype, OptotypeScaler},
    recommendation::{self, Recommendation, RecommendationService},
    report::{self, ReportWriter},
    session::{SessionContext, Subject},
    trial::{Eye, EyeResult, Trial, TrialController},
    voting::StabilityVoter,
    Error, Result,
};
use chrono::Local;
use log::{error, info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

/// Warning shown while no usable input arrives
pub const NO_INPUT_NOTICE: &str = "No hand or keyboard input detected!";

/// Key poll timeout inside the sampling loop
const KEY_POLL: Duration = Duration::from_millis(1);

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// File-level configuration
    pub config: Config,
    /// Person being tested
    pub subject: Subject,
    /// Run chessboard calibration before the first test
    pub calibrate: bool,
    /// Number of full test cycles
    pub cycles: usize,
    /// Seed for target directions; random when absent
    pub seed: Option<u64>,
}

/// Outcome of one full test cycle
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// Per-eye results, left first
    pub results: Vec<EyeResult>,
    /// Distance used for sizing
    pub distance_m: f64,
    /// Recommendation text and source
    pub recommendation: Recommendation,
    /// Saved report
    pub report_path: PathBuf,
}

/// The visual acuity test application
pub struct AcuityApp {
    config: AppConfig,
    camera: Box<dyn CameraSource>,
    landmarks: Box<dyn LandmarkProvider>,
    display: Box<dyn DisplaySurface>,
    clock: Box<dyn Clock>,
    store: Box<dyn CalibrationStore>,
    pattern_detector: Option<Box<dyn PatternDetector>>,
    recommender: Option<Box<dyn RecommendationService>>,
    classifier: GestureClassifier,
    scaler: OptotypeScaler,
    rng: StdRng,
}

impl AcuityApp {
    /// Create a new application instance
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid; this is
    /// surfaced before any test starts
    pub fn new(
        config: AppConfig,
        camera: Box<dyn CameraSource>,
        landmarks: Box<dyn LandmarkProvider>,
        display: Box<dyn DisplaySurface>,
        clock: Box<dyn Clock>,
        store: Box<dyn CalibrationStore>,
    ) -> Result<Self> {
        info!("Initializing visual acuity test");
        config.config.validate()?;
        let scaler = config.config.optotype_scaler()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            camera,
            landmarks,
            display,
            clock,
            store,
            pattern_detector: None,
            recommender: None,
            classifier: GestureClassifier::new(),
            scaler,
            rng,
        })
    }

    /// Use `detector` for calibration
    #[must_use]
    pub fn with_pattern_detector(mut self, detector: Box<dyn PatternDetector>) -> Self {
        self.pattern_detector = Some(detector);
        self
    }

    /// Ask `service` for recommendations
    #[must_use]
    pub fn with_recommendation_service(mut self, service: Box<dyn RecommendationService>) -> Self {
        self.recommender = Some(service);
        self
    }

    /// Run all configured cycles. On any error the camera is released before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` on quit, `CameraUnavailable` when the camera
    /// fails, or a configuration or report error
    pub fn run(&mut self) -> Result<Vec<CycleOutcome>> {
        info!("Starting main application loop");
        let mut outcomes = Vec::with_capacity(self.config.cycles);

        for cycle in 0..self.config.cycles {
            if cycle > 0 {
                info!("Restarting camera for cycle {}", cycle + 1);
                self.camera.release();
                if let Err(e) = self.camera.reopen() {
                    error!("Could not reopen camera: {e}");
                    return Err(e);
                }
            }

            match self.run_cycle() {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    match &e {
                        Error::Cancelled => info!("Exit requested by user"),
                        other => error!("Session aborted: {other}"),
                    }
                    self.camera.release();
                    return Err(e);
                }
            }
        }

        self.camera.release();
        info!("Application shutting down");
        Ok(outcomes)
    }

    /// One complete test for the configured subject
    ///
    /// # Errors
    ///
    /// See [`AcuityApp::run`]
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let camera_id = self.camera.camera_id();

        if self.config.calibrate {
            match self.calibrate() {
                Ok(profile) => info!("Using calibrated focal length {:.2}px", profile.focal_length_px),
                Err(e @ (Error::CameraUnavailable(_) | Error::Cancelled)) => return Err(e),
                Err(e) => warn!("Calibration failed: {e}; proceeding with default focal length"),
            }
        }

        let focal = match self.store.load(&camera_id) {
            Ok(focal) => focal,
            Err(e) => {
                warn!("Could not read calibration for {camera_id}: {e}");
                None
            }
        };
        let estimator = self.config.config.distance_estimator(focal);

        let mut table = AcuityTable::clinical();
        self.scaler.compute_baselines(&mut table)?;
        let mut context = SessionContext::new(self.config.subject.clone(), table, camera_id);

        context.distance_m = self.measure_distance(&estimator)?;
        self.scaler.rescale(&mut context.table, context.distance_m);

        let mut results = Vec::with_capacity(Eye::ORDER.len());
        for eye in Eye::ORDER {
            self.show_eye_prompt(eye)?;
            let mut controller = TrialController::new(StdRng::seed_from_u64(self.rng.gen()));
            let result = controller.run_eye(eye, &context.table, |trial| self.await_answer(trial, &context))?;
            results.push(result);
        }

        let summary = report::summary_text(&results);
        for line in summary.lines() {
            info!("{line}");
        }
        let service = self
            .recommender
            .as_mut()
            .map(|service| service.as_mut() as &mut dyn RecommendationService);
        let recommendation = recommendation::recommend(service, &summary, &results);
        info!("Recommendation: {}", recommendation.text);

        let writer = ReportWriter::new(&self.config.config.report.results_dir);
        let report_path = writer.write(&context, &results, &recommendation.text, Local::now())?;

        let mut lines: Vec<String> = summary.lines().map(str::to_string).collect();
        lines.push(format!("Recommendation: {}", recommendation.text));
        lines.push(format!("Results saved to {}", report_path.display()));
        self.display.present(&Screen::text(lines))?;

        Ok(CycleOutcome {
            results,
            distance_m: context.distance_m,
            recommendation,
            report_path,
        })
    }

    /// Interactive chessboard calibration for the current camera
    ///
    /// # Errors
    ///
    /// Returns `InsufficientData` or `SolveFailed` from the solver,
    /// `CameraUnavailable` if the camera fails, or `ConfigError` when no
    /// pattern detector is available
    pub fn calibrate(&mut self) -> Result<CalibrationProfile> {
        let geometry = self.config.config.pattern_geometry()?;
        let target = self.config.config.calibration.target_samples;
        let interval = self.config.config.sample_interval();
        let camera_id = self.camera.camera_id();

        let Self {
            camera,
            display,
            clock,
            store,
            pattern_detector,
            ..
        } = self;
        let detector = pattern_detector
            .as_mut()
            .ok_or_else(|| Error::ConfigError("No calibration pattern detector available".to_string()))?;

        info!("Starting calibration of {camera_id}: {target} samples of a {}x{} pattern", geometry.cols, geometry.rows);
        let mut calibrator = CameraCalibrator::new(geometry, target);

        while !calibrator.is_complete() {
            let frame = camera.read_frame()?;
            let corners = detector.detect(&frame, calibrator.geometry())?;

            display.present(&Screen {
                lines: vec![
                    format!("Calibration: {}/{}", calibrator.sample_count(), calibrator.target_samples()),
                    "Press SPACE to capture, Q to finish".to_string(),
                ],
                optotype: None,
                status: Some(if corners.is_some() { "Pattern detected" } else { "Pattern not found" }.to_string()),
                notice: None,
            })?;

            match display.poll_key(KEY_POLL)? {
                Some(KeyEvent::Capture) => match corners {
                    Some(corners) => {
                        calibrator.add_sample(corners)?;
                    }
                    None => warn!("Chessboard not detected; frame rejected"),
                },
                Some(KeyEvent::Quit) => {
                    info!("Calibration finished early with {} samples", calibrator.sample_count());
                    break;
                }
                _ => {}
            }
            clock.sleep(interval);
        }

        calibrator.finish(&camera_id, store.as_mut())
    }

    /// Measure the subject's distance from one frame; never fails on a
    /// missing detection
    fn measure_distance(&mut self, estimator: &DistanceEstimator) -> Result<f64> {
        self.display
            .present(&Screen::text(["Measuring distance, please look at the camera"]))?;
        let frame = self.camera.read_frame()?;
        let face = match self.landmarks.detect_face(&frame) {
            Ok(face) => face,
            Err(e) => {
                warn!("Face detection failed: {e}");
                None
            }
        };
        Ok(estimator.estimate(face.as_ref(), frame.width()))
    }

    fn show_eye_prompt(&mut self, eye: Eye) -> Result<()> {
        let other = match eye {
            Eye::Left => Eye::Right,
            Eye::Right => Eye::Left,
        };
        info!("Prompting subject to cover the {} eye", other.label().to_lowercase());
        self.display.present(&Screen::text([
            format!("Testing the {} eye", eye.label().to_lowercase()),
            format!("Please cover your {} eye", other.label().to_lowercase()),
        ]))
    }

    /// Show one trial and run the stability voting loop until an answer is
    /// confirmed or overridden from the keyboard
    fn await_answer(&mut self, trial: &Trial, context: &SessionContext) -> Result<Direction> {
        let max_px = self.config.config.max_optotype_px();
        if trial.size_px > max_px {
            warn!(
                "Level {} needs {}px but the screen fits {}px; drawing at screen size",
                trial.level_label, trial.size_px, max_px
            );
        }
        let optotype = Rc::new(render_optotype(trial.size_px.min(max_px), trial.target));
        let interval = self.config.config.sample_interval();
        let mut voter = StabilityVoter::new(self.config.config.voting_config(), self.clock.now());

        loop {
            // Square input keeps normalized x and y on the same scale
            let frame = self.camera.read_frame()?.center_square();
            let landmarks = match self.landmarks.detect(&frame) {
                Ok(landmarks) => landmarks,
                Err(e) => {
                    warn!("Landmark detection failed: {e}");
                    LandmarkFrame::default()
                }
            };
            let sample = self.classifier.classify(&landmarks);

            if let Some(direction) = voter.tick(self.clock.now(), sample) {
                return Ok(direction);
            }

            self.display.present(&Screen {
                lines: vec![
                    format!("{} eye - Level: {} ({}/{})", trial.eye, trial.level_label, trial.index + 1, trial.total),
                    format!("Adjusted to distance: {:.2} m", context.distance_m),
                ],
                optotype: Some(Rc::clone(&optotype)),
                status: voter.last_window_vote().map(|d| format!("Hand detected: {d}")),
                notice: voter.notice_active().then(|| NO_INPUT_NOTICE.to_string()),
            })?;

            match self.display.poll_key(KEY_POLL)? {
                Some(KeyEvent::Direction(direction)) => return Ok(voter.override_with(direction)),
                Some(KeyEvent::Quit) => return Err(Error::Cancelled),
                _ => {}
            }

            self.clock.sleep(interval);
        }
    }
}
