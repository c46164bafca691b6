//! Self-paced visual acuity test driven by hand gestures.

use anyhow::{bail, Result};
use clap::Parser;
use log::{info, warn};
use visual_acuity::{
    app::{AcuityApp, AppConfig},
    calibration::YamlCalibrationStore,
    camera::{sequence::ImageSequenceCamera, CameraSource},
    clock::SystemClock,
    config::{Config, EXAMPLE_CONFIG},
    display::DisplaySurface,
    landmarks::{subprocess::SubprocessLandmarkProvider, LandmarkProvider, NullLandmarkProvider},
    session::Subject,
    Error,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long)]
    cam: Option<i32>,

    /// Replay still images from this directory instead of a webcam
    #[arg(long)]
    frames: Option<String>,

    /// Subject given name
    #[arg(long)]
    name: Option<String>,

    /// Subject family name
    #[arg(long)]
    surname: Option<String>,

    /// Subject age in years
    #[arg(long)]
    age: Option<String>,

    /// Subject national identity number (optional)
    #[arg(long)]
    national_id: Option<String>,

    /// Subject phone number (optional)
    #[arg(long)]
    phone: Option<String>,

    /// Subject email address (optional)
    #[arg(long)]
    email: Option<String>,

    /// Calibrate the camera with a chessboard before testing
    #[arg(long)]
    calibrate: bool,

    /// Screen diagonal in inches
    #[arg(long)]
    screen_diag: Option<f64>,

    /// Landmark helper command (hand and face detection)
    #[arg(long)]
    landmark_cmd: Option<String>,

    /// Number of test cycles to run
    #[arg(long, default_value = "1")]
    cycles: usize,

    /// Seed for the target directions
    #[arg(long)]
    seed: Option<u64>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,
}

fn open_camera(config: &Config) -> Result<Box<dyn CameraSource>> {
    if let Some(dir) = &config.camera.frames_dir {
        info!("Replaying frames from {}", dir.display());
        return Ok(Box::new(ImageSequenceCamera::open(dir, config.camera.loop_frames)?));
    }

    #[cfg(feature = "opencv")]
    {
        Ok(Box::new(visual_acuity::camera::capture::WebcamSource::open(
            config.camera.index,
            config.camera.mirror,
        )?))
    }

    #[cfg(not(feature = "opencv"))]
    {
        bail!("Built without the `opencv` feature; use --frames <dir> to replay images")
    }
}

fn open_display(config: &Config) -> Result<Box<dyn DisplaySurface>> {
    #[cfg(feature = "opencv")]
    {
        Ok(Box::new(visual_acuity::display::highgui::HighguiDisplay::open(
            config.screen.width_px,
            config.screen.height_px,
            config.screen.fullscreen,
        )?))
    }

    #[cfg(not(feature = "opencv"))]
    {
        let _ = config;
        warn!("Built without the `opencv` feature; running headless");
        Ok(Box::new(visual_acuity::display::HeadlessDisplay::new()))
    }
}

fn open_landmarks(config: &Config) -> Result<Box<dyn LandmarkProvider>> {
    match &config.landmarks.command {
        Some(command) => Ok(Box::new(SubprocessLandmarkProvider::spawn(
            command,
            &config.landmarks.args,
            config.landmarks.startup_timeout(),
            config.landmarks.reply_timeout(),
        )?)),
        None => {
            warn!("No landmark helper configured; answers must be given with the keyboard");
            Ok(Box::new(NullLandmarkProvider))
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    if args.print_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Visual Acuity Test");

    // Load configuration if provided
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path);
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // Command line overrides
    if let Some(cam) = args.cam {
        config.camera.index = cam;
    }
    if let Some(frames) = args.frames {
        config.camera.frames_dir = Some(frames.into());
    }
    if let Some(diagonal) = args.screen_diag {
        config.screen.diagonal_in = diagonal;
    }
    if let Some(command) = args.landmark_cmd {
        config.landmarks.command = Some(command);
    }
    config.validate()?;

    let subject = Subject::new(
        args.name.as_deref().unwrap_or_default(),
        args.surname.as_deref().unwrap_or_default(),
        args.age.as_deref().unwrap_or_default(),
    )?
    .with_contact(args.national_id.as_deref(), args.phone.as_deref(), args.email.as_deref());
    if args.cycles == 0 {
        bail!("--cycles must be at least 1");
    }

    let camera = open_camera(&config)?;
    let landmarks = open_landmarks(&config)?;
    let display = open_display(&config)?;
    let store = Box::new(YamlCalibrationStore::new(&config.calibration.store_path));

    let app_config = AppConfig {
        config,
        subject,
        calibrate: args.calibrate,
        cycles: args.cycles,
        seed: args.seed,
    };

    // Create and run application
    let app = AcuityApp::new(app_config, camera, landmarks, display, Box::new(SystemClock), store)?;
    #[cfg(feature = "opencv")]
    let app = app.with_pattern_detector(Box::new(visual_acuity::calibration::chessboard::ChessboardDetector::new()));
    let mut app = app;

    match app.run() {
        Ok(outcomes) => {
            for outcome in &outcomes {
                info!("Report written to {}", outcome.report_path.display());
            }
            Ok(())
        }
        Err(Error::Cancelled) => {
            info!("Test cancelled");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
