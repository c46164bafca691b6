use super::{CameraSource, Frame};
use crate::{Error, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Plays back still images from a directory in file-name order
pub struct ImageSequenceCamera {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    looping: bool,
    open: bool,
}

impl ImageSequenceCamera {
    /// Open a directory of `png`/`jpg` frames
    ///
    /// # Errors
    ///
    /// Returns `CameraUnavailable` if the directory cannot be listed or holds no frames
    pub fn open<P: AsRef<Path>>(dir: P, looping: bool) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let files = Self::list_frames(&dir)?;
        info!("Opened frame sequence {} ({} frames)", dir.display(), files.len());
        Ok(Self {
            dir,
            files,
            cursor: 0,
            looping,
            open: true,
        })
    }

    fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::CameraUnavailable(format!("Cannot read frame directory {}: {e}", dir.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(Error::CameraUnavailable(format!("No frames found in {}", dir.display())));
        }
        Ok(files)
    }

    /// Number of frames in the sequence
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the sequence is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl CameraSource for ImageSequenceCamera {
    fn camera_id(&self) -> String {
        format!("sequence:{}", self.dir.display())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(Error::CameraUnavailable("Frame sequence has been released".to_string()));
        }
        if self.cursor >= self.files.len() {
            if !self.looping {
                return Err(Error::CameraUnavailable("End of frame sequence reached".to_string()));
            }
            self.cursor = 0;
        }

        let path = &self.files[self.cursor];
        self.cursor += 1;
        debug!("Reading frame {}", path.display());
        let image = image::open(path)?.to_rgb8();
        Ok(Frame::new(image))
    }

    fn release(&mut self) {
        self.open = false;
    }

    fn reopen(&mut self) -> Result<()> {
        self.files = Self::list_frames(&self.dir)?;
        self.cursor = 0;
        self.open = true;
        Ok(())
    }
}
