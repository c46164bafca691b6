//! Display surface seam: draws the current screen and reports key presses.

/// `OpenCV` highgui window
#[cfg(feature = "opencv")]
pub mod highgui;

use crate::{direction::Direction, Result};
use image::{imageops, GrayImage};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Everything shown on screen at one moment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Screen {
    /// Text lines drawn top-left
    pub lines: Vec<String>,
    /// Optotype drawn centered; shared so each frame of a trial reuses one image
    pub optotype: Option<Rc<GrayImage>>,
    /// Status line at the bottom, e.g. the detected direction
    pub status: Option<String>,
    /// Warning drawn at the bottom in red
    pub notice: Option<String>,
}

impl Screen {
    /// Screen showing only text
    #[must_use]
    pub fn text<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Operator or subject input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// Manual direction answer
    Direction(Direction),
    /// Accept the current calibration frame
    Capture,
    /// Stop the session
    Quit,
}

/// Where screens are drawn and keys are read
pub trait DisplaySurface {
    /// Draw and present `screen`
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to draw
    fn present(&mut self, screen: &Screen) -> Result<()>;

    /// Wait up to `timeout` for a key press
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to poll
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyEvent>>;
}

/// Map an unmasked key code, as returned by `waitKeyEx`, to an event.
///
/// Arrow keys arrive as X11/GTK keysyms (`0xFF51..=0xFF54`), Windows virtual
/// key codes shifted into the high word (`0x25_0000..=0x28_0000`) or Cocoa
/// function keys (`0xF700..=0xF703`). Plain bytes map WASD (either case),
/// space, `q`/`Q` and Esc; a bare byte is never read as an arrow, so `Q`
/// quits and `S` means down.
#[must_use]
pub fn key_from_code(code: i32) -> Option<KeyEvent> {
    let event = match code {
        0xFF51 | 0x25_0000 | 0xF702 => KeyEvent::Direction(Direction::Left),
        0xFF52 | 0x26_0000 | 0xF700 => KeyEvent::Direction(Direction::Up),
        0xFF53 | 0x27_0000 | 0xF703 => KeyEvent::Direction(Direction::Right),
        0xFF54 | 0x28_0000 | 0xF701 => KeyEvent::Direction(Direction::Down),
        27 => KeyEvent::Quit,
        _ => match u8::try_from(code).ok().map(char::from) {
            Some('w' | 'W') => KeyEvent::Direction(Direction::Up),
            Some('a' | 'A') => KeyEvent::Direction(Direction::Left),
            Some('s' | 'S') => KeyEvent::Direction(Direction::Down),
            Some('d' | 'D') => KeyEvent::Direction(Direction::Right),
            Some(' ') => KeyEvent::Capture,
            Some('q' | 'Q') => KeyEvent::Quit,
            _ => return None,
        },
    };
    Some(event)
}

/// Downscale `image` to fit inside `max_width` x `max_height`, keeping its
/// aspect ratio. Images that already fit are borrowed, not copied.
#[must_use]
pub fn fit_to_canvas(image: &GrayImage, max_width: u32, max_height: u32) -> Cow<'_, GrayImage> {
    let (width, height) = image.dimensions();
    if width <= max_width && height <= max_height {
        return Cow::Borrowed(image);
    }
    let scale = (f64::from(max_width) / f64::from(width)).min(f64::from(max_height) / f64::from(height));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = |v: u32| ((f64::from(v) * scale).floor() as u32).max(1);
    Cow::Owned(imageops::resize(
        image,
        scaled(width),
        scaled(height),
        imageops::FilterType::Nearest,
    ))
}

/// Display without a window: records what was shown and replays scripted keys
#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    frames_presented: usize,
    last_screen: Option<Screen>,
    notices_seen: usize,
    scripted_keys: VecDeque<(usize, KeyEvent)>,
    polls: usize,
}

impl HeadlessDisplay {
    /// Display with no scripted input
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `key` on the poll after `polls` further polls
    #[must_use]
    pub fn with_key_after(mut self, polls: usize, key: KeyEvent) -> Self {
        let at = self.scripted_keys.back().map_or(0, |(at, _)| *at) + polls;
        self.scripted_keys.push_back((at, key));
        self
    }

    /// Number of `present` calls
    #[must_use]
    pub fn frames_presented(&self) -> usize {
        self.frames_presented
    }

    /// Most recent screen
    #[must_use]
    pub fn last_screen(&self) -> Option<&Screen> {
        self.last_screen.as_ref()
    }

    /// Number of presented screens carrying a notice
    #[must_use]
    pub fn notices_seen(&self) -> usize {
        self.notices_seen
    }
}

impl DisplaySurface for HeadlessDisplay {
    fn present(&mut self, screen: &Screen) -> Result<()> {
        self.frames_presented += 1;
        if screen.notice.is_some() {
            self.notices_seen += 1;
        }
        self.last_screen = Some(screen.clone());
        Ok(())
    }

    fn poll_key(&mut self, _timeout: Duration) -> Result<Option<KeyEvent>> {
        let poll = self.polls;
        self.polls += 1;
        match self.scripted_keys.front() {
            Some((at, key)) if *at <= poll => {
                let key = *key;
                self.scripted_keys.pop_front();
                Ok(Some(key))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_codes() {
        assert_eq!(key_from_code(65361), Some(KeyEvent::Direction(Direction::Left)));
        assert_eq!(key_from_code(65362), Some(KeyEvent::Direction(Direction::Up)));
        assert_eq!(key_from_code(65363), Some(KeyEvent::Direction(Direction::Right)));
        assert_eq!(key_from_code(65364), Some(KeyEvent::Direction(Direction::Down)));
        assert_eq!(key_from_code(2_424_832), Some(KeyEvent::Direction(Direction::Left)));
        assert_eq!(key_from_code(2_621_440), Some(KeyEvent::Direction(Direction::Down)));
        assert_eq!(key_from_code(0xF700), Some(KeyEvent::Direction(Direction::Up)));
        assert_eq!(key_from_code(0xF703), Some(KeyEvent::Direction(Direction::Right)));
    }

    #[test]
    fn test_uppercase_letters_keep_their_meaning() {
        assert_eq!(key_from_code(i32::from(b'Q')), Some(KeyEvent::Quit));
        assert_eq!(key_from_code(i32::from(b'S')), Some(KeyEvent::Direction(Direction::Down)));
        assert_eq!(key_from_code(i32::from(b'R')), None);
        assert_eq!(key_from_code(i32::from(b'T')), None);
    }

    #[test]
    fn test_letter_keys() {
        assert_eq!(key_from_code(i32::from(b'w')), Some(KeyEvent::Direction(Direction::Up)));
        assert_eq!(key_from_code(i32::from(b'd')), Some(KeyEvent::Direction(Direction::Right)));
        assert_eq!(key_from_code(i32::from(b' ')), Some(KeyEvent::Capture));
        assert_eq!(key_from_code(i32::from(b'q')), Some(KeyEvent::Quit));
        assert_eq!(key_from_code(27), Some(KeyEvent::Quit));
        assert_eq!(key_from_code(-1), None);
        assert_eq!(key_from_code(i32::from(b'x')), None);
    }

    #[test]
    fn test_fit_to_canvas_preserves_aspect() {
        let image = GrayImage::new(400, 200);
        let fitted = fit_to_canvas(&image, 100, 100);
        assert_eq!(fitted.dimensions(), (100, 50));

        let small = GrayImage::new(40, 20);
        let kept = fit_to_canvas(&small, 100, 100);
        assert!(matches!(kept, Cow::Borrowed(_)));
        assert_eq!(kept.dimensions(), (40, 20));
    }

    #[test]
    fn test_headless_scripted_keys() {
        let mut display = HeadlessDisplay::new()
            .with_key_after(2, KeyEvent::Direction(Direction::Up))
            .with_key_after(1, KeyEvent::Quit);
        let timeout = Duration::from_millis(1);
        assert_eq!(display.poll_key(timeout).unwrap(), None);
        assert_eq!(display.poll_key(timeout).unwrap(), None);
        assert_eq!(display.poll_key(timeout).unwrap(), Some(KeyEvent::Direction(Direction::Up)));
        assert_eq!(display.poll_key(timeout).unwrap(), Some(KeyEvent::Quit));
        assert_eq!(display.poll_key(timeout).unwrap(), None);
    }

    #[test]
    fn test_headless_records_screens() {
        let mut display = HeadlessDisplay::new();
        display.present(&Screen::text(["Level: 10/200"])).unwrap();
        let mut screen = Screen::text(["Level: 10/160"]);
        screen.notice = Some("No input".to_string());
        display.present(&screen).unwrap();

        assert_eq!(display.frames_presented(), 2);
        assert_eq!(display.notices_seen(), 1);
        assert_eq!(display.last_screen().unwrap().lines, vec!["Level: 10/160".to_string()]);
    }
}
