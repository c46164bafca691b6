use super::{FaceBox, HandLandmarks, LandmarkFrame, LandmarkProvider, Point2};
use crate::{camera::Frame, constants::NUM_HAND_LANDMARKS, Error, Result};
use log::{debug, info, warn};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread;
use std::time::{Duration, Instant};

const READY_SIGNAL: &str = "READY";
const RGB_CHANNELS: u32 = 3;

/// One reply line from the helper
#[derive(Deserialize, Debug)]
struct DetectionReply {
    #[serde(default)]
    hand: Option<Vec<[f64; 2]>>,
    #[serde(default)]
    face: Option<FaceBox>,
    #[serde(default)]
    error: Option<String>,
}

/// Landmark provider that delegates detection to a helper process.
///
/// Per frame the helper receives a little-endian `u32` header
/// (`width`, `height`, `channels`) followed by raw RGB bytes on stdin, and
/// answers with one JSON line on stdout:
/// `{"hand": [[x, y], ...] | null, "face": {"x", "y", "width", "height"} | null, "error": null}`.
///
/// Pipe I/O runs on two worker threads so a stalled helper surfaces as a
/// timeout error instead of blocking the session. A reply that arrives after
/// its frame timed out is discarded when the next frame is answered.
pub struct SubprocessLandmarkProvider {
    process: Child,
    frames: SyncSender<Vec<u8>>,
    replies: Receiver<String>,
    reply_timeout: Duration,
    /// Frames sent whose replies have not been received yet
    pending: usize,
}

impl SubprocessLandmarkProvider {
    /// Spawn the helper and wait up to `startup_timeout` for its `READY` line
    ///
    /// # Errors
    ///
    /// Returns `LandmarkProvider` if the helper cannot start or does not signal ready
    pub fn spawn(program: &str, args: &[String], startup_timeout: Duration, reply_timeout: Duration) -> Result<Self> {
        info!("Starting landmark helper: {} {}", program, args.join(" "));

        let mut process = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::LandmarkProvider(format!("Failed to start '{program}': {e}")))?;

        let (Some(stdin), Some(stdout)) = (process.stdin.take(), process.stdout.take()) else {
            let _ = process.kill();
            let _ = process.wait();
            return Err(Error::LandmarkProvider("Helper pipes unavailable".to_string()));
        };

        let replies = spawn_reader(stdout)?;
        let frames = spawn_writer(stdin)?;

        let ready_line = match replies.recv_timeout(startup_timeout) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => String::new(),
            Err(RecvTimeoutError::Disconnected) => "<closed>".to_string(),
        };
        if ready_line.trim() != READY_SIGNAL {
            let _ = process.kill();
            let _ = process.wait();
            return Err(Error::LandmarkProvider(if ready_line.is_empty() {
                format!("Helper not ready after {startup_timeout:?}")
            } else {
                format!("Helper did not signal ready, got: {}", ready_line.trim())
            }));
        }

        info!("Landmark helper ready");
        Ok(Self {
            process,
            frames,
            replies,
            reply_timeout,
            pending: 0,
        })
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        let pixels = frame.as_bytes();
        let mut message = Vec::with_capacity(12 + pixels.len());
        message.extend_from_slice(&frame.width().to_le_bytes());
        message.extend_from_slice(&frame.height().to_le_bytes());
        message.extend_from_slice(&RGB_CHANNELS.to_le_bytes());
        message.extend_from_slice(pixels);

        match self.frames.try_send(message) {
            Ok(()) => {
                self.pending += 1;
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(Error::LandmarkProvider(
                "Helper is not accepting frames".to_string(),
            )),
            Err(TrySendError::Disconnected(_)) => Err(Error::LandmarkProvider("Helper closed its input".to_string())),
        }
    }

    /// Wait for the reply to the newest frame, dropping replies to older ones
    fn read_reply(&mut self) -> Result<DetectionReply> {
        let deadline = Instant::now() + self.reply_timeout;
        while self.pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = match self.replies.recv_timeout(remaining) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(Error::LandmarkProvider(format!(
                        "Helper did not answer within {:?}",
                        self.reply_timeout
                    )))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::LandmarkProvider("Helper closed its output".to_string()))
                }
            };
            self.pending -= 1;
            if self.pending == 0 {
                return parse_reply(&line);
            }
            debug!("Discarding late helper reply");
        }
        Err(Error::LandmarkProvider("No frame awaiting a reply".to_string()))
    }
}

/// Forward each stdout line to the returned channel until the pipe closes
fn spawn_reader(stdout: ChildStdout) -> Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("landmark-reader".to_string())
        .spawn(move || {
            let mut stdout = BufReader::new(stdout);
            loop {
                let mut line = String::new();
                match stdout.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Landmark helper output failed: {e}");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

/// Write each queued frame to stdin; holds at most one frame in flight
fn spawn_writer(mut stdin: ChildStdin) -> Result<SyncSender<Vec<u8>>> {
    let (tx, rx) = mpsc::sync_channel::<Vec<u8>>(1);
    thread::Builder::new()
        .name("landmark-writer".to_string())
        .spawn(move || {
            for message in rx {
                if let Err(e) = stdin.write_all(&message).and_then(|()| stdin.flush()) {
                    warn!("Landmark helper input failed: {e}");
                    break;
                }
            }
        })?;
    Ok(tx)
}

fn parse_reply(line: &str) -> Result<DetectionReply> {
    serde_json::from_str(line.trim())
        .map_err(|e| Error::LandmarkProvider(format!("Malformed helper reply '{}': {e}", line.trim())))
}

/// Turn a helper reply into detections; helper-side errors and malformed
/// hands count as nothing found.
fn reply_to_frame(reply: DetectionReply) -> LandmarkFrame {
    if let Some(error) = reply.error {
        warn!("Landmark helper error: {}", error);
        return LandmarkFrame::default();
    }

    let hand = reply.hand.and_then(|raw| {
        let points: Vec<Point2> = raw.iter().map(|[x, y]| Point2::new(*x, *y)).collect();
        match HandLandmarks::from_points(&points) {
            Ok(hand) => Some(hand),
            Err(_) => {
                warn!("Expected {} hand landmarks, got {}", NUM_HAND_LANDMARKS, points.len());
                None
            }
        }
    });

    LandmarkFrame { hand, face: reply.face }
}

impl LandmarkProvider for SubprocessLandmarkProvider {
    fn detect_hand(&mut self, frame: &Frame) -> Result<Option<HandLandmarks>> {
        Ok(self.detect(frame)?.hand)
    }

    fn detect_face(&mut self, frame: &Frame) -> Result<Option<FaceBox>> {
        Ok(self.detect(frame)?.face)
    }

    fn detect(&mut self, frame: &Frame) -> Result<LandmarkFrame> {
        self.send_frame(frame)?;
        let detections = reply_to_frame(self.read_reply()?);
        debug!(
            "Helper detections: hand={}, face={}",
            detections.hand.is_some(),
            detections.face.is_some()
        );
        Ok(detections)
    }
}

impl Drop for SubprocessLandmarkProvider {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn shell_helper(script: &str, reply_timeout: Duration) -> Result<SubprocessLandmarkProvider> {
        SubprocessLandmarkProvider::spawn(
            "sh",
            &["-c".to_string(), script.to_string()],
            Duration::from_secs(5),
            reply_timeout,
        )
    }

    #[test]
    fn test_parse_full_reply() {
        let hand: Vec<String> = (0..21).map(|i| format!("[{}, 0.5]", f64::from(i) / 100.0)).collect();
        let line = format!(
            r#"{{"hand": [{}], "face": {{"x": 0.3, "y": 0.2, "width": 0.25, "height": 0.3}}, "error": null}}"#,
            hand.join(",")
        );
        let frame = reply_to_frame(parse_reply(&line).unwrap());
        let hand = frame.hand.unwrap();
        assert!((hand.points()[20].x - 0.2).abs() < 1e-12);
        assert_eq!(frame.face, Some(FaceBox::new(0.3, 0.2, 0.25, 0.3)));
    }

    #[test]
    fn test_parse_empty_reply() {
        let frame = reply_to_frame(parse_reply(r#"{"hand": null, "face": null}"#).unwrap());
        assert_eq!(frame, LandmarkFrame::default());

        let frame = reply_to_frame(parse_reply("{}").unwrap());
        assert_eq!(frame, LandmarkFrame::default());
    }

    #[test]
    fn test_helper_error_means_no_detection() {
        let line = r#"{"hand": null, "face": {"x": 0.1, "y": 0.1, "width": 0.2, "height": 0.2}, "error": "model crashed"}"#;
        assert_eq!(reply_to_frame(parse_reply(line).unwrap()), LandmarkFrame::default());
    }

    #[test]
    fn test_short_hand_dropped() {
        let line = r#"{"hand": [[0.1, 0.1], [0.2, 0.2]], "face": null}"#;
        assert!(reply_to_frame(parse_reply(line).unwrap()).hand.is_none());
    }

    #[test]
    fn test_malformed_reply() {
        assert!(matches!(parse_reply("not json"), Err(Error::LandmarkProvider(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_round_trip_through_shell_helper() {
        // 12 header bytes plus a 2x2 RGB frame
        let script = r#"echo READY; head -c 24 > /dev/null; echo '{"hand": null, "face": {"x": 0.4, "y": 0.3, "width": 0.2, "height": 0.25}}'"#;
        let mut provider = shell_helper(script, Duration::from_secs(5)).unwrap();

        let detections = provider.detect(&Frame::blank(2, 2)).unwrap();
        assert!(detections.hand.is_none());
        assert_eq!(detections.face, Some(FaceBox::new(0.4, 0.3, 0.2, 0.25)));
    }

    #[cfg(unix)]
    #[test]
    fn test_helper_without_ready_signal() {
        let result = shell_helper("echo BOOT", Duration::from_secs(5));
        assert!(matches!(result, Err(Error::LandmarkProvider(_))));
    }

    #[test]
    fn test_spawn_missing_program() {
        let result = SubprocessLandmarkProvider::spawn(
            "/nonexistent/landmark-helper",
            &[],
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(Error::LandmarkProvider(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_helper_times_out() {
        let mut provider = shell_helper("echo READY; exec sleep 30", Duration::from_millis(200)).unwrap();

        let started = Instant::now();
        let result = provider.detect(&Frame::blank(2, 2));
        assert!(matches!(result, Err(Error::LandmarkProvider(msg)) if msg.contains("did not answer")));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_helper_never_ready_times_out() {
        let started = Instant::now();
        let result = SubprocessLandmarkProvider::spawn(
            "sh",
            &["-c".to_string(), "exec sleep 30".to_string()],
            Duration::from_millis(200),
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(Error::LandmarkProvider(msg)) if msg.contains("not ready")));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_late_reply_is_discarded() {
        let script = r#"echo READY
head -c 24 > /dev/null; sleep 1; echo '{"face": {"x": 0.1, "y": 0.1, "width": 0.1, "height": 0.1}}'
head -c 24 > /dev/null; echo '{"face": {"x": 0.5, "y": 0.5, "width": 0.2, "height": 0.2}}'
exec sleep 30"#;
        let mut provider = shell_helper(script, Duration::from_millis(300)).unwrap();

        assert!(provider.detect(&Frame::blank(2, 2)).is_err());
        std::thread::sleep(Duration::from_millis(1500));
        let detections = provider.detect(&Frame::blank(2, 2)).unwrap();
        assert_eq!(detections.face, Some(FaceBox::new(0.5, 0.5, 0.2, 0.2)));
    }
}
