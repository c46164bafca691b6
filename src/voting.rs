//! Stability voting: turns noisy per-frame gesture samples into one answer.
//!
//! Samples are grouped into fixed windows; each window's majority direction
//! is one window-vote. A window-vote becomes the candidate answer, and the
//! candidate is confirmed once it has persisted for the stability threshold,
//! measured from the start of the window that first produced it. A manual
//! override confirms immediately. If no usable window-vote arrives for the
//! timeout, the controller raises a no-input notice but keeps sampling.
//!
//! The controller is driven by [`StabilityVoter::tick`], one call per frame,
//! with the caller supplying the time, so tests can run on a simulated clock.

use crate::{
    constants::{DEFAULT_NO_INPUT_TIMEOUT_MS, DEFAULT_STABILITY_MS, DEFAULT_WINDOW_MS},
    direction::{majority, Direction, DirectionSample},
};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Timing parameters for the voting controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingConfig {
    /// Length of one sampling window
    pub window: Duration,
    /// How long a window-vote must persist to be confirmed
    pub stability: Duration,
    /// Time without a usable vote before the no-input notice appears
    pub no_input_timeout: Duration,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
            stability: Duration::from_millis(DEFAULT_STABILITY_MS),
            no_input_timeout: Duration::from_millis(DEFAULT_NO_INPUT_TIMEOUT_MS),
        }
    }
}

/// Controller state for one trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteState {
    /// Collecting samples, no candidate yet
    Sampling,
    /// A window-vote is waiting to prove stable
    Candidate {
        /// Proposed answer
        direction: Direction,
        /// Start of the window that first produced it
        since: Instant,
    },
    /// Nothing usable for longer than the timeout; still sampling
    NoInputNotice,
    /// Answer accepted; terminal for the trial
    Confirmed(Direction),
}

/// Window-voting state machine
#[derive(Debug, Clone)]
pub struct StabilityVoter {
    config: VotingConfig,
    state: VoteState,
    window_start: Instant,
    window_samples: Vec<Direction>,
    last_usable_vote: Instant,
    last_window_vote: DirectionSample,
}

impl StabilityVoter {
    /// Start a trial at `now`
    #[must_use]
    pub fn new(config: VotingConfig, now: Instant) -> Self {
        Self {
            config,
            state: VoteState::Sampling,
            window_start: now,
            window_samples: Vec::new(),
            last_usable_vote: now,
            last_window_vote: None,
        }
    }

    /// Restart for a new trial
    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(self.config, now);
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> VoteState {
        self.state
    }

    /// Most recent window-vote, for on-screen feedback
    #[must_use]
    pub fn last_window_vote(&self) -> DirectionSample {
        self.last_window_vote
    }

    /// Whether the no-input notice should be shown
    #[must_use]
    pub fn notice_active(&self) -> bool {
        self.state == VoteState::NoInputNotice
    }

    /// Confirmed answer, if any
    #[must_use]
    pub fn confirmed(&self) -> Option<Direction> {
        match self.state {
            VoteState::Confirmed(direction) => Some(direction),
            _ => None,
        }
    }

    /// Feed one frame's sample. Closes the current window once it has run
    /// for the configured length and returns the answer when confirmed.
    pub fn tick(&mut self, now: Instant, sample: DirectionSample) -> Option<Direction> {
        if let Some(direction) = self.confirmed() {
            return Some(direction);
        }

        if let Some(direction) = sample {
            self.window_samples.push(direction);
        }

        if now.saturating_duration_since(self.window_start) >= self.config.window {
            let vote = majority(self.window_samples.drain(..));
            let start = self.window_start;
            self.window_start = now;
            self.submit_window_vote(start, now, vote);
        }

        self.confirmed()
    }

    /// Apply one closed window's vote. `start` and `end` bound the window.
    pub fn submit_window_vote(&mut self, start: Instant, end: Instant, vote: DirectionSample) -> Option<Direction> {
        if let Some(direction) = self.confirmed() {
            return Some(direction);
        }
        self.last_window_vote = vote;

        let Some(direction) = vote else {
            let idle = end.saturating_duration_since(self.last_usable_vote);
            if idle > self.config.no_input_timeout && self.state != VoteState::NoInputNotice {
                warn!("No input detected for {:.1}s", idle.as_secs_f64());
                self.state = VoteState::NoInputNotice;
            }
            return None;
        };

        self.last_usable_vote = end;
        let since = match self.state {
            VoteState::Candidate { direction: current, since } if current == direction => since,
            _ => {
                debug!("New candidate direction: {}", direction);
                start
            }
        };

        if end.saturating_duration_since(since) >= self.config.stability {
            info!("Direction {} confirmed", direction);
            self.state = VoteState::Confirmed(direction);
        } else {
            self.state = VoteState::Candidate { direction, since };
        }
        self.confirmed()
    }

    /// Manual keyboard answer; bypasses voting
    pub fn override_with(&mut self, direction: Direction) -> Direction {
        info!("Manual override: {}", direction);
        self.state = VoteState::Confirmed(direction);
        direction
    }
}
