//! Per-eye trial sequencing and scoring.

use crate::{acuity::AcuityTable, direction::Direction, Result};
use log::info;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Eye under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eye {
    /// Left eye
    Left,
    /// Right eye
    Right,
}

impl Eye {
    /// Test order within one session
    pub const ORDER: [Eye; 2] = [Eye::Left, Eye::Right];

    /// Capitalized name for prompts and summaries
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Eye::Left => "Left",
            Eye::Right => "Right",
        }
    }
}

impl fmt::Display for Eye {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One optotype presentation awaiting an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    /// Eye being tested
    pub eye: Eye,
    /// Snellen label of the level
    pub level_label: String,
    /// Optotype size at the current distance
    pub size_px: u32,
    /// Direction the optotype points
    pub target: Direction,
    /// Zero-based position in the level sequence
    pub index: usize,
    /// Number of levels in the sequence
    pub total: usize,
}

/// Scored answer for one level
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Snellen label of the level
    pub level_label: String,
    /// Direction shown
    pub expected: Direction,
    /// Direction confirmed by the subject
    pub observed: Direction,
    /// Whether they match
    pub correct: bool,
}

/// All trials for one eye
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeResult {
    /// Eye tested
    pub eye: Eye,
    /// Trials in presentation order
    pub trials: Vec<TrialResult>,
}

impl EyeResult {
    fn new(eye: Eye) -> Self {
        Self { eye, trials: Vec::new() }
    }

    /// Labels answered correctly, in presentation order
    #[must_use]
    pub fn correct(&self) -> Vec<&str> {
        self.labels(true)
    }

    /// Labels answered incorrectly, in presentation order
    #[must_use]
    pub fn incorrect(&self) -> Vec<&str> {
        self.labels(false)
    }

    fn labels(&self, correct: bool) -> Vec<&str> {
        self.trials
            .iter()
            .filter(|trial| trial.correct == correct)
            .map(|trial| trial.level_label.as_str())
            .collect()
    }
}

/// Runs every level of the table for one eye
#[derive(Debug)]
pub struct TrialController<R: Rng> {
    rng: R,
}

impl<R: Rng> TrialController<R> {
    /// Controller drawing target directions from `rng`
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Uniformly random target direction
    pub fn draw_target(&mut self) -> Direction {
        Direction::ALL.choose(&mut self.rng).copied().unwrap_or(Direction::Right)
    }

    /// Present every level, coarsest first, and score the confirmed answers.
    /// All levels are always presented; there is no early stop.
    ///
    /// # Errors
    ///
    /// Propagates errors from `answer`, such as a quit request or a lost camera
    pub fn run_eye<F>(&mut self, eye: Eye, table: &AcuityTable, mut answer: F) -> Result<EyeResult>
    where
        F: FnMut(&Trial) -> Result<Direction>,
    {
        info!("Starting test for the {} eye", eye);
        let mut result = EyeResult::new(eye);
        let total = table.len();

        for (index, level) in table.levels().iter().enumerate() {
            let trial = Trial {
                eye,
                level_label: level.label().to_string(),
                size_px: level.current_px(),
                target: self.draw_target(),
                index,
                total,
            };

            let observed = answer(&trial)?;
            let correct = observed == trial.target;
            info!(
                "{} eye, level {}: shown {}, answered {} ({})",
                eye,
                trial.level_label,
                trial.target,
                observed,
                if correct { "correct" } else { "incorrect" }
            );
            result.trials.push(TrialResult {
                level_label: trial.level_label,
                expected: trial.target,
                observed,
                correct,
            });
        }

        info!(
            "{} Eye - Correct: {} / Incorrect: {}",
            eye,
            result.correct().len(),
            result.incorrect().len()
        );
        Ok(result)
    }
}
