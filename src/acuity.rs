//! Snellen acuity levels and the fixed clinical level table.

use crate::{
    constants::{MIN_BASELINE_PX, MIN_VISIBLE_PX},
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Clinical level labels, coarsest to finest
pub const CLINICAL_LEVELS: [&str; 14] = [
    "10/200", "10/160", "10/125", "10/100", "10/80", "10/70", "10/60", "10/50", "10/40", "10/30", "10/25", "10/20",
    "10/15", "10/10",
];

/// Parsed "N/D" Snellen fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnellenFraction {
    /// Test distance numerator
    pub numerator: u32,
    /// Distance at which a normal eye reads the same row
    pub denominator: u32,
}

impl SnellenFraction {
    /// Size multiplier relative to the finest (N/N) optotype
    #[must_use]
    pub fn size_ratio(self) -> f64 {
        f64::from(self.denominator) / f64::from(self.numerator)
    }
}

impl FromStr for SnellenFraction {
    type Err = Error;

    fn from_str(label: &str) -> Result<Self> {
        let (numerator, denominator) = label
            .split_once('/')
            .ok_or_else(|| Error::InvalidInput(format!("Snellen label '{label}' is not of the form N/D")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or_else(|| Error::InvalidInput(format!("Snellen label '{label}' has an invalid term '{part}'")))
        };
        Ok(Self {
            numerator: parse(numerator)?,
            denominator: parse(denominator)?,
        })
    }
}

/// One Snellen test row with its optotype sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcuityLevel {
    label: String,
    fraction: SnellenFraction,
    baseline_px: u32,
    current_px: u32,
}

impl AcuityLevel {
    /// Create a level from its "N/D" label; sizes start at the legible floor
    /// until a baseline is computed.
    pub fn new(label: &str) -> Result<Self> {
        Ok(Self {
            label: label.to_string(),
            fraction: label.parse()?,
            baseline_px: MIN_BASELINE_PX,
            current_px: MIN_BASELINE_PX,
        })
    }

    /// Snellen label, e.g. "10/40"
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Parsed fraction
    #[must_use]
    pub fn fraction(&self) -> SnellenFraction {
        self.fraction
    }

    /// Optotype size at the reference distance
    #[must_use]
    pub fn baseline_px(&self) -> u32 {
        self.baseline_px
    }

    /// Optotype size at the last measured distance
    #[must_use]
    pub fn current_px(&self) -> u32 {
        self.current_px
    }

    pub(crate) fn set_baseline(&mut self, px: u32) {
        self.baseline_px = px.max(MIN_BASELINE_PX);
        self.current_px = self.baseline_px;
    }

    pub(crate) fn set_current(&mut self, px: u32) {
        self.current_px = px.max(MIN_VISIBLE_PX);
    }
}

/// Ordered acuity levels, coarsest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcuityTable {
    levels: Vec<AcuityLevel>,
}

impl AcuityTable {
    /// Build a table from labels, preserving their order
    pub fn from_labels<'a, I>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let levels = labels.into_iter().map(AcuityLevel::new).collect::<Result<Vec<_>>>()?;
        if levels.is_empty() {
            return Err(Error::InvalidInput("Acuity table must contain at least one level".to_string()));
        }
        Ok(Self { levels })
    }

    /// The fixed clinical table from 10/200 down to 10/10
    #[must_use]
    pub fn clinical() -> Self {
        Self {
            levels: CLINICAL_LEVELS
                .iter()
                .filter_map(|label| AcuityLevel::new(label).ok())
                .collect(),
        }
    }

    /// Levels in test order
    #[must_use]
    pub fn levels(&self) -> &[AcuityLevel] {
        &self.levels
    }

    pub(crate) fn levels_mut(&mut self) -> &mut [AcuityLevel] {
        &mut self.levels
    }

    /// Look up a level by label
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&AcuityLevel> {
        self.levels.iter().find(|level| level.label == label)
    }

    /// Number of levels
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether the table has no levels
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl Default for AcuityTable {
    fn default() -> Self {
        Self::clinical()
    }
}
