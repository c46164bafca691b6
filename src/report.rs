//! Session summary text, comparison with the previous run, and the saved
//! YAML report.

use crate::{
    session::SessionContext,
    trial::{Eye, EyeResult},
    Result,
};
use chrono::{DateTime, Local};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// File holding the counts from the subject's last run
pub const PREVIOUS_RESULTS_FILE: &str = "previous_results.yaml";

fn join_or_none(labels: &[&str]) -> String {
    if labels.is_empty() {
        "None".to_string()
    } else {
        labels.join(", ")
    }
}

fn for_eye(results: &[EyeResult], eye: Eye) -> Option<&EyeResult> {
    results.iter().find(|result| result.eye == eye)
}

/// Plain-text summary handed to the recommendation service
#[must_use]
pub fn summary_text(results: &[EyeResult]) -> String {
    let mut text = String::new();
    for eye in Eye::ORDER {
        let (correct, incorrect) = for_eye(results, eye)
            .map(|result| (result.correct(), result.incorrect()))
            .unwrap_or_default();
        if !text.is_empty() {
            text.push('\n');
        }
        let _ = write!(
            text,
            "{eye} Eye - Correct Levels: {}\n{eye} Eye - Incorrect Levels: {}",
            join_or_none(&correct),
            join_or_none(&incorrect)
        );
    }
    text
}

/// Correct and incorrect level counts for one eye
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EyeCounts {
    /// Levels answered correctly
    pub correct: usize,
    /// Levels answered incorrectly
    pub incorrect: usize,
}

impl From<&EyeResult> for EyeCounts {
    fn from(result: &EyeResult) -> Self {
        Self {
            correct: result.correct().len(),
            incorrect: result.incorrect().len(),
        }
    }
}

/// Counts for both eyes, as stored between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultCounts {
    /// Left eye
    pub left: EyeCounts,
    /// Right eye
    pub right: EyeCounts,
}

impl ResultCounts {
    /// Counts for a finished session
    #[must_use]
    pub fn from_results(results: &[EyeResult]) -> Self {
        let counts = |eye| for_eye(results, eye).map(EyeCounts::from).unwrap_or_default();
        Self {
            left: counts(Eye::Left),
            right: counts(Eye::Right),
        }
    }

    fn eye(&self, eye: Eye) -> EyeCounts {
        match eye {
            Eye::Left => self.left,
            Eye::Right => self.right,
        }
    }
}

fn signed(value: i64) -> String {
    if value >= 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

#[allow(clippy::cast_possible_wrap)]
fn delta(current: usize, previous: usize) -> i64 {
    current as i64 - previous as i64
}

/// Current counts against the subject's previous run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    /// This session
    pub current: ResultCounts,
    /// Last stored session, zeros if none
    pub previous: ResultCounts,
}

impl Comparison {
    /// Signed change in (correct, incorrect) counts for one eye
    #[must_use]
    pub fn change(&self, eye: Eye) -> (i64, i64) {
        let current = self.current.eye(eye);
        let previous = self.previous.eye(eye);
        (
            delta(current.correct, previous.correct),
            delta(current.incorrect, previous.incorrect),
        )
    }

    /// Human readable comparison report
    #[must_use]
    pub fn text(&self) -> String {
        let mut text = String::from("--- Test Comparison Report ---\n\n");
        for eye in Eye::ORDER {
            let current = self.current.eye(eye);
            let previous = self.previous.eye(eye);
            let (d_correct, d_incorrect) = self.change(eye);
            let _ = write!(
                text,
                "{eye} Eye:\n  Current - Correct: {}, Incorrect: {}\n  Previous - Correct: {}, Incorrect: {}\n  \
                 Change - Correct: {}, Incorrect: {}\n\n",
                current.correct,
                current.incorrect,
                previous.correct,
                previous.incorrect,
                signed(d_correct),
                signed(d_incorrect)
            );
        }
        text.push_str("Overall, the improvements/deteriorations are as listed above.");
        text
    }
}

/// Compare with the counts stored in `subject_dir` and replace them with the
/// current ones. An unreadable previous file counts as no previous run.
///
/// # Errors
///
/// Returns an error if the current counts cannot be written
pub fn compare_with_previous(subject_dir: &Path, results: &[EyeResult]) -> Result<Comparison> {
    let path = subject_dir.join(PREVIOUS_RESULTS_FILE);
    let previous = if path.exists() {
        match std::fs::read_to_string(&path)
            .map_err(crate::Error::from)
            .and_then(|contents| serde_yaml::from_str::<ResultCounts>(&contents).map_err(crate::Error::from))
        {
            Ok(counts) => counts,
            Err(e) => {
                error!("Error reading previous results: {e}");
                ResultCounts::default()
            }
        }
    } else {
        ResultCounts::default()
    };

    let current = ResultCounts::from_results(results);
    std::fs::create_dir_all(subject_dir)?;
    std::fs::write(&path, serde_yaml::to_string(&current)?)?;

    Ok(Comparison { current, previous })
}

/// Level labels for one eye in the saved report
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EyeReport {
    /// Levels answered correctly
    pub correct: Vec<String>,
    /// Levels answered incorrectly
    pub incorrect: Vec<String>,
}

/// Persisted record of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Subject given name
    pub name: String,
    /// Subject family name
    pub surname: String,
    /// Subject age
    pub age: u32,
    /// Subject national identity number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    /// Subject phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Subject email address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Local time the report was written
    pub timestamp: String,
    /// Distance used for optotype sizing
    pub distance_m: f64,
    /// Camera used
    pub camera_id: String,
    /// Left eye outcome
    pub left_eye: EyeReport,
    /// Right eye outcome
    pub right_eye: EyeReport,
    /// Recommendation text
    pub recommendation: String,
    /// Comparison with the previous run
    pub comparison: String,
}

impl SessionReport {
    /// Assemble a report
    #[must_use]
    pub fn new(
        context: &SessionContext,
        results: &[EyeResult],
        recommendation: &str,
        comparison: &Comparison,
        timestamp: DateTime<Local>,
    ) -> Self {
        let eye_report = |eye| {
            for_eye(results, eye)
                .map(|result| EyeReport {
                    correct: result.correct().into_iter().map(str::to_string).collect(),
                    incorrect: result.incorrect().into_iter().map(str::to_string).collect(),
                })
                .unwrap_or_default()
        };
        Self {
            name: context.subject.name.clone(),
            surname: context.subject.surname.clone(),
            age: context.subject.age,
            national_id: context.subject.national_id.clone(),
            phone: context.subject.phone.clone(),
            email: context.subject.email.clone(),
            timestamp: timestamp.to_rfc3339(),
            distance_m: context.distance_m,
            camera_id: context.camera_id.clone(),
            left_eye: eye_report(Eye::Left),
            right_eye: eye_report(Eye::Right),
            recommendation: recommendation.to_string(),
            comparison: comparison.text(),
        }
    }

    /// Load a saved report
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }
}

/// Writes reports under `<results_dir>/<name>_<surname>/`
#[derive(Debug, Clone)]
pub struct ReportWriter {
    results_dir: PathBuf,
}

impl ReportWriter {
    /// Writer rooted at `results_dir`
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    /// Folder for the session's subject
    #[must_use]
    pub fn subject_dir(&self, context: &SessionContext) -> PathBuf {
        self.results_dir.join(context.subject.folder_name())
    }

    /// Compare with the previous run and save the report, returning its path
    ///
    /// # Errors
    ///
    /// Returns an error if the subject folder or report cannot be written
    pub fn write(
        &self,
        context: &SessionContext,
        results: &[EyeResult],
        recommendation: &str,
        timestamp: DateTime<Local>,
    ) -> Result<PathBuf> {
        let subject_dir = self.subject_dir(context);
        std::fs::create_dir_all(&subject_dir)?;

        let comparison = compare_with_previous(&subject_dir, results)?;
        let report = SessionReport::new(context, results, recommendation, &comparison, timestamp);

        let path = subject_dir.join(format!("vision_test_{}.yaml", timestamp.format("%Y%m%d_%H%M%S")));
        std::fs::write(&path, serde_yaml::to_string(&report)?)?;
        info!("Results saved to {}", path.display());
        Ok(path)
    }
}
