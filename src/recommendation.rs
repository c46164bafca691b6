//! Post-test recommendation text.
//!
//! An external text service may phrase a recommendation from the session
//! summary. It is opaque to the core: any failure, or its own documented
//! fallback reply, is replaced by a local rule-based assessment.

use crate::{trial::EyeResult, Result};
use log::{info, warn};

/// Reply text the external service uses when it could not answer
pub const SERVICE_FALLBACK_MARKER: &str = "No recommendation available";

/// Assessment for a subject who missed one of the two coarsest levels
pub const GLAUCOMA_RISK: &str = "Possible risk of glaucoma. Recommend further ophthalmologic evaluation.";

/// Assessment when nothing stands out
pub const NO_ABNORMALITIES: &str = "No significant abnormalities detected.";

/// Levels whose failure suggests a gross field or acuity loss
const WARNING_LEVELS: [&str; 2] = ["10/200", "10/160"];

/// External free-text recommendation generator
pub trait RecommendationService {
    /// Recommendation for a plain-text session summary
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or fails
    fn recommend(&mut self, summary: &str) -> Result<String>;
}

/// Local rule-based assessment
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedAdvisor;

impl RuleBasedAdvisor {
    /// Assessment for the given per-eye results
    #[must_use]
    pub fn assess(&self, results: &[EyeResult]) -> &'static str {
        let missed_coarse = results
            .iter()
            .flat_map(EyeResult::incorrect)
            .any(|label| WARNING_LEVELS.contains(&label));
        if missed_coarse {
            GLAUCOMA_RISK
        } else {
            NO_ABNORMALITIES
        }
    }
}

/// Where the final recommendation text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationSource {
    /// External service reply
    Service,
    /// Local rule-based fallback
    RuleBased,
}

/// Final recommendation text and its origin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    /// Text shown and stored in the report
    pub text: String,
    /// Origin of the text
    pub source: RecommendationSource,
}

/// Ask `service` (if any) and fall back to the rule-based assessment when
/// it fails or answers with its fallback marker. Never fails.
pub fn recommend(
    service: Option<&mut dyn RecommendationService>,
    summary: &str,
    results: &[EyeResult],
) -> Recommendation {
    let fallback = RuleBasedAdvisor.assess(results);
    let Some(service) = service else {
        info!("No recommendation service configured; using rule-based assessment");
        return Recommendation {
            text: fallback.to_string(),
            source: RecommendationSource::RuleBased,
        };
    };

    match service.recommend(summary) {
        Ok(text) if !text.contains(SERVICE_FALLBACK_MARKER) && !text.trim().is_empty() => {
            info!("Recommendation received from service");
            Recommendation {
                text,
                source: RecommendationSource::Service,
            }
        }
        Ok(_) => {
            warn!("Recommendation service returned no recommendation; using rule-based assessment");
            Recommendation {
                text: fallback.to_string(),
                source: RecommendationSource::RuleBased,
            }
        }
        Err(e) => {
            warn!("Recommendation service failed: {e}; using rule-based assessment");
            Recommendation {
                text: fallback.to_string(),
                source: RecommendationSource::RuleBased,
            }
        }
    }
}
