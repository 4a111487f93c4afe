//! Pairing of detected contours with workpiece templates
//!
//! Every detected contour is scored against every template outline. The best
//! template above [`SIMILARITY_THRESHOLD`] claims the contour, which then
//! leaves the candidate pool so no later template can reuse it.

use nalgebra::Vector2;
use shared::contour::{similarity_percent, Contour};
use tracing::{debug, info};

use crate::{WorkpieceError, WorkpieceTemplate};

/// Minimum similarity (percent, exclusive) for a template to claim a contour.
pub const SIMILARITY_THRESHOLD: f64 = 70.0;

/// Shape similarity metric, in percent.
pub trait ShapeScorer {
    fn similarity(&self, template: &WorkpieceTemplate, detected: &Contour) -> f64;
}

/// Hu-moment distance turned into a 0..=100 score.
#[derive(Debug, Clone, Copy, Default)]
pub struct HuMomentScorer;

impl ShapeScorer for HuMomentScorer {
    fn similarity(&self, template: &WorkpieceTemplate, detected: &Contour) -> f64 {
        similarity_percent(&template.outline, detected)
    }
}

/// A detected contour paired with the template it resembles.
#[derive(Debug, Clone)]
pub struct Match<'a> {
    pub template: &'a WorkpieceTemplate,
    pub detected: Contour,
    /// Score that won the contour
    pub similarity: f64,
    /// Detected centroid minus template centroid, in pixels
    pub centroid_delta: Vector2<f64>,
    /// Detected orientation minus template orientation, in `[-180, 180)`
    pub rotation_delta_deg: f64,
    /// Principal-axis orientation of the detected contour
    pub orientation_deg: f64,
}

/// Outcome of one matching pass.
#[derive(Debug, Clone, Default)]
pub struct MatchResult<'a> {
    pub matches: Vec<Match<'a>>,
    /// Contours no template claimed
    pub unmatched: Vec<Contour>,
    /// Contours consumed by `matches`, in match order
    pub matched_contours: Vec<Contour>,
}

impl<'a> MatchResult<'a> {
    /// Fail when nothing matched; partial results are otherwise acceptable.
    pub fn require_matches(self) -> Result<Self, WorkpieceError> {
        if self.matches.is_empty() {
            return Err(WorkpieceError::NoMatches {
                detected: self.unmatched.len(),
            });
        }
        Ok(self)
    }
}

pub struct ContourMatcher<S = HuMomentScorer> {
    scorer: S,
    threshold: f64,
}

impl Default for ContourMatcher<HuMomentScorer> {
    fn default() -> Self {
        Self::new(HuMomentScorer)
    }
}

impl<S: ShapeScorer> ContourMatcher<S> {
    pub fn new(scorer: S) -> Self {
        Self {
            scorer,
            threshold: SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Match `detected` contours against `templates`.
    ///
    /// `matches.len() + unmatched.len()` always equals the number of
    /// contours passed in.
    pub fn match_contours<'a>(
        &self,
        templates: &'a [WorkpieceTemplate],
        detected: Vec<Contour>,
    ) -> MatchResult<'a> {
        let mut result = MatchResult::default();

        for (index, contour) in detected.into_iter().enumerate() {
            let mut best: Option<(&'a WorkpieceTemplate, f64)> = None;
            for template in templates {
                let score = self.scorer.similarity(template, &contour);
                debug!(
                    "Contour {index} vs template {}: similarity {score:.1}%",
                    template.id
                );
                if score <= self.threshold {
                    continue;
                }
                // Strict comparison keeps the first-seen template on ties
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((template, score));
                }
            }

            match best {
                Some((template, similarity)) => {
                    let m = Self::build_match(template, contour, similarity);
                    info!(
                        "Contour {index} matched template {} ({similarity:.1}%, {:.2} deg)",
                        template.id, m.rotation_delta_deg
                    );
                    result.matched_contours.push(m.detected.clone());
                    result.matches.push(m);
                }
                None => {
                    debug!("Contour {index} left unmatched");
                    result.unmatched.push(contour);
                }
            }
        }

        result
    }

    fn build_match(template: &WorkpieceTemplate, detected: Contour, similarity: f64) -> Match<'_> {
        let template_orientation = template.outline.orientation_deg();
        let orientation_deg = detected.orientation_deg();
        let centroid_delta = detected.centroid() - template.outline.centroid();
        Match {
            template,
            detected,
            similarity,
            centroid_delta,
            rotation_delta_deg: cell_math::normalize_angle_deg(
                orientation_deg - template_orientation,
            ),
            orientation_deg,
        }
    }
}
