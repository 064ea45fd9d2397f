//! Weighted risk scoring for release proposals.
//!
//! The score is a linear sum over category signals, each signal clamped to
//! `[0, 1]` before weighting and the total clamped again at the end. The
//! factor list names every category with a non-zero contribution, in a
//! fixed category order, so two identical inputs always produce identical
//! assessments.

#![deny(unsafe_code)]

use serde::{Deserialize, Serialize};

use relicta_core::{ActorKind, BumpKind, ChangeAnalysis, Proposal, TrustLevel};

/// Risk categories in their deterministic reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    /// Breaking API surface changes.
    ApiChange,
    /// Files and lines touched.
    BlastRadius,
    /// Security-relevant commits.
    SecurityImpact,
    /// How little the platform trusts the actor.
    ActorTrust,
    /// How unsure the proposer is.
    Confidence,
    /// Raw volume of features and fixes.
    ChangeVolume,
    /// How aggressive the requested bump is.
    BumpAggressiveness,
}

impl RiskCategory {
    /// All categories in reporting order.
    pub const ALL: [Self; 7] = [
        Self::ApiChange,
        Self::BlastRadius,
        Self::SecurityImpact,
        Self::ActorTrust,
        Self::Confidence,
        Self::ChangeVolume,
        Self::BumpAggressiveness,
    ];

    /// Stable snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ApiChange => "api_change",
            Self::BlastRadius => "blast_radius",
            Self::SecurityImpact => "security_impact",
            Self::ActorTrust => "actor_trust",
            Self::Confidence => "confidence",
            Self::ChangeVolume => "change_volume",
            Self::BumpAggressiveness => "bump_aggressiveness",
        }
    }
}

/// One category's contribution to the score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Category.
    pub category: RiskCategory,
    /// Weight applied to the signal.
    pub weight: f64,
    /// `weight × signal`, the amount added to the score.
    pub contribution: f64,
    /// Human-readable account of the signal.
    pub description: String,
}

/// The full assessment: score plus the contributing factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Total score in `[0, 1]`.
    pub score: f64,
    /// Non-zero factors in category order.
    pub factors: Vec<RiskFactor>,
}

/// Per-category weights. The defaults sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    /// Weight for `api_change`.
    pub api_change: f64,
    /// Weight for `blast_radius`.
    pub blast_radius: f64,
    /// Weight for `security_impact`.
    pub security_impact: f64,
    /// Weight for `actor_trust`.
    pub actor_trust: f64,
    /// Weight for `confidence`.
    pub confidence: f64,
    /// Weight for `change_volume`.
    pub change_volume: f64,
    /// Weight for `bump_aggressiveness`.
    pub bump_aggressiveness: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            api_change: 0.25,
            blast_radius: 0.15,
            security_impact: 0.05,
            actor_trust: 0.20,
            confidence: 0.10,
            change_volume: 0.10,
            bump_aggressiveness: 0.15,
        }
    }
}

impl RiskWeights {
    const fn weight_for(&self, category: RiskCategory) -> f64 {
        match category {
            RiskCategory::ApiChange => self.api_change,
            RiskCategory::BlastRadius => self.blast_radius,
            RiskCategory::SecurityImpact => self.security_impact,
            RiskCategory::ActorTrust => self.actor_trust,
            RiskCategory::Confidence => self.confidence,
            RiskCategory::ChangeVolume => self.change_volume,
            RiskCategory::BumpAggressiveness => self.bump_aggressiveness,
        }
    }
}

/// Normalisation caps for the blast-radius log scale.
const BLAST_FILES_CAP: f64 = 500.0;
const BLAST_LINES_CAP: f64 = 10_000.0;
/// Breaking changes saturating the api_change signal.
const API_BREAKING_CAP: f64 = 3.0;
/// Security commits saturating the security signal.
const SECURITY_CAP: f64 = 2.0;
/// Feature + fix commits saturating the volume signal.
const VOLUME_CAP: f64 = 10.0;

/// The risk calculator.
#[derive(Debug, Clone, Default)]
pub struct Calculator {
    weights: RiskWeights,
}

impl Calculator {
    /// Calculator with the default weights.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculator with custom weights.
    #[must_use]
    pub const fn with_weights(weights: RiskWeights) -> Self {
        Self { weights }
    }

    /// Score a proposal. A missing analysis reads as all-zero change data.
    #[must_use]
    pub fn assess(&self, proposal: &Proposal, analysis: Option<&ChangeAnalysis>) -> RiskAssessment {
        let empty = ChangeAnalysis::default();
        let analysis = analysis.unwrap_or(&empty);

        let mut factors = Vec::new();
        let mut score = 0.0;
        for category in RiskCategory::ALL {
            let (signal, description) = signal(category, proposal, analysis);
            let signal = signal.clamp(0.0, 1.0);
            let weight = self.weights.weight_for(category);
            let contribution = weight * signal;
            if contribution > 0.0 {
                factors.push(RiskFactor { category, weight, contribution, description });
                score += contribution;
            }
        }

        RiskAssessment { score: score.clamp(0.0, 1.0), factors }
    }

}

fn signal(
    category: RiskCategory,
    proposal: &Proposal,
    analysis: &ChangeAnalysis,
) -> (f64, String) {
    match category {
        RiskCategory::ApiChange => {
            let breaking = f64::from(analysis.breaking_total());
            (breaking / API_BREAKING_CAP, format!("{breaking} breaking change(s)"))
        }
        RiskCategory::BlastRadius => {
            let files = analysis.files_changed();
            let lines = analysis.lines_changed();
            let signal = blast_signal(files, lines);
            (signal, format!("{files} file(s), {lines} line(s) changed"))
        }
        RiskCategory::SecurityImpact => {
            let security = f64::from(analysis.security);
            (security / SECURITY_CAP, format!("{security} security-relevant commit(s)"))
        }
        RiskCategory::ActorTrust => {
            let signal = actor_distrust(proposal.actor.kind, proposal.actor.trust);
            (
                signal,
                format!(
                    "{} actor with {} trust",
                    proposal.actor.kind.as_str(),
                    proposal.actor.trust.as_str()
                ),
            )
        }
        RiskCategory::Confidence => {
            let signal = 1.0 - proposal.intent.confidence;
            (signal, format!("proposer confidence {:.2}", proposal.intent.confidence))
        }
        RiskCategory::ChangeVolume => {
            let volume = f64::from(analysis.features + analysis.fixes);
            (volume / VOLUME_CAP, format!("{volume} feature/fix commit(s)"))
        }
        RiskCategory::BumpAggressiveness => {
            let signal = bump_signal(proposal.intent.suggested_bump);
            (signal, format!("suggested bump: {}", proposal.intent.suggested_bump.as_str()))
        }
    }
}

/// Log-scaled blast radius: files and lines normalised independently
/// against their caps, then averaged.
#[allow(clippy::cast_precision_loss)]
fn blast_signal(files: u64, lines: u64) -> f64 {
    let files_norm = (1.0 + files as f64).ln() / (1.0 + BLAST_FILES_CAP).ln();
    let lines_norm = (1.0 + lines as f64).ln() / (1.0 + BLAST_LINES_CAP).ln();
    (files_norm.min(1.0) + lines_norm.min(1.0)) / 2.0
}

/// Inverse-trust ladder. For any trust level: agent > ci > human; within a
/// kind, more trust means less risk. A fully-trusted human scores zero.
const fn actor_distrust(kind: ActorKind, trust: TrustLevel) -> f64 {
    match (kind, trust) {
        (ActorKind::Agent, TrustLevel::None) => 1.0,
        (ActorKind::Agent, TrustLevel::Basic) => 0.9,
        (ActorKind::Agent, TrustLevel::Full) => 0.7,
        (ActorKind::Ci, TrustLevel::None) => 0.7,
        (ActorKind::Ci, TrustLevel::Basic) => 0.5,
        (ActorKind::Ci, TrustLevel::Full) => 0.3,
        (ActorKind::System, TrustLevel::None) => 0.5,
        (ActorKind::System, TrustLevel::Basic) => 0.3,
        (ActorKind::System, TrustLevel::Full) => 0.1,
        (ActorKind::Human, TrustLevel::None) => 0.6,
        (ActorKind::Human, TrustLevel::Basic) => 0.3,
        (ActorKind::Human, TrustLevel::Full) => 0.0,
    }
}

const fn bump_signal(bump: BumpKind) -> f64 {
    match bump {
        BumpKind::Major => 1.0,
        BumpKind::Minor => 0.5,
        BumpKind::Patch => 0.2,
        BumpKind::Prerelease => 0.1,
        BumpKind::None => 0.0,
    }
}
