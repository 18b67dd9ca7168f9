//! Jury roles and the per-role assessment they produce.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Score;

/// One seat on the jury.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Feasibility Agent")]
    Feasibility,
    #[serde(rename = "Innovation Agent")]
    Innovation,
    #[serde(rename = "Risk & Ethics Agent")]
    RiskEthics,
}

impl Role {
    /// Evaluation order used by the pipeline.
    pub const ALL: [Role; 3] = [Role::Feasibility, Role::Innovation, Role::RiskEthics];

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Role::Feasibility => "Feasibility Agent",
            Role::Innovation => "Innovation Agent",
            Role::RiskEthics => "Risk & Ethics Agent",
        }
    }

    /// What the agent in this seat is asked to look at.
    #[must_use]
    pub const fn focus(self) -> &'static str {
        match self {
            Role::Feasibility => {
                "Assess implementation realism, scope for a small team, and delivery speed."
            }
            Role::Innovation => {
                "Assess novelty, market differentiation, and user value uniqueness."
            }
            Role::RiskEthics => {
                "Assess legal, misuse, safety, fairness, and ethical concerns. Higher score means higher risk."
            }
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Sub-dimension scores an agent may report alongside its headline score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub primary: Score,
    pub secondary: Score,
    pub tertiary: Score,
}

impl ScoreBreakdown {
    #[must_use]
    pub const fn uniform(score: Score) -> Self {
        Self {
            primary: score,
            secondary: score,
            tertiary: score,
        }
    }
}

/// A normalized assessment from one jury role.
///
/// Produced only by the response validator, which guarantees the list bounds
/// and a non-empty rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEvaluation {
    pub role: Role,
    pub score: Score,
    pub confidence: Score,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_breakdown: Option<ScoreBreakdown>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub rationale: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub uncertainty_flags: Vec<String>,
}
