//! Weighted aggregation of the three jury scores.

use jury_types::{AgentEvaluation, Decision, FinalVerdict, Role, Score};

/// Weights in percent. Risk is inverted before weighting.
const FEASIBILITY_WEIGHT: u32 = 45;
const INNOVATION_WEIGHT: u32 = 35;
const RISK_WEIGHT: u32 = 20;

/// Below this, feasibility and innovation advice turns corrective.
const WEAK_DIMENSION: u8 = 60;
/// Above this, risk advice asks for safeguards.
const HIGH_RISK: u8 = 60;

/// Per-role scores feeding one verdict. A role with no evaluation scores 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JuryScores {
    pub feasibility: Score,
    pub innovation: Score,
    pub risk: Score,
}

impl JuryScores {
    #[must_use]
    pub fn from_evaluations(evaluations: &[AgentEvaluation]) -> Self {
        let score_of = |role: Role| {
            evaluations
                .iter()
                .find(|evaluation| evaluation.role == role)
                .map(|evaluation| evaluation.score)
                .unwrap_or_default()
        };
        Self {
            feasibility: score_of(Role::Feasibility),
            innovation: score_of(Role::Innovation),
            risk: score_of(Role::RiskEthics),
        }
    }

    /// `0.45·f + 0.35·i + 0.20·(100 − r)`, rounded half up.
    ///
    /// Computed in hundredths so the .5 boundary is exact.
    #[must_use]
    pub fn weighted(self) -> Score {
        let hundredths = FEASIBILITY_WEIGHT * u32::from(self.feasibility.get())
            + INNOVATION_WEIGHT * u32::from(self.innovation.get())
            + RISK_WEIGHT * u32::from(self.risk.inverted().get());
        let rounded = (hundredths + 50) / 100;
        Score::new(u8::try_from(rounded).unwrap_or(Score::MAX.get())).unwrap_or(Score::MAX)
    }
}

/// Combine the jury's evaluations into a verdict. Pure and deterministic.
#[must_use]
pub fn build_final_verdict(evaluations: &[AgentEvaluation]) -> FinalVerdict {
    verdict_for(JuryScores::from_evaluations(evaluations))
}

#[must_use]
pub fn verdict_for(scores: JuryScores) -> FinalVerdict {
    let final_score = scores.weighted();
    let decision = Decision::from_score(final_score);
    let JuryScores {
        feasibility,
        innovation,
        risk,
    } = scores;

    let summary = format!(
        "Feasibility {feasibility}, Innovation {innovation}, Risk {risk}. \
         Weighted final score {final_score}, decision: {decision}."
    );

    let next_steps = [
        if decision == Decision::Ship {
            "Build a small production pilot and track usage."
        } else {
            "Run one focused iteration on the weakest dimension first."
        },
        if feasibility.get() < WEAK_DIMENSION {
            "Reduce implementation complexity and tighten scope."
        } else {
            "Keep technical scope disciplined."
        },
        if innovation.get() < WEAK_DIMENSION {
            "Strengthen differentiation with a unique feature."
        } else {
            "Preserve the most differentiated element."
        },
        if risk.get() > HIGH_RISK {
            "Add explicit safeguards for abuse, privacy, and edge cases."
        } else {
            "Document responsible use and basic guardrails."
        },
    ]
    .map(str::to_string);

    FinalVerdict {
        final_score,
        decision,
        summary,
        next_steps,
    }
}
