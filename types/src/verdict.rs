//! Aggregated verdicts and their attestations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Score;

/// Final scores at or above this ship.
pub const SHIP_THRESHOLD: u8 = 75;
/// Final scores at or above this (and below [`SHIP_THRESHOLD`]) iterate.
pub const ITERATE_THRESHOLD: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Ship,
    Iterate,
    Reject,
}

impl Decision {
    #[must_use]
    pub const fn from_score(score: Score) -> Self {
        let value = score.get();
        if value >= SHIP_THRESHOLD {
            Decision::Ship
        } else if value >= ITERATE_THRESHOLD {
            Decision::Iterate
        } else {
            Decision::Reject
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Decision::Ship => "SHIP",
            Decision::Iterate => "ITERATE",
            Decision::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The jury's combined verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalVerdict {
    pub final_score: Score,
    pub decision: Decision,
    pub summary: String,
    pub next_steps: [String; 4],
}

/// Signature binding a verdict hash to the attestor's address.
///
/// All byte fields are `0x`-prefixed lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub attestor: String,
    pub message_hash: String,
    pub signature: String,
}
