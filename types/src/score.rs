//! Bounded 0-100 scores.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An integer score in `[0, 100]`.
///
/// Also fits the 8-bit score fields of the on-chain verdict store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("score {0} is outside 0..=100")]
pub struct ScoreRangeError(pub u8);

impl Score {
    pub const MIN: Score = Score(0);
    pub const MAX: Score = Score(100);

    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value <= 100 { Some(Self(value)) } else { None }
    }

    /// Round to the nearest integer (halves round up) and clamp into `[0, 100]`.
    ///
    /// Non-finite input maps to 0.
    #[must_use]
    pub fn clamp(value: f64) -> Self {
        if !value.is_finite() {
            return Self::MIN;
        }
        let rounded = value.round().clamp(0.0, 100.0);
        Self(rounded as u8)
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// `100 - self`: turns a danger score into a safety score.
    #[must_use]
    pub const fn inverted(self) -> Self {
        Self(100 - self.0)
    }
}

impl TryFrom<u8> for Score {
    type Error = ScoreRangeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ScoreRangeError(value))
    }
}

impl From<Score> for u8 {
    fn from(value: Score) -> Self {
        value.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
