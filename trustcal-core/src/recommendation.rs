use crate::trial::{DAMAGE_THRESHOLD, Trial};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the robot suggests doing with the scanned board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    Keep,
    Discard,
}

impl Recommendation {
    pub fn inverted(self) -> Self {
        match self {
            Recommendation::Keep => Recommendation::Discard,
            Recommendation::Discard => Recommendation::Keep,
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Keep => f.write_str("Keep"),
            Recommendation::Discard => f.write_str("Discard"),
        }
    }
}

/// Keep iff the board is below the damage threshold; salient trials get the
/// opposite advice.
pub fn recommend(percentage: u8, is_salient: bool) -> Recommendation {
    let naive = if percentage < DAMAGE_THRESHOLD {
        Recommendation::Keep
    } else {
        Recommendation::Discard
    };
    if is_salient { naive.inverted() } else { naive }
}

impl Trial {
    pub fn recommendation(&self) -> Recommendation {
        recommend(self.percentage, self.is_salient)
    }
}
