use serde::{Deserialize, Serialize};
use std::fmt;

/// Damage percentage at or above which a board should be discarded.
pub const DAMAGE_THRESHOLD: u8 = 40;

/// A single judgment trial: how damaged the scanned board is and whether the
/// robot's recommendation is deliberately reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trial {
    pub percentage: u8,
    pub is_salient: bool,
}

impl Trial {
    pub const fn new(percentage: u8, is_salient: bool) -> Self {
        Self {
            percentage,
            is_salient,
        }
    }

    pub const fn regular(percentage: u8) -> Self {
        Self::new(percentage, false)
    }

    pub const fn salient(percentage: u8) -> Self {
        Self::new(percentage, true)
    }

    /// Percentage as a damage fraction in `[0, 1]`.
    pub fn damage_fraction(&self) -> f64 {
        f64::from(self.percentage) / 100.0
    }
}

/// Which block a trial belongs to. Serialized as the label written to the
/// response log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialType {
    Practice,
    Experimental,
}

impl TrialType {
    pub fn label(&self) -> &'static str {
        match self {
            TrialType::Practice => "Practice",
            TrialType::Experimental => "Experimental",
        }
    }
}

impl fmt::Display for TrialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Participant decision on a scanned board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Response {
    /// Keep the board.
    Accept,
    /// Discard the board.
    Reject,
}

/// Per-trial state machine. A trial leaves it when its response is
/// recorded.
///
/// `Present` and `DetailView` are both waiting on the participant; the
/// difference is only which view of the stimulus is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Scanning,
    Present,
    DetailView,
}

impl TrialState {
    pub fn awaits_response(&self) -> bool {
        matches!(self, TrialState::Present | TrialState::DetailView)
    }
}
