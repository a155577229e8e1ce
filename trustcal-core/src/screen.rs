use crate::questionnaire::{Questionnaire, QuestionnaireForm};
use crate::recommendation::Recommendation;
use crate::stimulus::Grid;
use crate::trial::TrialType;
use std::path::Path;

/// Every participant-facing control. Screens expose a subset of these with
/// an enabled flag instead of being searched for widgets at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Start,
    ShowZoom,
    ShowFull,
    Keep,
    Discard,
    BeginMain,
    Submit,
    Close,
}

impl Control {
    pub fn label(&self) -> &'static str {
        match self {
            Control::Start => "Start Practice",
            Control::ShowZoom => "Show Zoom",
            Control::ShowFull => "Show Full",
            Control::Keep => "Keep",
            Control::Discard => "Discard",
            Control::BeginMain => "Start Main Trials",
            Control::Submit => "Continue",
            Control::Close => "Close",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlHandle {
    pub control: Control,
    pub enabled: bool,
}

impl ControlHandle {
    pub fn new(control: Control, enabled: bool) -> Self {
        Self { control, enabled }
    }
}

/// What a trial screen shows.
#[derive(Debug, Clone, Copy)]
pub struct TrialView<'a> {
    pub trial_type: TrialType,
    /// 1-based position in the current block.
    pub number: usize,
    pub total: usize,
    pub image: &'a Grid,
    pub zoomed: bool,
    pub recommendation: Recommendation,
}

/// Read-only snapshot of what the presentation layer should draw.
#[derive(Debug, Clone, Copy)]
pub enum Screen<'a> {
    Welcome {
        prompt: &'a str,
        practice_trials: usize,
        main_trials: usize,
    },
    Questionnaire {
        questionnaire: &'a Questionnaire,
        form: &'a QuestionnaireForm,
    },
    Scanning {
        trial_type: TrialType,
    },
    Trial(TrialView<'a>),
    Transition,
    End {
        results_path: &'a Path,
    },
}
