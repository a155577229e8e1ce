/// Session phases in presentation order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    /// Consent and pre-task questionnaires.
    PreTask,
    Practice,
    Transition,
    Main,
    /// Post-task questionnaires and feedback.
    PostTask,
    End,
}

impl SessionPhase {
    pub fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Welcome => PreTask,
            PreTask => Practice,
            Practice => Transition,
            Transition => Main,
            Main => PostTask,
            PostTask => End,
            End => return None,
        })
    }

    pub fn runs_trials(&self) -> bool {
        matches!(self, SessionPhase::Practice | SessionPhase::Main)
    }

    pub fn is_questionnaire(&self) -> bool {
        matches!(self, SessionPhase::PreTask | SessionPhase::PostTask)
    }
}
