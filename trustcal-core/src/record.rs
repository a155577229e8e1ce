use crate::trial::{DAMAGE_THRESHOLD, Response, Trial, TrialType};
use serde::{Serialize, Serializer};

/// Whether a response matches the true state of the board.
///
/// Salience is ignored here: a participant who follows a reversed
/// recommendation is scored as incorrect.
pub fn is_correct(percentage: u8, response: Response) -> bool {
    if percentage < DAMAGE_THRESHOLD {
        response == Response::Accept
    } else {
        response == Response::Reject
    }
}

/// One row of the response log. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRecord {
    pub trial_number: usize,
    pub trial_type: TrialType,
    pub percentage: u8,
    #[serde(serialize_with = "title_case_bool")]
    pub is_salient: bool,
    pub response: Response,
    #[serde(serialize_with = "title_case_bool")]
    pub is_correct: bool,
    #[serde(rename = "zoom_used", serialize_with = "title_case_bool")]
    pub detail_view_used: bool,
    pub session_id: String,
    pub timestamp: String,
}

impl ResponseRecord {
    pub fn new(
        trial: Trial,
        response: Response,
        detail_view_used: bool,
        trial_type: TrialType,
        trial_number: usize,
        session_id: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            trial_number,
            trial_type,
            percentage: trial.percentage,
            is_salient: trial.is_salient,
            response,
            is_correct: is_correct(trial.percentage, response),
            detail_view_used,
            session_id: session_id.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// One answered questionnaire item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionnaireResponse {
    pub questionnaire: String,
    pub item: String,
    pub answer: String,
    pub session_id: String,
    pub timestamp: String,
}

// Existing analysis sheets expect Python-style booleans.
fn title_case_bool<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "True" } else { "False" })
}
