pub mod phase;
pub mod questionnaire;
pub mod recommendation;
pub mod record;
pub mod screen;
pub mod stimulus;
pub mod trial;

pub use phase::SessionPhase;
pub use questionnaire::{ItemKind, QuestionItem, Questionnaire, QuestionnaireForm};
pub use recommendation::{Recommendation, recommend};
pub use record::{QuestionnaireResponse, ResponseRecord, is_correct};
pub use screen::{Control, ControlHandle, Screen, TrialView};
pub use stimulus::{Cell, DamagePattern, FocusRegion, Grid};
pub use trial::{DAMAGE_THRESHOLD, Response, Trial, TrialState, TrialType};
