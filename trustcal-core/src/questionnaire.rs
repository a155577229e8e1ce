use serde::Deserialize;
use std::collections::BTreeMap;

/// A block of items shown on one screen, e.g. consent or a post-task trust
/// scale. Loaded from the session configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Questionnaire {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub items: Vec<QuestionItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionItem {
    pub key: String,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: ItemKind,
    #[serde(default = "required_by_default")]
    pub required: bool,
}

fn required_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Likert { min: i32, max: i32 },
    Choice { options: Vec<String> },
    FreeText,
}

impl ItemKind {
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ItemKind::Likert { min, max } => value
                .parse::<i32>()
                .is_ok_and(|v| (*min..=*max).contains(&v)),
            ItemKind::Choice { options } => options.iter().any(|o| o == value),
            ItemKind::FreeText => !value.trim().is_empty(),
        }
    }

    /// Moves a scale or choice answer by `delta` steps, clamped to the ends.
    /// Unanswered items start from the first option. Free text has no steps.
    pub fn step(&self, current: Option<&str>, delta: i32) -> Option<String> {
        match self {
            ItemKind::Likert { min, max } => {
                let next = match current.and_then(|c| c.parse::<i32>().ok()) {
                    Some(v) => (v + delta).clamp(*min, *max),
                    None => *min,
                };
                Some(next.to_string())
            }
            ItemKind::Choice { options } if !options.is_empty() => {
                let next = match current.and_then(|c| options.iter().position(|o| o == c)) {
                    Some(i) => (i as i64 + i64::from(delta)).clamp(0, options.len() as i64 - 1),
                    None => 0,
                };
                Some(options[next as usize].clone())
            }
            _ => None,
        }
    }
}

impl Questionnaire {
    pub fn item(&self, key: &str) -> Option<&QuestionItem> {
        self.items.iter().find(|i| i.key == key)
    }
}

/// Answers collected for one questionnaire screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionnaireForm {
    answers: BTreeMap<String, String>,
}

impl QuestionnaireForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an answer if the item exists and the value is valid for it.
    /// An empty value clears the answer.
    pub fn set(&mut self, questionnaire: &Questionnaire, key: &str, value: &str) -> bool {
        let Some(item) = questionnaire.item(key) else {
            return false;
        };
        if value.is_empty() {
            return self.answers.remove(key).is_some();
        }
        if !item.kind.accepts(value) {
            return false;
        }
        self.answers.insert(key.to_string(), value.to_string());
        true
    }

    pub fn answer(&self, key: &str) -> Option<&str> {
        self.answers.get(key).map(String::as_str)
    }

    /// True once every required item has an answer.
    pub fn is_complete(&self, questionnaire: &Questionnaire) -> bool {
        questionnaire
            .items
            .iter()
            .filter(|i| i.required)
            .all(|i| self.answers.contains_key(&i.key))
    }

    /// Answers in questionnaire item order.
    pub fn answers<'a>(
        &'a self,
        questionnaire: &'a Questionnaire,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        questionnaire
            .items
            .iter()
            .filter_map(|i| self.answer(&i.key).map(|a| (i.key.as_str(), a)))
    }
}
