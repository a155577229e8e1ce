use crate::error::{ExperimentError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use trustcal_core::{ItemKind, Questionnaire, Trial};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub practice_trials: Vec<Trial>,
    pub main: MainTrialConfig,
    pub stimulus: StimulusConfig,
    /// Simulated scan duration before each trial is shown.
    pub scan_delay_ms: u64,
    pub output: OutputConfig,
    /// Consent and pre-task questionnaires, shown in order after the welcome.
    pub pre_task: Vec<Questionnaire>,
    /// Post-task questionnaires, shown in order after the main trials.
    pub post_task: Vec<Questionnaire>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MainTrialConfig {
    pub salient: Vec<SalientSlot>,
    /// Inclusive percentage range for regular trials.
    pub regular_range: (u8, u8),
    pub regular_count: usize,
}

/// A fixed-percentage salient trial and the half-open index window its
/// insertion position is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SalientSlot {
    pub percentage: u8,
    pub window: (usize, usize),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    pub width: usize,
    pub height: usize,
    pub focus_size: usize,
    pub background_damage_rate: f64,
    pub border_thickness: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            practice_trials: vec![
                Trial::regular(25),
                Trial::regular(35),
                Trial::regular(45),
                Trial::regular(50),
                Trial::regular(55),
            ],
            main: MainTrialConfig::default(),
            stimulus: StimulusConfig::default(),
            scan_delay_ms: 1000,
            output: OutputConfig::default(),
            pre_task: Vec::new(),
            post_task: Vec::new(),
        }
    }
}

impl Default for MainTrialConfig {
    fn default() -> Self {
        Self {
            salient: vec![
                SalientSlot {
                    percentage: 25,
                    window: (6, 9),
                },
                SalientSlot {
                    percentage: 35,
                    window: (14, 17),
                },
                SalientSlot {
                    percentage: 45,
                    window: (22, 25),
                },
                SalientSlot {
                    percentage: 55,
                    window: (30, 33),
                },
            ],
            regular_range: (20, 60),
            regular_count: 32,
        }
    }
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            width: 200,
            height: 400,
            focus_size: 20,
            background_damage_rate: 0.001,
            border_thickness: 2,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            file_prefix: "pcb_survey_results".to_string(),
        }
    }
}

impl MainTrialConfig {
    pub fn trial_count(&self) -> usize {
        self.regular_count + self.salient.len()
    }

    /// Salient slots in insertion order (ascending percentage).
    pub fn insertion_order(&self) -> Vec<SalientSlot> {
        let mut slots = self.salient.clone();
        slots.sort_by_key(|s| s.percentage);
        slots
    }

    /// Regular percentages available after the salient ones are reserved.
    pub fn regular_pool(&self) -> Vec<u8> {
        let reserved: HashSet<u8> = self.salient.iter().map(|s| s.percentage).collect();
        (self.regular_range.0..=self.regular_range.1)
            .filter(|p| !reserved.contains(p))
            .collect()
    }
}

impl SessionConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: SessionConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded session configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ExperimentError::Config(msg));

        if self.practice_trials.is_empty() {
            return invalid("at least one practice trial is required".into());
        }
        if let Some(t) = self.practice_trials.iter().find(|t| t.percentage > 100) {
            return invalid(format!("practice percentage {} exceeds 100", t.percentage));
        }

        let main = &self.main;
        let (lo, hi) = main.regular_range;
        if lo > hi || hi > 100 {
            return invalid(format!("invalid regular range {lo}..={hi}"));
        }
        let distinct: HashSet<u8> = main.salient.iter().map(|s| s.percentage).collect();
        if distinct.len() != main.salient.len() {
            return invalid("salient percentages must be distinct".into());
        }
        if main.salient.iter().any(|s| s.percentage > 100) {
            return invalid("salient percentage exceeds 100".into());
        }
        let pool = main.regular_pool().len();
        if pool < main.regular_count {
            return invalid(format!(
                "{} regular trials requested but only {pool} percentages available",
                main.regular_count
            ));
        }
        for (k, slot) in main.insertion_order().iter().enumerate() {
            let (start, end) = slot.window;
            if start >= end {
                return invalid(format!("empty window for salient {}%", slot.percentage));
            }
            // Insertion index may be at most the current list length.
            if end - 1 > main.regular_count + k {
                return invalid(format!(
                    "window {start}..{end} for salient {}% exceeds the trial list",
                    slot.percentage
                ));
            }
        }

        let s = &self.stimulus;
        if s.focus_size == 0 || s.focus_size > s.width || s.focus_size > s.height {
            return invalid(format!(
                "focus size {} does not fit a {}x{} surface",
                s.focus_size, s.width, s.height
            ));
        }
        if !(0.0..=1.0).contains(&s.background_damage_rate) {
            return invalid(format!(
                "background damage rate {} outside [0, 1]",
                s.background_damage_rate
            ));
        }

        for q in self.pre_task.iter().chain(&self.post_task) {
            let keys: HashSet<&str> = q.items.iter().map(|i| i.key.as_str()).collect();
            if keys.len() != q.items.len() {
                return invalid(format!("questionnaire '{}' repeats an item key", q.id));
            }
            for item in &q.items {
                match &item.kind {
                    ItemKind::Likert { min, max } if min > max => {
                        return invalid(format!(
                            "item '{}' in '{}' has scale {min}..={max}",
                            item.key, q.id
                        ));
                    }
                    ItemKind::Choice { options } if options.is_empty() => {
                        return invalid(format!("item '{}' in '{}' has no options", item.key, q.id));
                    }
                    _ => {}
                }
            }
        }

        if self.output.file_prefix.is_empty() {
            return invalid("output file prefix is empty".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SessionConfig::default();
        config.validate().unwrap();
        assert_eq!(config.main.trial_count(), 36);
        assert_eq!(config.main.regular_pool().len(), 37);
        assert_eq!(config.practice_trials.len(), 5);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SessionConfig::from_toml_str(
            r#"
            scan_delay_ms = 250

            [output]
            file_prefix = "pilot"

            [[post_task]]
            id = "trust"
            title = "Trust in the robot"

            [[post_task.items]]
            key = "reliable"
            prompt = "The robot was reliable"
            kind = "likert"
            min = 1
            max = 7

            [[post_task.items]]
            key = "comments"
            prompt = "Anything else?"
            kind = "free_text"
            required = false
            "#,
        )
        .unwrap();
        assert_eq!(config.scan_delay_ms, 250);
        assert_eq!(config.output.file_prefix, "pilot");
        assert_eq!(config.output.directory, PathBuf::from("."));
        assert_eq!(config.stimulus.focus_size, 20);
        assert_eq!(config.post_task.len(), 1);
        assert_eq!(config.post_task[0].items.len(), 2);
        assert!(!config.post_task[0].items[1].required);
    }

    #[test]
    fn rejects_window_past_end_of_list() {
        let mut config = SessionConfig::default();
        config.main.salient[3].window = (30, 40);
        assert!(matches!(config.validate(), Err(ExperimentError::Config(_))));
    }

    #[test]
    fn rejects_oversized_regular_count() {
        let mut config = SessionConfig::default();
        config.main.regular_count = 38;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_focus_larger_than_surface() {
        let mut config = SessionConfig::default();
        config.stimulus.focus_size = 300;
        assert!(config.validate().is_err());
    }

    fn with_pre_task_item(item: &str) -> SessionConfig {
        toml::from_str(&format!(
            r#"
            [[pre_task]]
            id = "consent"
            title = "Consent"

            [[pre_task.items]]
            key = "agree"
            prompt = "Do you agree to take part?"
            {item}
            "#
        ))
        .unwrap()
    }

    #[test]
    fn rejects_choice_without_options() {
        let config = with_pre_task_item("kind = \"choice\"\noptions = []");
        assert!(matches!(config.validate(), Err(ExperimentError::Config(_))));

        let config = with_pre_task_item("kind = \"choice\"\noptions = [\"Yes\"]");
        config.validate().unwrap();
    }

    #[test]
    fn rejects_inverted_likert_scale() {
        let config = with_pre_task_item("kind = \"likert\"\nmin = 7\nmax = 1");
        assert!(matches!(config.validate(), Err(ExperimentError::Config(_))));

        let config = with_pre_task_item("kind = \"likert\"\nmin = 4\nmax = 4");
        config.validate().unwrap();
    }
}
