use crate::error::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;
use trustcal_core::Trial;

/// Everything needed to reproduce a session's trial order after the fact.
#[derive(Debug, Serialize)]
pub struct SessionManifest<'a> {
    pub session_id: &'a str,
    pub started_at: &'a str,
    pub seed: Option<u64>,
    pub practice_trials: &'a [Trial],
    pub main_trials: &'a [Trial],
    pub results_file: &'a Path,
}

impl SessionManifest<'_> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut json = self.to_json()?;
        json.push('\n');
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_trials_in_order() {
        let practice = [Trial::regular(25)];
        let main = [Trial::regular(30), Trial::salient(45)];
        let manifest = SessionManifest {
            session_id: "20240101_120000",
            started_at: "2024-01-01 12:00:00",
            seed: Some(7),
            practice_trials: &practice,
            main_trials: &main,
            results_file: Path::new("out.csv"),
        };
        let value: serde_json::Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(value["seed"], 7);
        assert_eq!(value["main_trials"][1]["percentage"], 45);
        assert_eq!(value["main_trials"][1]["is_salient"], true);
        assert_eq!(value["results_file"], "out.csv");
    }
}
