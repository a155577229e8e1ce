use crate::config::OutputConfig;
use crate::error::{ExperimentError, Result};
use chrono::Local;
use log::{debug, error, warn};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use trustcal_core::{QuestionnaireResponse, Response, ResponseRecord, Trial, TrialType};

/// Human-readable, timestamp-derived session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Local::now().format("%Y%m%d_%H%M%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Where a log is written, and where it goes if that fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavePaths {
    pub primary: PathBuf,
    pub fallback: PathBuf,
}

impl SavePaths {
    /// `<dir>/<prefix>_<session><suffix>.csv` with a `_backup` fallback.
    pub fn for_session(output: &OutputConfig, session_id: &SessionId, suffix: &str) -> Self {
        let stem = format!("{}_{}{}", output.file_prefix, session_id, suffix);
        Self {
            primary: output.directory.join(format!("{stem}.csv")),
            fallback: output.directory.join(format!("{stem}_backup.csv")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing recorded yet, nothing written.
    Skipped,
    Primary,
    Fallback,
    Failed,
}

/// Rewrites the whole file: header plus every row.
fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(File::create(path)?);
    for row in rows {
        writer.serialize(row)?;
    }
    let file = writer
        .into_inner()
        .map_err(|e| ExperimentError::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

/// Saves to the primary path, once to the fallback on failure. Never raises.
pub fn save_with_fallback<T: Serialize>(paths: &SavePaths, rows: &[T]) -> SaveOutcome {
    if rows.is_empty() {
        return SaveOutcome::Skipped;
    }
    match write_csv(&paths.primary, rows) {
        Ok(()) => {
            debug!("Saved {} rows to {}", rows.len(), paths.primary.display());
            SaveOutcome::Primary
        }
        Err(e) => {
            error!("Error saving results to {}: {}", paths.primary.display(), e);
            match write_csv(&paths.fallback, rows) {
                Ok(()) => {
                    warn!("Results saved to backup {}", paths.fallback.display());
                    SaveOutcome::Fallback
                }
                Err(backup_error) => {
                    error!(
                        "Error saving backup {}: {}",
                        paths.fallback.display(),
                        backup_error
                    );
                    SaveOutcome::Failed
                }
            }
        }
    }
}

/// In-memory response log, persisted in full after every append.
#[derive(Debug)]
pub struct ResponseRecorder {
    session_id: SessionId,
    responses: Vec<ResponseRecord>,
    answers: Vec<QuestionnaireResponse>,
    response_paths: SavePaths,
    answer_paths: SavePaths,
    last_outcome: SaveOutcome,
    finished: bool,
}

impl ResponseRecorder {
    pub fn new(session_id: SessionId, response_paths: SavePaths, answer_paths: SavePaths) -> Self {
        Self {
            session_id,
            responses: Vec::new(),
            answers: Vec::new(),
            response_paths,
            answer_paths,
            last_outcome: SaveOutcome::Skipped,
            finished: false,
        }
    }

    pub fn for_output(output: &OutputConfig, session_id: SessionId) -> Self {
        let responses = SavePaths::for_session(output, &session_id, "");
        let answers = SavePaths::for_session(output, &session_id, "_questionnaires");
        Self::new(session_id, responses, answers)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn responses(&self) -> &[ResponseRecord] {
        &self.responses
    }

    pub fn questionnaire_answers(&self) -> &[QuestionnaireResponse] {
        &self.answers
    }

    pub fn results_path(&self) -> &Path {
        &self.response_paths.primary
    }

    pub fn last_outcome(&self) -> SaveOutcome {
        self.last_outcome
    }

    /// Appends the scored response and saves the whole log.
    pub fn record(
        &mut self,
        trial: Trial,
        response: Response,
        detail_view_used: bool,
        phase: TrialType,
        ordinal: usize,
    ) -> ResponseRecord {
        let record = ResponseRecord::new(
            trial,
            response,
            detail_view_used,
            phase,
            ordinal,
            self.session_id.as_str(),
            timestamp(),
        );
        self.responses.push(record.clone());
        self.last_outcome = save_with_fallback(&self.response_paths, &self.responses);
        record
    }

    pub fn record_questionnaire<'a>(
        &mut self,
        questionnaire: &str,
        answers: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> SaveOutcome {
        let now = timestamp();
        self.answers
            .extend(answers.into_iter().map(|(item, answer)| QuestionnaireResponse {
                questionnaire: questionnaire.to_string(),
                item: item.to_string(),
                answer: answer.to_string(),
                session_id: self.session_id.to_string(),
                timestamp: now.clone(),
            }));
        save_with_fallback(&self.answer_paths, &self.answers)
    }

    /// Final save of both logs. Later calls are no-ops.
    pub fn finish(&mut self) -> SaveOutcome {
        if self.finished {
            return self.last_outcome;
        }
        self.finished = true;
        save_with_fallback(&self.answer_paths, &self.answers);
        self.last_outcome = save_with_fallback(&self.response_paths, &self.responses);
        self.last_outcome
    }
}

impl Drop for ResponseRecorder {
    fn drop(&mut self) {
        self.finish();
    }
}
