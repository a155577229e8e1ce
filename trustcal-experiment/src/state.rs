use crate::config::SessionConfig;
use crate::device::{ScanCommand, ScanDevice};
use crate::error::Result;
use crate::manifest::SessionManifest;
use crate::recorder::{ResponseRecorder, SessionId, timestamp};
use crate::sequence::{SequencerEvent, TrialSequencer, generate_main_trials};
use crate::stimulus::StimulusGenerator;
use log::{debug, info, warn};
use rand::Rng;
use std::path::PathBuf;
use trustcal_core::{
    Control, ControlHandle, DamagePattern, Grid, Questionnaire, QuestionnaireForm,
    Recommendation, Response, ResponseRecord, Screen, SessionPhase, Trial, TrialState, TrialType,
    TrialView,
};
use trustcal_timing::Timer;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Start,
    ScanCompleted,
    ShowZoom,
    ShowFull,
    Respond(Response),
    BeginMain,
    Answer { key: String, value: String },
    Submit,
    Close,
}

impl From<Control> for SessionEvent {
    fn from(control: Control) -> Self {
        match control {
            Control::Start => SessionEvent::Start,
            Control::ShowZoom => SessionEvent::ShowZoom,
            Control::ShowFull => SessionEvent::ShowFull,
            Control::Keep => SessionEvent::Respond(Response::Accept),
            Control::Discard => SessionEvent::Respond(Response::Reject),
            Control::BeginMain => SessionEvent::BeginMain,
            Control::Submit => SessionEvent::Submit,
            Control::Close => SessionEvent::Close,
        }
    }
}

/// Images shown for a presented trial.
#[derive(Debug, Clone)]
pub struct TrialImages {
    pub pattern: DamagePattern,
    pub full: Grid,
    pub zoom: Grid,
}

#[derive(Debug, Clone)]
pub struct ActiveTrial {
    pub trial: Trial,
    pub trial_type: TrialType,
    /// 1-based position in the current block.
    pub number: usize,
    pub total: usize,
    pub recommendation: Recommendation,
    pub state: TrialState,
    pub images: Option<TrialImages>,
    pub detail_view_used: bool,
    pub presented_ns: Option<u64>,
}

/// The whole participant session: phase flow, trial cycle, and the response
/// log. Exactly one instance exists per run.
pub struct Session<T, R, D>
where
    T: Timer,
    R: Rng,
    D: ScanDevice,
{
    pub phase: SessionPhase,
    pub timer: T,
    pub rng: R,
    pub config: SessionConfig,
    prompt: String,
    started_at: String,
    generator: StimulusGenerator,
    sequencer: TrialSequencer,
    recorder: ResponseRecorder,
    device: D,
    current: Option<ActiveTrial>,
    questionnaire_cursor: usize,
    form: QuestionnaireForm,
}

fn block(config: &SessionConfig, phase: SessionPhase) -> &[Questionnaire] {
    match phase {
        SessionPhase::PreTask => &config.pre_task,
        SessionPhase::PostTask => &config.post_task,
        _ => &[],
    }
}

impl<T, R, D> Session<T, R, D>
where
    T: Timer,
    R: Rng,
    D: ScanDevice,
{
    pub fn new(
        config: SessionConfig,
        prompt: String,
        session_id: SessionId,
        timer: T,
        mut rng: R,
        device: D,
    ) -> Result<Self> {
        config.validate()?;
        let main = generate_main_trials(&config.main, &mut rng);
        let sequencer = TrialSequencer::new(config.practice_trials.clone(), main);
        let recorder = ResponseRecorder::for_output(&config.output, session_id);
        info!(
            "Session {} created: {} practice, {} main trials",
            recorder.session_id(),
            sequencer.practice_trials().len(),
            sequencer.main_trials().len()
        );
        Ok(Self {
            phase: SessionPhase::Welcome,
            timer,
            rng,
            generator: StimulusGenerator::new(config.stimulus.clone()),
            config,
            prompt,
            started_at: timestamp(),
            sequencer,
            recorder,
            device,
            current: None,
            questionnaire_cursor: 0,
            form: QuestionnaireForm::new(),
        })
    }

    /// Polls the scan device and reports what the event loop should handle.
    pub fn update(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Some(done) = self.device.poll() {
            if done == ScanCommand::Scan && self.is_scanning() {
                events.push(SessionEvent::ScanCompleted);
            } else {
                debug!("Ignoring completion of '{}'", done.byte() as char);
            }
        }
        events
    }

    /// Applies an event. Returns false when the event does not apply to the
    /// current state, in which case nothing changes.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        let trial_state = self.current.as_ref().map(|t| t.state);
        match (self.phase, event) {
            (SessionPhase::Welcome, SessionEvent::Start) => {
                self.advance_phase();
                true
            }

            (phase, SessionEvent::Answer { key, value }) if phase.is_questionnaire() => {
                match block(&self.config, phase).get(self.questionnaire_cursor) {
                    Some(q) => self.form.set(q, &key, &value),
                    None => false,
                }
            }

            (phase, SessionEvent::Submit) if phase.is_questionnaire() => {
                self.submit_questionnaire()
            }

            (phase, SessionEvent::ScanCompleted)
                if phase.runs_trials() && trial_state == Some(TrialState::Scanning) =>
            {
                self.present_trial();
                true
            }

            (phase, SessionEvent::ShowZoom)
                if phase.runs_trials() && trial_state == Some(TrialState::Present) =>
            {
                self.show_detail_view();
                true
            }

            (phase, SessionEvent::ShowFull)
                if phase.runs_trials() && trial_state == Some(TrialState::DetailView) =>
            {
                if let Some(active) = &mut self.current {
                    active.state = TrialState::Present;
                }
                true
            }

            (phase, SessionEvent::Respond(response))
                if phase.runs_trials() && trial_state.is_some_and(|s| s.awaits_response()) =>
            {
                self.record_response(response);
                true
            }

            (SessionPhase::Transition, SessionEvent::BeginMain) => {
                self.advance_phase();
                true
            }

            (SessionPhase::End, SessionEvent::Close) => {
                self.finish();
                true
            }

            _ => false,
        }
    }

    pub fn advance_phase(&mut self) -> bool {
        match self.phase.next() {
            Some(next) => {
                self.enter(next);
                true
            }
            None => false,
        }
    }

    fn enter(&mut self, phase: SessionPhase) {
        self.phase = phase;
        match phase {
            SessionPhase::PreTask | SessionPhase::PostTask => {
                if block(&self.config, phase).is_empty() {
                    self.advance_phase();
                    return;
                }
                info!("Starting {:?} questionnaires", phase);
                self.questionnaire_cursor = 0;
                self.form = QuestionnaireForm::new();
            }
            SessionPhase::Practice => {
                info!("Starting practice trials...");
                self.start_trial();
            }
            SessionPhase::Main => {
                info!("Starting main trials...");
                self.sequencer.switch_to_main();
                self.start_trial();
            }
            SessionPhase::Transition => {
                info!("Practice complete");
                self.current = None;
            }
            SessionPhase::End => {
                info!("Session complete");
                self.current = None;
                self.finish();
            }
            SessionPhase::Welcome => {
                self.current = None;
            }
        }
    }

    fn start_trial(&mut self) {
        let Some(trial) = self.sequencer.current() else {
            self.complete_block();
            return;
        };
        let active = ActiveTrial {
            trial,
            trial_type: self.sequencer.mode(),
            number: self.sequencer.cursor() + 1,
            total: self.sequencer.len(),
            recommendation: trial.recommendation(),
            state: TrialState::Scanning,
            images: None,
            detail_view_used: false,
            presented_ns: None,
        };
        info!(
            "{} trial {} of {} scanning ({}%, salient: {})",
            active.trial_type, active.number, active.total, trial.percentage, trial.is_salient
        );
        self.current = Some(active);

        if let Err(e) = self.device.send(ScanCommand::Scan) {
            // Without a link there is nothing to wait for.
            warn!("Scan request failed: {e}; presenting without device");
            self.present_trial();
        }
    }

    fn present_trial(&mut self) {
        let Some(active) = &mut self.current else {
            return;
        };
        let pattern = self
            .generator
            .generate(active.trial.damage_fraction(), &mut self.rng);
        let full = self.generator.full_view(&pattern);
        let zoom = pattern.crop_zoom();
        active.images = Some(TrialImages {
            pattern,
            full,
            zoom,
        });
        active.state = TrialState::Present;
        active.detail_view_used = false;
        active.presented_ns = Some(self.timer.now());
        debug!(
            "Presented trial {} with recommendation {} ({} damaged cells in focus)",
            active.number,
            active.recommendation,
            active
                .images
                .as_ref()
                .map_or(0, |images| images.pattern.damaged_in_focus())
        );
    }

    fn show_detail_view(&mut self) {
        let Some(active) = &mut self.current else {
            return;
        };
        active.state = TrialState::DetailView;
        if !active.detail_view_used {
            active.detail_view_used = true;
            if let Err(e) = self.device.send(ScanCommand::ZoomScan) {
                warn!("Zoom scan request failed: {e}");
            }
        }
    }

    fn record_response(&mut self, response: Response) {
        let Some(active) = self.current.take() else {
            return;
        };
        let record = self.recorder.record(
            active.trial,
            response,
            active.detail_view_used,
            active.trial_type,
            active.number,
        );
        if let Some(shown) = active.presented_ns {
            debug!(
                "Response recorded, RT = {:.3} ms",
                self.timer.elapsed(shown).as_secs_f64() * 1e3
            );
        }
        info!(
            "{} trial {}: {:?} at {}% (correct: {}, zoom: {})",
            record.trial_type,
            record.trial_number,
            record.response,
            record.percentage,
            record.is_correct,
            record.detail_view_used
        );

        if let Err(e) = self.device.send(ScanCommand::NextItem) {
            warn!("Next item request failed: {e}");
        }

        match self.sequencer.advance() {
            SequencerEvent::Continue => self.start_trial(),
            SequencerEvent::PhaseComplete => self.complete_block(),
        }
    }

    /// The practice block hands over to the transition screen; the main
    /// block always ends the trials.
    fn complete_block(&mut self) {
        self.current = None;
        if self.sequencer.is_practice() {
            self.enter(SessionPhase::Transition);
        } else {
            self.enter(SessionPhase::PostTask);
        }
    }

    fn submit_questionnaire(&mut self) -> bool {
        let questionnaires = block(&self.config, self.phase);
        let Some(q) = questionnaires.get(self.questionnaire_cursor) else {
            return false;
        };
        if !self.form.is_complete(q) {
            debug!("Questionnaire '{}' incomplete, submit ignored", q.id);
            return false;
        }
        self.recorder.record_questionnaire(&q.id, self.form.answers(q));
        info!("Questionnaire '{}' submitted", q.id);

        let remaining = questionnaires.len() - self.questionnaire_cursor - 1;
        self.form = QuestionnaireForm::new();
        if remaining == 0 {
            self.advance_phase();
        } else {
            self.questionnaire_cursor += 1;
        }
        true
    }

    /// Final save. Safe to call more than once.
    pub fn finish(&mut self) {
        self.recorder.finish();
    }

    pub fn screen(&self) -> Screen<'_> {
        match self.phase {
            SessionPhase::Welcome => Screen::Welcome {
                prompt: &self.prompt,
                practice_trials: self.sequencer.practice_trials().len(),
                main_trials: self.sequencer.main_trials().len(),
            },
            SessionPhase::PreTask | SessionPhase::PostTask => match self.current_questionnaire() {
                Some(questionnaire) => Screen::Questionnaire {
                    questionnaire,
                    form: &self.form,
                },
                None => Screen::Transition,
            },
            SessionPhase::Practice | SessionPhase::Main => match &self.current {
                Some(ActiveTrial {
                    images: Some(images),
                    trial_type,
                    number,
                    total,
                    recommendation,
                    state,
                    ..
                }) => {
                    let zoomed = *state == TrialState::DetailView;
                    Screen::Trial(TrialView {
                        trial_type: *trial_type,
                        number: *number,
                        total: *total,
                        image: if zoomed { &images.zoom } else { &images.full },
                        zoomed,
                        recommendation: *recommendation,
                    })
                }
                _ => Screen::Scanning {
                    trial_type: self.sequencer.mode(),
                },
            },
            SessionPhase::Transition => Screen::Transition,
            SessionPhase::End => Screen::End {
                results_path: self.recorder.results_path(),
            },
        }
    }

    pub fn controls(&self) -> Vec<ControlHandle> {
        use Control::*;
        let handles = |list: &[(Control, bool)]| -> Vec<ControlHandle> {
            list.iter()
                .map(|&(c, enabled)| ControlHandle::new(c, enabled))
                .collect()
        };
        match self.phase {
            SessionPhase::Welcome => handles(&[(Start, true)]),
            SessionPhase::PreTask | SessionPhase::PostTask => {
                let complete = self
                    .current_questionnaire()
                    .is_some_and(|q| self.form.is_complete(q));
                handles(&[(Submit, complete)])
            }
            SessionPhase::Practice | SessionPhase::Main => {
                let state = self.current.as_ref().map(|t| t.state);
                let present = state == Some(TrialState::Present);
                let detail = state == Some(TrialState::DetailView);
                handles(&[
                    (ShowZoom, present),
                    (ShowFull, detail),
                    (Discard, present || detail),
                    (Keep, present || detail),
                ])
            }
            SessionPhase::Transition => handles(&[(BeginMain, true)]),
            SessionPhase::End => handles(&[(Close, true)]),
        }
    }

    pub fn current_questionnaire(&self) -> Option<&Questionnaire> {
        block(&self.config, self.phase).get(self.questionnaire_cursor)
    }

    pub fn form(&self) -> &QuestionnaireForm {
        &self.form
    }

    pub fn current_trial(&self) -> Option<&ActiveTrial> {
        self.current.as_ref()
    }

    pub fn is_scanning(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|t| t.state == TrialState::Scanning)
    }

    /// When the device will next report back, if it knows.
    pub fn next_deadline(&self) -> Option<u64> {
        self.device.next_deadline()
    }

    pub fn recorder(&self) -> &ResponseRecorder {
        &self.recorder
    }

    pub fn records(&self) -> &[ResponseRecord] {
        self.recorder.responses()
    }

    pub fn session_id(&self) -> &SessionId {
        self.recorder.session_id()
    }

    pub fn manifest(&self, seed: Option<u64>) -> SessionManifest<'_> {
        SessionManifest {
            session_id: self.recorder.session_id().as_str(),
            started_at: &self.started_at,
            seed,
            practice_trials: self.sequencer.practice_trials(),
            main_trials: self.sequencer.main_trials(),
            results_file: self.recorder.results_path(),
        }
    }

    /// Writes the manifest next to the response log.
    pub fn write_manifest(&self, seed: Option<u64>) -> Result<PathBuf> {
        let path = self.config.output.directory.join(format!(
            "{}_{}_session.json",
            self.config.output.file_prefix,
            self.recorder.session_id()
        ));
        self.manifest(seed).write(&path)?;
        info!("Session manifest written to {}", path.display());
        Ok(path)
    }
}
