use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use std::time::Duration;
use trustcal_core::{
    Control, ItemKind, QuestionItem, Questionnaire, Recommendation, Response, Screen,
    SessionPhase, TrialState, TrialType,
};
use trustcal_experiment::{
    ExperimentError, ScanCommand, ScanDevice, Session, SessionConfig, SessionEvent, SessionId,
    SimulatedScanner,
};
use trustcal_timing::{ManualTimer, Timer};

type TestSession = Session<ManualTimer, StdRng, SimulatedScanner<ManualTimer>>;

fn session_in(dir: &Path, mut config: SessionConfig, seed: u64) -> (ManualTimer, TestSession) {
    config.output.directory = dir.to_path_buf();
    let timer = ManualTimer::new();
    let scanner = SimulatedScanner::new(timer.clone(), Duration::from_millis(config.scan_delay_ms));
    let session = Session::new(
        config,
        "Decide whether each board should be kept.".into(),
        SessionId::from("20240101_120000"),
        timer.clone(),
        StdRng::seed_from_u64(seed),
        scanner,
    )
    .unwrap();
    (timer, session)
}

fn finish_scan(timer: &ManualTimer, session: &mut TestSession) {
    assert!(session.is_scanning());
    timer.advance(Duration::from_millis(1000));
    let events = session.update();
    assert_eq!(events, vec![SessionEvent::ScanCompleted]);
    for event in events {
        assert!(session.handle_event(event));
    }
}

fn run_block(timer: &ManualTimer, session: &mut TestSession, count: usize, responses: &mut usize) {
    for _ in 0..count {
        finish_scan(timer, session);
        let response = if *responses % 2 == 0 {
            Response::Accept
        } else {
            Response::Reject
        };
        *responses += 1;
        assert!(session.handle_event(SessionEvent::Respond(response)));
    }
}

fn trust_scale(id: &str) -> Questionnaire {
    Questionnaire {
        id: id.into(),
        title: "Trust in automation".into(),
        items: vec![QuestionItem {
            key: "trust".into(),
            prompt: "I trust the robot".into(),
            kind: ItemKind::Likert { min: 1, max: 7 },
            required: true,
        }],
    }
}

#[test]
fn full_session_records_every_trial() {
    let dir = tempfile::tempdir().unwrap();
    let (timer, mut session) = session_in(dir.path(), SessionConfig::default(), 42);
    assert_eq!(session.phase, SessionPhase::Welcome);
    assert!(!session.handle_event(SessionEvent::BeginMain));

    assert!(session.handle_event(SessionEvent::Start));
    assert_eq!(session.phase, SessionPhase::Practice);

    let mut responses = 0;
    run_block(&timer, &mut session, 5, &mut responses);
    assert_eq!(session.phase, SessionPhase::Transition);
    assert!(matches!(session.screen(), Screen::Transition));

    assert!(session.handle_event(SessionEvent::BeginMain));
    assert_eq!(session.phase, SessionPhase::Main);
    run_block(&timer, &mut session, 36, &mut responses);
    assert_eq!(session.phase, SessionPhase::End);

    let records = session.records();
    assert_eq!(records.len(), 41);
    assert!(records[..5].iter().all(|r| r.trial_type == TrialType::Practice));
    assert!(records[5..].iter().all(|r| r.trial_type == TrialType::Experimental));
    assert_eq!(records[0].percentage, 25);
    let practice_numbers: Vec<usize> = records[..5].iter().map(|r| r.trial_number).collect();
    assert_eq!(practice_numbers, (1..=5).collect::<Vec<_>>());
    let main_numbers: Vec<usize> = records[5..].iter().map(|r| r.trial_number).collect();
    assert_eq!(main_numbers, (1..=36).collect::<Vec<_>>());
    for r in records {
        assert_eq!(r.is_correct, (r.percentage >= 40) == (r.response == Response::Reject));
        assert!(!r.detail_view_used);
    }
    assert_eq!(records.iter().filter(|r| r.is_salient).count(), 4);

    let text = std::fs::read_to_string(session.recorder().results_path()).unwrap();
    assert_eq!(text.lines().count(), 42);

    assert!(session.handle_event(SessionEvent::Close));
    // Closing twice is harmless.
    assert!(session.handle_event(SessionEvent::Close));
}

#[test]
fn zoom_is_flagged_and_requested_once() {
    let dir = tempfile::tempdir().unwrap();
    let (timer, mut session) = session_in(dir.path(), SessionConfig::default(), 1);
    session.handle_event(SessionEvent::Start);

    assert!(!session.handle_event(SessionEvent::ShowZoom));
    assert!(!session.handle_event(SessionEvent::Respond(Response::Accept)));
    finish_scan(&timer, &mut session);

    assert!(session.handle_event(SessionEvent::ShowZoom));
    match session.screen() {
        Screen::Trial(view) => {
            assert!(view.zoomed);
            assert_eq!((view.image.width(), view.image.height()), (20, 20));
            // First practice trial is 25%, not salient.
            assert_eq!(view.recommendation, Recommendation::Keep);
        }
        other => panic!("unexpected screen {other:?}"),
    }
    let enabled: Vec<Control> = session
        .controls()
        .into_iter()
        .filter(|c| c.enabled)
        .map(|c| c.control)
        .collect();
    assert_eq!(enabled, vec![Control::ShowFull, Control::Discard, Control::Keep]);

    assert!(session.handle_event(SessionEvent::ShowFull));
    assert!(!session.handle_event(SessionEvent::ShowFull));
    assert!(session.handle_event(SessionEvent::ShowZoom));

    // The zoom rescan completes but is not a trial scan.
    timer.advance(Duration::from_millis(1000));
    assert!(session.update().is_empty());

    assert!(session.handle_event(SessionEvent::Respond(Response::Accept)));
    let record = &session.records()[0];
    assert!(record.detail_view_used);
    assert!(record.is_correct);

    // The flag does not leak into the next trial.
    finish_scan(&timer, &mut session);
    session.handle_event(SessionEvent::Respond(Response::Accept));
    assert!(!session.records()[1].detail_view_used);
}

#[test]
fn response_hands_over_to_the_next_scan() {
    let dir = tempfile::tempdir().unwrap();
    let (timer, mut session) = session_in(dir.path(), SessionConfig::default(), 5);
    session.handle_event(SessionEvent::Start);
    finish_scan(&timer, &mut session);
    assert!(session.handle_event(SessionEvent::Respond(Response::Reject)));

    // The answered trial lives on only as its record.
    assert_eq!(session.records().len(), 1);
    assert_eq!(session.records()[0].trial_number, 1);
    let next = session.current_trial().unwrap();
    assert_eq!(next.number, 2);
    assert_eq!(next.state, TrialState::Scanning);
    assert!(next.images.is_none());
    assert!(!session.handle_event(SessionEvent::Respond(Response::Reject)));
    assert_eq!(session.records().len(), 1);
}

#[test]
fn questionnaires_bracket_the_trials() {
    let dir = tempfile::tempdir().unwrap();
    let config = SessionConfig {
        pre_task: vec![trust_scale("pre_trust")],
        post_task: vec![trust_scale("post_trust")],
        ..SessionConfig::default()
    };
    let (timer, mut session) = session_in(dir.path(), config, 9);
    session.handle_event(SessionEvent::Start);
    assert_eq!(session.phase, SessionPhase::PreTask);
    assert!(matches!(session.screen(), Screen::Questionnaire { .. }));
    assert!(!session.controls()[0].enabled);

    assert!(!session.handle_event(SessionEvent::Submit));
    let answer = |value: &str| SessionEvent::Answer {
        key: "trust".into(),
        value: value.into(),
    };
    assert!(!session.handle_event(answer("9")));
    assert!(session.handle_event(answer("5")));
    assert!(session.controls()[0].enabled);
    assert!(session.handle_event(SessionEvent::Submit));
    assert_eq!(session.phase, SessionPhase::Practice);

    let mut responses = 0;
    run_block(&timer, &mut session, 5, &mut responses);
    session.handle_event(SessionEvent::BeginMain);
    run_block(&timer, &mut session, 36, &mut responses);
    assert_eq!(session.phase, SessionPhase::PostTask);

    session.handle_event(answer("2"));
    assert!(session.handle_event(SessionEvent::Submit));
    assert_eq!(session.phase, SessionPhase::End);

    let answers = session.recorder().questionnaire_answers();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers[0].questionnaire, "pre_trust");
    assert_eq!(answers[1].answer, "2");
}

#[test]
fn same_seed_gives_same_trial_order() {
    let dir = tempfile::tempdir().unwrap();
    let (_, a) = session_in(dir.path(), SessionConfig::default(), 1234);
    let (_, b) = session_in(dir.path(), SessionConfig::default(), 1234);
    assert_eq!(a.manifest(None).main_trials, b.manifest(None).main_trials);
}

#[test]
fn manifest_lists_the_generated_trials() {
    let dir = tempfile::tempdir().unwrap();
    let (_, session) = session_in(dir.path(), SessionConfig::default(), 5);
    let path = session.write_manifest(Some(5)).unwrap();
    assert_eq!(
        path,
        dir.path().join("pcb_survey_results_20240101_120000_session.json")
    );
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(value["main_trials"].as_array().unwrap().len(), 36);
    assert_eq!(value["practice_trials"][0]["percentage"], 25);
}

struct DeadLink;

impl ScanDevice for DeadLink {
    fn send(&mut self, _command: ScanCommand) -> trustcal_experiment::Result<()> {
        Err(ExperimentError::Device("no link".into()))
    }

    fn poll(&mut self) -> Option<ScanCommand> {
        None
    }
}

#[test]
fn dead_link_does_not_stall_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SessionConfig::default();
    config.output.directory = dir.path().to_path_buf();
    let timer = ManualTimer::new();
    let mut session = Session::new(
        config,
        String::new(),
        SessionId::from("x"),
        timer.clone(),
        StdRng::seed_from_u64(3),
        DeadLink,
    )
    .unwrap();
    session.handle_event(SessionEvent::Start);
    assert!(!session.is_scanning());
    assert!(matches!(session.screen(), Screen::Trial(_)));
    timer.advance(Duration::from_millis(350));
    assert!(session.handle_event(SessionEvent::Respond(Response::Reject)));
    assert_eq!(session.records().len(), 1);
    assert!(timer.now() > 0);
}
