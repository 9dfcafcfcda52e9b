use proctored_exam::environment::{ChannelSignalSource, EnvSignal, ScriptedEnvironment};
use proctored_exam::error::SessionError;
use proctored_exam::models::{
    Answer, Catalog, CorrectAnswer, Question, QuestionKind, SubmissionRecord, SubmitTrigger,
};
use proctored_exam::services::{
    EmailRegistry, InMemoryRegistry, InMemorySubmissions, JsonFileRegistry, SubmissionWriter,
};
use proctored_exam::session::{
    spawn_session, ControllerSettings, InterruptionCause, Outcome, ReentryStatus,
    SessionController, SessionHandle, SessionServices, SessionState, SubmissionSink,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_test::{assert_err, assert_ok};

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog {
        name: "flow".to_string(),
        duration_minutes: 1,
        questions: vec![
            Question {
                id: 1,
                prompt: "2 + 2".to_string(),
                kind: QuestionKind::MultipleChoice,
                options: vec!["3".into(), "4".into()],
                correct_answer: Some(CorrectAnswer::Choice(1)),
                points: 2,
            },
            Question {
                id: 2,
                prompt: "capital of France".to_string(),
                kind: QuestionKind::FillBlank,
                options: Vec::new(),
                correct_answer: Some(CorrectAnswer::Text("Paris".to_string())),
                points: 2,
            },
            Question {
                id: 3,
                prompt: "describe a conflict you resolved".to_string(),
                kind: QuestionKind::Subjective,
                options: Vec::new(),
                correct_answer: None,
                points: 4,
            },
        ],
    })
}

struct Session {
    handle: SessionHandle,
    task: JoinHandle<Option<SubmissionRecord>>,
    signals: UnboundedSender<EnvSignal>,
}

fn launch(
    registry: Arc<dyn EmailRegistry>,
    environment: Arc<ScriptedEnvironment>,
    submissions: Arc<dyn SubmissionSink>,
) -> Session {
    let catalog = catalog();
    let controller = SessionController::new(
        Arc::clone(&catalog),
        ControllerSettings::for_catalog(&catalog),
        registry,
    );
    let (source, signals) = ChannelSignalSource::new();
    let (handle, task) = spawn_session(
        controller,
        SessionServices {
            environment,
            signals: Arc::new(source),
            submissions,
        },
    );
    Session {
        handle,
        task,
        signals,
    }
}

async fn answer_all(handle: &SessionHandle) {
    assert_ok!(handle.answer(0, Answer::Choice(1)).await);
    assert_ok!(handle.answer(1, Answer::Text(" paris ".to_string())).await);
    assert_ok!(
        handle
            .answer(2, Answer::Text("We split the work and met daily.".to_string()))
            .await
    );
}

async fn finish(session: Session) -> Option<SubmissionRecord> {
    let Session { handle, task, .. } = session;
    drop(handle);
    task.await.unwrap()
}

#[tokio::test]
async fn test_full_session_writes_one_record_and_registers_email() {
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("used_emails.json");
    let writer = Arc::new(SubmissionWriter::new(
        dir.path().join("submissions.jsonl"),
        dir.path().join("evaluations.jsonl"),
    ));
    let registry = Arc::new(JsonFileRegistry::open(&registry_path).unwrap());

    let session = launch(
        registry,
        Arc::new(ScriptedEnvironment::granting()),
        writer.clone(),
    );
    let handle = &session.handle;

    assert_eq!(
        handle.bind_identity("Asha Rao", "  Asha@Example.com ").await,
        Ok(Outcome::IdentityBound)
    );
    assert_eq!(handle.start().await, Ok(Outcome::Started));
    answer_all(handle).await;

    let outcome = assert_ok!(handle.submit().await);
    assert!(matches!(
        outcome,
        Outcome::Submitted {
            trigger: SubmitTrigger::ExplicitSubmit,
            ..
        }
    ));

    let record = finish(session).await.unwrap();
    assert_eq!(record.identity.email_key, "asha@example.com");
    assert_eq!(record.objective.awarded_points, 4);
    assert_eq!(record.objective.total_points, 8);
    assert_eq!(record.objective.pending_subjective, vec![2]);

    let lines = std::fs::read_to_string(writer.submissions_path()).unwrap();
    let written: Vec<SubmissionRecord> = lines
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].id, record.id);

    let reopened = JsonFileRegistry::open(&registry_path).unwrap();
    assert!(reopened.has("asha@example.com"));
}

#[tokio::test]
async fn test_repeated_submit_is_absorbed() {
    let submissions = Arc::new(InMemorySubmissions::new());
    let session = launch(
        Arc::new(InMemoryRegistry::new()),
        Arc::new(ScriptedEnvironment::granting()),
        submissions.clone(),
    );
    let handle = &session.handle;

    assert_ok!(handle.bind_identity("Asha", "a@x.com").await);
    assert_ok!(handle.start().await);
    answer_all(handle).await;

    assert_ok!(handle.submit().await);
    assert_eq!(handle.submit().await, Ok(Outcome::AlreadySubmitted));
    assert_eq!(handle.confirm_exit().await, Ok(Outcome::AlreadySubmitted));
    assert_eq!(
        handle.answer(0, Answer::Choice(0)).await,
        Ok(Outcome::AlreadySubmitted)
    );

    finish(session).await;
    assert_eq!(submissions.records().len(), 1);
}

#[tokio::test]
async fn test_email_cannot_be_used_by_a_second_session() {
    let registry = Arc::new(InMemoryRegistry::new());

    let first = launch(
        registry.clone(),
        Arc::new(ScriptedEnvironment::granting()),
        Arc::new(InMemorySubmissions::new()),
    );
    assert_ok!(first.handle.bind_identity("Asha", "a@x.com").await);
    assert_ok!(first.handle.start().await);

    let second = launch(
        registry.clone(),
        Arc::new(ScriptedEnvironment::granting()),
        Arc::new(InMemorySubmissions::new()),
    );
    assert_eq!(
        second.handle.bind_identity("Someone Else", "A@X.COM").await,
        Err(SessionError::DuplicateIdentity {
            email_key: "a@x.com".to_string()
        })
    );
    assert_eq!(second.handle.status().state, SessionState::NotStarted);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_declined_fullscreen_leaves_registry_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let registry_path = dir.path().join("used_emails.json");
    let registry = Arc::new(JsonFileRegistry::open(&registry_path).unwrap());
    let environment = Arc::new(ScriptedEnvironment::declining());

    let session = launch(
        registry.clone(),
        environment.clone(),
        Arc::new(InMemorySubmissions::new()),
    );
    assert_ok!(session.handle.bind_identity("Asha", "a@x.com").await);
    let err = assert_err!(session.handle.start().await);
    assert_eq!(err, SessionError::FullscreenDenied);

    assert_eq!(environment.enter_calls(), 1);
    assert!(!registry.has("a@x.com"));
    assert!(!registry_path.exists());

    // 拒绝后可以再次尝试开考
    assert_eq!(session.handle.status().state, SessionState::NotStarted);
    assert!(session.handle.status().armed);
    assert_eq!(finish(session).await, None);
}

#[tokio::test]
async fn test_counters_only_grow_and_pause_while_interrupted() {
    let session = launch(
        Arc::new(InMemoryRegistry::new()),
        Arc::new(ScriptedEnvironment::granting()),
        Arc::new(InMemorySubmissions::new()),
    );
    let handle = &session.handle;
    assert_ok!(handle.bind_identity("Asha", "a@x.com").await);
    assert_ok!(handle.start().await);

    // 第一次切屏进入中断，中断期间的切屏不计数
    assert!(handle.notify_visibility(true));
    assert!(handle.notify_visibility(false));
    assert!(handle.notify_visibility(true));
    assert!(handle.notify_visibility(false));
    assert_eq!(handle.confirm_continue().await, Ok(Outcome::Resumed));
    assert_eq!(handle.status().tab_switch_count, 1);

    assert!(handle.notify_visibility(true));
    assert_eq!(handle.confirm_continue().await, Ok(Outcome::Resumed));
    assert_eq!(handle.status().tab_switch_count, 2);

    // 退出全屏计数并自动恢复
    assert!(handle.notify_fullscreen(false));
    let mut rx = handle.subscribe();
    let status = rx
        .wait_for(|s| s.last_reentry == Some(ReentryStatus::Restored))
        .await
        .unwrap()
        .clone();
    assert_eq!(status.fullscreen_exit_count, 1);
    assert_eq!(status.state, SessionState::InProgress);

    assert!(handle.notify_fullscreen(false));
    assert_eq!(
        handle.request_exit().await,
        Ok(Outcome::Interrupted(InterruptionCause::ParticipantRequest))
    );
    assert_eq!(handle.status().fullscreen_exit_count, 2);

    assert_ok!(handle.confirm_exit().await);
    let record = finish(session).await.unwrap();
    assert_eq!(record.trigger, SubmitTrigger::InterruptionExit);
    assert_eq!(record.tab_switch_count, 2);
    assert_eq!(record.fullscreen_exit_count, 2);
}

#[tokio::test]
async fn test_repeated_reentry_failures_escalate() {
    // 开考时允许全屏，之后的恢复请求全部失败
    let environment = Arc::new(ScriptedEnvironment::declining().then(Ok(())));
    let session = launch(
        Arc::new(InMemoryRegistry::new()),
        environment,
        Arc::new(InMemorySubmissions::new()),
    );
    let handle = &session.handle;
    assert_ok!(handle.bind_identity("Asha", "a@x.com").await);
    assert_ok!(handle.start().await);
    let mut rx = handle.subscribe();

    assert!(handle.notify_fullscreen(false));
    assert_ok!(
        rx.wait_for(|s| s.last_reentry
            == Some(ReentryStatus::Failed {
                consecutive_failures: 1
            }))
            .await
    );

    for expected in [2, 3] {
        assert!(handle.notify_visibility(true));
        assert!(handle.notify_visibility(false));
        assert_eq!(handle.confirm_continue().await, Ok(Outcome::Resumed));
        let status = rx
            .wait_for(|s| match s.last_reentry {
                Some(ReentryStatus::Failed {
                    consecutive_failures,
                })
                | Some(ReentryStatus::Escalated {
                    consecutive_failures,
                }) => consecutive_failures == expected,
                _ => false,
            })
            .await
            .unwrap()
            .clone();
        if expected == 3 {
            assert_eq!(
                status.last_reentry,
                Some(ReentryStatus::Escalated {
                    consecutive_failures: 3
                })
            );
        }
    }

    // 升级只是提醒，考试继续
    assert_eq!(handle.status().state, SessionState::InProgress);
    assert_eq!(handle.status().fullscreen_exit_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_expiry_racing_submit_yields_one_record() {
    let submissions = Arc::new(InMemorySubmissions::new());
    let session = launch(
        Arc::new(InMemoryRegistry::new()),
        Arc::new(ScriptedEnvironment::granting()),
        submissions.clone(),
    );
    let handle = session.handle.clone();
    assert_ok!(handle.bind_identity("Asha", "a@x.com").await);
    assert_ok!(handle.start().await);
    answer_all(&handle).await;

    tokio::time::sleep(Duration::from_secs(59)).await;
    let (submitted, _) = tokio::join!(
        handle.submit(),
        tokio::time::sleep(Duration::from_secs(2))
    );
    let outcome = assert_ok!(submitted);
    assert!(matches!(
        outcome,
        Outcome::Submitted { .. } | Outcome::AlreadySubmitted
    ));

    let status = assert_ok!(handle.wait_until_completed().await);
    assert!(status.submission_id.is_some());
    drop(handle);

    let record = finish(session).await.unwrap();
    let records = submissions.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, record.id);
}

#[tokio::test(start_paused = true)]
async fn test_clock_counts_down_once_per_second() {
    let session = launch(
        Arc::new(InMemoryRegistry::new()),
        Arc::new(ScriptedEnvironment::granting()),
        Arc::new(InMemorySubmissions::new()),
    );
    let handle = &session.handle;
    assert_ok!(handle.bind_identity("Asha", "a@x.com").await);
    assert_ok!(handle.start().await);
    assert_eq!(handle.status().time_remaining_seconds, 60);

    let mut rx = handle.subscribe();
    let status = rx
        .wait_for(|s| s.time_remaining_seconds <= 50)
        .await
        .unwrap()
        .clone();
    assert!((49..=50).contains(&status.time_remaining_seconds));
    assert!(status.time_display.starts_with("00:"));
    assert!(status.running_low);

    // 中断期间时钟仍在走
    assert!(handle.notify_visibility(true));
    let status = rx
        .wait_for(|s| s.state == SessionState::Interrupted && s.time_remaining_seconds <= 40)
        .await
        .unwrap()
        .clone();
    assert!(status.clock_running);
}

#[tokio::test]
async fn test_completion_closes_signal_channel() {
    let session = launch(
        Arc::new(InMemoryRegistry::new()),
        Arc::new(ScriptedEnvironment::granting()),
        Arc::new(InMemorySubmissions::new()),
    );
    assert_ok!(session.handle.bind_identity("Asha", "a@x.com").await);
    assert_ok!(session.handle.start().await);
    assert!(!session.signals.is_closed());

    assert_ok!(session.handle.request_exit().await);
    assert_ok!(session.handle.confirm_exit().await);

    for _ in 0..100 {
        if session.signals.is_closed() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(session.signals.is_closed());
    // 交卷后的信号被丢弃
    assert!(session.signals.send(EnvSignal::Unload).is_err());
}

#[tokio::test]
async fn test_signals_before_start_are_not_counted() {
    let session = launch(
        Arc::new(InMemoryRegistry::new()),
        Arc::new(ScriptedEnvironment::granting()),
        Arc::new(InMemorySubmissions::new()),
    );
    let handle = &session.handle;
    assert_ok!(handle.bind_identity("Asha", "a@x.com").await);

    // 开考前的切屏和关闭页面都不算违规
    session
        .signals
        .send(EnvSignal::Visibility { hidden: true })
        .unwrap();
    session
        .signals
        .send(EnvSignal::Visibility { hidden: false })
        .unwrap();
    session.signals.send(EnvSignal::Unload).unwrap();

    assert_eq!(handle.start().await, Ok(Outcome::Started));
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    let status = handle.status();
    assert_eq!(status.state, SessionState::InProgress);
    assert_eq!(status.tab_switch_count, 0);
    assert_eq!(status.prompt, None);

    // 开考后的信号照常计数
    session
        .signals
        .send(EnvSignal::Visibility { hidden: true })
        .unwrap();
    let mut rx = handle.subscribe();
    let status = rx
        .wait_for(|s| s.state == SessionState::Interrupted)
        .await
        .unwrap()
        .clone();
    assert_eq!(status.tab_switch_count, 1);
}
