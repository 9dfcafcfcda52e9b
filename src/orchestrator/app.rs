//! 应用 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、题库、邮箱注册表、评分器、考试环境
//! 2. **会话驱动**：启动会话运行时，把终端命令转成会话操作
//! 3. **收尾**：打印交卷统计，交卷后复核主观题
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有 Browser 的模块
//! - **无业务逻辑**：状态迁移全部交给会话控制器

use anyhow::{Context, Result};
use chromiumoxide::Browser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::browser;
use crate::config::{Config, EnvironmentMode, GraderMode};
use crate::environment::{
    BrowserEnvironment, BrowserProbe, ChannelSignalSource, EnvSignal, Environment,
    ScriptedEnvironment, SignalSource,
};
use crate::infrastructure::JsExecutor;
use crate::models::{self, Catalog, SubjectiveEvaluation, SubmissionRecord};
use crate::orchestrator::console::{self, ConsoleCommand};
use crate::services::{
    EmailRegistry, Grader, HeuristicGrader, JsonFileRegistry, LlmGrader, SubmissionWriter,
};
use crate::session::{
    spawn_session, ControllerSettings, InterruptionCause, Outcome, SessionController,
    SessionHandle, SessionServices, SessionState, SessionStatus,
};
use crate::utils::logging::{
    append_log_line, init_log_file, log_startup, print_evaluation_summary,
    print_submission_summary,
};
use crate::workflow::ReviewFlow;

/// 应用主结构
pub struct App {
    config: Config,
    catalog: Arc<Catalog>,
    registry: Arc<dyn EmailRegistry>,
    writer: Arc<SubmissionWriter>,
    review: Option<Arc<ReviewFlow>>,
    services: SessionServices,
    /// 脱机模式下模拟环境信号的发送端
    simulator: Option<UnboundedSender<EnvSignal>>,
    _browser: Option<Browser>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)
            .with_context(|| format!("无法创建日志文件 {}", config.output_log_file))?;

        let mut catalog = load_catalog(&config.catalog_path).await?;
        if let Some(minutes) = config.exam_duration_minutes {
            catalog.duration_minutes = minutes;
        }
        log_startup(&catalog.name, catalog.len(), catalog.duration_seconds());

        let registry: Arc<dyn EmailRegistry> = Arc::new(
            JsonFileRegistry::open(&config.registry_file)
                .with_context(|| format!("无法打开邮箱注册表 {}", config.registry_file))?,
        );

        let writer = Arc::new(SubmissionWriter::new(
            &config.submissions_file,
            &config.evaluations_file,
        ));

        let review = build_grader(&config).map(|grader| Arc::new(ReviewFlow::new(grader)));

        let (environment, signals, simulator, browser) = match config.environment_mode {
            EnvironmentMode::Browser => {
                let (browser, page) =
                    browser::connect_to_exam_page(config.browser_debug_port, &config.target_url)
                        .await?;
                // 创建 JsExecutor（持有 page）
                let executor = JsExecutor::new(page);
                info!("🖥️ 考试环境: 浏览器 (端口 {})", config.browser_debug_port);
                (
                    Arc::new(BrowserEnvironment::new(executor.clone()))
                        as Arc<dyn Environment>,
                    Arc::new(BrowserProbe::new(executor, config.probe_interval()))
                        as Arc<dyn SignalSource>,
                    None,
                    Some(browser),
                )
            }
            EnvironmentMode::Detached => {
                let (source, simulator) = ChannelSignalSource::new();
                info!("🖥️ 考试环境: 脱机模式 (全屏总是可用，可用命令模拟切屏)");
                (
                    Arc::new(ScriptedEnvironment::granting())
                        as Arc<dyn Environment>,
                    Arc::new(source) as Arc<dyn SignalSource>,
                    Some(simulator),
                    None,
                )
            }
        };

        let services = SessionServices {
            environment,
            signals,
            submissions: writer.clone(),
        };

        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            registry,
            writer,
            review,
            services,
            simulator,
            _browser: browser,
        })
    }

    /// 运行一场考试
    pub async fn run(&self) -> Result<Option<SubmissionRecord>> {
        let settings = ControllerSettings {
            duration_seconds: self.catalog.duration_seconds(),
            pause_clock_during_interruption: self.config.pause_clock_during_interruption,
            max_reentry_failures: self.config.max_reentry_failures,
        };
        let controller = SessionController::new(
            Arc::clone(&self.catalog),
            settings,
            Arc::clone(&self.registry),
        );
        let (handle, task) = spawn_session(controller, self.services.clone());

        let notices = spawn_notice_printer(&handle);
        println!("{}", console::HELP);

        self.drive(&handle).await;

        // 考生离开终端时，进行中的考试继续计时直到交卷
        if handle.status().state.is_live() {
            info!("⌛ 输入已结束，等待考试结束...");
            let _ = handle.wait_until_completed().await;
        }

        drop(handle);
        let record = task.await.context("会话运行时异常退出")?;
        notices.abort();

        let Some(record) = record else {
            warn!("⚠️ 考试未开始，没有生成提交记录");
            return Ok(None);
        };

        print_submission_summary(&record, &self.config.output_log_file);
        if let Err(e) = append_log_line(
            &self.config.output_log_file,
            &serde_json::to_string(&record).unwrap_or_default(),
        ) {
            warn!("⚠️ 写入日志文件失败: {}", e);
        }

        if let Some(review) = &self.review {
            let evaluation =
                review_submission(review, &self.catalog, &self.writer, &record).await;
            if let Some(evaluation) = evaluation {
                print_evaluation_summary(&evaluation);
            }
        }

        Ok(Some(record))
    }

    /// 逐行读取终端命令，直到交卷或输入结束
    async fn drive(&self, handle: &SessionHandle) {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let line = tokio::select! {
                line = lines.next_line() => line,
                _ = handle.wait_until_completed() => break,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("❌ 读取输入失败: {}", e);
                    break;
                }
            };

            match console::parse_command(&line) {
                Ok(command) => self.dispatch(handle, command).await,
                Err(message) => println!("{}", message),
            }

            if handle.status().state == SessionState::Completed {
                break;
            }
        }
    }

    async fn dispatch(&self, handle: &SessionHandle, command: ConsoleCommand) {
        let result = match command {
            ConsoleCommand::Login { name, email } => handle.bind_identity(&name, &email).await,
            ConsoleCommand::Start => handle.start().await,
            ConsoleCommand::Answer { question, value } => {
                let Some(q) = self.catalog.question(question) else {
                    println!("没有第 {} 题", question + 1);
                    return;
                };
                match console::to_answer(q, &value) {
                    Ok(answer) => handle.answer(question, answer).await,
                    Err(message) => {
                        println!("{}", message);
                        return;
                    }
                }
            }
            ConsoleCommand::Navigate(nav) => handle.navigate(nav).await,
            ConsoleCommand::Submit => handle.submit().await,
            ConsoleCommand::Continue => handle.confirm_continue().await,
            ConsoleCommand::Exit => {
                // 进行中时先进入确认步骤，等待确认时直接结束
                if handle.status().state == SessionState::Interrupted {
                    handle.confirm_exit().await
                } else {
                    handle.request_exit().await
                }
            }
            ConsoleCommand::Status => {
                println!("{}", handle.status().summary_line());
                return;
            }
            ConsoleCommand::Help => {
                println!("{}", console::HELP);
                return;
            }
            ConsoleCommand::Simulate(signal) => {
                match &self.simulator {
                    None => println!("只有脱机模式可以模拟环境信号"),
                    Some(_) if !handle.status().state.is_live() => {
                        println!("考试未在进行，当前没有在监视环境信号")
                    }
                    Some(simulator) if simulator.send(signal).is_ok() => {}
                    Some(_) => println!("当前没有在监视环境信号"),
                }
                return;
            }
        };

        match result {
            Ok(outcome) => self.show_outcome(&outcome, &handle.status()),
            Err(e) => println!("✗ {}", e),
        }
    }

    fn show_outcome(&self, outcome: &Outcome, status: &SessionStatus) {
        match outcome {
            Outcome::IdentityBound => println!("✓ 身份已确认，输入 start 开始考试"),
            Outcome::Started | Outcome::Navigated { .. } => {
                if let Some(question) = self.catalog.question(status.cursor) {
                    println!(
                        "{}",
                        console::render_question(status.cursor, question, &status.current_answer)
                    );
                }
            }
            Outcome::AnswerRecorded { answered, total } => {
                println!("✓ 已作答 {}/{}", answered, total)
            }
            Outcome::Submitted { trigger, percentage } => {
                println!("✓ 已交卷 ({})，客观题得分 {:.1}%", trigger, percentage)
            }
            Outcome::AlreadySubmitted => println!("考试已经交卷"),
            Outcome::Resumed => println!("▶ 继续考试，剩余 {}", status.time_display),
            other => println!("{:?}", other),
        }
    }
}

/// 题库路径可以是文件或目录
async fn load_catalog(path: &str) -> Result<Catalog> {
    info!("\n📁 正在加载题库: {}", path);
    if Path::new(path).is_dir() {
        models::load_catalog_from_dir(path).await
    } else {
        models::load_catalog(Path::new(path)).await
    }
}

fn build_grader(config: &Config) -> Option<Arc<dyn Grader>> {
    match config.grader_mode {
        GraderMode::Llm => Some(Arc::new(LlmGrader::new(config))),
        GraderMode::Heuristic => Some(Arc::new(HeuristicGrader::new())),
        GraderMode::Off => None,
    }
}

/// 复核主观题并写出复核结果，提交记录已经写出，不受复核结果影响
async fn review_submission(
    review: &ReviewFlow,
    catalog: &Catalog,
    writer: &SubmissionWriter,
    record: &SubmissionRecord,
) -> Option<SubjectiveEvaluation> {
    if record.objective.pending_subjective.is_empty() {
        return None;
    }

    match review.review(catalog, record).await {
        Ok(evaluation) => {
            if let Err(e) = writer.write_evaluation(&evaluation).await {
                error!("❌ 复核结果写出失败: {}", e);
            }
            Some(evaluation)
        }
        Err(e) => {
            error!("❌ 主观题复核失败，需要人工评分: {}", e);
            None
        }
    }
}

/// 把状态变化里考生需要看到的提示打印出来
fn spawn_notice_printer(handle: &SessionHandle) -> JoinHandle<()> {
    let mut rx = handle.subscribe();
    tokio::spawn(async move {
        let mut last_prompt: Option<InterruptionCause> = None;
        let mut warned_low = false;
        let mut last_reentry = None;

        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();

            if status.prompt != last_prompt {
                if let Some(cause) = status.prompt {
                    let reason = match cause {
                        InterruptionCause::TabHidden => "检测到切换标签页",
                        InterruptionCause::UnloadAttempt => "检测到关闭页面",
                        InterruptionCause::ParticipantRequest => "你选择了退出",
                    };
                    println!(
                        "⚠️ {}（已切屏 {} 次），输入 continue 继续考试，或 exit 结束并交卷。{}，剩余 {}",
                        reason,
                        status.tab_switch_count,
                        if status.clock_running { "计时仍在继续" } else { "计时已暂停" },
                        status.time_display
                    );
                }
                last_prompt = status.prompt;
            }

            if status.running_low && status.clock_running && !warned_low {
                println!("⏰ 剩余时间不足 5 分钟: {}", status.time_display);
                warned_low = true;
            }

            if status.last_reentry != last_reentry {
                if let Some(reentry) = status.last_reentry {
                    println!("🖥️ 全屏恢复结果: {:?}", reentry);
                }
                last_reentry = status.last_reentry;
            }

            if status.state == SessionState::Completed {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Answer, CorrectAnswer, Identity, Question, QuestionKind, SubmitTrigger};
    use crate::services::scorer;
    use chrono::Utc;
    use uuid::Uuid;

    fn catalog(with_subjective: bool) -> Catalog {
        let mut questions = vec![Question {
            id: 1,
            prompt: "2 + 2".to_string(),
            kind: QuestionKind::MultipleChoice,
            options: vec!["3".into(), "4".into()],
            correct_answer: Some(CorrectAnswer::Choice(1)),
            points: 1,
        }];
        if with_subjective {
            questions.push(Question {
                id: 2,
                prompt: "Explain closures".to_string(),
                kind: QuestionKind::Subjective,
                options: Vec::new(),
                correct_answer: None,
                points: 4,
            });
        }
        Catalog {
            name: "app".to_string(),
            duration_minutes: 10,
            questions,
        }
    }

    fn record(catalog: &Catalog, answers: Vec<Answer>) -> SubmissionRecord {
        SubmissionRecord {
            id: Uuid::new_v4(),
            identity: Identity::new("Asha", "a@x.com").unwrap(),
            objective: scorer::score_objective(catalog, &answers),
            answers,
            trigger: SubmitTrigger::ExplicitSubmit,
            tab_switch_count: 0,
            fullscreen_exit_count: 0,
            time_remaining_seconds: 60,
            started_at: Utc::now(),
            submitted_at: Utc::now(),
        }
    }

    fn writer(dir: &tempfile::TempDir) -> SubmissionWriter {
        SubmissionWriter::new(
            dir.path().join("submissions.jsonl"),
            dir.path().join("evaluations.jsonl"),
        )
    }

    #[tokio::test]
    async fn test_review_submission_writes_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(&dir);
        let review = ReviewFlow::new(Arc::new(HeuristicGrader::new()));
        let catalog = catalog(true);
        let submitted = record(
            &catalog,
            vec![
                Answer::Choice(1),
                Answer::Text("A closure captures variables from its environment".to_string()),
            ],
        );

        let evaluation = review_submission(&review, &catalog, &writer, &submitted)
            .await
            .unwrap();
        assert_eq!(evaluation.submission_id, submitted.id);
        assert_eq!(evaluation.per_question.len(), 1);

        let content = tokio::fs::read_to_string(writer.evaluations_path())
            .await
            .unwrap();
        let saved: SubjectiveEvaluation = serde_json::from_str(content.trim_end()).unwrap();
        assert_eq!(saved, evaluation);
    }

    #[tokio::test]
    async fn test_objective_only_submission_skips_review() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer(&dir);
        let review = ReviewFlow::new(Arc::new(HeuristicGrader::new()));
        let catalog = catalog(false);
        let submitted = record(&catalog, vec![Answer::Choice(1)]);

        assert!(review_submission(&review, &catalog, &writer, &submitted)
            .await
            .is_none());
        assert!(!writer.evaluations_path().exists());
    }
}
