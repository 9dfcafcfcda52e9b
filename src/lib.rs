//! # Proctored Exam
//!
//! 一个带监考的限时考试会话控制器
//!
//! ## 架构设计
//!
//! 本系统采用分层架构，会话状态只有一个写入者：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//!
//! ### ② 环境层（Environment）
//! - `environment/` - 全屏请求与环境信号，只产生事件
//! - `BrowserEnvironment` / `BrowserProbe` - 真实考试页面
//! - `ScriptedEnvironment` / `ChannelSignalSource` - 脱机模式与测试
//!
//! ### ③ 会话层（Session）
//! - `session/` - 倒计时、完整性监控、作答存储
//! - `SessionController` - 纯状态机，所有状态迁移的唯一入口
//! - `SessionHandle` - 运行时的异步句柄
//!
//! ### ④ 业务能力层（Services）
//! - `services/` - 评分、邮箱注册表、提交写入、主观题评分器
//!
//! ### ⑤ 流程层（Workflow）
//! - `workflow/` - 交卷后的主观题复核
//!
//! ### ⑥ 编排层（Orchestration）
//! - `orchestrator/app` - 组装资源，把终端命令交给会话
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod environment;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod session;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::connect_to_exam_page;
pub use config::Config;
pub use error::{AppError, AppResult, SessionError};
pub use infrastructure::JsExecutor;
pub use models::{Answer, Catalog, Identity, Question, SubmissionRecord, SubmitTrigger};
pub use orchestrator::App;
pub use session::{spawn_session, SessionController, SessionHandle, SessionServices, SessionState};
pub use workflow::ReviewFlow;
