//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责把资源和流程组装起来，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用
//! - 管理应用生命周期（初始化、运行、收尾）
//! - 管理浏览器资源（Browser、JsExecutor）
//! - 驱动一场考试会话，交卷后启动主观题复核
//!
//! ### `console` - 终端命令
//! - 解析考生输入的命令
//! - 题目展示
//!
//! ## 层次关系
//!
//! ```text
//! app (终端命令 → SessionHandle)
//!     ↓
//! session (单写者状态机 + 运行时)
//!     ↓
//! environment / services (全屏与信号 / 注册表、评分、写入)
//!     ↓
//! infrastructure (基础设施：JsExecutor)
//! ```

pub mod app;
pub mod console;

// 重新导出主要类型
pub use app::App;
pub use console::{parse_command, ConsoleCommand};
