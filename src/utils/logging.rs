use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::models::{SubjectiveEvaluation, SubmissionRecord};
use crate::session::format_seconds;

/// 初始化 tracing
///
/// `RUST_LOG` 优先，否则 `verbose` 时为 debug，默认 info。重复调用无副作用。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n考试会话日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 向日志文件追加一行
pub fn append_log_line(log_file_path: &str, line: &str) -> Result<()> {
    use std::io::Write;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)?;
    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%H:%M:%S"),
        line
    )?;
    Ok(())
}

/// 记录程序启动信息
///
/// # 参数
/// - `catalog_name`: 题库名称
/// - `questions`: 题目数量
/// - `duration_seconds`: 考试时长
pub fn log_startup(catalog_name: &str, questions: usize, duration_seconds: u64) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 监考考试模式");
    info!("📋 题库: {} | {} 道题", catalog_name, questions);
    info!("⏱️ 考试时长: {}", format_seconds(duration_seconds));
    info!("{}", "=".repeat(60));
}

/// 打印交卷统计
pub fn print_submission_summary(record: &SubmissionRecord, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 交卷统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("👤 考生: {}", record.identity);
    info!("📌 交卷方式: {}", record.trigger);
    info!(
        "✅ 客观题得分: {}/{} ({:.1}%)",
        record.objective.awarded_points, record.objective.total_points, record.objective.percentage
    );
    if !record.objective.pending_subjective.is_empty() {
        info!(
            "📝 待复核主观题: {} 道",
            record.objective.pending_subjective.len()
        );
    }
    info!(
        "⚠️ 切换标签页: {} 次 | 退出全屏: {} 次",
        record.tab_switch_count, record.fullscreen_exit_count
    );
    info!("⏱️ 剩余时间: {}", format_seconds(record.time_remaining_seconds));
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 打印主观题复核结果
pub fn print_evaluation_summary(evaluation: &SubjectiveEvaluation) {
    info!("\n{}", "─".repeat(60));
    info!("📝 主观题复核");
    for grade in &evaluation.per_question {
        info!(
            "  第 {} 题: {:.1}/{} - {}",
            grade.index + 1,
            grade.score,
            grade.max_points,
            truncate_text(&grade.feedback, 60)
        );
    }
    info!("✓ 修订后得分: {:.1}%", evaluation.revised_percentage);
    info!("{}", "─".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
