//! 提交记录写入服务 - 业务能力层
//!
//! 只负责"把提交记录和主观题复核结果追加到 JSONL 文件"，不关心流程

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{SubjectiveEvaluation, SubmissionRecord};
use crate::session::runtime::SubmissionSink;

/// JSONL 写入服务
///
/// 每行一个 JSON 对象，只追加不修改。
#[derive(Debug, Clone)]
pub struct SubmissionWriter {
    submissions_path: PathBuf,
    evaluations_path: PathBuf,
}

impl SubmissionWriter {
    pub fn new(submissions_path: impl Into<PathBuf>, evaluations_path: impl Into<PathBuf>) -> Self {
        Self {
            submissions_path: submissions_path.into(),
            evaluations_path: evaluations_path.into(),
        }
    }

    pub fn submissions_path(&self) -> &Path {
        &self.submissions_path
    }

    pub fn evaluations_path(&self) -> &Path {
        &self.evaluations_path
    }

    /// 追加一条提交记录
    pub async fn write_submission(&self, record: &SubmissionRecord) -> AppResult<()> {
        debug!(
            "写入提交记录: {} | {}",
            record.id, record.identity.email_key
        );
        append_line(&self.submissions_path, record).await?;
        info!("💾 提交记录已保存至 {}", self.submissions_path.display());
        Ok(())
    }

    /// 追加一条主观题复核结果，原提交记录不变
    pub async fn write_evaluation(&self, evaluation: &SubjectiveEvaluation) -> AppResult<()> {
        debug!("写入复核结果: {}", evaluation.submission_id);
        append_line(&self.evaluations_path, evaluation).await?;
        info!("💾 复核结果已保存至 {}", self.evaluations_path.display());
        Ok(())
    }
}

async fn append_line<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

    file.write_all(line.as_bytes())
        .await
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;
    file.flush()
        .await
        .map_err(|e| AppError::file_write_failed(path.display().to_string(), e))?;

    Ok(())
}

#[async_trait]
impl SubmissionSink for SubmissionWriter {
    async fn deliver(&self, record: &SubmissionRecord) -> AppResult<()> {
        self.write_submission(record).await
    }
}

/// 内存中的提交记录，用于脱机演示和测试
#[derive(Debug, Default)]
pub struct InMemorySubmissions {
    records: Mutex<Vec<SubmissionRecord>>,
}

impl InMemorySubmissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SubmissionRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SubmissionSink for InMemorySubmissions {
    async fn deliver(&self, record: &SubmissionRecord) -> AppResult<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }
}
