//! 主观题评分能力
//!
//! 只负责"给一批主观题作答打分"，不关心提交记录和流程

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GraderError;

/// 一道主观题的评分请求
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRequest {
    pub prompt: String,
    pub answer_text: String,
    pub max_points: u32,
}

/// 一道主观题的评分结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeResult {
    pub score: f64,
    pub feedback: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl GradeResult {
    /// 分数夹在 [0, max_points] 内
    pub fn clamped(mut self, max_points: u32) -> Self {
        self.score = if self.score.is_finite() {
            self.score.clamp(0.0, f64::from(max_points))
        } else {
            0.0
        };
        self
    }
}

/// 评分器
///
/// 结果与请求一一对应、顺序一致。
#[async_trait]
pub trait Grader: Send + Sync {
    async fn evaluate_batch(
        &self,
        requests: &[GradeRequest],
    ) -> Result<Vec<GradeResult>, GraderError>;

    /// 用于日志的名称
    fn name(&self) -> &str;
}
