//! 主观题复核流程 - 流程层
//!
//! 核心职责：交卷之后，为一份提交记录的全部主观题打分
//!
//! 流程顺序：
//! 1. 按题目顺序收集主观题作答（未作答按空文本）
//! 2. 调用一次评分器
//! 3. 计算修订后的百分比，单独生成复核结果
//!
//! 提交记录本身保持不变，复核结果另行保存。

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::GraderError;
use crate::models::{Answer, Catalog, QuestionGrade, SubjectiveEvaluation, SubmissionRecord};
use crate::services::grader::{GradeRequest, Grader};
use crate::services::scorer;

/// 主观题复核流程
///
/// - 不持有任何会话状态
/// - 只依赖评分能力（services）
pub struct ReviewFlow {
    grader: Arc<dyn Grader>,
}

impl ReviewFlow {
    pub fn new(grader: Arc<dyn Grader>) -> Self {
        Self { grader }
    }

    pub fn grader_name(&self) -> &str {
        self.grader.name()
    }

    /// 复核一份提交记录
    pub async fn review(
        &self,
        catalog: &Catalog,
        record: &SubmissionRecord,
    ) -> Result<SubjectiveEvaluation, GraderError> {
        let indices = catalog.subjective_indices();

        let requests: Vec<GradeRequest> = indices
            .iter()
            .filter_map(|&index| catalog.question(index).map(|q| (index, q)))
            .map(|(index, question)| GradeRequest {
                prompt: question.prompt.clone(),
                answer_text: record
                    .answers
                    .get(index)
                    .and_then(Answer::as_text)
                    .unwrap_or_default()
                    .to_string(),
                max_points: question.points,
            })
            .collect();

        info!(
            "📝 开始复核 {} 的 {} 道主观题 (评分器: {})",
            record.identity.email_key,
            requests.len(),
            self.grader.name()
        );

        let results = if requests.is_empty() {
            Vec::new()
        } else {
            self.grader.evaluate_batch(&requests).await.map_err(|e| {
                warn!("⚠️ 主观题评分失败: {}", e);
                e
            })?
        };

        if results.len() != requests.len() {
            return Err(GraderError::ResultCountMismatch {
                expected: requests.len(),
                actual: results.len(),
            });
        }

        let per_question: Vec<QuestionGrade> = indices
            .iter()
            .zip(requests.iter())
            .zip(results)
            .map(|((&index, request), result)| {
                let result = result.clamped(request.max_points);
                QuestionGrade {
                    index,
                    score: result.score,
                    max_points: request.max_points,
                    feedback: result.feedback,
                    suggestions: result.suggestions,
                }
            })
            .collect();

        let subjective_points: f64 = per_question.iter().map(|g| g.score).sum();
        let revised_percentage = scorer::percentage(
            f64::from(record.objective.awarded_points) + subjective_points,
            record.objective.total_points,
        );

        info!(
            "✅ 复核完成: 主观题得分 {:.1} | 修订后 {:.1}% (原 {:.1}%)",
            subjective_points, revised_percentage, record.objective.percentage
        );

        Ok(SubjectiveEvaluation {
            submission_id: record.id,
            per_question,
            subjective_points,
            revised_percentage,
            evaluated_at: chrono::Utc::now(),
        })
    }
}
