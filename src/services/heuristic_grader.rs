//! 离线启发式评分
//!
//! 按作答长度分档，长答案再看是否命中题目话题的关键词。
//! 不需要网络，适合没有 LLM 的场景。

use async_trait::async_trait;
use phf::phf_map;
use tracing::debug;

use super::grader::{GradeRequest, GradeResult, Grader};
use crate::error::GraderError;

/// 话题 → 关键词
static TOPIC_KEYWORDS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "closure" => &["closure", "scope", "lexical", "function", "variable", "encapsulation"],
    "database" => &["sql", "nosql", "relational", "document", "acid", "consistency", "scalability"],
    "javascript" => &["javascript", "js", "function", "variable", "object", "prototype"],
    "api" => &["api", "rest", "http", "endpoint", "request", "response"],
};

/// 话题检查顺序
const TOPIC_ORDER: [&str; 4] = ["closure", "database", "javascript", "api"];

/// 至少命中的关键词数
const MIN_KEYWORD_HITS: usize = 2;

const BRIEF_LIMIT: usize = 50;
const PARTIAL_LIMIT: usize = 150;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicGrader;

impl HeuristicGrader {
    pub fn new() -> Self {
        Self
    }

    /// 给单道题打分
    pub fn grade(&self, request: &GradeRequest) -> GradeResult {
        let max = f64::from(request.max_points);
        let length = request.answer_text.chars().count();
        let mut suggestions = Vec::new();

        let (score, feedback) = if length < BRIEF_LIMIT {
            suggestions.push("Provide more comprehensive explanation".to_string());
            suggestions.push("Include specific examples".to_string());
            (
                (max * 0.3).min(1.0),
                "Answer is too brief. More detailed explanation needed.",
            )
        } else if length < PARTIAL_LIMIT {
            suggestions.push("Expand on key concepts".to_string());
            (
                (max * 0.6).min(2.0),
                "Good attempt but could be more detailed.",
            )
        } else if has_keywords(&request.prompt, &request.answer_text) {
            (max, "Excellent comprehensive answer with good understanding.")
        } else {
            suggestions.push("Include more technical terminology".to_string());
            (
                (max * 0.8).min(2.5),
                "Good length but missing some key concepts.",
            )
        };

        GradeResult {
            score: round_one_decimal(score),
            feedback: feedback.to_string(),
            suggestions,
        }
    }
}

/// 只看第一个出现在题干里的话题
fn has_keywords(prompt: &str, answer: &str) -> bool {
    let prompt = prompt.to_lowercase();
    let answer = answer.to_lowercase();

    TOPIC_ORDER
        .iter()
        .find(|topic| prompt.contains(*topic))
        .and_then(|topic| TOPIC_KEYWORDS.get(*topic))
        .map(|keywords| {
            keywords.iter().filter(|k| answer.contains(**k)).count() >= MIN_KEYWORD_HITS
        })
        .unwrap_or(false)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[async_trait]
impl Grader for HeuristicGrader {
    async fn evaluate_batch(
        &self,
        requests: &[GradeRequest],
    ) -> Result<Vec<GradeResult>, GraderError> {
        debug!("启发式评分 {} 道主观题", requests.len());
        Ok(requests.iter().map(|r| self.grade(r)).collect())
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
