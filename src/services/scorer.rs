//! 客观题评分 - 业务能力层
//!
//! 纯函数：给定试卷和作答，计算客观题得分。没有 I/O，结果在交卷时冻结。

use crate::models::{Answer, Catalog, CorrectAnswer, ObjectiveScore, Question, QuestionKind};

/// 计算客观题得分
///
/// 百分比的分母是全部题目的总分（包括主观题），主观题在这里记 0 分并列入待评。
pub fn score_objective(catalog: &Catalog, answers: &[Answer]) -> ObjectiveScore {
    let mut awarded_points = 0;
    let mut pending_subjective = Vec::new();

    for (index, question) in catalog.questions.iter().enumerate() {
        if question.kind == QuestionKind::Subjective {
            pending_subjective.push(index);
            continue;
        }
        let answer = answers.get(index).unwrap_or(&Answer::Absent);
        if is_correct(question, answer) {
            awarded_points += question.points;
        }
    }

    let total_points = catalog.total_points();
    ObjectiveScore {
        awarded_points,
        total_points,
        percentage: percentage(f64::from(awarded_points), total_points),
        pending_subjective,
    }
}

/// 判断一道客观题是否答对
pub fn is_correct(question: &Question, answer: &Answer) -> bool {
    match (question.kind, &question.correct_answer, answer) {
        (
            QuestionKind::MultipleChoice,
            Some(CorrectAnswer::Choice(expected)),
            Answer::Choice(given),
        ) => expected == given,
        (QuestionKind::FillBlank, Some(CorrectAnswer::Text(expected)), Answer::Text(given)) => {
            normalize(expected) == normalize(given)
        }
        _ => false,
    }
}

/// 百分比，总分为 0 时返回 0
pub fn percentage(points: f64, total_points: u32) -> f64 {
    if total_points == 0 {
        return 0.0;
    }
    100.0 * points / f64::from(total_points)
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
