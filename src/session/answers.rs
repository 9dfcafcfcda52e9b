//! 作答存储
//!
//! 题号到答案的映射，只有在会话进行中（打开状态）时可写。

use crate::error::SessionError;
use crate::models::answer::Answer;
use crate::session::state::SessionState;

/// 题目导航
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Prev,
    Goto(usize),
}

#[derive(Debug, Clone)]
pub struct AnswerStore {
    answers: Vec<Answer>,
    cursor: usize,
    open: bool,
}

impl AnswerStore {
    pub fn new(catalog_len: usize) -> Self {
        Self {
            answers: vec![Answer::Absent; catalog_len],
            cursor: 0,
            open: false,
        }
    }

    /// 允许写入
    pub fn open(&mut self) {
        self.open = true;
    }

    /// 禁止写入
    pub fn seal(&mut self) {
        self.open = false;
    }

    /// 清空全部作答（绑定新身份时）
    pub fn clear(&mut self) {
        self.answers.iter_mut().for_each(|a| *a = Answer::Absent);
        self.cursor = 0;
        self.open = false;
    }

    /// 写入一题答案，`state` 用于拒绝时的错误信息
    pub fn set(
        &mut self,
        index: usize,
        answer: Answer,
        state: SessionState,
    ) -> Result<(), SessionError> {
        if !self.open {
            return Err(SessionError::NotAcceptingInput { state });
        }
        let total = self.answers.len();
        let slot = self
            .answers
            .get_mut(index)
            .ok_or(SessionError::QuestionOutOfRange { index, total })?;
        *slot = answer;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&Answer> {
        self.answers.get(index)
    }

    /// 移动光标，越界时夹在 [0, len) 内
    pub fn navigate(&mut self, nav: Navigation) -> usize {
        let last = self.answers.len().saturating_sub(1);
        self.cursor = match nav {
            Navigation::Next => (self.cursor + 1).min(last),
            Navigation::Prev => self.cursor.saturating_sub(1),
            Navigation::Goto(index) => index.min(last),
        };
        self.cursor
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_present()).count()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// 每一题都已作答时才可以主动交卷
    pub fn is_complete(&self) -> bool {
        self.answers.iter().all(Answer::is_present)
    }

    /// 当前作答的快照
    pub fn snapshot(&self) -> Vec<Answer> {
        self.answers.clone()
    }
}
