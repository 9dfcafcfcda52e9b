use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::SessionError;

/// 考生身份
///
/// `email_key` 是自然主键，统一去空白并转为小写。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub display_name: String,
    pub email_key: String,
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("邮箱正则无效"))
}

impl Identity {
    /// 校验并规范化考生输入的姓名和邮箱
    pub fn new(display_name: &str, email: &str) -> Result<Self, SessionError> {
        let display_name = display_name.trim();
        let email_key = email.trim().to_lowercase();

        if display_name.is_empty() || email_key.is_empty() {
            return Err(SessionError::InvalidIdentity {
                reason: "姓名和邮箱都不能为空".to_string(),
            });
        }
        if !email_pattern().is_match(&email_key) {
            return Err(SessionError::InvalidIdentity {
                reason: format!("邮箱格式不正确: {}", email_key),
            });
        }

        Ok(Self {
            display_name: display_name.to_string(),
            email_key,
        })
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.display_name, self.email_key)
    }
}
