use thiserror::Error;

use crate::session::state::SessionState;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 会话状态机拒绝的操作
    #[error("会话错误: {0}")]
    Session(#[from] SessionError),
    /// 考试环境（浏览器 / 全屏）相关错误
    #[error("环境错误: {0}")]
    Environment(#[from] EnvironmentError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 主观题评分服务错误
    #[error("评分错误: {0}")]
    Grader(#[from] GraderError),
    /// 题库错误
    #[error("题库错误: {0}")]
    Catalog(#[from] CatalogError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 会话守卫错误
///
/// 所有变体都不改变会话状态，调用方可以修正后重试原操作。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// 邮箱已经参加过考试
    #[error("邮箱 {email_key} 已经使用过，每个邮箱只能参加一次考试")]
    DuplicateIdentity { email_key: String },
    /// 身份信息不合法
    #[error("身份信息不合法: {reason}")]
    InvalidIdentity { reason: String },
    /// 考试开始后不能更换身份
    #[error("考试已开始，不能更换身份")]
    IdentityLocked,
    /// 尚未绑定身份
    #[error("尚未确认考生身份")]
    NotArmed,
    /// 开考请求正在处理
    #[error("开考请求正在处理中")]
    StartPending,
    /// 考生拒绝进入全屏
    #[error("考生拒绝进入全屏，无法开始考试")]
    FullscreenDenied,
    /// 环境无法建立全屏监考前提
    #[error("无法建立全屏监考环境: {reason}")]
    FullscreenUnavailable { reason: String },
    /// 还有题目未作答
    #[error("还有题目未作答 ({answered}/{total})")]
    Incomplete { answered: usize, total: usize },
    /// 当前状态不接受作答
    #[error("会话当前状态 {state:?} 不接受输入")]
    NotAcceptingInput { state: SessionState },
    /// 题号超出范围
    #[error("题号 {index} 超出范围 [0, {total})")]
    QuestionOutOfRange { index: usize, total: usize },
    /// 答案类型与题型不符
    #[error("第 {index} 题的答案类型不匹配: {reason}")]
    AnswerMismatch { index: usize, reason: String },
    /// 正在等待确认，不能提交
    #[error("正在等待考生确认是否退出")]
    ConfirmationPending,
    /// 没有待确认的提示
    #[error("当前没有待确认的提示")]
    NothingToConfirm,
    /// 注册表写入失败
    #[error("邮箱注册表写入失败: {reason}")]
    RegistryUnavailable { reason: String },
    /// 会话任务已经结束
    #[error("会话已关闭")]
    Closed,
}

/// 考试环境错误
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 主观题评分错误
#[derive(Debug, Error)]
pub enum GraderError {
    /// 评分服务不可用（可重试）
    #[error("评分服务不可用 (已尝试 {attempts} 次): {reason}")]
    Unavailable { attempts: usize, reason: String },
    /// 返回内容无法解析
    #[error("无法解析评分结果 (响应: {response}): {reason}")]
    MalformedResponse { response: String, reason: String },
    /// 返回的结果数量与请求不一致
    #[error("评分结果数量 {actual} 与请求数量 {expected} 不一致")]
    ResultCountMismatch { expected: usize, actual: usize },
}

impl GraderError {
    /// 是否可以由调用方重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GraderError::Unavailable { .. } | GraderError::MalformedResponse { .. }
        )
    }
}

/// 题库错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// 题库为空
    #[error("题库 {name} 中没有题目")]
    Empty { name: String },
    /// 分值不合法
    #[error("第 {index} 题的分值必须大于 0")]
    InvalidPoints { index: usize },
    /// 题目定义不合法
    #[error("第 {index} 题定义不合法: {reason}")]
    InvalidQuestion { index: usize, reason: String },
    /// 考试时长不合法
    #[error("考试时长必须大于 0 分钟")]
    InvalidDuration,
}

/// 配置错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// 环境变量取值不合法
    #[error("环境变量 {var_name} 的值 '{value}' 不合法: 期望 {expected}")]
    InvalidValue {
        var_name: String,
        value: String,
        expected: String,
    },
    /// 缺少必要配置
    #[error("缺少必要配置 {var_name}")]
    Missing { var_name: String },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON 处理失败: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Environment(EnvironmentError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grader_error_retryable() {
        let err = GraderError::Unavailable {
            attempts: 3,
            reason: "timeout".to_string(),
        };
        assert!(err.is_retryable());

        let err = GraderError::ResultCountMismatch {
            expected: 2,
            actual: 1,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_session_error_wraps_into_app_error() {
        let err: AppError = SessionError::DuplicateIdentity {
            email_key: "a@x.com".to_string(),
        }
        .into();
        assert!(err.to_string().contains("a@x.com"));
    }
}
