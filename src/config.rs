use std::time::Duration;

use crate::error::ConfigError;

/// 考试环境模式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvironmentMode {
    /// 连接到已打开调试端口的浏览器
    Browser,
    /// 不连接浏览器，全屏总是成功，适合终端演示
    Detached,
}

impl std::str::FromStr for EnvironmentMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "browser" => Ok(EnvironmentMode::Browser),
            "detached" => Ok(EnvironmentMode::Detached),
            _ => Err(()),
        }
    }
}

/// 主观题评分方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraderMode {
    Llm,
    Heuristic,
    Off,
}

impl std::str::FromStr for GraderMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(GraderMode::Llm),
            "heuristic" => Ok(GraderMode::Heuristic),
            "off" => Ok(GraderMode::Off),
            _ => Err(()),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 题库 TOML 文件，或存放 TOML 文件的目录
    pub catalog_path: String,
    /// 覆盖题库中的考试时长（分钟）
    pub exam_duration_minutes: Option<u32>,
    /// 等待确认时是否暂停倒计时
    pub pause_clock_during_interruption: bool,
    /// 连续重新进入全屏失败多少次后通知监考人员
    pub max_reentry_failures: u32,
    pub environment_mode: EnvironmentMode,
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 考试页面 URL
    pub target_url: String,
    /// 页面状态轮询间隔（毫秒）
    pub probe_interval_ms: u64,
    /// 已用邮箱注册表
    pub registry_file: String,
    /// 提交记录（JSONL）
    pub submissions_file: String,
    /// 主观题复核结果（JSONL）
    pub evaluations_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
    // --- 评分配置 ---
    pub grader_mode: GraderMode,
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub llm_max_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: "catalogs".to_string(),
            exam_duration_minutes: None,
            pause_clock_during_interruption: false,
            max_reentry_failures: 3,
            environment_mode: EnvironmentMode::Detached,
            browser_debug_port: 2001,
            target_url: "http://localhost:8080/exam".to_string(),
            probe_interval_ms: 250,
            registry_file: "used_emails.json".to_string(),
            submissions_file: "submissions.jsonl".to_string(),
            evaluations_file: "evaluations.jsonl".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            grader_mode: GraderMode::Heuristic,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_max_attempts: 3,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            catalog_path: std::env::var("CATALOG_PATH").unwrap_or(default.catalog_path),
            exam_duration_minutes: env_parse("EXAM_DURATION_MINUTES")
                .or(default.exam_duration_minutes),
            pause_clock_during_interruption: env_parse("PAUSE_CLOCK_DURING_INTERRUPTION")
                .unwrap_or(default.pause_clock_during_interruption),
            max_reentry_failures: env_parse("MAX_REENTRY_FAILURES")
                .unwrap_or(default.max_reentry_failures),
            environment_mode: env_parse("ENVIRONMENT_MODE").unwrap_or(default.environment_mode),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT")
                .unwrap_or(default.browser_debug_port),
            target_url: std::env::var("TARGET_URL").unwrap_or(default.target_url),
            probe_interval_ms: env_parse("PROBE_INTERVAL_MS").unwrap_or(default.probe_interval_ms),
            registry_file: std::env::var("REGISTRY_FILE").unwrap_or(default.registry_file),
            submissions_file: std::env::var("SUBMISSIONS_FILE").unwrap_or(default.submissions_file),
            evaluations_file: std::env::var("EVALUATIONS_FILE").unwrap_or(default.evaluations_file),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            grader_mode: env_parse("GRADER_MODE").unwrap_or(default.grader_mode),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_max_attempts: env_parse("LLM_MAX_ATTEMPTS").unwrap_or(default.llm_max_attempts),
        }
    }

    /// 检查配置之间的约束
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog_path.trim().is_empty() {
            return Err(ConfigError::Missing {
                var_name: "CATALOG_PATH".to_string(),
            });
        }
        if self.exam_duration_minutes == Some(0) {
            return Err(ConfigError::InvalidValue {
                var_name: "EXAM_DURATION_MINUTES".to_string(),
                value: "0".to_string(),
                expected: "大于 0 的分钟数".to_string(),
            });
        }
        if self.max_reentry_failures == 0 {
            return Err(ConfigError::InvalidValue {
                var_name: "MAX_REENTRY_FAILURES".to_string(),
                value: "0".to_string(),
                expected: "大于 0 的次数".to_string(),
            });
        }
        if self.environment_mode == EnvironmentMode::Browser && self.probe_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                var_name: "PROBE_INTERVAL_MS".to_string(),
                value: "0".to_string(),
                expected: "大于 0 的毫秒数".to_string(),
            });
        }
        if self.grader_mode == GraderMode::Llm && self.llm_api_key.trim().is_empty() {
            return Err(ConfigError::Missing {
                var_name: "LLM_API_KEY".to_string(),
            });
        }
        Ok(())
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}
