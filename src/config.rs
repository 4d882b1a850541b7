use crate::error::{AppResult, ConfigError};

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 评测后端地址
    pub api_base_url: String,
    /// 访问令牌（为空时不携带 Authorization 头）
    pub api_token: String,
    /// 评测会话ID
    pub session_id: String,
    /// 单次评测最多可上传的答卷数量
    pub max_answer_files: usize,
    /// 普通请求超时（秒），进度流不受此限制
    pub request_timeout_secs: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 本地试卷配置模板路径（.toml / .json）
    pub paper_template_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            api_token: String::new(),
            session_id: String::new(),
            max_answer_files: 10,
            request_timeout_secs: 60,
            verbose_logging: false,
            paper_template_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            api_base_url: std::env::var("EVAL_API_BASE_URL").unwrap_or(default.api_base_url),
            api_token: std::env::var("EVAL_API_TOKEN").unwrap_or(default.api_token),
            session_id: std::env::var("EVAL_SESSION_ID").unwrap_or(default.session_id),
            max_answer_files: std::env::var("MAX_ANSWER_FILES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_answer_files),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            paper_template_path: std::env::var("PAPER_TEMPLATE_PATH").ok().filter(|v| !v.is_empty()),
        }
    }

    /// 检查必填项
    pub fn validate(&self) -> AppResult<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Missing {
                name: "EVAL_API_BASE_URL".to_string(),
            }
            .into());
        }
        if self.max_answer_files == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_ANSWER_FILES".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
