use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 资源上传错误
    #[error("上传错误: {0}")]
    Upload(#[from] UploadError),
    /// 进度流错误
    #[error("进度流错误: {0}")]
    Stream(#[from] StreamError),
    /// 试卷配置校验错误
    #[error("校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 评测准备状态错误
    #[error("准备状态错误: {0}")]
    Setup(#[from] SetupError),
    /// 页面切换错误
    #[error("页面切换错误: {0}")]
    Router(#[from] RouterError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 操作被取消
    #[error("操作已取消")]
    Cancelled,
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// API 返回错误状态码
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message:?}")]
    BadResponse {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },
    /// 登录失效
    #[error("登录已失效 ({endpoint})")]
    Unauthorized { endpoint: String },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// 资源上传错误
#[derive(Debug, Error)]
pub enum UploadError {
    /// 没有可上传的文件
    #[error("没有可上传的文件")]
    EmptyBatch,
    /// 文件类型无法识别
    #[error("无效的文件类型 ({filename}): {mime}")]
    InvalidMime { filename: String, mime: String },
    /// 后端未返回任何资源
    #[error("上传完成但未返回任何资源ID")]
    NoResourcesReturned,
}

/// 进度流错误
#[derive(Debug, Error)]
pub enum StreamError {
    /// 所有答卷都无法匹配到文档ID
    #[error("无法为任何答卷解析文档ID (会话: {session_id})")]
    NoDocumentsResolved { session_id: String },
    /// 读取进度流失败
    #[error("读取进度流失败 (文档: {document_id}): {reason}")]
    ReadFailed { document_id: String, reason: String },
    /// 没有需要评测的文件
    #[error("没有需要评测的答卷")]
    NoFiles,
}

/// 试卷配置校验错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// 任选题分值不一致
    #[error("{part}: 任选 {required} 题时所有题目分值必须相同")]
    Uniformity { part: String, required: u32 },
    /// 任选题总分不匹配
    #[error("{part}: 每题 {per_question} 分 × 任选 {required} 题 = {actual}，与总分 {total} 不符")]
    ChooseAnyTotal {
        part: String,
        per_question: u32,
        required: u32,
        actual: u32,
        total: u32,
    },
    /// 题目分值之和与总分不符
    #[error("{part}: 题目分值之和 {sum} 与总分 {total} 不符")]
    SumMismatch { part: String, sum: u32, total: u32 },
    /// 小题模式下不能直接修改分值
    #[error("题目 {label} 的分值由小题汇总，不能直接修改")]
    MarksDerived { label: String },
    /// 索引超出范围
    #[error("索引 {index} 超出范围 [0, {len})")]
    IndexOutOfRange { index: usize, len: usize },
    /// 试卷配置为空
    #[error("试卷配置为空")]
    EmptyConfig,
}

/// 评测准备状态错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    /// 答卷数量已达上限
    #[error("最多只能上传 {limit} 份答卷，剩余名额 {remaining}")]
    FileLimitReached { limit: usize, remaining: usize },
    /// 正在处理中，不能重复开始
    #[error("正在处理中，请勿重复操作")]
    AlreadyProcessing,
    /// 当前不在处理状态
    #[error("当前没有正在进行的处理")]
    NotProcessing,
    /// 前置步骤未完成
    #[error("前置步骤未完成: {step}")]
    StepLocked { step: String },
    /// 答卷不存在
    #[error("答卷不存在: {resource_id}")]
    UnknownFile { resource_id: String },
}

/// 页面切换错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// 不允许的页面切换
    #[error("不允许从 {from} 执行 {action}")]
    InvalidTransition { from: String, action: String },
    /// 仍有答卷未完成评测
    #[error("仍有答卷未完成评测")]
    RunNotSettled,
    /// 历史记录不存在
    #[error("历史记录不存在: {id}")]
    UnknownHistory { id: String },
    /// 进度快照不属于当前评测
    #[error("进度属于第 {actual} 次评测，当前是第 {expected} 次")]
    StaleRun { expected: u64, actual: u64 },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 模板解析失败
    #[error("模板解析失败 ({path}): {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 不支持的文件格式
    #[error("不支持的文件格式: {path}")]
    UnsupportedFormat { path: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置项为空
    #[error("配置项 {name} 不能为空")]
    Missing { name: String },
    /// 配置项取值无效
    #[error("配置项 {name} 的值 '{value}' 无效")]
    Invalid { name: String, value: String },
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        AppError::Api(ApiError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::ParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
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

    /// 创建进度流读取错误
    pub fn stream_read_failed(document_id: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Stream(StreamError::ReadFailed {
            document_id: document_id.into(),
            reason: reason.into(),
        })
    }

    /// 是否为取消导致的错误
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
