use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 查询内容为空
    #[error("查询内容不能为空")]
    EmptyQuery,
    /// 任务不存在（未知 ID 或已被淘汰）
    #[error("任务不存在: {job_id}")]
    JobNotFound { job_id: String },
    /// 任务 ID 冲突
    #[error("任务已存在: {job_id}")]
    JobAlreadyExists { job_id: String },
    /// 外部服务错误
    #[error("外部服务错误: {0}")]
    Gateway(#[from] GatewayError),
    /// 结果缓存错误
    #[error("缓存错误: {0}")]
    Cache(#[from] CacheError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 外部服务（搜索 / 语义搜索 / 摘要）调用错误
///
/// 任何一种都会让当前阶段进入 `error`，调用方只会看到 `failed`
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 网络错误或超时
    #[error("外部服务不可用 ({endpoint}): {reason}")]
    Unavailable { endpoint: String, reason: String },
    /// 外部服务返回非成功状态
    #[error("外部服务拒绝请求 ({endpoint}): status={status:?}, message={message:?}")]
    Rejected {
        endpoint: String,
        status: Option<u16>,
        message: Option<String>,
    },
    /// 返回内容缺少必要字段或无法解析
    #[error("响应格式错误 ({endpoint}): {reason}")]
    MalformedResponse { endpoint: String, reason: String },
}

/// 结果缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    /// 只有全部阶段完成的任务才能写入缓存
    #[error("任务 {job_id} 尚未全部完成，不能写入缓存")]
    IncompleteRecord { job_id: String },
    /// 读写缓存文件失败
    #[error("缓存文件读写失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 序列化 / 反序列化失败
    #[error("缓存记录编解码失败: {0}")]
    Codec(#[from] serde_json::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 取值不合法
    #[error("配置项 {name} 取值不合法: {value}")]
    InvalidValue { name: String, value: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建任务不存在错误
    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        AppError::JobNotFound {
            job_id: job_id.into(),
        }
    }
}

impl GatewayError {
    /// 创建服务不可用错误
    pub fn unavailable(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        GatewayError::Unavailable {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// 创建拒绝请求错误
    pub fn rejected(endpoint: impl Into<String>, status: Option<u16>, message: Option<String>) -> Self {
        GatewayError::Rejected {
            endpoint: endpoint.into(),
            status,
            message,
        }
    }

    /// 创建响应格式错误
    pub fn malformed(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        GatewayError::MalformedResponse {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// 按 reqwest 错误的种类归类
    ///
    /// - 解码失败 → `MalformedResponse`
    /// - 状态码错误 → `Rejected`
    /// - 连接失败 / 超时等 → `Unavailable`
    pub fn from_reqwest(endpoint: impl Into<String>, err: reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if err.is_decode() {
            GatewayError::malformed(endpoint, err)
        } else if let Some(status) = err.status() {
            GatewayError::rejected(endpoint, Some(status.as_u16()), Some(err.to_string()))
        } else {
            GatewayError::unavailable(endpoint, err)
        }
    }

    /// 错误种类的简短名称（用于日志）
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Unavailable { .. } => "GatewayUnavailable",
            GatewayError::Rejected { .. } => "GatewayRejected",
            GatewayError::MalformedResponse { .. } => "MalformedResponse",
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 外部服务调用结果类型
pub type GatewayResult<T> = Result<T, GatewayError>;
