//! 错误处理模块

use thiserror::Error;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum Error {
    /// 初始化错误
    #[error("初始化失败: {0}")]
    Initialization(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 工具入参校验错误，在任何网络调用之前抛出
    #[error("参数校验失败: {0}")]
    Validation(String),

    /// 连接错误：端点解析失败、连接被拒绝或请求超时
    #[error("无法连接 Dash API: {0}")]
    Connectivity(String),

    /// 上游错误：Dash API 返回了错误状态或无法解析的响应体
    #[error("Dash API 响应异常: {message}")]
    Upstream {
        /// 上游返回的 HTTP 状态码（若有）
        status: Option<u16>,
        /// 上游返回的错误消息
        message: String,
    },

    /// MCP 协议错误
    #[error("MCP 协议错误: {0}")]
    Mcp(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// URL 解析错误
    #[error("URL 解析错误: {0}")]
    Url(#[from] url::ParseError),

    /// 其他错误
    #[error("未知错误: {0}")]
    Other(String),
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// 构造上游错误，状态码会拼入消息便于直接展示
    #[must_use]
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = match status {
            Some(code) => format!("HTTP {code}: {message}"),
            None => message,
        };
        Error::Upstream { status, message }
    }

    /// 转换为 MCP 工具调用错误
    #[must_use]
    pub fn into_call_error(self) -> rust_mcp_sdk::schema::CallToolError {
        rust_mcp_sdk::schema::CallToolError::from_message(self.to_string())
    }
}

/// 超时和连接失败映射为连接错误，其余请求阶段的失败映射为上游错误
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            Error::Connectivity(err.to_string())
        } else if err.is_decode() {
            Error::upstream(
                err.status().map(|s| s.as_u16()),
                format!("响应体解析失败: {err}"),
            )
        } else {
            Error::Connectivity(err.to_string())
        }
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}
