//! 服务器模块
//!
//! 提供 MCP 服务器的实现，支持多种传输协议。

pub mod handler;
pub mod transport;

use crate::config::{LoggingConfig, UpstreamConfig};
use crate::error::Result;
use crate::tools::ToolRegistry;
use crate::upstream::DashService;
use rust_mcp_sdk::schema::{
    Icon, IconTheme, Implementation, InitializeResult, ProtocolVersion, ServerCapabilities,
    ServerCapabilitiesTools,
};
use std::sync::Arc;
use url::Url;

/// 服务器配置
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct ServerConfig {
    /// 服务器名称
    pub name: String,

    /// 服务器版本
    pub version: String,

    /// 服务器描述
    pub description: Option<String>,

    /// 服务器图标
    pub icons: Vec<Icon>,

    /// 网站 URL
    pub website_url: Option<String>,

    /// 主机地址
    pub host: String,

    /// 端口
    pub port: u16,

    /// 传输模式
    pub transport_mode: String,

    /// 启用 SSE 支持
    pub enable_sse: bool,

    /// 最大并发连接数
    pub max_connections: usize,

    /// 上游 Dash API 配置
    pub upstream: UpstreamConfig,

    /// 日志配置
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "dash-docs".to_string(),
            version: crate::VERSION.to_string(),
            description: Some("Dash 文档浏览器 MCP 适配服务器".to_string()),
            icons: vec![
                Icon {
                    src: "https://kapeli.com/favicon.ico".to_string(),
                    mime_type: Some("image/x-icon".to_string()),
                    sizes: vec!["32x32".to_string()],
                    theme: Some(IconTheme::Light),
                },
                Icon {
                    src: "https://kapeli.com/favicon.ico".to_string(),
                    mime_type: Some("image/x-icon".to_string()),
                    sizes: vec!["32x32".to_string()],
                    theme: Some(IconTheme::Dark),
                },
            ],
            website_url: Some("https://kapeli.com/dash".to_string()),
            host: "127.0.0.1".to_string(),
            port: 8080,
            transport_mode: "stdio".to_string(),
            enable_sse: true,
            max_connections: 100,
            upstream: UpstreamConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// MCP 服务器
#[derive(Clone)]
pub struct DashDocsServer {
    config: ServerConfig,
    tool_registry: Arc<ToolRegistry>,
    service: Arc<DashService>,
}

impl DashDocsServer {
    /// 创建新的服务器实例
    pub fn new(config: ServerConfig) -> Result<Self> {
        let service = Arc::new(DashService::new(config.upstream.clone())?);
        let tool_registry = Arc::new(crate::tools::create_default_registry(&service));

        Ok(Self {
            config,
            tool_registry,
            service,
        })
    }

    /// 获取服务器配置
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// 获取工具注册器
    #[must_use]
    pub fn tool_registry(&self) -> &Arc<ToolRegistry> {
        &self.tool_registry
    }

    /// 获取上游服务
    #[must_use]
    pub fn service(&self) -> &Arc<DashService> {
        &self.service
    }

    /// 启动前确认上游可达。解析过程本身以一次成功的健康检查收尾，
    /// 这里不再额外发请求；失败时调用方应拒绝进入服务状态
    pub async fn ensure_upstream(&self) -> Result<Url> {
        self.service.resolver().resolve().await
    }

    /// 获取服务器信息
    #[must_use]
    pub fn server_info(&self) -> InitializeResult {
        InitializeResult {
            server_info: Implementation {
                name: self.config.name.clone(),
                version: self.config.version.clone(),
                title: Some("Dash Docs MCP Server".to_string()),
                description: self.config.description.clone(),
                icons: self.config.icons.clone(),
                website_url: self.config.website_url.clone(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ServerCapabilitiesTools { list_changed: None }),
                resources: None,
                prompts: None,
                experimental: None,
                completions: None,
                logging: None,
                tasks: None,
            },
            protocol_version: ProtocolVersion::V2025_11_25.into(),
            instructions: Some(
                "使用此服务器查询 Dash 本地文档。支持列出已安装的 docset、搜索文档和启用全文搜索。"
                    .to_string(),
            ),
            meta: None,
        }
    }

    /// 运行 Stdio 服务器
    pub async fn run_stdio(&self) -> Result<()> {
        transport::run_stdio_server(self).await
    }

    /// 运行 HTTP 服务器
    pub async fn run_http(&self) -> Result<()> {
        transport::run_http_server(self).await
    }

    /// 运行 SSE 服务器
    pub async fn run_sse(&self) -> Result<()> {
        transport::run_sse_server(self).await
    }
}
