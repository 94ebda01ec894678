//! 配置模块

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 应用程序配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[derive(Default)]
pub struct AppConfig {
    /// 服务器配置
    pub server: ServerConfig,

    /// 上游 Dash API 配置
    pub upstream: UpstreamConfig,

    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// 服务器名称
    pub name: String,

    /// 服务器版本
    pub version: String,

    /// 服务器描述
    pub description: Option<String>,

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

    /// 请求超时时间（秒）
    pub request_timeout_secs: u64,

    /// 响应超时时间（秒）
    pub response_timeout_secs: u64,
}

/// 上游 Dash API 配置
///
/// 候选端口、状态文件路径与启动命令都是配置而非硬编码逻辑，
/// 默认值对应 macOS 上 Dash 的常规安装。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// 显式覆盖的 API 基地址。设置后禁用自动发现与进程拉起，
    /// 仅在启动时做一次健康检查。也可通过环境变量 DASH_API_URL 设置
    pub base_url: Option<String>,

    /// 候选端口列表，按优先级探测
    pub candidate_ports: Vec<u16>,

    /// Dash 公布 API 端口的状态文件，其中的端口优先于候选端口
    pub status_file: Option<PathBuf>,

    /// 健康检查超时时间（秒）
    pub health_timeout_secs: u64,

    /// 工具请求超时时间（秒）
    pub request_timeout_secs: u64,

    /// 探测失败时是否尝试拉起 Dash 进程
    pub auto_launch: bool,

    /// 拉起 Dash 的命令
    pub launch_command: Vec<String>,

    /// 启用 Dash API Server 的命令
    pub enable_api_command: Vec<String>,

    /// 拉起后等待应用就绪的时间（秒）
    pub launch_wait_secs: u64,

    /// 探测轮次上限
    pub probe_attempts: u32,

    /// 探测轮次间的初始退避时间（毫秒），逐轮翻倍
    pub probe_backoff_ms: u64,

    /// 整个解析过程的总时限（秒）
    pub resolve_timeout_secs: u64,

    /// 搜索结果数量默认上限
    pub max_results: u32,

    /// 工具响应的 token 预算，超出部分截断
    pub token_limit: usize,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,

    /// 日志文件路径
    pub file_path: Option<String>,

    /// 是否启用控制台日志
    pub enable_console: bool,

    /// 是否启用文件日志
    pub enable_file: bool,

    /// 日志文件最大大小（MB）
    pub max_file_size_mb: u64,

    /// 保留的日志文件数量
    pub max_files: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "dash-docs".to_string(),
            version: crate::VERSION.to_string(),
            description: Some("Dash 文档浏览器 MCP 适配服务器".to_string()),
            host: "127.0.0.1".to_string(),
            port: 8080,
            transport_mode: "stdio".to_string(),
            enable_sse: true,
            max_connections: 100,
            request_timeout_secs: 30,
            response_timeout_secs: 60,
        }
    }
}

/// Dash 状态文件的默认位置
fn default_status_file() -> Option<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join("Library/Application Support/Dash/.dash_api_server/status.json"))
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            candidate_ports: vec![56733],
            status_file: default_status_file(),
            health_timeout_secs: 5,
            request_timeout_secs: 30,
            auto_launch: true,
            launch_command: ["open", "-g", "-j", "-b", "com.kapeli.dashdoc"]
                .map(String::from)
                .to_vec(),
            enable_api_command: ["defaults", "write", "com.kapeli.dashdoc", "DHAPIServerEnabled", "YES"]
                .map(String::from)
                .to_vec(),
            launch_wait_secs: 4,
            probe_attempts: 3,
            probe_backoff_ms: 500,
            resolve_timeout_secs: 30,
            max_results: 100,
            token_limit: 25_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: Some("./logs/dash-docs.log".to_string()),
            enable_console: true,
            enable_file: false,
            max_file_size_mb: 100,
            max_files: 10,
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    ///
    /// # Errors
    ///
    /// 如果文件不存在、无法读取或格式无效，返回错误
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, crate::error::Error> {
        let content = fs::read_to_string(path)
            .map_err(|e| crate::error::Error::Config(format!("读取配置文件失败: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::Error::Config(format!("解析配置文件失败: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    ///
    /// # Errors
    ///
    /// 如果无法序列化配置、创建目录或写入文件，返回错误
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), crate::error::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::Error::Config(format!("序列化配置失败: {e}")))?;

        // 确保目录存在
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .map_err(|e| crate::error::Error::Config(format!("创建目录失败: {e}")))?;
        }

        fs::write(path, content)
            .map_err(|e| crate::error::Error::Config(format!("写入配置文件失败: {e}")))?;

        Ok(())
    }

    /// 验证配置
    ///
    /// # Errors
    ///
    /// 如果配置无效（如空主机名、无效端口等），返回错误
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        // 验证服务器配置
        if self.server.host.is_empty() {
            return Err(crate::error::Error::Config("服务器主机不能为空".to_string()));
        }

        if self.server.port == 0 {
            return Err(crate::error::Error::Config("服务器端口不能为0".to_string()));
        }

        if self.server.max_connections == 0 {
            return Err(crate::error::Error::Config("最大连接数不能为0".to_string()));
        }

        // 验证传输模式
        let valid_modes = ["stdio", "http", "sse", "hybrid"];
        if !valid_modes.contains(&self.server.transport_mode.as_str()) {
            return Err(crate::error::Error::Config(format!(
                "无效的传输模式: {}，有效值: {:?}",
                self.server.transport_mode, valid_modes
            )));
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(crate::error::Error::Config(format!(
                "无效的日志级别: {}，有效值: {:?}",
                self.logging.level, valid_levels
            )));
        }

        // 验证上游配置
        if let Some(base_url) = &self.upstream.base_url {
            url::Url::parse(base_url).map_err(|e| {
                crate::error::Error::Config(format!("无效的覆盖地址 {base_url}: {e}"))
            })?;
        }

        if self.upstream.probe_attempts == 0 {
            return Err(crate::error::Error::Config("探测轮次上限不能为0".to_string()));
        }

        if self.upstream.health_timeout_secs == 0 || self.upstream.request_timeout_secs == 0 {
            return Err(crate::error::Error::Config("超时时间不能为0".to_string()));
        }

        if self.upstream.resolve_timeout_secs < self.upstream.health_timeout_secs {
            return Err(crate::error::Error::Config(
                "解析总时限不能小于单次健康检查超时".to_string(),
            ));
        }

        if self.upstream.max_results == 0 || self.upstream.max_results > 1000 {
            return Err(crate::error::Error::Config(
                "搜索结果上限必须在 1 到 1000 之间".to_string(),
            ));
        }

        if self.upstream.token_limit == 0 {
            return Err(crate::error::Error::Config("token 预算不能为0".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    ///
    /// DASH_API_URL 设置后禁用自动发现与进程拉起（见 `UpstreamConfig::base_url`）
    pub fn apply_env(&mut self) -> Result<(), crate::error::Error> {
        if let Ok(base_url) = std::env::var("DASH_API_URL") {
            if !base_url.trim().is_empty() {
                self.upstream.base_url = Some(base_url);
            }
        }

        if let Ok(name) = std::env::var("DASH_DOCS_NAME") {
            self.server.name = name;
        }

        if let Ok(host) = std::env::var("DASH_DOCS_HOST") {
            self.server.host = host;
        }

        if let Ok(port) = std::env::var("DASH_DOCS_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| crate::error::Error::Config(format!("无效的端口: {e}")))?;
        }

        if let Ok(mode) = std::env::var("DASH_DOCS_TRANSPORT_MODE") {
            self.server.transport_mode = mode;
        }

        if let Ok(level) = std::env::var("DASH_DOCS_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(auto_launch) = std::env::var("DASH_DOCS_AUTO_LAUNCH") {
            self.upstream.auto_launch =
                matches!(auto_launch.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(())
    }

    /// 从环境变量加载配置
    ///
    /// # Errors
    ///
    /// 如果环境变量格式无效或配置验证失败，返回错误
    pub fn from_env() -> Result<Self, crate::error::Error> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }
}
