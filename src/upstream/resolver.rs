//! 连接解析器
//!
//! 定位本机 Dash API 的可用基地址：优先使用显式覆盖地址，
//! 否则按状态文件端口与候选端口依次探测，必要时拉起 Dash 进程。
//! 解析结果在进程生命周期内缓存，可显式标记失效后重新解析。

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::upstream::client::{DashApiClient, CONNECT_HINT};
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

/// 连接解析器
pub struct ConnectionResolver {
    config: UpstreamConfig,
    client: DashApiClient,
    resolved: RwLock<Option<Url>>,
}

impl ConnectionResolver {
    /// 创建新的解析器
    #[must_use]
    pub fn new(config: UpstreamConfig, client: DashApiClient) -> Self {
        Self {
            config,
            client,
            resolved: RwLock::new(None),
        }
    }

    /// 解析可用的 Dash API 基地址，结果在进程内缓存
    pub async fn resolve(&self) -> Result<Url> {
        if let Some(url) = self.resolved.read().await.clone() {
            return Ok(url);
        }

        let url = self.resolve_uncached().await?;
        *self.resolved.write().await = Some(url.clone());
        Ok(url)
    }

    /// 当前缓存的目标，尚未解析时为 None
    pub async fn current(&self) -> Option<Url> {
        self.resolved.read().await.clone()
    }

    /// 将缓存的目标标记为失效，下一次调用会重新解析
    pub async fn mark_stale(&self) {
        *self.resolved.write().await = None;
    }

    /// 候选端点列表，按优先级排列：状态文件公布的端口优先，
    /// 其次是配置的候选端口
    #[must_use]
    pub fn candidates(&self) -> Vec<Url> {
        let mut urls = Vec::new();

        if let Some(port) = self.status_file_port() {
            if let Ok(url) = Url::parse(&format!("http://127.0.0.1:{port}")) {
                urls.push(url);
            }
        }

        for port in &self.config.candidate_ports {
            if let Ok(url) = Url::parse(&format!("http://127.0.0.1:{port}")) {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }

        urls
    }

    async fn resolve_uncached(&self) -> Result<Url> {
        // 覆盖地址只做一次健康检查，失败立即报错，不探测也不拉起进程
        if let Some(base) = &self.config.base_url {
            let url = Url::parse(base)?;
            self.client.health_check(&url).await.map_err(|e| {
                Error::Connectivity(format!("覆盖地址 {base} 不可用: {e}"))
            })?;
            tracing::info!("使用覆盖的 Dash API 地址: {base}");
            return Ok(url);
        }

        // 整个发现过程受总时限约束，不允许无限阻塞
        let deadline = Duration::from_secs(self.config.resolve_timeout_secs);
        match tokio::time::timeout(deadline, self.discover()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Connectivity(format!(
                "在 {} 秒内未能定位 Dash API，{CONNECT_HINT}",
                self.config.resolve_timeout_secs
            ))),
        }
    }

    /// 探测候选端点，必要时拉起 Dash，带有限轮次的退避重试
    async fn discover(&self) -> Result<Url> {
        let mut backoff = Duration::from_millis(self.config.probe_backoff_ms);

        for attempt in 0..self.config.probe_attempts {
            if let Some(url) = self.probe_candidates().await {
                return Ok(url);
            }

            if attempt == 0 && self.config.auto_launch {
                self.launch_application().await;
            } else {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        Err(Error::Connectivity(format!(
            "未找到可用的 Dash API 端点，{CONNECT_HINT}"
        )))
    }

    /// 按优先级探测候选端点，第一个健康检查通过者胜出
    async fn probe_candidates(&self) -> Option<Url> {
        for url in self.candidates() {
            tracing::debug!("探测候选端点: {url}");
            if self.client.health_check(&url).await.is_ok() {
                tracing::info!("已选定 Dash API 端点: {url}");
                return Some(url);
            }
        }
        None
    }

    /// 从 Dash 状态文件读取已公布的 API 端口
    fn status_file_port(&self) -> Option<u16> {
        let path = self.config.status_file.as_ref()?;
        let content = std::fs::read_to_string(path).ok()?;
        let status: serde_json::Value = serde_json::from_str(&content).ok()?;
        status.get("port")?.as_u64()?.try_into().ok()
    }

    /// 拉起 Dash，端口仍未公布时再尝试打开 API Server 开关。
    /// 失败只记日志，后续探测轮次自然会再次失败并报错
    async fn launch_application(&self) {
        if self.config.launch_command.is_empty() {
            return;
        }

        tracing::info!("Dash 未响应，尝试拉起应用...");
        if let Err(e) = self.run_command(&self.config.launch_command).await {
            tracing::warn!("拉起 Dash 失败: {e}");
            return;
        }

        tokio::time::sleep(Duration::from_secs(self.config.launch_wait_secs)).await;

        if self.status_file_port().is_none() && !self.config.enable_api_command.is_empty() {
            tracing::info!("尝试自动启用 Dash API Server...");
            if let Err(e) = self.run_command(&self.config.enable_api_command).await {
                tracing::warn!(
                    "启用 Dash API Server 失败: {e}，请在 Dash 的 Settings > Integration 中手动启用"
                );
            }
        }
    }

    /// 运行一条外部命令，超时即放弃
    async fn run_command(&self, command: &[String]) -> Result<()> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Config("启动命令为空".to_string()))?;

        let status = tokio::time::timeout(
            Duration::from_secs(10),
            tokio::process::Command::new(program).args(args).status(),
        )
        .await
        .map_err(|_| Error::Connectivity(format!("命令执行超时: {program}")))?
        .map_err(Error::from)?;

        if !status.success() {
            return Err(Error::Connectivity(format!(
                "命令退出状态异常: {program} ({status})"
            )));
        }

        Ok(())
    }
}
