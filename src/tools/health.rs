//! 健康检查工具
#![allow(missing_docs)]

use crate::tools::Tool;
use crate::upstream::DashService;
use async_trait::async_trait;
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 健康检查工具参数
#[macros::mcp_tool(
    name = "health_check",
    title = "健康检查",
    description = "检查本服务器与 Dash API 的健康状态。用于诊断连接问题：上游不可达时会给出排查提示。",
    destructive_hint = false,
    idempotent_hint = true,
    open_world_hint = false,
    read_only_hint = true,
    execution(task_support = "optional"),
    icons = [
        (src = "https://img.icons8.com/color/96/000000/heart-health.png", mime_type = "image/png", sizes = ["96x96"], theme = "light"),
        (src = "https://img.icons8.com/color/96/000000/heart-health.png", mime_type = "image/png", sizes = ["96x96"], theme = "dark")
    ]
)]
#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct HealthCheckTool {
    /// 检查类型
    #[json_schema(
        title = "检查类型",
        description = "要执行的健康检查类型：all（全部检查）、upstream（仅 Dash API）、internal（仅内部状态）",
        default = "all"
    )]
    pub check_type: Option<String>,

    /// 详细输出
    #[json_schema(
        title = "详细输出",
        description = "是否显示详细输出，包括每个检查的响应时间",
        default = false
    )]
    pub verbose: Option<bool>,
}

/// 健康检查结果
#[derive(Debug, Clone, Serialize)]
struct HealthStatus {
    status: String,
    timestamp: String,
    checks: Vec<HealthCheck>,
    uptime: Duration,
}

/// 单个健康检查
#[derive(Debug, Clone, Serialize)]
struct HealthCheck {
    name: String,
    status: String,
    duration_ms: u64,
    message: Option<String>,
    error: Option<String>,
}

/// 健康检查工具实现
pub struct HealthCheckToolImpl {
    service: Arc<DashService>,
    start_time: Instant,
}

impl HealthCheckToolImpl {
    /// 创建新的健康检查工具
    #[must_use]
    pub fn new(service: Arc<DashService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }

    /// 检查 Dash API：解析目标并做一次健康检查往返
    #[allow(clippy::cast_possible_truncation)]
    async fn check_upstream(&self) -> HealthCheck {
        let start = Instant::now();

        match self.service.health_check().await {
            Ok(base) => HealthCheck {
                name: "dash_api".to_string(),
                status: "healthy".to_string(),
                duration_ms: start.elapsed().as_millis() as u64,
                message: Some(format!("Dash API 可用: {base}")),
                error: None,
            },
            Err(e) => HealthCheck {
                name: "dash_api".to_string(),
                status: "unhealthy".to_string(),
                duration_ms: start.elapsed().as_millis() as u64,
                message: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// 检查内部请求计数
    fn check_internal(&self) -> HealthCheck {
        let stats = self.service.counter().get_stats();

        HealthCheck {
            name: "internal".to_string(),
            status: "healthy".to_string(),
            duration_ms: 0,
            message: Some(format!(
                "请求 {} 次，成功 {}，失败 {}，平均耗时 {:.1}ms",
                stats.total_requests,
                stats.successful_requests,
                stats.failed_requests,
                stats.average_response_time_ms
            )),
            error: None,
        }
    }

    /// 执行健康检查
    async fn perform_checks(&self, check_type: &str, verbose: bool) -> HealthStatus {
        let mut checks = Vec::new();

        match check_type {
            "all" => {
                checks.push(self.check_upstream().await);
                checks.push(self.check_internal());
            }
            "upstream" => {
                checks.push(self.check_upstream().await);
            }
            "internal" => {
                checks.push(self.check_internal());
            }
            _ => {
                checks.push(HealthCheck {
                    name: "unknown_check".to_string(),
                    status: "unknown".to_string(),
                    duration_ms: 0,
                    message: None,
                    error: Some(format!("未知的检查类型: {check_type}")),
                });
            }
        }

        // 确定总体状态
        let overall_status = if checks.iter().all(|c| c.status == "healthy") {
            "healthy".to_string()
        } else if checks.iter().any(|c| c.status == "unhealthy") {
            "unhealthy".to_string()
        } else {
            "degraded".to_string()
        };

        HealthStatus {
            status: overall_status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            checks: if verbose {
                checks
            } else {
                // 非详细模式下只返回有问题的检查
                checks
                    .into_iter()
                    .filter(|c| c.status != "healthy")
                    .collect()
            },
            uptime: self.start_time.elapsed(),
        }
    }
}

#[async_trait]
impl Tool for HealthCheckToolImpl {
    fn definition(&self) -> rust_mcp_sdk::schema::Tool {
        HealthCheckTool::tool()
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<
        rust_mcp_sdk::schema::CallToolResult,
        rust_mcp_sdk::schema::CallToolError,
    > {
        let params: HealthCheckTool = serde_json::from_value(arguments).map_err(|e| {
            rust_mcp_sdk::schema::CallToolError::invalid_arguments(
                "health_check",
                Some(format!("参数解析失败: {e}")),
            )
        })?;

        let check_type = params.check_type.unwrap_or_else(|| "all".to_string());
        let verbose = params.verbose.unwrap_or(false);

        let health_status = self.perform_checks(&check_type, verbose).await;

        let content = if verbose {
            serde_json::to_string_pretty(&health_status).map_err(|e| {
                rust_mcp_sdk::schema::CallToolError::from_message(format!("JSON 序列化失败: {e}"))
            })?
        } else {
            let mut summary = format!(
                "状态: {}\n运行时间: {:.2?}\n时间戳: {}",
                health_status.status, health_status.uptime, health_status.timestamp
            );

            if !health_status.checks.is_empty() {
                use std::fmt::Write;
                summary.push_str("\n\n检查结果:");
                for check in &health_status.checks {
                    write!(
                        summary,
                        "\n- {}: {} ({}ms)",
                        check.name, check.status, check.duration_ms
                    )
                    .unwrap();
                    if let Some(ref msg) = check.message {
                        write!(summary, " - {msg}").unwrap();
                    }
                    if let Some(ref err) = check.error {
                        write!(summary, " [错误: {err}]").unwrap();
                    }
                }
            }

            summary
        };

        Ok(rust_mcp_sdk::schema::CallToolResult::text_content(vec![
            content.into(),
        ]))
    }
}
