//! 启用 docset 全文搜索工具
#![allow(missing_docs)]

use crate::tools::Tool;
use crate::upstream::DashService;
use async_trait::async_trait;
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 启用全文搜索的工具参数
#[macros::mcp_tool(
    name = "enable_docset_fts",
    title = "启用 Docset 全文搜索",
    description = "为指定 docset 启用全文搜索（FTS）索引，启用后可按正文内容搜索。对已启用的 docset 重复调用会直接返回成功。标识符来自 list_installed_docsets。",
    destructive_hint = false,
    idempotent_hint = true,
    open_world_hint = false,
    read_only_hint = false,
    execution(task_support = "optional"),
    icons = [
        (src = "https://kapeli.com/favicon.ico", mime_type = "image/x-icon", sizes = ["32x32"], theme = "light"),
        (src = "https://kapeli.com/favicon.ico", mime_type = "image/x-icon", sizes = ["32x32"], theme = "dark")
    ]
)]
#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct EnableDocsetFtsTool {
    /// docset 标识符
    #[json_schema(
        title = "Docset 标识符",
        description = "要启用全文搜索的 docset 标识符（来自 list_installed_docsets）"
    )]
    pub identifier: String,
}

/// 启用全文搜索工具实现
pub struct EnableDocsetFtsToolImpl {
    service: Arc<DashService>,
}

impl EnableDocsetFtsToolImpl {
    /// 创建新的工具实例
    #[must_use]
    pub fn new(service: Arc<DashService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for EnableDocsetFtsToolImpl {
    fn definition(&self) -> rust_mcp_sdk::schema::Tool {
        EnableDocsetFtsTool::tool()
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<
        rust_mcp_sdk::schema::CallToolResult,
        rust_mcp_sdk::schema::CallToolError,
    > {
        let params: EnableDocsetFtsTool = serde_json::from_value(arguments).map_err(|e| {
            rust_mcp_sdk::schema::CallToolError::invalid_arguments(
                "enable_docset_fts",
                Some(format!("参数解析失败: {e}")),
            )
        })?;

        tracing::debug!("启用 docset 全文搜索: {}", params.identifier);

        let ack = self
            .service
            .enable_fts(&params.identifier)
            .await
            .map_err(crate::error::Error::into_call_error)?;

        let content = match &ack.message {
            Some(message) => format!(
                "已为 docset `{}` 启用全文搜索（上游提示: {message}）",
                ack.identifier
            ),
            None => format!("已为 docset `{}` 启用全文搜索", ack.identifier),
        };

        Ok(rust_mcp_sdk::schema::CallToolResult::text_content(vec![
            content.into(),
        ]))
    }
}
