//! 列出已安装 docset 工具
#![allow(missing_docs)]

use crate::tools::Tool;
use crate::upstream::{DashService, Docset};
use crate::utils::tokens;
use async_trait::async_trait;
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 列出已安装 docset 的工具参数
#[macros::mcp_tool(
    name = "list_installed_docsets",
    title = "列出已安装的 Docsets",
    description = "列出 Dash 中已安装的全部文档集（docset），包括名称、标识符、平台与全文搜索状态。未安装任何 docset 时返回空列表。结果超过 token 上限时会自动截断。",
    destructive_hint = false,
    idempotent_hint = true,
    open_world_hint = false,
    read_only_hint = true,
    execution(task_support = "optional"),
    icons = [
        (src = "https://kapeli.com/favicon.ico", mime_type = "image/x-icon", sizes = ["32x32"], theme = "light"),
        (src = "https://kapeli.com/favicon.ico", mime_type = "image/x-icon", sizes = ["32x32"], theme = "dark")
    ]
)]
#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListInstalledDocsetsTool {
    /// 输出格式
    #[json_schema(
        title = "输出格式",
        description = "结果输出格式：markdown（默认）、text（纯文本）、json（原始 JSON）",
        default = "markdown"
    )]
    pub format: Option<String>,
}

/// 列出 docset 工具实现
pub struct ListInstalledDocsetsToolImpl {
    service: Arc<DashService>,
}

impl ListInstalledDocsetsToolImpl {
    /// 创建新的工具实例
    #[must_use]
    pub fn new(service: Arc<DashService>) -> Self {
        Self { service }
    }
}

/// 格式化 docset 列表，truncated_from 为截断前的总数
fn format_docsets(docsets: &[Docset], truncated_from: Option<usize>, format: &str) -> String {
    match format {
        "json" => serde_json::to_string_pretty(docsets).unwrap_or_else(|_| "[]".to_string()),
        "text" => {
            use std::fmt::Write;
            let mut output = String::new();

            for (i, docset) in docsets.iter().enumerate() {
                writeln!(output, "{}. {} [{}]", i + 1, docset.name, docset.identifier).unwrap();
                writeln!(
                    output,
                    "   平台: {} | 全文搜索: {}",
                    docset.platform, docset.full_text_search
                )
                .unwrap();
                if let Some(notice) = &docset.notice {
                    writeln!(output, "   提示: {notice}").unwrap();
                }
            }

            if let Some(total) = truncated_from {
                writeln!(
                    output,
                    "（超出 token 上限，仅显示 {} / {total} 个 docset）",
                    docsets.len()
                )
                .unwrap();
            }

            output
        }
        _ => {
            // 默认使用 markdown
            use std::fmt::Write;
            let mut output = String::from("# 已安装的 Docsets\n\n");

            if docsets.is_empty() {
                output.push_str("当前没有已安装的 docset。\n");
                return output;
            }

            for docset in docsets {
                writeln!(output, "- **{}** (`{}`)", docset.name, docset.identifier).unwrap();
                writeln!(
                    output,
                    "  平台: {} | 全文搜索: {}",
                    docset.platform, docset.full_text_search
                )
                .unwrap();
                if let Some(notice) = &docset.notice {
                    writeln!(output, "  提示: {notice}").unwrap();
                }
            }

            if let Some(total) = truncated_from {
                writeln!(
                    output,
                    "\n（超出 token 上限，仅显示 {} / {total} 个 docset）",
                    docsets.len()
                )
                .unwrap();
            }

            output
        }
    }
}

#[async_trait]
impl Tool for ListInstalledDocsetsToolImpl {
    fn definition(&self) -> rust_mcp_sdk::schema::Tool {
        ListInstalledDocsetsTool::tool()
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<
        rust_mcp_sdk::schema::CallToolResult,
        rust_mcp_sdk::schema::CallToolError,
    > {
        let params: ListInstalledDocsetsTool = serde_json::from_value(arguments).map_err(|e| {
            rust_mcp_sdk::schema::CallToolError::invalid_arguments(
                "list_installed_docsets",
                Some(format!("参数解析失败: {e}")),
            )
        })?;

        let docsets = self
            .service
            .list_docsets()
            .await
            .map_err(crate::error::Error::into_call_error)?;

        let total = docsets.len();
        tracing::info!("发现 {total} 个已安装的 docset");

        let (kept, truncated) =
            tokens::take_within_budget(docsets, self.service.config().token_limit);
        if truncated {
            tracing::warn!("docset 列表超出 token 上限，截断为 {} / {total}", kept.len());
        }

        let format = params.format.unwrap_or_else(|| "markdown".to_string());
        let content = format_docsets(&kept, truncated.then_some(total), &format);

        Ok(rust_mcp_sdk::schema::CallToolResult::text_content(vec![
            content.into(),
        ]))
    }
}
