//! 搜索文档工具
#![allow(missing_docs)]

use crate::tools::Tool;
use crate::upstream::{DashService, SearchHit, SearchRequest};
use crate::utils::{string, tokens};
use async_trait::async_trait;
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 搜索文档的工具参数
#[macros::mcp_tool(
    name = "search_documentation",
    title = "搜索文档",
    description = "在 Dash 已安装的 docset 与 snippet 中搜索文档。返回条目名称、类型与加载地址，排序由 Dash 决定。可用逗号分隔的 docset 标识符缩小范围（标识符来自 list_installed_docsets）。结果超过 token 上限时会自动截断。",
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
pub struct SearchDocumentationTool {
    /// 搜索查询
    #[json_schema(
        title = "搜索查询",
        description = "搜索关键词，例如：UIView、Array.map、flexbox"
    )]
    pub query: String,

    /// docset 过滤
    #[json_schema(
        title = "Docset 过滤",
        description = "逗号分隔的 docset 标识符列表（可选），留空则搜索上游默认范围"
    )]
    pub docset_identifiers: Option<String>,

    /// 是否包含 snippet 结果
    #[json_schema(
        title = "包含 Snippets",
        description = "是否同时搜索 snippet（默认 true）",
        default = true
    )]
    pub search_snippets: Option<bool>,

    /// 结果数量上限
    #[json_schema(
        title = "结果上限",
        description = "返回的最大结果数量，范围 1-1000",
        minimum = 1,
        maximum = 1000,
        default = 100
    )]
    pub max_results: Option<u32>,

    /// 输出格式
    #[json_schema(
        title = "输出格式",
        description = "结果输出格式：markdown（默认）、text（纯文本）、json（原始 JSON）",
        default = "markdown"
    )]
    pub format: Option<String>,
}

/// 搜索文档工具实现
pub struct SearchDocumentationToolImpl {
    service: Arc<DashService>,
}

impl SearchDocumentationToolImpl {
    /// 创建新的工具实例
    #[must_use]
    pub fn new(service: Arc<DashService>) -> Self {
        Self { service }
    }
}

/// 格式化搜索结果
fn format_search_results(
    hits: &[SearchHit],
    message: Option<&str>,
    truncated_from: Option<usize>,
    format: &str,
) -> String {
    match format {
        "json" => serde_json::to_string_pretty(hits).unwrap_or_else(|_| "[]".to_string()),
        "text" => {
            use std::fmt::Write;
            let mut output = String::new();

            if let Some(message) = message {
                writeln!(output, "提示: {message}\n").unwrap();
            }

            for (i, hit) in hits.iter().enumerate() {
                writeln!(output, "{}. {} ({})", i + 1, hit.name, hit.entry_type).unwrap();
                if let Some(docset) = &hit.docset {
                    writeln!(output, "   docset: {docset}").unwrap();
                }
                writeln!(output, "   {}", hit.load_url).unwrap();
            }

            if let Some(total) = truncated_from {
                writeln!(
                    output,
                    "（超出 token 上限，仅显示 {} / {total} 条结果）",
                    hits.len()
                )
                .unwrap();
            }

            output
        }
        _ => {
            // 默认使用 markdown
            use std::fmt::Write;
            let mut output = String::from("# 搜索结果\n\n");

            if let Some(message) = message {
                writeln!(output, "> 提示: {message}\n").unwrap();
            }

            if hits.is_empty() {
                output.push_str("没有匹配的结果。\n");
                return output;
            }

            for (i, hit) in hits.iter().enumerate() {
                writeln!(output, "## {}. {}", i + 1, hit.name).unwrap();
                writeln!(output, "**类型**: {}", hit.entry_type).unwrap();

                if let Some(docset) = &hit.docset {
                    writeln!(output, "**Docset**: {docset}").unwrap();
                }

                if let Some(platform) = &hit.platform {
                    writeln!(output, "**平台**: {platform}").unwrap();
                }

                if let Some(description) = &hit.description {
                    writeln!(
                        output,
                        "**描述**: {}",
                        string::truncate_with_ellipsis(description, 300)
                    )
                    .unwrap();
                }

                if let Some(language) = &hit.language {
                    writeln!(output, "**语言**: {language}").unwrap();
                }

                if let Some(tags) = &hit.tags {
                    writeln!(output, "**标签**: {tags}").unwrap();
                }

                writeln!(output, "**链接**: {}\n", hit.load_url).unwrap();
            }

            if let Some(total) = truncated_from {
                writeln!(
                    output,
                    "（超出 token 上限，仅显示 {} / {total} 条结果）",
                    hits.len()
                )
                .unwrap();
            }

            output
        }
    }
}

#[async_trait]
impl Tool for SearchDocumentationToolImpl {
    fn definition(&self) -> rust_mcp_sdk::schema::Tool {
        SearchDocumentationTool::tool()
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<
        rust_mcp_sdk::schema::CallToolResult,
        rust_mcp_sdk::schema::CallToolError,
    > {
        let params: SearchDocumentationTool = serde_json::from_value(arguments).map_err(|e| {
            rust_mcp_sdk::schema::CallToolError::invalid_arguments(
                "search_documentation",
                Some(format!("参数解析失败: {e}")),
            )
        })?;

        let request = SearchRequest {
            query: params.query,
            docset_identifiers: params
                .docset_identifiers
                .filter(|ids| !ids.trim().is_empty()),
            search_snippets: params.search_snippets.unwrap_or(true),
            max_results: params
                .max_results
                .unwrap_or(self.service.config().max_results),
        };

        tracing::debug!("搜索 Dash 文档: '{}'", request.query);

        let response = self
            .service
            .search(&request)
            .await
            .map_err(crate::error::Error::into_call_error)?;

        if let Some(message) = &response.message {
            tracing::warn!("上游提示: {message}");
        }

        let total = response.results.len();
        tracing::info!("找到 {total} 条结果");

        let (kept, truncated) =
            tokens::take_within_budget(response.results, self.service.config().token_limit);
        if truncated {
            tracing::warn!("搜索结果超出 token 上限，截断为 {} / {total}", kept.len());
        }

        let format = params.format.unwrap_or_else(|| "markdown".to_string());
        let content = format_search_results(
            &kept,
            response.message.as_deref(),
            truncated.then_some(total),
            &format,
        );

        Ok(rust_mcp_sdk::schema::CallToolResult::text_content(vec![
            content.into(),
        ]))
    }
}
