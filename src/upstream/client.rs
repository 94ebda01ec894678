//! Dash API HTTP 客户端
//!
//! 封装 Dash 本地 API 的四个端点，响应按显式结构解码，
//! 形状不符时直接报上游错误，不透传未定型的数据。

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::utils::{string, HttpClientBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// 连接失败时附带的排查提示
pub const CONNECT_HINT: &str = "请确认 Dash 正在运行且已启用 API Server\
（Settings > Integration，或执行 open -g -b com.kapeli.dashdoc，\
再执行 defaults write com.kapeli.dashdoc DHAPIServerEnabled YES）";

/// 已安装的 docset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Docset {
    /// 显示名称
    pub name: String,
    /// 唯一标识符
    pub identifier: String,
    /// 平台/类型
    pub platform: String,
    /// 全文搜索状态: not supported / disabled / indexing / enabled
    pub full_text_search: String,
    /// 上游附带的提示信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// docsets/list 响应体
#[derive(Debug, Clone, Deserialize)]
pub struct DocsetList {
    /// 按上游顺序排列的 docset 列表
    #[serde(default)]
    pub docsets: Vec<Docset>,
}

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// 文档条目名称
    pub name: String,
    /// 条目类型（Function、Class 等）
    #[serde(rename = "type")]
    pub entry_type: String,
    /// 所属平台
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// 文档加载地址
    pub load_url: String,
    /// 所属 docset 名称
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docset: Option<String>,
    /// 补充描述
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// 编程语言（仅 snippet 结果）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// 标签（仅 snippet 结果）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// search 响应体
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    /// 按上游排序的结果列表
    #[serde(default)]
    pub results: Vec<SearchHit>,
    /// 上游附带的警告信息
    #[serde(default)]
    pub message: Option<String>,
}

/// search 请求参数
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// 搜索查询
    pub query: String,
    /// 逗号分隔的 docset 标识符过滤，None 表示使用上游默认范围
    pub docset_identifiers: Option<String>,
    /// 是否包含 snippet 结果
    pub search_snippets: bool,
    /// 结果数量上限
    pub max_results: u32,
}

/// enable_fts 的确认结果
#[derive(Debug, Clone, Serialize)]
pub struct FtsAck {
    /// 目标 docset 标识符
    pub identifier: String,
    /// 上游附带的消息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Dash API 客户端
#[derive(Clone)]
pub struct DashApiClient {
    client: reqwest::Client,
    health_timeout: Duration,
}

impl DashApiClient {
    /// 根据上游配置创建客户端
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = HttpClientBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.health_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            health_timeout: Duration::from_secs(config.health_timeout_secs),
        })
    }

    /// 健康检查，判断 base 是否为可用的 Dash API 端点
    pub async fn health_check(&self, base: &Url) -> Result<()> {
        let url = join_path(base, "health")?;
        let response = self
            .client
            .get(url)
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(connect_err)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Connectivity(format!(
                "健康检查返回 HTTP {}，{CONNECT_HINT}",
                response.status()
            )))
        }
    }

    /// 列出已安装的 docsets，保持上游顺序
    pub async fn list_docsets(&self, base: &Url) -> Result<Vec<Docset>> {
        let url = join_path(base, "docsets/list")?;
        let response = self.client.get(url).send().await.map_err(connect_err)?;

        if !response.status().is_success() {
            return Err(upstream_error("docsets/list", response).await);
        }

        let list: DocsetList = response.json().await.map_err(Error::from)?;
        Ok(list.docsets)
    }

    /// 搜索文档，排序由上游决定
    pub async fn search(&self, base: &Url, request: &SearchRequest) -> Result<SearchResponse> {
        let mut url = join_path(base, "search")?;
        let mut query_string = format!(
            "query={}&search_snippets={}&max_results={}",
            urlencoding::encode(&request.query),
            request.search_snippets,
            request.max_results
        );
        if let Some(identifiers) = &request.docset_identifiers {
            query_string.push_str("&docset_identifiers=");
            query_string.push_str(&urlencoding::encode(identifiers));
        }
        url.set_query(Some(&query_string));

        let response = self.client.get(url).send().await.map_err(connect_err)?;

        if !response.status().is_success() {
            return Err(upstream_error("search", response).await);
        }

        let result: SearchResponse = response.json().await.map_err(Error::from)?;
        Ok(result)
    }

    /// 为 docset 启用全文搜索。对已启用的 docset 重复调用上游返回成功，
    /// 因此该操作的结果是幂等的
    pub async fn enable_fts(&self, base: &Url, identifier: &str) -> Result<FtsAck> {
        let mut url = join_path(base, "docsets/enable_fts")?;
        url.set_query(Some(&format!(
            "identifier={}",
            urlencoding::encode(identifier)
        )));

        let response = self.client.get(url).send().await.map_err(connect_err)?;

        if response.status().as_u16() == 404 {
            return Err(Error::Validation(format!(
                "未找到 docset: {identifier}，请调用 list_installed_docsets 获取有效标识符"
            )));
        }

        if !response.status().is_success() {
            return Err(upstream_error("docsets/enable_fts", response).await);
        }

        // 确认体的形状上游未作保证，只宽松地提取 message 字段
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from));

        Ok(FtsAck {
            identifier: identifier.to_string(),
            message,
        })
    }
}

/// 拼接基地址与端点路径
fn join_path(base: &Url, path: &str) -> Result<Url> {
    base.join(path).map_err(Error::from)
}

/// 传输层错误统一补充排查提示
fn connect_err(err: reqwest::Error) -> Error {
    match Error::from(err) {
        Error::Connectivity(msg) => Error::Connectivity(format!("{msg}，{CONNECT_HINT}")),
        other => other,
    }
}

/// 非成功状态映射为错误。上游用 400/404 报告无效的 docset 标识符，
/// 这类输入问题归为校验错误，便于调用方修正后重试
async fn upstream_error(endpoint: &str, response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    match status {
        400 if body.contains("not found") => Error::Validation(format!(
            "docset 标识符无效: {}，请调用 list_installed_docsets 获取有效标识符",
            string::truncate_with_ellipsis(&body, 200)
        )),
        403 => Error::upstream(
            Some(403),
            if body.contains("trial") {
                "Dash 试用期已过，API 访问被禁用，请在 https://kapeli.com/dash 购买后重试"
                    .to_string()
            } else {
                string::truncate_with_ellipsis(&body, 500)
            },
        ),
        404 if endpoint == "docsets/list" => Error::upstream(
            Some(404),
            "未找到任何 docset，请先在 Dash 的 Settings > Downloads 中安装文档".to_string(),
        ),
        _ => Error::upstream(
            Some(status),
            if body.is_empty() {
                "空响应体".to_string()
            } else {
                string::truncate_with_ellipsis(&body, 500)
            },
        ),
    }
}
