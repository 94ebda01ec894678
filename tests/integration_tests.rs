//! 集成测试
//!
//! 通过一个进程内的模拟 Dash API 验证连接解析与三个工具的端到端行为。

use dash_docs::config::UpstreamConfig;
use dash_docs::error::Error;
use dash_docs::upstream::{DashService, SearchRequest};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

// ============================================================================
// 模拟 Dash API
// ============================================================================

/// 模拟上游的响应配置
#[derive(Clone)]
struct MockUpstream {
    /// /health 是否返回 200
    healthy: bool,
    /// /docsets/list 的状态码与响应体
    docsets: (u16, String),
    /// /search 的状态码与响应体
    search: (u16, String),
    /// /docsets/enable_fts 的状态码与响应体
    enable_fts: (u16, String),
    /// 指定路径上的人为延迟，用于测试超时
    delay: Option<(String, Duration)>,
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self {
            healthy: true,
            docsets: (200, sample_docsets_json()),
            search: (200, sample_search_json()),
            enable_fts: (200, "{}".to_string()),
            delay: None,
        }
    }
}

/// 已启动的模拟服务器句柄
struct MockHandle {
    base_url: String,
    port: u16,
    /// 收到的请求（路径 + 查询串），按到达顺序记录
    hits: Arc<Mutex<Vec<String>>>,
}

impl MockHandle {
    fn hit_paths(&self) -> Vec<String> {
        self.hits
            .lock()
            .unwrap()
            .iter()
            .map(|h| h.split('?').next().unwrap_or("").to_string())
            .collect()
    }
}

fn sample_docsets_json() -> String {
    serde_json::json!({
        "docsets": [
            {
                "name": "Zsh",
                "identifier": "zsh",
                "platform": "zsh",
                "full_text_search": "disabled"
            },
            {
                "name": "Apple API Reference",
                "identifier": "com.apple.adc.documentation",
                "platform": "apple",
                "full_text_search": "enabled",
                "notice": "FTS index is large"
            },
            {
                "name": "CSS",
                "identifier": "css",
                "platform": "css",
                "full_text_search": "not supported"
            }
        ]
    })
    .to_string()
}

fn sample_search_json() -> String {
    serde_json::json!({
        "results": [
            {
                "name": "zremove",
                "type": "Function",
                "load_url": "dash-workflow-callback://zsh/zremove",
                "docset": "Zsh"
            },
            {
                "name": "align-content",
                "type": "Property",
                "platform": "css",
                "load_url": "dash-workflow-callback://css/align-content",
                "docset": "CSS",
                "description": "CSS align-content property"
            },
            {
                "name": "array push snippet",
                "type": "Snippet",
                "load_url": "dash-snippet://42",
                "language": "JavaScript",
                "tags": "js,array"
            }
        ]
    })
    .to_string()
}

/// 启动模拟服务器，返回基地址与请求记录
async fn spawn_mock(mock: MockUpstream) -> MockHandle {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("绑定模拟服务器失败");
    let port = listener.local_addr().expect("获取本地地址失败").port();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let hits_task = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let mock = mock.clone();
            let hits = hits_task.clone();

            tokio::spawn(async move {
                // 读取到请求头结束即可，GET 请求没有请求体
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                loop {
                    match socket.read(&mut buf[read..]).await {
                        Ok(0) => break,
                        Ok(n) => {
                            read += n;
                            if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                            if read == buf.len() {
                                break;
                            }
                        }
                        Err(_) => return,
                    }
                }

                let request = String::from_utf8_lossy(&buf[..read]).to_string();
                let path_query = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();
                hits.lock().unwrap().push(path_query.clone());
                let path = path_query.split('?').next().unwrap_or("/").to_string();

                if let Some((delay_path, delay)) = &mock.delay {
                    if *delay_path == path {
                        tokio::time::sleep(*delay).await;
                    }
                }

                let (status, body) = match path.as_str() {
                    "/health" => {
                        if mock.healthy {
                            (200, r#"{"status":"ok"}"#.to_string())
                        } else {
                            (500, "{}".to_string())
                        }
                    }
                    "/docsets/list" => mock.docsets.clone(),
                    "/search" => mock.search.clone(),
                    "/docsets/enable_fts" => mock.enable_fts.clone(),
                    _ => (404, "{}".to_string()),
                };

                let reason = if status < 400 { "OK" } else { "Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockHandle {
        base_url: format!("http://127.0.0.1:{port}"),
        port,
        hits,
    }
}

/// 测试用上游配置：关闭自动拉起，超时收紧
fn test_config(base_url: Option<String>) -> UpstreamConfig {
    UpstreamConfig {
        base_url,
        candidate_ports: vec![],
        status_file: None,
        health_timeout_secs: 1,
        request_timeout_secs: 2,
        auto_launch: false,
        launch_command: vec![],
        enable_api_command: vec![],
        launch_wait_secs: 0,
        probe_attempts: 1,
        probe_backoff_ms: 50,
        resolve_timeout_secs: 5,
        max_results: 100,
        token_limit: 25_000,
    }
}

/// 取一个当前空闲的端口：绑定后立即释放
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("绑定失败");
    listener.local_addr().expect("获取端口失败").port()
}

fn default_search_request(query: &str) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        docset_identifiers: None,
        search_snippets: true,
        max_results: 100,
    }
}

// ============================================================================
// 连接解析测试
// ============================================================================

/// 覆盖地址只做一次健康检查，之后的解析直接命中缓存
#[tokio::test]
async fn test_override_single_health_check() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let first = service.resolver().resolve().await.expect("解析失败");
    let second = service.resolver().resolve().await.expect("解析失败");
    assert_eq!(first, second);

    // 仅一次 /health，第二次解析命中缓存
    assert_eq!(mock.hit_paths(), vec!["/health"]);

    // 后续工具调用不再重复健康检查
    let docsets = service.list_docsets().await.expect("列出 docsets 失败");
    assert_eq!(docsets.len(), 3);
    assert_eq!(mock.hit_paths(), vec!["/health", "/docsets/list"]);
}

/// 覆盖地址不可用时快速失败，不退回端口探测
#[tokio::test]
async fn test_override_unreachable_fails_fast_without_probing() {
    let fallback = spawn_mock(MockUpstream::default()).await;
    let dead_port = free_port();

    // 候选端口指向可用的模拟服务器，但覆盖地址优先且失败后不允许退回
    let mut config = test_config(Some(format!("http://127.0.0.1:{dead_port}")));
    config.candidate_ports = vec![fallback.port];

    let service = DashService::new(config).expect("创建服务失败");
    let result = service.resolver().resolve().await;

    assert!(matches!(result, Err(Error::Connectivity(_))));
    // 候选端点完全没有被探测
    assert!(fallback.hits.lock().unwrap().is_empty());
}

/// 首选端口不可达时回退到次选端口
#[tokio::test]
async fn test_probe_falls_back_to_secondary_port() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let dead_port = free_port();

    let mut config = test_config(None);
    config.candidate_ports = vec![dead_port, mock.port];

    let service = DashService::new(config).expect("创建服务失败");
    let base = service.resolver().resolve().await.expect("解析失败");
    assert_eq!(base.port(), Some(mock.port));

    // 后续工具调用使用选定的次选端点
    let docsets = service.list_docsets().await.expect("列出 docsets 失败");
    assert_eq!(docsets.len(), 3);
}

/// 状态文件公布的端口优先于配置的候选端口
#[tokio::test]
async fn test_status_file_port_takes_priority() {
    let mock = spawn_mock(MockUpstream::default()).await;

    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let status_path = dir.path().join("status.json");
    std::fs::write(
        &status_path,
        serde_json::json!({ "port": mock.port }).to_string(),
    )
    .expect("写入状态文件失败");

    let mut config = test_config(None);
    config.status_file = Some(status_path);
    config.candidate_ports = vec![free_port()];

    let service = DashService::new(config).expect("创建服务失败");
    let base = service.resolver().resolve().await.expect("解析失败");
    assert_eq!(base.port(), Some(mock.port));
}

/// 无覆盖、无可用候选且禁用拉起时，解析有界失败
#[tokio::test]
async fn test_resolution_fails_closed_without_candidates() {
    let mut config = test_config(None);
    config.candidate_ports = vec![free_port()];
    config.probe_attempts = 2;

    let service = DashService::new(config).expect("创建服务失败");
    let start = std::time::Instant::now();
    let result = service.resolver().resolve().await;

    assert!(matches!(result, Err(Error::Connectivity(_))));
    // 有界失败：不超过解析总时限加少量开销
    assert!(start.elapsed() < Duration::from_secs(6));
}

/// 标记失效后的下一次解析会重新探测
#[tokio::test]
async fn test_mark_stale_triggers_re_resolution() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    service.resolver().resolve().await.expect("解析失败");
    assert!(service.resolver().current().await.is_some());

    service.resolver().mark_stale().await;
    assert!(service.resolver().current().await.is_none());

    service.resolver().resolve().await.expect("解析失败");
    assert_eq!(mock.hit_paths(), vec!["/health", "/health"]);
}

// ============================================================================
// list_installed_docsets 测试
// ============================================================================

/// 上游响应的字段与顺序原样透传
#[tokio::test]
async fn test_list_docsets_preserves_order_and_fields() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let docsets = service.list_docsets().await.expect("列出 docsets 失败");

    let names: Vec<&str> = docsets.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Zsh", "Apple API Reference", "CSS"]);

    assert_eq!(docsets[1].identifier, "com.apple.adc.documentation");
    assert_eq!(docsets[1].full_text_search, "enabled");
    assert_eq!(docsets[1].notice, Some("FTS index is large".to_string()));
    assert!(docsets[0].notice.is_none());
}

/// 上游 404 表示没有已安装的 docset，映射为上游错误
#[tokio::test]
async fn test_list_docsets_upstream_404() {
    let mock = spawn_mock(MockUpstream {
        docsets: (404, "not found".to_string()),
        ..MockUpstream::default()
    })
    .await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let result = service.list_docsets().await;
    let Err(Error::Upstream { status, message }) = result else {
        panic!("应返回 Upstream 错误");
    };
    assert_eq!(status, Some(404));
    assert!(message.contains("安装"));
}

/// 响应体形状不符时解码拒绝，不透传未定型数据
#[tokio::test]
async fn test_list_docsets_malformed_body_fails_closed() {
    let mock = spawn_mock(MockUpstream {
        docsets: (200, r#"{"docsets": "oops"}"#.to_string()),
        ..MockUpstream::default()
    })
    .await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let result = service.list_docsets().await;
    assert!(matches!(result, Err(Error::Upstream { .. })));
}

// ============================================================================
// search_documentation 测试
// ============================================================================

/// 空查询在任何网络调用之前失败
#[tokio::test]
async fn test_empty_query_fails_before_network() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    for query in ["", "   ", "\t"] {
        let result = service.search(&default_search_request(query)).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    // 校验失败时既不解析端点也不发请求
    assert!(mock.hits.lock().unwrap().is_empty());
}

/// max_results 越界同样在网络调用之前失败
#[tokio::test]
async fn test_invalid_max_results_fails_before_network() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    for max_results in [0, 1001] {
        let mut request = default_search_request("swift");
        request.max_results = max_results;
        let result = service.search(&request).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    assert!(mock.hits.lock().unwrap().is_empty());
}

/// 搜索结果的顺序与字段原样透传，上游排序不被改写
#[tokio::test]
async fn test_search_preserves_upstream_ranking() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let response = service
        .search(&default_search_request("align"))
        .await
        .expect("搜索失败");

    let names: Vec<&str> = response.results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["zremove", "align-content", "array push snippet"]);

    assert_eq!(response.results[0].entry_type, "Function");
    assert_eq!(response.results[1].platform, Some("css".to_string()));
    assert_eq!(
        response.results[2].language,
        Some("JavaScript".to_string())
    );
    assert!(response.message.is_none());
}

/// 请求参数按约定编码进查询串
#[tokio::test]
async fn test_search_encodes_request_parameters() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let request = SearchRequest {
        query: "array map".to_string(),
        docset_identifiers: Some("css,zsh".to_string()),
        search_snippets: false,
        max_results: 25,
    };
    service.search(&request).await.expect("搜索失败");

    let hits = mock.hits.lock().unwrap();
    let search_hit = hits
        .iter()
        .find(|h| h.starts_with("/search"))
        .expect("未发出搜索请求");

    assert!(search_hit.contains("query=array%20map"));
    assert!(search_hit.contains("search_snippets=false"));
    assert!(search_hit.contains("max_results=25"));
    assert!(search_hit.contains("docset_identifiers=css%2Czsh"));
}

/// 未提供过滤时不发送 docset_identifiers 参数
#[tokio::test]
async fn test_search_omits_absent_filter() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    service
        .search(&default_search_request("swift"))
        .await
        .expect("搜索失败");

    let hits = mock.hits.lock().unwrap();
    let search_hit = hits
        .iter()
        .find(|h| h.starts_with("/search"))
        .expect("未发出搜索请求");
    assert!(!search_hit.contains("docset_identifiers"));
}

/// 上游的 message 警告随结果透出
#[tokio::test]
async fn test_search_surfaces_upstream_message() {
    let body = serde_json::json!({
        "results": [],
        "message": "Docset 'foo' was skipped"
    })
    .to_string();
    let mock = spawn_mock(MockUpstream {
        search: (200, body),
        ..MockUpstream::default()
    })
    .await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let response = service
        .search(&default_search_request("swift"))
        .await
        .expect("搜索失败");
    assert_eq!(
        response.message,
        Some("Docset 'foo' was skipped".to_string())
    );
}

/// 上游报告未知 docset 标识符时映射为校验错误，便于调用方纠正
#[tokio::test]
async fn test_search_unknown_docset_maps_to_validation() {
    let mock = spawn_mock(MockUpstream {
        search: (
            400,
            "Docset with identifier 'bogus' not found".to_string(),
        ),
        ..MockUpstream::default()
    })
    .await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let mut request = default_search_request("swift");
    request.docset_identifiers = Some("bogus".to_string());
    let result = service.search(&request).await;

    assert!(matches!(result, Err(Error::Validation(_))));
}

/// 上游超时映射为连接错误，且在配置的时限内返回
#[tokio::test]
async fn test_upstream_timeout_maps_to_connectivity() {
    let mock = spawn_mock(MockUpstream {
        delay: Some(("/search".to_string(), Duration::from_secs(30))),
        ..MockUpstream::default()
    })
    .await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let start = std::time::Instant::now();
    let result = service.search(&default_search_request("swift")).await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(Error::Connectivity(_))));
    // 2 秒请求超时加少量开销
    assert!(elapsed < Duration::from_secs(5));

    // 连接失败后缓存的目标被标记失效，下次调用会重新解析
    assert!(service.resolver().current().await.is_none());
}

// ============================================================================
// enable_docset_fts 测试
// ============================================================================

/// 重复启用同一 docset 两次都返回成功（结果幂等）
#[tokio::test]
async fn test_enable_fts_idempotent_success() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let first = service.enable_fts("com.kapeli.swift").await.expect("启用失败");
    let second = service.enable_fts("com.kapeli.swift").await.expect("启用失败");

    assert_eq!(first.identifier, "com.kapeli.swift");
    assert_eq!(second.identifier, "com.kapeli.swift");

    let paths = mock.hit_paths();
    assert_eq!(
        paths
            .iter()
            .filter(|p| p.as_str() == "/docsets/enable_fts")
            .count(),
        2
    );
}

/// 空标识符在任何网络调用之前失败
#[tokio::test]
async fn test_enable_fts_blank_identifier() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let result = service.enable_fts("  ").await;
    assert!(matches!(result, Err(Error::Validation(_))));
    assert!(mock.hits.lock().unwrap().is_empty());
}

/// 上游报告 docset 不存在时映射为校验错误
#[tokio::test]
async fn test_enable_fts_unknown_identifier() {
    let mock = spawn_mock(MockUpstream {
        enable_fts: (404, "docset not found".to_string()),
        ..MockUpstream::default()
    })
    .await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let result = service.enable_fts("bogus").await;
    assert!(matches!(result, Err(Error::Validation(_))));
}

/// 上游附带 message 时透传进确认结果
#[tokio::test]
async fn test_enable_fts_surfaces_upstream_message() {
    let mock = spawn_mock(MockUpstream {
        enable_fts: (200, r#"{"message":"already enabled"}"#.to_string()),
        ..MockUpstream::default()
    })
    .await;
    let service = DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败");

    let ack = service.enable_fts("zsh").await.expect("启用失败");
    assert_eq!(ack.message, Some("already enabled".to_string()));
}

// ============================================================================
// 工具注册表测试
// ============================================================================

/// 注册表暴露全部四个工具，并能通过注册表端到端执行
#[tokio::test]
async fn test_tool_registry_end_to_end() {
    let mock = spawn_mock(MockUpstream::default()).await;
    let service = Arc::new(
        DashService::new(test_config(Some(mock.base_url.clone()))).expect("创建服务失败"),
    );
    let registry = dash_docs::tools::create_default_registry(&service);

    let names: Vec<String> = registry
        .get_tools()
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert!(names.contains(&"list_installed_docsets".to_string()));
    assert!(names.contains(&"search_documentation".to_string()));
    assert!(names.contains(&"enable_docset_fts".to_string()));
    assert!(names.contains(&"health_check".to_string()));

    // 无参调用（arguments 为 Null）也能正常执行
    let result = registry
        .execute_tool("list_installed_docsets", serde_json::Value::Null)
        .await;
    assert!(result.is_ok());

    // 空查询通过注册表同样报校验错误
    let result = registry
        .execute_tool(
            "search_documentation",
            serde_json::json!({ "query": "  " }),
        )
        .await;
    assert!(result.is_err());

    // 未知工具
    let result = registry
        .execute_tool("unknown_tool", serde_json::Value::Null)
        .await;
    assert!(result.is_err());
}
