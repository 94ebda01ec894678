//! Dash Docs MCP 服务器主程序

use clap::{Parser, Subcommand};
use dash_docs::server::transport;
use dash_docs::DashDocsServer;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dash-docs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dash 文档浏览器 MCP 适配服务器", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// 启用调试日志
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动服务器
    Serve {
        /// 传输模式 [stdio, http, sse, hybrid]
        #[arg(short, long)]
        mode: Option<String>,

        /// 监听主机
        #[arg(long)]
        host: Option<String>,

        /// 监听端口
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// 生成配置文件
    Config {
        /// 输出文件路径
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// 覆盖已存在的文件
        #[arg(short, long)]
        force: bool,
    },

    /// 测试工具
    Test {
        /// 要测试的工具 [list_installed_docsets, search_documentation, enable_docset_fts, health_check]
        #[arg(short, long, default_value = "list_installed_docsets")]
        tool: String,

        /// 搜索查询（用于 search_documentation）
        #[arg(long)]
        query: Option<String>,

        /// 逗号分隔的 docset 标识符（用于 search_documentation）
        #[arg(long)]
        docsets: Option<String>,

        /// docset 标识符（用于 enable_docset_fts）
        #[arg(long)]
        identifier: Option<String>,

        /// 结果限制（用于 search_documentation）
        #[arg(long, default_value = "10")]
        limit: u32,

        /// 输出格式 [json, markdown, text]
        #[arg(long, default_value = "markdown")]
        format: String,
    },

    /// 检查上游 Dash API 连接状态
    Health {
        /// 详细输出
        #[arg(short, long)]
        verbose: bool,
    },

    /// 显示版本信息
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 注意：日志系统在 serve_command 中初始化（使用配置文件中的日志设置）

    match cli.command {
        Commands::Serve { mode, host, port } => {
            serve_command(&cli.config, cli.debug, mode, host, port).await?;
        }
        Commands::Config { output, force } => {
            config_command(&output, force)?;
        }
        Commands::Test {
            tool,
            query,
            docsets,
            identifier,
            limit,
            format,
        } => {
            test_command(
                &cli.config,
                &tool,
                query.as_deref(),
                docsets.as_deref(),
                identifier.as_deref(),
                limit,
                &format,
            )
            .await?;
        }
        Commands::Health { verbose } => {
            health_command(&cli.config, verbose).await?;
        }
        Commands::Version => {
            version_command();
        }
    }

    Ok(())
}

/// 启动服务器命令
async fn serve_command(
    config_path: &PathBuf,
    debug: bool,
    mode: Option<String>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    // 加载配置
    let config = load_config(config_path, host, port, mode)?;

    // 获取实际使用的传输模式（用于日志和启动）
    let transport_mode = config.transport_mode.clone();

    // 初始化日志系统（debug 模式覆盖配置文件中的日志级别）
    if debug {
        let mut debug_config = config.logging.clone();
        debug_config.level = "debug".to_string();
        dash_docs::init_logging_with_config(&debug_config)
            .map_err(|e| format!("初始化日志系统失败: {e}"))?;
    } else {
        dash_docs::init_logging_with_config(&config.logging)
            .map_err(|e| format!("初始化日志系统失败: {e}"))?;
    }

    tracing::info!("启动 Dash Docs MCP 服务器 v{}", env!("CARGO_PKG_VERSION"));

    // 创建服务器
    let server: DashDocsServer =
        DashDocsServer::new(config).map_err(|e| format!("创建服务器失败: {e}"))?;

    // 启动前完成上游解析，失败即退出，不带着不可用的上游进入服务状态
    match server.ensure_upstream().await {
        Ok(base) => tracing::info!("Dash API 已就绪: {base}"),
        Err(e) => {
            tracing::error!("无法连接 Dash API: {e}");
            return Err(format!("无法连接 Dash API: {e}").into());
        }
    }

    // 根据模式启动服务器
    match transport_mode.to_lowercase().as_str() {
        "stdio" => {
            tracing::info!("使用 Stdio 传输模式");
            transport::run_stdio_server(&server)
                .await
                .map_err(|e| format!("Stdio 服务器启动失败: {e}"))?;
        }
        "http" => {
            tracing::info!(
                "使用 HTTP 传输模式，监听 {}:{}",
                server.config().host,
                server.config().port
            );
            transport::run_http_server(&server)
                .await
                .map_err(|e| format!("HTTP 服务器启动失败: {e}"))?;
        }
        "sse" => {
            tracing::info!(
                "使用 SSE 传输模式，监听 {}:{}",
                server.config().host,
                server.config().port
            );
            transport::run_sse_server(&server)
                .await
                .map_err(|e| format!("SSE 服务器启动失败: {e}"))?;
        }
        "hybrid" => {
            tracing::info!(
                "使用混合传输模式（HTTP + SSE），监听 {}:{}",
                server.config().host,
                server.config().port
            );
            transport::run_hybrid_server(&server)
                .await
                .map_err(|e| format!("混合服务器启动失败: {e}"))?;
        }
        _ => {
            return Err(format!("未知的传输模式: {transport_mode}").into());
        }
    }

    Ok(())
}

/// 加载应用配置：配置文件 + 环境变量 + 命令行覆盖
fn load_app_config(config_path: &PathBuf) -> Result<dash_docs::config::AppConfig, Box<dyn std::error::Error>> {
    let mut config = if config_path.exists() {
        dash_docs::config::AppConfig::from_file(config_path)
            .map_err(|e| format!("加载配置文件失败: {e}"))?
    } else {
        dash_docs::config::AppConfig::default()
    };

    // 环境变量覆盖文件配置（DASH_API_URL 等）
    config.apply_env().map_err(|e| format!("应用环境变量失败: {e}"))?;

    Ok(config)
}

/// 加载服务器配置
fn load_config(
    config_path: &PathBuf,
    host: Option<String>,
    port: Option<u16>,
    mode: Option<String>,
) -> Result<dash_docs::ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_app_config(config_path)?;

    // 仅当命令行参数显式提供时，才覆盖配置文件
    if let Some(h) = host {
        config.server.host = h;
    }
    if let Some(p) = port {
        config.server.port = p;
    }
    if let Some(m) = mode {
        config.server.transport_mode = m;
    }

    // 验证配置
    config.validate().map_err(|e| format!("配置验证失败: {e}"))?;

    // 将 config::AppConfig 转换为 server::ServerConfig
    let server_config = dash_docs::ServerConfig {
        name: config.server.name,
        version: config.server.version,
        description: config.server.description,
        host: config.server.host,
        port: config.server.port,
        transport_mode: config.server.transport_mode,
        enable_sse: config.server.enable_sse,
        max_connections: config.server.max_connections,
        upstream: config.upstream,
        logging: config.logging,
        ..dash_docs::ServerConfig::default()
    };

    Ok(server_config)
}

/// 生成配置文件命令
fn config_command(output: &PathBuf, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if output.exists() && !force {
        return Err(format!("配置文件已存在: {}，使用 --force 覆盖", output.display()).into());
    }

    let config = dash_docs::config::AppConfig::default();
    config
        .save_to_file(output)
        .map_err(|e| format!("保存配置文件失败: {e}"))?;

    println!("配置文件已生成: {}", output.display());
    println!("请根据需要编辑配置文件。");

    Ok(())
}

/// 打印工具执行结果
fn print_tool_result(result: &rust_mcp_sdk::schema::CallToolResult) {
    if let Some(content) = result.content.first() {
        match content {
            rust_mcp_sdk::schema::ContentBlock::TextContent(text_content) => {
                println!("{}", text_content.text);
            }
            other => {
                println!("非文本内容: {other:?}");
            }
        }
    }
}

/// 测试工具命令：在本地直接执行一次工具调用
async fn test_command(
    config_path: &PathBuf,
    tool: &str,
    query: Option<&str>,
    docsets: Option<&str>,
    identifier: Option<&str>,
    limit: u32,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_app_config(config_path)?;
    config.validate().map_err(|e| format!("配置验证失败: {e}"))?;

    // 创建上游服务和工具注册表
    let service = std::sync::Arc::new(
        dash_docs::upstream::DashService::new(config.upstream)
            .map_err(|e| format!("创建上游服务失败: {e}"))?,
    );
    let registry = dash_docs::tools::create_default_registry(&service);

    let arguments = match tool {
        "list_installed_docsets" => {
            println!("测试列出已安装的 docsets（格式: {format}）");
            serde_json::json!({ "format": format })
        }
        "search_documentation" => {
            let Some(q) = query else {
                return Err("search_documentation 需要 --query 参数".into());
            };
            println!("测试搜索文档: {q} (限制: {limit}, 格式: {format})");

            let mut arguments = serde_json::json!({
                "query": q,
                "max_results": limit,
                "format": format
            });
            if let Some(ids) = docsets {
                arguments["docset_identifiers"] = serde_json::Value::String(ids.to_string());
            }
            arguments
        }
        "enable_docset_fts" => {
            let Some(id) = identifier else {
                return Err("enable_docset_fts 需要 --identifier 参数".into());
            };
            println!("测试启用全文搜索: {id}");
            serde_json::json!({ "identifier": id })
        }
        "health_check" => {
            println!("测试健康检查");
            serde_json::json!({ "check_type": "all", "verbose": true })
        }
        _ => {
            return Err(format!("未知的工具: {tool}").into());
        }
    };

    match registry.execute_tool(tool, arguments).await {
        Ok(result) => {
            println!("工具执行成功:");
            print_tool_result(&result);
        }
        Err(e) => {
            eprintln!("工具执行失败: {e}");
        }
    }

    println!("工具测试完成");
    Ok(())
}

/// 健康检查命令：解析上游端点并做一次健康检查往返
async fn health_command(
    config_path: &PathBuf,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_app_config(config_path)?;
    config.validate().map_err(|e| format!("配置验证失败: {e}"))?;

    let service = dash_docs::upstream::DashService::new(config.upstream)
        .map_err(|e| format!("创建上游服务失败: {e}"))?;

    if verbose {
        if let Some(base_url) = &service.config().base_url {
            println!("覆盖地址: {base_url}");
        } else {
            println!("候选端点:");
            for url in service.resolver().candidates() {
                println!("  - {url}");
            }
        }
    }

    match service.health_check().await {
        Ok(base) => {
            println!("Dash API 可用: {base}");
            Ok(())
        }
        Err(e) => Err(format!("{e}").into()),
    }
}

/// 版本命令
fn version_command() {
    println!("Dash Docs MCP 服务器 v{}", env!("CARGO_PKG_VERSION"));
    println!("构建时间: {}", env!("BUILD_TIMESTAMP"));
    println!("Git 提交: {}", env!("GIT_COMMIT"));
    println!("Rust 版本: {}", env!("RUST_VERSION"));
}
