use std::path::{Path, PathBuf};

use analysis_infrastructure::{init_metrics, init_tracing};
use analysis_worker::SectionSnapshotAnalyzer;
use anyhow::{Context, Result};
use clap::{Arg, Command};
use process_analysis::{load_requests, Application, ShutdownManager};
use tokio::signal;
use tracing::{error, info, warn};

use analysis_core::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("process-analysis")
        .version(env!("CARGO_PKG_VERSION"))
        .about("蛋白质提取工艺分析编排服务")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时尝试 config/analysis.toml"),
        )
        .arg(
            Arg::new("requests")
                .short('r')
                .long("requests")
                .value_name("FILE")
                .help("启动后处理的分析请求 (JSON 数组)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"]),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let requests_path = matches.get_one::<String>("requests").map(PathBuf::from);

    // 加载配置
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| format!("加载配置失败: {:?}", config_path))?;

    // 命令行参数覆盖配置
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.clone();
    }

    // 初始化日志系统
    init_tracing(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;
    if config.observability.metrics_enabled {
        init_metrics(&config.observability.metrics_listen_addr)?;
        info!(
            "Prometheus 指标端点: {}",
            config.observability.metrics_listen_addr
        );
    }

    info!("启动工艺分析服务");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let app = Application::new(config, SectionSnapshotAnalyzer::collaborators());
    let shutdown_manager = ShutdownManager::new();
    let handles = app.start(&shutdown_manager).await;

    if let Some(path) = requests_path {
        process_requests(&app, &path).await?;
    }

    // 等待关闭信号
    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");

    if shutdown_manager.graceful_shutdown(handles).await {
        info!("应用已优雅关闭");
    } else {
        warn!("应用关闭超时，强制退出");
    }

    info!("工艺分析服务已退出");
    Ok(())
}

/// 处理请求文件：带执行时间或重复间隔的请求交给调度器，其余立即执行
async fn process_requests(app: &Application, path: &Path) -> Result<()> {
    let requests = load_requests(path).await?;
    info!("从 {} 读取到 {} 个请求", path.display(), requests.len());

    for request in requests {
        let process_id = request.process_id.clone();
        if request.is_deferred() {
            match app.schedule(request).await {
                Ok(task_id) => info!("工艺 {} 已登记调度任务 {}", process_id, task_id),
                Err(e) => {
                    error!("工艺 {} 登记调度失败: {}", process_id, e);
                    println!("{}", e.to_envelope().into_response());
                }
            }
            continue;
        }

        match app.submit(request).await {
            Ok(result) => match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{json}"),
                Err(e) => error!("序列化分析结果失败: {e}"),
            },
            Err(e) => {
                error!("工艺 {} 分析失败: {}", process_id, e);
                println!("{}", e.to_envelope().into_response());
            }
        }
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
