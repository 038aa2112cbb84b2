/// 日志工具模块
///
/// 提供日志初始化以及运行过程中的格式化输出
use anyhow::Result;
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::models::{RunOptions, RunReport};
use crate::workflow::AuditCtx;

/// 初始化 tracing 日志
///
/// # 参数
/// - `verbose`: 是否输出 debug 级别日志（`RUST_LOG` 优先）
/// - `log_file_path`: 额外写入的日志文件，为 `None` 时只输出到终端
///
/// 可重复调用，后续调用不生效。
pub fn init(verbose: bool, log_file_path: Option<&str>) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = log_file_path
        .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok())
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
        });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n无障碍批量审计日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录运行开始信息
pub fn log_run_start(run_id: &str, total_urls: usize, options: &RunOptions) {
    info!("{}", "=".repeat(60));
    info!("🚀 [运行 {}] 开始批量审计", run_id);
    info!("📄 URL 总数: {}", total_urls);
    info!(
        "🏷️ 标签过滤: {}",
        options
            .wcag_tags
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!(
        "⚙️ 失败后继续: {} | 单页超时: {}s | 采集截图: {}",
        options.continue_on_failure,
        options.per_page_timeout.as_secs(),
        options.capture_evidence
    );
    info!("{}", "=".repeat(60));
}

/// 记录单个 URL 开始信息
pub fn log_url_start(ctx: &AuditCtx) {
    info!("\n{} {}", ctx, "─".repeat(30));
    info!("{} 🌐 正在审计: {}", ctx, ctx.url);
}

/// 打印运行最终统计
pub fn log_run_complete(report: &RunReport) {
    info!("\n{}", "=".repeat(60));
    info!("📊 [运行 {}] 审计完成统计", report.run_id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "✅ 成功: {}/{}",
        report.completed_count - report.failed_count,
        report.total_urls
    );
    info!("❌ 失败: {}", report.failed_count);
    if report.completed_count < report.total_urls {
        info!(
            "⏭️ 未处理: {}",
            report.total_urls - report.completed_count
        );
    }
    if let Some(err) = &report.fatal_error {
        info!("💥 整体错误: {}", err);
    }
    info!("📌 最终状态: {:?}", report.status);
    info!("{}", "=".repeat(60));
}
