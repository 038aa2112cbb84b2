use a11y_batch_audit::config::Config;
use a11y_batch_audit::export::{write_run_artifacts, write_summary_pdf};
use a11y_batch_audit::report::gate;
use a11y_batch_audit::services::{EvidenceStore, FsEvidenceStore, MemoryEvidenceStore};
use a11y_batch_audit::utils::logging;
use a11y_batch_audit::{AxeEngine, ChromiumDriver, RunCoordinator};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 进度输出间隔
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::load()?;

    // 初始化日志
    logging::init_log_file(&config.output_log_file)?;
    logging::init(config.verbose_logging, Some(&config.output_log_file));

    let urls = collect_urls(std::env::args().skip(1)).await?;
    if urls.is_empty() {
        bail!("用法: a11y_batch_audit <url>... 或 a11y_batch_audit @urls.txt");
    }

    // 组装依赖
    let driver = Arc::new(ChromiumDriver::from_config(&config));
    let engine = Arc::new(AxeEngine::from_config(&config));
    let store: Arc<dyn EvidenceStore> = match &config.evidence_dir {
        Some(dir) => Arc::new(FsEvidenceStore::new(dir)),
        None => Arc::new(MemoryEvidenceStore::new()),
    };
    let coordinator = RunCoordinator::from_config(&config, driver.clone(), engine, store.clone());

    // 启动运行并输出进度
    let run_id = coordinator.start_run(urls, config.run_options())?;
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    loop {
        ticker.tick().await;
        let snapshot = coordinator.get_run_report(&run_id)?;
        if snapshot.is_terminal() {
            break;
        }
        info!(
            "⏳ [运行 {}] {}/{} ({}%)",
            run_id,
            snapshot.completed_count,
            snapshot.total_urls,
            snapshot.progress_percent()
        );
    }
    let report = coordinator.wait_for_run(&run_id).await?;

    // 写入报告
    let out_dir = Path::new(&config.output_dir).join(&report.run_id);
    write_run_artifacts(&out_dir, &report, store.as_ref())
        .await
        .context("写入报告失败")?;
    if let Err(e) = write_summary_pdf(&out_dir, &report, driver.as_ref()).await {
        warn!("⚠️ 执行摘要 PDF 生成失败: {}", e);
    }

    // CI 门禁
    let verdict = gate::evaluate(&report, &config.threshold());
    for reason in &verdict.reasons {
        warn!("🚫 {}", reason);
    }
    info!(
        "🏁 门禁结果: {} (退出码 {})",
        verdict.label(),
        verdict.exit_code()
    );
    info!("\n日志已保存至: {}", config.output_log_file);

    std::process::exit(verdict.exit_code());
}

/// 从命令行参数收集 URL，`@file` 表示从文件逐行读取
async fn collect_urls(args: impl Iterator<Item = String>) -> Result<Vec<String>> {
    let mut urls = Vec::new();
    for arg in args {
        match arg.strip_prefix('@') {
            Some(path) => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("无法读取 URL 列表: {}", path))?;
                urls.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty() && !line.starts_with('#'))
                        .map(str::to_string),
                );
            }
            None => urls.push(arg),
        }
    }
    Ok(urls)
}
