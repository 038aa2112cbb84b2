use crate::error::{AppResult, ConfigError};
use crate::models::RunOptions;
use crate::report::gate::ViolationThreshold;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 浏览器配置 ---
    /// 浏览器调试端口，0 表示自行启动无头浏览器
    pub browser_debug_port: u16,
    /// 浏览器可执行文件路径，为空时自动查找
    pub chrome_executable: Option<String>,
    /// 是否以无头模式启动
    pub headless: bool,
    // --- 运行配置 ---
    /// 单页超时（秒）
    pub per_page_timeout_secs: u64,
    /// 单个 URL 失败后是否继续
    pub continue_on_failure: bool,
    /// 是否采集违规截图
    pub capture_evidence: bool,
    /// WCAG 标签过滤
    pub wcag_tags: Vec<String>,
    /// 同时执行的运行数量
    pub max_concurrent_runs: usize,
    /// 运行结束后在注册表中保留的时间（秒）
    pub run_ttl_secs: u64,
    // --- 证据截图配置 ---
    /// 截图保存目录，为空时只保存在内存中
    pub evidence_dir: Option<String>,
    /// 截图四周留白（像素）
    pub evidence_padding_px: f64,
    /// 滚动后等待动画结束的时间（毫秒）
    pub settle_delay_ms: u64,
    /// 每条违规最多截图的节点数
    pub max_evidence_per_violation: usize,
    // --- 规则引擎配置 ---
    /// 本地 axe-core 脚本路径
    pub axe_script_path: Option<String>,
    /// 本地脚本不存在时的下载地址
    pub axe_script_url: String,
    // --- CI 阈值 ---
    pub max_critical: Option<usize>,
    pub max_serious: Option<usize>,
    pub max_total_violations: Option<usize>,
    // --- 输出配置 ---
    /// 报告输出目录
    pub output_dir: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 0,
            chrome_executable: None,
            headless: true,
            per_page_timeout_secs: 30,
            continue_on_failure: true,
            capture_evidence: true,
            wcag_tags: vec!["wcag2a".to_string(), "wcag2aa".to_string()],
            max_concurrent_runs: 2,
            run_ttl_secs: 3600,
            evidence_dir: None,
            evidence_padding_px: 20.0,
            settle_delay_ms: 300,
            max_evidence_per_violation: 5,
            axe_script_path: None,
            axe_script_url: "https://cdnjs.cloudflare.com/ajax/libs/axe-core/4.10.2/axe.min.js"
                .to_string(),
            max_critical: Some(0),
            max_serious: None,
            max_total_violations: None,
            output_dir: "a11y_reports".to_string(),
            verbose_logging: false,
            output_log_file: "a11y_audit.log".to_string(),
        }
    }
}

impl Config {
    /// 从环境变量加载（未设置或无法解析时使用默认值）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺省字段使用默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source: e,
        })?;
        let config = toml::from_str(&content).map_err(|e| ConfigError::FileParseFailed {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(config)
    }

    /// 加载配置：设置了 `A11Y_CONFIG` 时先读文件，再用环境变量覆盖
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var("A11Y_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_toml_file(path)?,
            _ => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> Self {
        Self {
            browser_debug_port: env_or("BROWSER_DEBUG_PORT", self.browser_debug_port),
            chrome_executable: env_opt("CHROME_EXECUTABLE").or(self.chrome_executable),
            headless: env_or("HEADLESS", self.headless),
            per_page_timeout_secs: env_or("PER_PAGE_TIMEOUT_SECS", self.per_page_timeout_secs),
            continue_on_failure: env_or("CONTINUE_ON_FAILURE", self.continue_on_failure),
            capture_evidence: env_or("CAPTURE_EVIDENCE", self.capture_evidence),
            wcag_tags: env_opt("WCAG_TAGS")
                .map(|v| parse_tag_list(&v))
                .unwrap_or(self.wcag_tags),
            max_concurrent_runs: env_or("MAX_CONCURRENT_RUNS", self.max_concurrent_runs),
            run_ttl_secs: env_or("RUN_TTL_SECS", self.run_ttl_secs),
            evidence_dir: env_opt("EVIDENCE_DIR").or(self.evidence_dir),
            evidence_padding_px: env_or("EVIDENCE_PADDING_PX", self.evidence_padding_px),
            settle_delay_ms: env_or("SETTLE_DELAY_MS", self.settle_delay_ms),
            max_evidence_per_violation: env_or(
                "MAX_EVIDENCE_PER_VIOLATION",
                self.max_evidence_per_violation,
            ),
            axe_script_path: env_opt("AXE_SCRIPT_PATH").or(self.axe_script_path),
            axe_script_url: std::env::var("AXE_SCRIPT_URL").unwrap_or(self.axe_script_url),
            max_critical: env_opt_parse("MAX_CRITICAL").or(self.max_critical),
            max_serious: env_opt_parse("MAX_SERIOUS").or(self.max_serious),
            max_total_violations: env_opt_parse("MAX_TOTAL_VIOLATIONS")
                .or(self.max_total_violations),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(self.output_dir),
            verbose_logging: env_or("VERBOSE_LOGGING", self.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
        }
    }

    /// 生成单次运行参数
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            wcag_tags: self.wcag_tags.iter().cloned().collect(),
            continue_on_failure: self.continue_on_failure,
            per_page_timeout: Duration::from_secs(self.per_page_timeout_secs.max(1)),
            capture_evidence: self.capture_evidence,
        }
    }

    /// 生成 CI 阈值
    pub fn threshold(&self) -> ViolationThreshold {
        ViolationThreshold {
            max_critical: self.max_critical,
            max_serious: self.max_serious,
            max_total: self.max_total_violations,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn run_ttl(&self) -> Duration {
        Duration::from_secs(self.run_ttl_secs)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_opt_parse<T: FromStr>(name: &str) -> Option<T> {
    env_opt(name).and_then(|v| v.trim().parse().ok())
}

/// 解析逗号分隔的标签列表
pub fn parse_tag_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag_list() {
        assert_eq!(
            parse_tag_list("wcag2a, wcag21aa,,best-practice "),
            vec!["wcag2a", "wcag21aa", "best-practice"]
        );
    }

    #[test]
    fn test_toml_partial_profile() {
        let config: Config = toml::from_str(
            r#"
            continue_on_failure = false
            per_page_timeout_secs = 10
            wcag_tags = ["wcag21aa"]
            max_serious = 3
            "#,
        )
        .unwrap();
        assert!(!config.continue_on_failure);
        assert_eq!(config.per_page_timeout_secs, 10);
        assert_eq!(config.max_serious, Some(3));
        // 未写出的字段保持默认
        assert_eq!(config.settle_delay_ms, 300);
        assert!(config.headless);

        let options = config.run_options();
        assert_eq!(options.per_page_timeout, Duration::from_secs(10));
        assert!(options.wcag_tags.contains("wcag21aa"));
    }
}
