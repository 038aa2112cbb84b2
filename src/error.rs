use thiserror::Error;

/// 装箱的底层错误
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 规则引擎错误
    #[error("规则引擎错误: {0}")]
    Engine(#[from] EngineError),
    /// 证据截图错误
    #[error("证据采集错误: {0}")]
    Evidence(#[from] EvidenceError),
    /// 导出错误
    #[error("导出错误: {0}")]
    Export(#[from] ExportError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 运行管理错误
    #[error("运行错误: {0}")]
    Run(#[from] RunError),
    /// 文件读写错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {source}")]
    LaunchFailed { source: BoxError },
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed { port: u16, source: BoxError },
    /// 创建页面失败
    #[error("创建页面失败: {source}")]
    PageCreationFailed { source: BoxError },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed { url: String, source: BoxError },
    /// 导航超时
    #[error("导航到 {url} 超时 ({timeout_ms} ms)")]
    NavigationTimeout { url: String, timeout_ms: u64 },
    /// 执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed { source: BoxError },
    /// 元素查询失败
    #[error("查询元素 {selector} 失败: {source}")]
    ElementQueryFailed { selector: String, source: BoxError },
    /// 截图失败
    #[error("截图失败: {source}")]
    ScreenshotFailed { source: BoxError },
}

/// 规则引擎错误
#[derive(Debug, Error)]
pub enum EngineError {
    /// 加载规则脚本失败
    #[error("加载规则脚本失败 ({location}): {source}")]
    ScriptLoadFailed { location: String, source: BoxError },
    /// 规则执行失败
    #[error("规则执行失败: {message}")]
    EvaluationFailed { message: String },
    /// 规则结果无法解析
    #[error("规则结果解析失败: {source}")]
    MalformedResult { source: serde_json::Error },
    /// 规则执行超时
    #[error("规则执行超时 ({timeout_ms} ms)")]
    Timeout { timeout_ms: u64 },
}

/// 证据截图错误
#[derive(Debug, Error)]
pub enum EvidenceError {
    /// 截图解码失败
    #[error("截图解码失败: {source}")]
    ImageDecodeFailed { source: image::ImageError },
    /// 合成图片编码失败
    #[error("图片编码失败: {source}")]
    ImageEncodeFailed { source: image::ImageError },
    /// 截图区域为空
    #[error("截图区域为空: {width}x{height}")]
    EmptyRegion { width: f64, height: f64 },
    /// 画布无法创建
    #[error("无法创建 {width}x{height} 的画布")]
    CanvasFailed { width: u32, height: u32 },
    /// 写入证据图片失败
    #[error("写入证据图片失败 ({path}): {source}")]
    StoreFailed { path: String, source: std::io::Error },
}

/// 导出错误（与审计错误区分）
#[derive(Debug, Error)]
pub enum ExportError {
    /// 输入数据不合法
    #[error("违规数据不合法 (规则: {rule_id}): {reason}")]
    MalformedViolation { rule_id: String, reason: String },
    /// 证据记录指向不存在的违规
    #[error("证据记录引用了不存在的节点 (违规 {violation_index}, 节点 {node_index})")]
    DanglingEvidence {
        violation_index: usize,
        node_index: usize,
    },
    /// 序列化失败
    #[error("序列化失败: {source}")]
    Serialization { source: serde_json::Error },
    /// PDF 渲染失败
    #[error("PDF 渲染失败: {source}")]
    PdfRenderFailed { source: BoxError },
    /// 写入导出文件失败
    #[error("写入导出文件失败 ({path}): {source}")]
    WriteFailed { path: String, source: std::io::Error },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed { path: String, source: std::io::Error },
    /// 配置文件解析失败
    #[error("解析配置文件失败 ({path}): {source}")]
    FileParseFailed {
        path: String,
        source: toml::de::Error,
    },
}

/// 运行管理错误
#[derive(Debug, Error)]
pub enum RunError {
    /// URL 列表为空
    #[error("URL 列表不能为空")]
    EmptyUrlList,
    /// 运行不存在
    #[error("运行不存在: {run_id}")]
    UnknownRun { run_id: String },
    /// 运行仍在进行中
    #[error("运行仍在进行中: {run_id}")]
    StillRunning { run_id: String },
    /// 后台任务异常退出
    #[error("后台任务异常退出 ({run_id}): {message}")]
    TaskJoinFailed { run_id: String, message: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Engine(EngineError::MalformedResult { source: err })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(ConfigError::FileParseFailed {
            path: String::new(),
            source: err,
        })
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Evidence(EvidenceError::ImageDecodeFailed { source: err })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器启动错误
    pub fn browser_launch_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Browser(BrowserError::LaunchFailed {
            source: Box::new(source),
        })
    }

    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建页面创建错误
    pub fn page_creation_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Browser(BrowserError::PageCreationFailed {
            source: Box::new(source),
        })
    }

    /// 创建导航失败错误
    pub fn navigation_failed(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }

    /// 创建导航超时错误
    pub fn navigation_timeout(url: impl Into<String>, timeout: std::time::Duration) -> Self {
        AppError::Browser(BrowserError::NavigationTimeout {
            url: url.into(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// 创建元素查询错误
    pub fn element_query_failed(
        selector: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ElementQueryFailed {
            selector: selector.into(),
            source: Box::new(source),
        })
    }

    /// 创建规则执行错误
    pub fn engine_failed(message: impl Into<String>) -> Self {
        AppError::Engine(EngineError::EvaluationFailed {
            message: message.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 导出结果类型
pub type ExportResult<T> = Result<T, ExportError>;
