//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 chromiumoxide `Page`，只暴露"执行 JS"的能力

use crate::error::{AppError, AppResult, BrowserError};
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() / call() 能力
/// - 不认识 Violation / RunReport
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于导航、截图等操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 交出 page 所有权（用于关闭页面）
    pub fn into_page(self) -> Page {
        self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// 返回 Promise 时会等待其完成。
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await.map_err(script_error)?;
        // 脚本返回 undefined 时没有可反序列化的值
        Ok(result.into_value().unwrap_or(JsonValue::Null))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 以 JSON 参数调用一个函数表达式
    ///
    /// `function_source` 形如 `(sel) => document.querySelector(sel) !== null`，
    /// 参数经过 JSON 序列化，不做字符串拼接。
    pub async fn call_as<A: Serialize, T: DeserializeOwned>(
        &self,
        function_source: &str,
        arg: &A,
    ) -> AppResult<T> {
        let js_code = format!("({})({})", function_source, serde_json::to_string(arg)?);
        self.eval_as(js_code).await
    }
}

fn script_error(err: chromiumoxide::error::CdpError) -> AppError {
    AppError::Browser(BrowserError::ScriptExecutionFailed {
        source: Box::new(err),
    })
}
