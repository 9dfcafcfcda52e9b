//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use anyhow::{anyhow, Result};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// JS 执行器
///
/// 职责：
/// - 持有考试页面
/// - 暴露 eval() 能力
/// - 不认识会话 / 题目
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 以用户手势的身份执行 JS，并等待返回的 Promise
    ///
    /// 全屏请求必须由用户手势触发，否则浏览器会直接拒绝。
    pub async fn eval_with_gesture(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let params = EvaluateParams::builder()
            .expression(js_code.into())
            .await_promise(true)
            .user_gesture(true)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow!("构建脚本参数失败: {}", e))?;
        let result = self.page.evaluate(params).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }
}
