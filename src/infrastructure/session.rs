//! 浏览器会话能力 - 基础设施层
//!
//! 流程解释器只通过这组窄接口驱动浏览器，不认识具体引擎

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SessionError;

/// 下拉选项的选择方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionChoice {
    /// 按选项值精确匹配
    Value(String),
    /// 按位置选择（从 0 开始），用于事先不知道具体值的情况
    Ordinal(usize),
}

/// 浏览器会话
///
/// 所有等待类原语都必须在 `timeout` 内返回；`close()` 之后的调用返回
/// `SessionError::Closed`
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// 打开地址并等待加载完成
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), SessionError>;

    /// 等待元素出现后写入值，并触发前端框架需要的 input/change 事件
    async fn wait_and_fill(
        &self,
        target: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    async fn wait_and_select(
        &self,
        target: &str,
        choice: &OptionChoice,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    async fn wait_and_click(&self, target: &str, timeout: Duration) -> Result<(), SessionError>;

    /// 等待文件输入框（必要时强制启用并显示），然后挂载本地文件
    async fn wait_and_upload(
        &self,
        target: &str,
        file: &Path,
        timeout: Duration,
    ) -> Result<(), SessionError>;

    /// 元素当前是否存在
    async fn probe(&self, target: &str) -> Result<bool, SessionError>;

    async fn close(&self) -> Result<(), SessionError>;
}

/// 为每个任务打开一个新的浏览器会话
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn BrowserSession>, SessionError>;
}
