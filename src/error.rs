use std::time::Duration;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 入队参数校验错误
    #[error("参数校验失败: {0}")]
    Validation(#[from] ValidationError),
    /// 浏览器会话错误
    #[error("浏览器错误: {0}")]
    Session(#[from] SessionError),
    /// 流程执行错误
    #[error("流程错误: {0}")]
    Flow(#[from] FlowError),
    /// 订单数据或上传文件错误
    #[error("数据错误: {0}")]
    Data(#[from] DataError),
}

/// 入队前的同步校验错误，出现时不会创建任务
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// 用户名或密码为空
    #[error("用户名和密码不能为空")]
    MissingCredentials,
    /// 租户或路线为空
    #[error("租户和路线不能为空")]
    EmptyKey,
    /// 租户下没有任何路线
    #[error("租户 {tenant} 没有可处理的路线")]
    EmptyWorkload { tenant: String },
    /// 路线不属于该租户
    #[error("租户 {tenant} 下不存在路线 {route}")]
    UnknownRoute { tenant: String, route: String },
}

/// 浏览器会话原语错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 等待元素或页面超时
    #[error("等待 {target} 超时 ({after:?})")]
    Timeout { target: String, after: Duration },
    /// 元素不存在
    #[error("未找到元素: {target}")]
    NotFound { target: String },
    /// 会话已关闭
    #[error("浏览器会话已关闭")]
    Closed,
    /// 启动或连接浏览器失败
    #[error("启动浏览器失败: {0}")]
    Launch(String),
    /// CDP 协议错误
    #[error("CDP错误: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    /// 页面脚本执行失败
    #[error("执行脚本失败: {0}")]
    Script(String),
}

/// 流程执行结果中的失败分支
#[derive(Debug, Error)]
pub enum FlowError {
    /// 某个步骤的原语失败，流程终止
    #[error("{flow} 在步骤 '{step}' 失败: {cause}")]
    StepFailure {
        flow: String,
        step: String,
        #[source]
        cause: SessionError,
    },
    /// 门户显示了错误提示，`step` 为结果轮询阶段的步骤名
    #[error("{flow} 被门户拒绝")]
    PortalRejected { flow: String, step: String },
    /// 成功与错误标记都未在限定时间内出现
    #[error("{flow} 等待结果超时 ({after:?})")]
    Timeout {
        flow: String,
        step: String,
        after: Duration,
    },
    /// 用户取消
    #[error("任务已取消")]
    Cancelled,
}

impl FlowError {
    /// 失败位置：步骤失败时为步骤名，结果判定失败时为 `<flow> outcome`
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            FlowError::StepFailure { step, .. }
            | FlowError::PortalRejected { step, .. }
            | FlowError::Timeout { step, .. } => Some(step),
            FlowError::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FlowError::Cancelled)
    }
}

/// 订单数据与上传文件错误
#[derive(Debug, Error)]
pub enum DataError {
    /// 无法读取订单数据
    #[error("无法读取租户 {tenant} 的订单数据: {message}")]
    OrdersUnavailable { tenant: String, message: String },
    /// 上传文件不存在
    #[error("上传文件不存在: {path}")]
    ArtifactMissing { path: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建订单读取错误
    pub fn orders_unavailable(tenant: impl Into<String>, message: impl ToString) -> Self {
        AppError::Data(DataError::OrdersUnavailable {
            tenant: tenant.into(),
            message: message.to_string(),
        })
    }

    /// 取消属于终态而不是错误
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Flow(FlowError::Cancelled))
    }

    /// 错误对应的失败步骤（如有）
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            AppError::Flow(e) => e.failed_step(),
            _ => None,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_step_by_variant() {
        let step = FlowError::StepFailure {
            flow: "portal login".into(),
            step: "fill password".into(),
            cause: SessionError::NotFound {
                target: "#password".into(),
            },
        };
        assert_eq!(step.failed_step(), Some("fill password"));

        let rejected = FlowError::PortalRejected {
            flow: "portal login".into(),
            step: "portal login outcome".into(),
        };
        assert_eq!(rejected.failed_step(), Some("portal login outcome"));
        assert_eq!(FlowError::Cancelled.failed_step(), None);
    }

    #[test]
    fn test_app_error_cancelled() {
        let err: AppError = FlowError::Cancelled.into();
        assert!(err.is_cancelled());
        let err: AppError = ValidationError::MissingCredentials.into();
        assert!(!err.is_cancelled());
        assert!(err.to_string().contains("用户名和密码不能为空"));
    }
}
