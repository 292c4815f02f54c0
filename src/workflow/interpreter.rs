//! 流程解释器 - 流程层
//!
//! 按顺序执行 `Flow` 中的步骤，每一步都受超时与取消约束；
//! 全部步骤完成后轮询成功/失败标记判定结果。
//! 门户是异步确认提交的，点击提交没有同步返回值，只能轮询。

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{FlowError, SessionError};
use crate::infrastructure::BrowserSession;
use crate::models::{JobKey, JobStatePatch};
use crate::orchestrator::JobControl;
use crate::store::JobStateStore;
use crate::workflow::flow::{Flow, Step, StepAction};

/// 默认结果轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// 流程执行上下文：进度写到哪里、响应哪个取消标记
pub struct JobContext<'a> {
    pub store: &'a JobStateStore,
    pub key: &'a JobKey,
    pub control: &'a JobControl,
}

/// 单个原语被打断的原因
enum Interrupt {
    Cancelled,
    Failed(SessionError),
}

#[derive(Debug, Clone)]
pub struct FlowInterpreter {
    poll_interval: Duration,
}

impl Default for FlowInterpreter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl FlowInterpreter {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    /// 执行流程
    ///
    /// 任一步骤失败立即终止，后续步骤不会执行，也不会在这里重试
    pub async fn run(
        &self,
        flow: &Flow,
        session: &dyn BrowserSession,
        ctx: &JobContext<'_>,
    ) -> Result<(), FlowError> {
        info!("[{}] ▶ 开始流程: {}", ctx.key, flow.name);

        for (index, step) in flow.steps.iter().enumerate() {
            if ctx.control.is_cancelled() {
                info!("[{}] ⏹ 流程 {} 在步骤前被取消", ctx.key, flow.name);
                return Err(FlowError::Cancelled);
            }

            // 先记录进度再执行
            ctx.store
                .set(ctx.key, JobStatePatch::current_step(step.name.as_str()));
            info!(
                "[{}] {} - ({}/{}) {} [{}]",
                ctx.key,
                flow.name,
                index + 1,
                flow.steps.len(),
                step.name,
                step.kind()
            );

            match self.execute(step, session, ctx.control).await {
                Ok(()) => {}
                Err(Interrupt::Cancelled) => {
                    info!("[{}] ⏹ 步骤 '{}' 执行中被取消", ctx.key, step.name);
                    return Err(FlowError::Cancelled);
                }
                Err(Interrupt::Failed(cause)) => {
                    return Err(self.fail(flow, &step.name, cause, ctx));
                }
            }
        }

        self.await_outcome(flow, session, ctx).await
    }

    async fn execute(
        &self,
        step: &Step,
        session: &dyn BrowserSession,
        control: &JobControl,
    ) -> Result<(), Interrupt> {
        let limit = step.timeout;
        match &step.action {
            StepAction::Navigate { url } => {
                guarded(control, limit, url, session.navigate(url, limit)).await
            }
            StepAction::Fill { target, value } => {
                guarded(control, limit, target, session.wait_and_fill(target, value, limit)).await
            }
            StepAction::Select { target, choice } => {
                guarded(
                    control,
                    limit,
                    target,
                    session.wait_and_select(target, choice, limit),
                )
                .await
            }
            StepAction::Click { target, fallback } => {
                let Some(fallback) = fallback else {
                    return guarded(control, limit, target, session.wait_and_click(target, limit))
                        .await;
                };
                let window = step.fallback_window.unwrap_or(limit);
                match guarded(control, window, target, session.wait_and_click(target, window))
                    .await
                {
                    Err(Interrupt::Failed(
                        e @ (SessionError::Timeout { .. } | SessionError::NotFound { .. }),
                    )) => {
                        warn!("主目标 {} 不可点击 ({}), 改用备用目标 {}", target, e, fallback);
                        guarded(control, limit, fallback, session.wait_and_click(fallback, limit))
                            .await
                    }
                    other => other,
                }
            }
            StepAction::Upload { target, file } => {
                guarded(
                    control,
                    limit,
                    target,
                    session.wait_and_upload(target, file, limit),
                )
                .await
            }
        }
    }

    /// 轮询成功/失败标记直到超时
    async fn await_outcome(
        &self,
        flow: &Flow,
        session: &dyn BrowserSession,
        ctx: &JobContext<'_>,
    ) -> Result<(), FlowError> {
        let outcome_step = flow.outcome_step_name();
        ctx.store
            .set(ctx.key, JobStatePatch::current_step(outcome_step.as_str()));
        debug!("[{}] 等待 {} 的结果标记", ctx.key, flow.name);

        let deadline = Instant::now() + flow.overall_timeout;
        loop {
            if ctx.control.is_cancelled() {
                return Err(FlowError::Cancelled);
            }
            let probe_limit = deadline
                .saturating_duration_since(Instant::now())
                .max(self.poll_interval);

            match self.probe(ctx.control, probe_limit, &flow.success_probe, session).await {
                Ok(true) => {
                    info!("[{}] ✓ 流程 {} 成功", ctx.key, flow.name);
                    return Ok(());
                }
                Ok(false) => {}
                Err(Interrupt::Cancelled) => return Err(FlowError::Cancelled),
                Err(Interrupt::Failed(cause)) => {
                    return Err(self.fail(flow, &outcome_step, cause, ctx))
                }
            }

            if let Some(error_probe) = &flow.error_probe {
                match self.probe(ctx.control, probe_limit, error_probe, session).await {
                    Ok(true) => {
                        warn!("[{}] ❌ 门户拒绝了 {}", ctx.key, flow.name);
                        ctx.store
                            .set(ctx.key, JobStatePatch::failed_step(outcome_step.as_str()));
                        return Err(FlowError::PortalRejected {
                            flow: flow.name.clone(),
                            step: outcome_step,
                        });
                    }
                    Ok(false) => {}
                    Err(Interrupt::Cancelled) => return Err(FlowError::Cancelled),
                    Err(Interrupt::Failed(cause)) => {
                        return Err(self.fail(flow, &outcome_step, cause, ctx))
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "[{}] ⚠️ {} 在 {:?} 内没有出现结果标记",
                    ctx.key, flow.name, flow.overall_timeout
                );
                ctx.store
                    .set(ctx.key, JobStatePatch::failed_step(outcome_step.as_str()));
                return Err(FlowError::Timeout {
                    flow: flow.name.clone(),
                    step: outcome_step,
                    after: flow.overall_timeout,
                });
            }

            let pause = self.poll_interval.min(deadline - now);
            tokio::select! {
                _ = ctx.control.cancelled() => return Err(FlowError::Cancelled),
                _ = sleep(pause) => {}
            }
        }
    }

    async fn probe(
        &self,
        control: &JobControl,
        limit: Duration,
        target: &str,
        session: &dyn BrowserSession,
    ) -> Result<bool, Interrupt> {
        guarded(control, limit, target, session.probe(target)).await
    }

    /// 记录失败步骤并构造错误
    fn fail(&self, flow: &Flow, step: &str, cause: SessionError, ctx: &JobContext<'_>) -> FlowError {
        error!("[{}] ❌ {} 在步骤 '{}' 失败: {}", ctx.key, flow.name, step, cause);
        ctx.store.set(ctx.key, JobStatePatch::failed_step(step));
        FlowError::StepFailure {
            flow: flow.name.clone(),
            step: step.to_string(),
            cause,
        }
    }
}

/// 以超时与取消包裹一次会话原语
async fn guarded<T>(
    control: &JobControl,
    limit: Duration,
    target: &str,
    op: impl Future<Output = Result<T, SessionError>>,
) -> Result<T, Interrupt> {
    tokio::select! {
        biased;
        _ = control.cancelled() => Err(Interrupt::Cancelled),
        result = timeout(limit, op) => match result {
            Ok(Ok(value)) => Ok(value),
            // 会话被取消请求关闭时，原语的报错归为取消
            Ok(Err(_)) if control.is_cancelled() => Err(Interrupt::Cancelled),
            Ok(Err(e)) => Err(Interrupt::Failed(e)),
            Err(_) => Err(Interrupt::Failed(SessionError::Timeout {
                target: target.to_string(),
                after: limit,
            })),
        },
    }
}
