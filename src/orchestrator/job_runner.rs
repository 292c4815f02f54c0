//! 单个任务执行器 - 编排层
//!
//! 一个任务 = 准备订单数据 → 打开浏览器会话 → 登录 → 逐条路线上传。
//! 会话只在本次执行期间存在，任何退出路径都会卸下并关闭。

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppResult, FlowError};
use crate::infrastructure::{BrowserSession, SessionFactory};
use crate::models::{Credentials, JobKey, JobStatePatch, RouteRecord};
use crate::orchestrator::JobControl;
use crate::services::{OrderDataProvider, UploadArtifacts};
use crate::store::JobStateStore;
use crate::workflow::portal_flows::{STAGE_ARTIFACT, STAGE_BROWSER, STAGE_PREPARING};
use crate::workflow::{login_flow, upload_flow, FlowInterpreter, JobContext};

/// 任务执行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub uploaded: usize,
    /// 没有订单而跳过的路线
    pub skipped: usize,
}

impl JobSummary {
    /// 成功时写入状态的说明
    pub fn message(&self) -> String {
        if self.skipped == 0 {
            format!("登录并上传 {} 条路线", self.uploaded)
        } else {
            format!(
                "登录并上传 {} 条路线，{} 条路线没有订单已跳过",
                self.uploaded, self.skipped
            )
        }
    }
}

pub struct JobRunner {
    config: Config,
    factory: Arc<dyn SessionFactory>,
    provider: Arc<dyn OrderDataProvider>,
    artifacts: Arc<dyn UploadArtifacts>,
    interpreter: FlowInterpreter,
}

impl JobRunner {
    pub fn new(
        config: Config,
        factory: Arc<dyn SessionFactory>,
        provider: Arc<dyn OrderDataProvider>,
        artifacts: Arc<dyn UploadArtifacts>,
    ) -> Self {
        let interpreter = FlowInterpreter::new(config.poll_interval());
        Self {
            config,
            factory,
            provider,
            artifacts,
            interpreter,
        }
    }

    pub fn provider(&self) -> Arc<dyn OrderDataProvider> {
        self.provider.clone()
    }

    /// 执行一个任务
    pub async fn run(
        &self,
        key: &JobKey,
        credentials: &Credentials,
        control: &JobControl,
        store: &JobStateStore,
    ) -> AppResult<JobSummary> {
        store.set(key, JobStatePatch::current_step(STAGE_PREPARING));
        let workload = match self.load_workload(key).await {
            Ok(workload) => workload,
            Err(e) => {
                store.set(key, JobStatePatch::failed_step(STAGE_PREPARING));
                return Err(e);
            }
        };

        if control.is_cancelled() {
            return Err(FlowError::Cancelled.into());
        }

        store.set(key, JobStatePatch::current_step(STAGE_BROWSER));
        let session = match self.factory.open().await {
            Ok(session) => session,
            Err(e) => {
                store.set(key, JobStatePatch::failed_step(STAGE_BROWSER));
                return Err(e.into());
            }
        };
        control.attach(session.clone());
        debug!("[{}] 浏览器会话已就绪", key);

        let ctx = JobContext {
            store,
            key,
            control,
        };
        // 挂载之后再检查一次，覆盖挂载前到达的取消请求
        let result = if control.is_cancelled() {
            Err(FlowError::Cancelled.into())
        } else {
            self.run_flows(&workload, credentials, session.as_ref(), &ctx)
                .await
        };

        self.release(key, control).await;
        result
    }

    /// 卸下并关闭任务会话
    ///
    /// 先等取消时发起的后台关闭结束，再自己关闭一次；每一步都受关闭超时约束，
    /// 超时只记录警告，不影响任务结果
    pub async fn release(&self, key: &JobKey, control: &JobControl) {
        let session = control.detach();
        let limit = self.config.close_timeout();

        if let Some(closing) = control.take_closing() {
            if timeout(limit, closing).await.is_err() {
                warn!("[{}] ⚠️ 取消时发起的会话关闭在 {:?} 内没有完成", key, limit);
            }
        }

        let Some(session) = session else {
            return;
        };
        match timeout(limit, session.close()).await {
            Ok(Ok(())) => debug!("[{}] 浏览器会话已释放", key),
            Ok(Err(e)) => warn!("[{}] 关闭浏览器会话失败: {}", key, e),
            Err(_) => warn!("[{}] ⚠️ 关闭浏览器会话超时 ({:?})，放弃等待", key, limit),
        }
    }

    async fn run_flows(
        &self,
        workload: &[RouteRecord],
        credentials: &Credentials,
        session: &dyn BrowserSession,
        ctx: &JobContext<'_>,
    ) -> AppResult<JobSummary> {
        let login = login_flow(&self.config, credentials);
        self.interpreter.run(&login, session, ctx).await?;

        let mut summary = JobSummary::default();
        for record in workload {
            if record.is_empty() {
                info!("[{}] 路线 {} 没有订单，跳过上传", ctx.key, record.route);
                summary.skipped += 1;
                continue;
            }

            ctx.store
                .set(ctx.key, JobStatePatch::current_step(STAGE_ARTIFACT));
            let file = match self.artifacts.artifact_for(ctx.key, record).await {
                Ok(file) => file,
                Err(e) => {
                    ctx.store
                        .set(ctx.key, JobStatePatch::failed_step(STAGE_ARTIFACT));
                    return Err(e);
                }
            };
            let flow = upload_flow(&self.config, record, &file);
            self.interpreter.run(&flow, session, ctx).await?;
            info!(
                "[{}] ✓ 路线 {} 已上传 {} 条订单 (车牌 {})",
                ctx.key,
                record.route,
                record.orders.len(),
                record.plate
            );
            summary.uploaded += 1;
        }

        Ok(summary)
    }

    async fn load_workload(&self, key: &JobKey) -> AppResult<Vec<RouteRecord>> {
        let orders = self
            .provider
            .orders_for_route(&key.tenant, &key.route)
            .await?;
        let plate = self.provider.vehicle_plate(&key.tenant, &key.route).await?;
        debug!("[{}] 订单 {} 行，车牌 {}", key, orders.len(), plate);
        Ok(vec![RouteRecord {
            route: key.route.clone(),
            plate,
            orders,
        }])
    }
}
