//! 任务调度器 - 编排层
//!
//! ## 职责
//!
//! - 入队前校验请求，登记任务状态并放入 FIFO 队列
//! - 唯一的 Worker 按入队顺序逐个执行任务，全局同一时刻只有一个任务在操作浏览器
//! - 取消：排队中的任务直接标记取消；执行中的任务设置取消标记并关闭会话
//!
//! 请求方只读写状态表和取消标记，从不直接操作浏览器会话。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info};

use crate::error::{AppResult, ValidationError};
use crate::models::{Credentials, JobKey, JobState, JobStatePatch, JobStatus, JobStatusView};
use crate::orchestrator::{JobControl, JobRunner};
use crate::services::OrderDataProvider;
use crate::store::{Admission, JobStateStore};
use crate::utils::logging::{log_job_finished, log_job_start};
use crate::workflow::describe_step;

/// 队列中的一项
struct QueuedJob {
    key: JobKey,
    credentials: Credentials,
    control: Arc<JobControl>,
}

/// 调度器句柄，可自由克隆；所有句柄释放后 Worker 退出
#[derive(Clone)]
pub struct Dispatcher {
    store: JobStateStore,
    tx: UnboundedSender<QueuedJob>,
    provider: Arc<dyn OrderDataProvider>,
    /// 保证登记顺序与入队顺序一致
    enqueue_lock: Arc<Mutex<()>>,
}

impl Dispatcher {
    /// 启动 Worker 并返回调度器句柄
    pub fn start(runner: Arc<JobRunner>, store: JobStateStore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = runner.provider();
        tokio::spawn(worker_loop(rx, runner, store.clone()));
        Self {
            store,
            tx,
            provider,
            enqueue_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn store(&self) -> &JobStateStore {
        &self.store
    }

    /// 提交任务，返回 `queued` 或 `running`
    ///
    /// 同一键已在排队或执行时原样返回当前状态，不会重复执行
    pub async fn enqueue(&self, key: &JobKey, credentials: Credentials) -> AppResult<JobStatus> {
        self.validate(key, &credentials).await?;

        let control = Arc::new(JobControl::new());
        let _order = self
            .enqueue_lock
            .lock()
            .expect("dispatcher enqueue lock poisoned");

        let status = match self.store.admit(key, control.clone()) {
            Admission::AlreadyActive(status) => {
                info!("[{}] 任务已在{}，忽略重复提交", key, status);
                return Ok(status);
            }
            Admission::Admitted(status) => status,
        };

        let job = QueuedJob {
            key: key.clone(),
            credentials,
            control: control.clone(),
        };
        if self.tx.send(job).is_err() {
            error!("[{}] ❌ Worker 已停止，无法入队", key);
            self.store.set(
                key,
                JobStatePatch::finished(JobStatus::Error, "调度器已停止"),
            );
            self.store.release_control(key, &control);
            return Ok(JobStatus::Error);
        }

        info!("[{}] 📥 已入队，状态: {}", key, status);
        Ok(status)
    }

    /// 取消任务，返回取消后的状态
    ///
    /// 执行中的任务返回 `running`，Worker 观察到取消标记后写入 `cancelled`
    pub fn cancel(&self, key: &JobKey) -> JobStatus {
        let (status, running) = self.store.with_entry(key, |entry| match entry.state.status {
            JobStatus::Queued => {
                entry
                    .state
                    .apply(JobStatePatch::finished(JobStatus::Cancelled, "排队中被取消"));
                if let Some(control) = &entry.control {
                    control.cancel();
                }
                (JobStatus::Cancelled, None)
            }
            JobStatus::Running => (JobStatus::Running, entry.control.clone()),
            other => (other, None),
        });

        match running {
            Some(control) => {
                info!("[{}] ⏹ 请求取消执行中的任务", key);
                control.request_cancel();
            }
            None if status == JobStatus::Cancelled => info!("[{}] ⏹ 已取消排队中的任务", key),
            None => {}
        }
        status
    }

    /// 状态查询视图，当前步骤转为可读描述
    pub fn status(&self, key: &JobKey) -> JobStatusView {
        let state = self.store.get(key);
        JobStatusView {
            status: state.status,
            current_step: state.current_step.as_deref().map(describe_step),
            failed_step: state.failed_step,
            message: state.message,
        }
    }

    pub fn list(&self, tenant: &str) -> Vec<(JobKey, JobState)> {
        self.store.list(tenant)
    }

    /// 等待到没有排队或执行中的任务
    pub async fn wait_idle(&self, poll: Duration) {
        while self.store.has_active_jobs() {
            tokio::time::sleep(poll).await;
        }
    }

    async fn validate(&self, key: &JobKey, credentials: &Credentials) -> AppResult<()> {
        if key.tenant.trim().is_empty() || key.route.trim().is_empty() {
            return Err(ValidationError::EmptyKey.into());
        }
        if !credentials.is_complete() {
            return Err(ValidationError::MissingCredentials.into());
        }

        let routes = self.provider.routes(&key.tenant).await?;
        if routes.is_empty() {
            return Err(ValidationError::EmptyWorkload {
                tenant: key.tenant.clone(),
            }
            .into());
        }
        if !routes.iter().any(|route| route == &key.route) {
            return Err(ValidationError::UnknownRoute {
                tenant: key.tenant.clone(),
                route: key.route.clone(),
            }
            .into());
        }
        Ok(())
    }
}

async fn worker_loop(mut rx: UnboundedReceiver<QueuedJob>, runner: Arc<JobRunner>, store: JobStateStore) {
    info!("👷 Worker 已启动");
    while let Some(job) = rx.recv().await {
        run_job(&runner, &store, job).await;
    }
    info!("👷 Worker 已退出");
}

async fn run_job(runner: &Arc<JobRunner>, store: &JobStateStore, job: QueuedJob) {
    let QueuedJob {
        key,
        credentials,
        control,
    } = job;

    let proceed = store.with_entry(&key, |entry| {
        // 表项已属于后来重新入队的任务
        let current = entry
            .control
            .as_ref()
            .is_some_and(|c| Arc::ptr_eq(c, &control));
        if !current {
            return false;
        }
        if control.is_cancelled() || entry.state.status == JobStatus::Cancelled {
            if entry.state.status != JobStatus::Cancelled {
                entry
                    .state
                    .apply(JobStatePatch::finished(JobStatus::Cancelled, "执行前被取消"));
            }
            entry.control = None;
            return false;
        }
        entry.state.apply(JobStatePatch::started());
        true
    });
    if !proceed {
        info!("[{}] ⏭ 任务已取消，跳过", key);
        return;
    }

    log_job_start(&key);

    // 在子任务中执行，panic 只会变成 JoinError
    let handle = {
        let runner = runner.clone();
        let store = store.clone();
        let key = key.clone();
        let control = control.clone();
        tokio::spawn(async move { runner.run(&key, &credentials, &control, &store).await })
    };

    let patch = match handle.await {
        Ok(Ok(summary)) => JobStatePatch::finished(JobStatus::Success, summary.message()),
        Ok(Err(e)) if e.is_cancelled() || control.is_cancelled() => {
            JobStatePatch::finished(JobStatus::Cancelled, "任务已取消")
        }
        Ok(Err(e)) => {
            JobStatePatch::finished(JobStatus::Error, e.to_string()).with_failed_step(e.failed_step())
        }
        Err(join_error) => {
            error!("[{}] ❌ 任务异常终止: {}", key, join_error);
            runner.release(&key, &control).await;
            JobStatePatch::finished(JobStatus::Error, format!("任务异常终止: {}", join_error))
        }
    };

    let status = patch.status.unwrap_or(JobStatus::Error);
    let message = patch.message.clone().unwrap_or_default();
    // 终态与卸下控制句柄在同一次加锁内完成
    store.with_entry(&key, |entry| {
        entry.state.apply(patch);
        if entry
            .control
            .as_ref()
            .is_some_and(|c| Arc::ptr_eq(c, &control))
        {
            entry.control = None;
        }
    });
    log_job_finished(&key, status, &message);
}
