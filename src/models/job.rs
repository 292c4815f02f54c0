//! 任务模型
//!
//! 任务键、生命周期状态以及对外展示的状态视图

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 任务键：一个租户的一条路线
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub tenant: String,
    pub route: String,
}

impl JobKey {
    pub fn new(tenant: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            route: route.into(),
        }
    }
}

impl Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.route)
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Queued,
    Running,
    Success,
    Error,
    Cancelled,
}

impl JobStatus {
    /// 排队中或执行中
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Success | JobStatus::Error | JobStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Success => "success",
            JobStatus::Error => "error",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个任务的完整状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub status: JobStatus,
    pub current_step: Option<String>,
    pub failed_step: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub message: String,
}

impl JobState {
    /// 入队时写入的初始状态
    pub fn admitted(status: JobStatus) -> Self {
        Self {
            status,
            started_at: (status == JobStatus::Running).then(Utc::now),
            ..Self::default()
        }
    }

    /// 合并部分更新
    pub fn apply(&mut self, patch: JobStatePatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(step) = patch.current_step {
            self.current_step = step;
        }
        if let Some(step) = patch.failed_step {
            self.failed_step = step;
        }
        if let Some(at) = patch.started_at {
            self.started_at = at;
        }
        if let Some(at) = patch.ended_at {
            self.ended_at = at;
        }
        if let Some(message) = patch.message {
            self.message = message;
        }
    }
}

/// `JobState` 的部分更新，外层 `None` 表示不修改
#[derive(Debug, Clone, Default)]
pub struct JobStatePatch {
    pub status: Option<JobStatus>,
    pub current_step: Option<Option<String>>,
    pub failed_step: Option<Option<String>>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub ended_at: Option<Option<DateTime<Utc>>>,
    pub message: Option<String>,
}

impl JobStatePatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn current_step(step: impl Into<String>) -> Self {
        Self {
            current_step: Some(Some(step.into())),
            ..Self::default()
        }
    }

    pub fn failed_step(step: impl Into<String>) -> Self {
        Self {
            failed_step: Some(Some(step.into())),
            ..Self::default()
        }
    }

    /// Worker 开始执行时写入
    pub fn started() -> Self {
        Self {
            status: Some(JobStatus::Running),
            current_step: Some(None),
            failed_step: Some(None),
            started_at: Some(Some(Utc::now())),
            ended_at: Some(None),
            message: Some(String::new()),
        }
    }

    /// 终态写入，附带结束时间与说明
    pub fn finished(status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ended_at: Some(Some(Utc::now())),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_failed_step(mut self, step: Option<&str>) -> Self {
        if let Some(step) = step {
            self.failed_step = Some(Some(step.to_string()));
        }
        self
    }
}

/// 状态查询返回给上层的视图
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub status: JobStatus,
    /// 当前步骤的可读描述
    pub current_step: Option<String>,
    pub failed_step: Option<String>,
    pub message: String,
}
