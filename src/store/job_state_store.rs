//! 任务状态表
//!
//! 进程内唯一的共享可变结构。状态查询、Dispatcher 与 Worker 都通过它读写，
//! 所有访问都在同一把锁下完成，临界区内不跨越 `.await`。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::models::{JobKey, JobState, JobStatePatch, JobStatus};
use crate::orchestrator::JobControl;

/// 表中的一项：状态与当前活动任务的控制句柄
#[derive(Default)]
pub struct JobEntry {
    pub state: JobState,
    pub control: Option<Arc<JobControl>>,
}

/// 入队判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 该键已有排队或执行中的任务，保持原状态
    AlreadyActive(JobStatus),
    /// 新任务已登记
    Admitted(JobStatus),
}

impl Admission {
    pub fn status(self) -> JobStatus {
        match self {
            Admission::AlreadyActive(status) | Admission::Admitted(status) => status,
        }
    }
}

#[derive(Clone, Default)]
pub struct JobStateStore {
    inner: Arc<Mutex<HashMap<JobKey, JobEntry>>>,
}

impl JobStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 锁被毒化意味着状态不变量已损坏，直接终止
    fn lock(&self) -> MutexGuard<'_, HashMap<JobKey, JobEntry>> {
        self.inner.lock().expect("job state store lock poisoned")
    }

    /// 读取状态，不存在时登记为 pending
    pub fn get(&self, key: &JobKey) -> JobState {
        self.lock().entry(key.clone()).or_default().state.clone()
    }

    /// 合并部分字段
    pub fn set(&self, key: &JobKey, patch: JobStatePatch) {
        self.lock().entry(key.clone()).or_default().state.apply(patch);
    }

    /// 列出租户下的全部任务状态，按路线排序
    pub fn list(&self, tenant: &str) -> Vec<(JobKey, JobState)> {
        let mut states: Vec<_> = self
            .lock()
            .iter()
            .filter(|(key, _)| key.tenant == tenant)
            .map(|(key, entry)| (key.clone(), entry.state.clone()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    /// 原子地判断并登记新任务
    ///
    /// 全局没有排队或执行中的任务时直接为 running，否则为 queued
    pub fn admit(&self, key: &JobKey, control: Arc<JobControl>) -> Admission {
        let mut table = self.lock();
        if let Some(entry) = table.get(key) {
            if entry.state.status.is_active() {
                return Admission::AlreadyActive(entry.state.status);
            }
        }

        let busy = table.values().any(|entry| entry.state.status.is_active());
        let status = if busy {
            JobStatus::Queued
        } else {
            JobStatus::Running
        };
        table.insert(
            key.clone(),
            JobEntry {
                state: JobState::admitted(status),
                control: Some(control),
            },
        );
        debug!("[{}] 已登记任务，状态: {}", key, status);
        Admission::Admitted(status)
    }

    /// 在锁内对单个表项执行操作
    pub fn with_entry<R>(&self, key: &JobKey, f: impl FnOnce(&mut JobEntry) -> R) -> R {
        let mut table = self.lock();
        f(table.entry(key.clone()).or_default())
    }

    pub fn control(&self, key: &JobKey) -> Option<Arc<JobControl>> {
        self.lock().get(key).and_then(|entry| entry.control.clone())
    }

    /// 卸下控制句柄；只移除同一个任务的句柄，避免清掉后续入队的新任务
    pub fn release_control(&self, key: &JobKey, control: &Arc<JobControl>) {
        if let Some(entry) = self.lock().get_mut(key) {
            if entry
                .control
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, control))
            {
                entry.control = None;
            }
        }
    }

    pub fn has_active_jobs(&self) -> bool {
        self.lock()
            .values()
            .any(|entry| entry.state.status.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key_is_pending() {
        let store = JobStateStore::new();
        let state = store.get(&JobKey::new("acme", "R1"));
        assert_eq!(state.status, JobStatus::Pending);
        assert!(state.current_step.is_none());
    }

    #[test]
    fn test_set_merges_fields() {
        let store = JobStateStore::new();
        let key = JobKey::new("acme", "R1");
        store.set(&key, JobStatePatch::status(JobStatus::Running));
        store.set(&key, JobStatePatch::current_step("login"));
        let state = store.get(&key);
        assert_eq!(state.status, JobStatus::Running);
        assert_eq!(state.current_step.as_deref(), Some("login"));
    }

    #[test]
    fn test_admit_first_runs_then_queues() {
        let store = JobStateStore::new();
        let first = JobKey::new("acme", "R1");
        let second = JobKey::new("acme", "R2");

        assert_eq!(
            store.admit(&first, Arc::new(JobControl::new())),
            Admission::Admitted(JobStatus::Running)
        );
        assert_eq!(
            store.admit(&second, Arc::new(JobControl::new())),
            Admission::Admitted(JobStatus::Queued)
        );
        // 重复入队不改变状态
        assert_eq!(
            store.admit(&second, Arc::new(JobControl::new())),
            Admission::AlreadyActive(JobStatus::Queued)
        );
        assert!(store.has_active_jobs());
    }

    #[test]
    fn test_admit_after_terminal_resets_record() {
        let store = JobStateStore::new();
        let key = JobKey::new("acme", "R1");
        store.admit(&key, Arc::new(JobControl::new()));
        store.set(&key, JobStatePatch::failed_step("upload file"));
        store.set(&key, JobStatePatch::finished(JobStatus::Error, "boom"));
        assert!(!store.has_active_jobs());

        let admission = store.admit(&key, Arc::new(JobControl::new()));
        assert_eq!(admission, Admission::Admitted(JobStatus::Running));
        let state = store.get(&key);
        assert!(state.failed_step.is_none());
        assert!(state.message.is_empty());
    }

    #[test]
    fn test_release_control_only_matching() {
        let store = JobStateStore::new();
        let key = JobKey::new("acme", "R1");
        let old = Arc::new(JobControl::new());
        let new = Arc::new(JobControl::new());
        store.admit(&key, new.clone());

        store.release_control(&key, &old);
        assert!(store.control(&key).is_some());
        store.release_control(&key, &new);
        assert!(store.control(&key).is_none());
    }

    #[test]
    fn test_list_filters_by_tenant() {
        let store = JobStateStore::new();
        store.get(&JobKey::new("acme", "R2"));
        store.get(&JobKey::new("acme", "R1"));
        store.get(&JobKey::new("other", "R1"));
        let routes: Vec<_> = store
            .list("acme")
            .into_iter()
            .map(|(key, _)| key.route)
            .collect();
        assert_eq!(routes, vec!["R1", "R2"]);
    }
}
