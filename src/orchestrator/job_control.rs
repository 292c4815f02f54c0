//! 任务控制：取消标记与当前持有的浏览器会话

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::infrastructure::BrowserSession;

/// 当前会话，以及取消时在后台发起的关闭任务
#[derive(Default)]
struct SessionSlot {
    session: Option<Arc<dyn BrowserSession>>,
    closing: Option<JoinHandle<()>>,
}

/// 单个任务的控制句柄
///
/// - 取消标记只会从 false 变为 true
/// - 会话只由 Worker 挂载和卸下，取消请求只会尝试关闭它
#[derive(Default)]
pub struct JobControl {
    cancelled: AtomicBool,
    notify: Notify,
    slot: Mutex<SessionSlot>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 设置取消标记并唤醒等待者，返回是否为首次设置
    pub fn cancel(&self) -> bool {
        let first = !self.cancelled.swap(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        first
    }

    /// 取消并尽力关闭当前会话，以打断正在阻塞的等待
    ///
    /// 关闭任务登记在控制句柄上，卸下会话的一方可以等它结束
    pub fn request_cancel(&self) {
        self.cancel();
        let mut slot = self.lock_slot();
        let Some(session) = slot.session.clone() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                slot.closing = Some(handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!("取消时关闭浏览器会话失败: {}", e);
                    } else {
                        debug!("取消时已关闭浏览器会话");
                    }
                }));
            }
            Err(_) => warn!("当前不在 tokio 运行时中，跳过关闭会话"),
        }
    }

    /// 在取消发生时完成
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // 先登记再检查，避免错过通知
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    pub fn attach(&self, session: Arc<dyn BrowserSession>) {
        self.lock_slot().session = Some(session);
    }

    /// 卸下会话；之后的取消请求不会再发起关闭
    pub fn detach(&self) -> Option<Arc<dyn BrowserSession>> {
        self.lock_slot().session.take()
    }

    pub fn session(&self) -> Option<Arc<dyn BrowserSession>> {
        self.lock_slot().session.clone()
    }

    /// 取出取消时发起的关闭任务（如有）
    pub fn take_closing(&self) -> Option<JoinHandle<()>> {
        self.lock_slot().closing.take()
    }

    fn lock_slot(&self) -> MutexGuard<'_, SessionSlot> {
        self.slot.lock().expect("job control session lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_monotonic() {
        let control = JobControl::new();
        assert!(!control.is_cancelled());
        assert!(control.cancel());
        assert!(!control.cancel());
        assert!(control.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_wakes() {
        let control = Arc::new(JobControl::new());
        let waiter = {
            let control = control.clone();
            tokio::spawn(async move { control.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        control.request_cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_future_after_flag() {
        let control = JobControl::new();
        control.cancel();
        tokio::time::timeout(Duration::from_millis(100), control.cancelled())
            .await
            .expect("already cancelled");
    }

    #[tokio::test]
    async fn test_request_cancel_without_session_spawns_no_close() {
        let control = JobControl::new();
        control.request_cancel();
        assert!(control.is_cancelled());
        assert!(control.take_closing().is_none());
        assert!(control.detach().is_none());
    }
}
