//! 集成测试共用的假实现
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use route_order_submit::error::{AppResult, DataError, SessionError};
use route_order_submit::infrastructure::{BrowserSession, OptionChoice, SessionFactory};
use route_order_submit::models::{JobKey, OrderLine, RouteRecord};
use route_order_submit::services::{OrderDataProvider, UploadArtifacts};
use route_order_submit::{Config, Dispatcher, JobRunner, JobStateStore};

/// 元素的脚本化行为
#[derive(Clone)]
pub enum Behavior {
    /// 立即报告元素不存在
    Missing,
    /// 一直阻塞，直到会话被关闭
    Hang,
    /// 阻塞到闸门打开
    HoldUntil(Arc<AtomicBool>),
    Panic,
}

/// 关闭会话时的脚本化行为
#[derive(Clone, Copy, Default)]
pub enum CloseBehavior {
    #[default]
    Immediate,
    /// 永远不返回
    Hang,
    /// 过一段时间才关完
    Slow(Duration),
}

/// 脚本化的浏览器会话，记录每一次调用
#[derive(Default)]
pub struct FakeSession {
    calls: Mutex<Vec<String>>,
    behaviors: Mutex<HashMap<String, Behavior>>,
    probes: Mutex<HashMap<String, bool>>,
    probe_default: bool,
    closed: AtomicBool,
    close_behavior: CloseBehavior,
    close_done: AtomicBool,
}

impl FakeSession {
    /// 所有探测默认成立
    pub fn succeeding() -> Self {
        Self {
            probe_default: true,
            ..Self::default()
        }
    }

    /// 所有探测默认不成立
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_behavior(self, target: &str, behavior: Behavior) -> Self {
        self.behaviors
            .lock()
            .unwrap()
            .insert(target.to_string(), behavior);
        self
    }

    pub fn with_probe(self, target: &str, present: bool) -> Self {
        self.probes
            .lock()
            .unwrap()
            .insert(target.to_string(), present);
        self
    }

    pub fn with_close(self, close_behavior: CloseBehavior) -> Self {
        Self {
            close_behavior,
            ..self
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls().iter().any(|c| c == call)
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// 关闭流程已经走完
    pub fn is_close_done(&self) -> bool {
        self.close_done.load(Ordering::SeqCst)
    }

    async fn act(&self, call: String, target: &str) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        self.calls.lock().unwrap().push(call);
        let behavior = self.behaviors.lock().unwrap().get(target).cloned();
        match behavior {
            None => Ok(()),
            Some(Behavior::Missing) => Err(SessionError::NotFound {
                target: target.to_string(),
            }),
            Some(Behavior::Hang) => loop {
                if self.is_closed() {
                    return Err(SessionError::Closed);
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            },
            Some(Behavior::HoldUntil(gate)) => loop {
                if self.is_closed() {
                    return Err(SessionError::Closed);
                }
                if gate.load(Ordering::SeqCst) {
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            },
            Some(Behavior::Panic) => panic!("fake session panic on {}", target),
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), SessionError> {
        self.act(format!("navigate {}", url), url).await
    }

    async fn wait_and_fill(
        &self,
        target: &str,
        value: &str,
        _timeout: Duration,
    ) -> Result<(), SessionError> {
        self.act(format!("fill {}={}", target, value), target).await
    }

    async fn wait_and_select(
        &self,
        target: &str,
        choice: &OptionChoice,
        _timeout: Duration,
    ) -> Result<(), SessionError> {
        self.act(format!("select {} {:?}", target, choice), target)
            .await
    }

    async fn wait_and_click(&self, target: &str, _timeout: Duration) -> Result<(), SessionError> {
        self.act(format!("click {}", target), target).await
    }

    async fn wait_and_upload(
        &self,
        target: &str,
        file: &Path,
        _timeout: Duration,
    ) -> Result<(), SessionError> {
        self.act(format!("upload {} {}", target, file.display()), target)
            .await
    }

    async fn probe(&self, target: &str) -> Result<bool, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let present = self.probes.lock().unwrap().get(target).copied();
        Ok(present.unwrap_or(self.probe_default))
    }

    async fn close(&self) -> Result<(), SessionError> {
        // 与真实会话一样，重复关闭立即返回
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match self.close_behavior {
            CloseBehavior::Immediate => {}
            CloseBehavior::Hang => std::future::pending::<()>().await,
            CloseBehavior::Slow(delay) => tokio::time::sleep(delay).await,
        }
        self.close_done.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// 按顺序为每个任务交出预先准备的会话，用完后交出默认成功会话
#[derive(Default)]
pub struct FakeFactory {
    scripted: Mutex<Vec<Arc<FakeSession>>>,
    opened: Mutex<Vec<Arc<FakeSession>>>,
}

impl FakeFactory {
    pub fn new(sessions: Vec<FakeSession>) -> Self {
        let mut scripted: Vec<_> = sessions.into_iter().map(Arc::new).collect();
        scripted.reverse();
        Self {
            scripted: Mutex::new(scripted),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn opened(&self) -> Vec<Arc<FakeSession>> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self) -> Result<Arc<dyn BrowserSession>, SessionError> {
        let session = self
            .scripted
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Arc::new(FakeSession::succeeding()));
        self.opened.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

/// 内存中的订单数据
#[derive(Default)]
pub struct InMemoryProvider {
    routes: HashMap<String, Vec<RouteRecord>>,
}

impl InMemoryProvider {
    /// 登记一条路线及其订单行数
    pub fn with_route(mut self, tenant: &str, route: &str, orders: usize) -> Self {
        let lines = (0..orders)
            .map(|i| OrderLine {
                route: route.to_string(),
                product_code: 1_000_000 + i as u64,
                product: format!("PRODUCT {}", i),
                unit: "UN".to_string(),
                quantity: 1,
            })
            .collect();
        self.routes
            .entry(tenant.to_string())
            .or_default()
            .push(RouteRecord {
                route: route.to_string(),
                plate: format!("PL{}", route),
                orders: lines,
            });
        self
    }

    fn record(&self, tenant: &str, route: &str) -> Option<&RouteRecord> {
        self.routes
            .get(tenant)
            .and_then(|records| records.iter().find(|r| r.route == route))
    }
}

#[async_trait]
impl OrderDataProvider for InMemoryProvider {
    async fn orders_for_route(&self, tenant: &str, route: &str) -> AppResult<Vec<OrderLine>> {
        Ok(self
            .record(tenant, route)
            .map(|r| r.orders.clone())
            .unwrap_or_default())
    }

    async fn vehicle_plate(&self, tenant: &str, route: &str) -> AppResult<String> {
        Ok(self
            .record(tenant, route)
            .map(|r| r.plate.clone())
            .unwrap_or_else(|| route.to_string()))
    }

    async fn routes(&self, tenant: &str) -> AppResult<Vec<String>> {
        Ok(self
            .routes
            .get(tenant)
            .map(|records| records.iter().map(|r| r.route.clone()).collect())
            .unwrap_or_default())
    }
}

/// 所有路线都使用同一个虚拟文件
pub struct StaticArtifacts;

#[async_trait]
impl UploadArtifacts for StaticArtifacts {
    async fn artifact_for(&self, key: &JobKey, record: &RouteRecord) -> AppResult<PathBuf> {
        Ok(PathBuf::from(format!(
            "/tmp/{}-{}.xlsx",
            key.tenant, record.route
        )))
    }
}

/// 找不到任何上传文件
pub struct MissingArtifacts;

#[async_trait]
impl UploadArtifacts for MissingArtifacts {
    async fn artifact_for(&self, _key: &JobKey, _record: &RouteRecord) -> AppResult<PathBuf> {
        Err(DataError::ArtifactMissing {
            path: "/nope.xlsx".to_string(),
        }
        .into())
    }
}

/// 测试用的短超时配置
pub fn fast_config() -> Config {
    Config {
        portal_base_url: "https://portal.test".to_string(),
        portal_upload_url: "https://portal.test/upload".to_string(),
        portal_cart_url: "https://portal.test/cart".to_string(),
        step_timeout_ms: 2_000,
        navigation_timeout_ms: 2_000,
        fallback_click_timeout_ms: 100,
        outcome_timeout_ms: 500,
        poll_interval_ms: 10,
        close_timeout_ms: 500,
        ..Config::default()
    }
}

/// 组装调度器
pub fn start_dispatcher(
    factory: Arc<FakeFactory>,
    provider: InMemoryProvider,
) -> (Dispatcher, JobStateStore) {
    start_dispatcher_with(factory, provider, Arc::new(StaticArtifacts))
}

/// 指定上传文件来源组装调度器
pub fn start_dispatcher_with(
    factory: Arc<FakeFactory>,
    provider: InMemoryProvider,
    artifacts: Arc<dyn UploadArtifacts>,
) -> (Dispatcher, JobStateStore) {
    let store = JobStateStore::new();
    let runner = Arc::new(JobRunner::new(
        fast_config(),
        factory,
        Arc::new(provider),
        artifacts,
    ));
    (Dispatcher::start(runner, store.clone()), store)
}

/// 轮询直到条件成立或超时
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
