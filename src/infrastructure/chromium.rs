//! 基于 chromiumoxide 的浏览器会话实现

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::element::Element;
use chromiumoxide::Browser;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::browser;
use crate::config::Config;
use crate::error::SessionError;
use crate::infrastructure::js_executor::JsExecutor;
use crate::infrastructure::session::{BrowserSession, OptionChoice, SessionFactory};

/// 等待元素时的轮询间隔
const ELEMENT_POLL: Duration = Duration::from_millis(100);

/// 关闭浏览器或页面、等待进程退出各自的上限
const BROWSER_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// 浏览器来源
#[derive(Debug, Clone)]
pub enum BrowserMode {
    /// 连接已打开调试端口的浏览器，任务结束只关闭自己的页面
    Connect { port: u16 },
    /// 每个任务启动独立浏览器，任务结束整体关闭
    Launch {
        headless: bool,
        chrome_binary: Option<String>,
    },
}

pub struct ChromiumSessionFactory {
    mode: BrowserMode,
}

impl ChromiumSessionFactory {
    pub fn new(mode: BrowserMode) -> Self {
        Self { mode }
    }

    pub fn from_config(config: &Config) -> Self {
        let mode = match config.browser_debug_port {
            Some(port) => BrowserMode::Connect { port },
            None => BrowserMode::Launch {
                headless: config.browser_headless,
                chrome_binary: config.chrome_binary.clone(),
            },
        };
        Self::new(mode)
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self) -> Result<Arc<dyn BrowserSession>, SessionError> {
        let (browser, page, handler_task, owns_browser) = match &self.mode {
            BrowserMode::Connect { port } => {
                let (browser, page, task) = browser::connect_to_browser(*port).await?;
                (browser, page, task, false)
            }
            BrowserMode::Launch {
                headless,
                chrome_binary,
            } => {
                let (browser, page, task) =
                    browser::launch_browser(*headless, chrome_binary.as_deref()).await?;
                (browser, page, task, true)
            }
        };

        Ok(Arc::new(ChromiumSession {
            executor: JsExecutor::new(page),
            browser: AsyncMutex::new(Some(browser)),
            handler_task: Mutex::new(Some(handler_task)),
            owns_browser,
            closed: AtomicBool::new(false),
        }))
    }
}

/// 单个任务持有的浏览器会话
pub struct ChromiumSession {
    executor: JsExecutor,
    browser: AsyncMutex<Option<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    owns_browser: bool,
    closed: AtomicBool,
}

impl ChromiumSession {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    /// 会话被强制关闭后，进行中的操作统一报告为 Closed
    fn map_err(&self, err: SessionError) -> SessionError {
        if self.is_closed() {
            SessionError::Closed
        } else {
            err
        }
    }

    /// 轮询等待元素出现
    async fn wait_for(&self, target: &str, timeout: Duration) -> Result<Element, SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.ensure_open()?;
            match self.executor.page().find_element(target).await {
                Ok(element) => return Ok(element),
                Err(e) => {
                    if Instant::now() >= deadline {
                        debug!("等待元素 {} 超时: {}", target, e);
                        return Err(self.map_err(SessionError::Timeout {
                            target: target.to_string(),
                            after: timeout,
                        }));
                    }
                }
            }
            sleep(ELEMENT_POLL).await;
        }
    }

    fn not_found(target: &str) -> SessionError {
        SessionError::NotFound {
            target: target.to_string(),
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str, limit: Duration) -> Result<(), SessionError> {
        self.ensure_open()?;
        let page = self.executor.page();
        match timeout(limit, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(self.map_err(e.into())),
            Err(_) => Err(self.map_err(SessionError::Timeout {
                target: url.to_string(),
                after: limit,
            })),
        }
    }

    async fn wait_and_fill(
        &self,
        target: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        self.wait_for(target, timeout).await?;
        let filled = self
            .executor
            .set_and_notify(target, value)
            .await
            .map_err(|e| self.map_err(e))?;
        if filled {
            Ok(())
        } else {
            Err(Self::not_found(target))
        }
    }

    async fn wait_and_select(
        &self,
        target: &str,
        choice: &OptionChoice,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        self.wait_for(target, timeout).await?;
        let selected = match choice {
            OptionChoice::Value(value) => self.executor.select_by_value(target, value).await,
            OptionChoice::Ordinal(index) => self.executor.select_by_ordinal(target, *index).await,
        }
        .map_err(|e| self.map_err(e))?;
        if selected {
            Ok(())
        } else {
            Err(SessionError::NotFound {
                target: format!("{} option {:?}", target, choice),
            })
        }
    }

    async fn wait_and_click(&self, target: &str, timeout: Duration) -> Result<(), SessionError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let element = self.wait_for(target, remaining).await?;
            // 元素存在但尚不可点击时继续等待
            match element.click().await {
                Ok(_) => return Ok(()),
                Err(e) if Instant::now() < deadline => {
                    debug!("点击 {} 失败，重试: {}", target, e);
                    sleep(ELEMENT_POLL).await;
                }
                Err(e) => return Err(self.map_err(e.into())),
            }
        }
    }

    async fn wait_and_upload(
        &self,
        target: &str,
        file: &Path,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        self.wait_for(target, timeout).await?;
        if !self
            .executor
            .unhide_input(target)
            .await
            .map_err(|e| self.map_err(e))?
        {
            return Err(Self::not_found(target));
        }
        // 恢复显示后重新获取节点
        let element = self.wait_for(target, ELEMENT_POLL * 10).await?;
        let params = SetFileInputFilesParams::builder()
            .file(file.to_string_lossy().to_string())
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(SessionError::Script)?;
        self.executor
            .page()
            .execute(params)
            .await
            .map_err(|e| self.map_err(e.into()))?;
        Ok(())
    }

    async fn probe(&self, target: &str) -> Result<bool, SessionError> {
        self.ensure_open()?;
        self.executor
            .exists(target)
            .await
            .map_err(|e| self.map_err(e))
    }

    async fn close(&self) -> Result<(), SessionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let result = if self.owns_browser {
            let mut guard = self.browser.lock().await;
            match guard.as_mut() {
                Some(browser) => {
                    let closed = match timeout(BROWSER_EXIT_TIMEOUT, browser.close()).await {
                        Ok(result) => result.map(|_| ()).map_err(SessionError::from),
                        Err(_) => Err(SessionError::Timeout {
                            target: "browser close".to_string(),
                            after: BROWSER_EXIT_TIMEOUT,
                        }),
                    };
                    match timeout(BROWSER_EXIT_TIMEOUT, browser.wait()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!("等待浏览器进程退出失败: {}", e),
                        Err(_) => {
                            // 进程没有按时退出，直接结束它
                            warn!("浏览器进程 {:?} 内未退出，强制结束", BROWSER_EXIT_TIMEOUT);
                            if let Some(Err(e)) = browser.kill().await {
                                warn!("强制结束浏览器进程失败: {}", e);
                            }
                        }
                    }
                    guard.take();
                    closed
                }
                None => Ok(()),
            }
        } else {
            let closed = match timeout(BROWSER_EXIT_TIMEOUT, self.executor.page().clone().close()).await {
                Ok(result) => result.map_err(SessionError::from),
                Err(_) => Err(SessionError::Timeout {
                    target: "page close".to_string(),
                    after: BROWSER_EXIT_TIMEOUT,
                }),
            };
            self.browser.lock().await.take();
            closed
        };

        if let Some(task) = self
            .handler_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            task.abort();
        }
        debug!("浏览器会话已关闭");
        result
    }
}
