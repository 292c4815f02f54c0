use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::SessionError;

/// 启动 Chromium 并打开一个空白页面
pub async fn launch_browser(
    headless: bool,
    chrome_binary: Option<&str>,
) -> Result<(Browser, Page, JoinHandle<()>), SessionError> {
    info!("🚀 启动浏览器 (headless: {})...", headless);

    let builder = if headless {
        BrowserConfig::builder().new_headless_mode()
    } else {
        BrowserConfig::builder().with_head()
    };
    let builder = match chrome_binary {
        Some(path) => builder.chrome_executable(path),
        None => builder,
    };

    let config = builder
        .args(vec![
            "--disable-gpu",           // 容器内无头模式禁用 GPU
            "--no-sandbox",            // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage", // 防止共享内存不足
            "--no-zygote",
        ])
        .build()
        .map_err(|e| {
            error!("配置浏览器失败: {}", e);
            SessionError::Launch(format!("配置浏览器失败: {}", e))
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        SessionError::Launch(e.to_string())
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let page = match browser.new_page("about:blank").await {
        Ok(page) => page,
        Err(e) => {
            error!("创建页面失败: {}", e);
            handler_task.abort();
            return Err(SessionError::Launch(format!("创建页面失败: {}", e)));
        }
    };

    Ok((browser, page, handler_task))
}
