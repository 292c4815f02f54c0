use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use route_order_submit::services::{
    probe_reachability, OrderDataProvider, PreparedArtifactDir, TomlOrderProvider,
};
use route_order_submit::utils::logging;
use route_order_submit::{
    ChromiumSessionFactory, Config, Credentials, Dispatcher, JobKey, JobRunner, JobStateStore,
    JobStatus,
};
use tracing::{error, info, warn};

const USAGE: &str = "用法: route_order_submit [--diagnose] <tenant> [route ...]";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置并初始化日志
    let config = Config::from_env();
    logging::init(config.verbose_logging);

    let mut diagnose = false;
    let mut positional = Vec::new();
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--diagnose" => diagnose = true,
            _ => positional.push(arg),
        }
    }

    if diagnose {
        let report = probe_reachability(&config).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        if positional.is_empty() {
            return Ok(());
        }
    }

    let Some((tenant, routes)) = positional.split_first() else {
        bail!(USAGE);
    };

    let credentials = Credentials::new(
        env::var("PORTAL_USER").unwrap_or_default(),
        env::var("PORTAL_PASS").unwrap_or_default(),
    );

    let provider: Arc<dyn OrderDataProvider> =
        Arc::new(TomlOrderProvider::new(&config.orders_folder));
    // 未指定路线时提交租户的全部路线
    let routes = if routes.is_empty() {
        provider
            .routes(tenant)
            .await
            .context("读取租户路线失败")?
    } else {
        routes.to_vec()
    };

    logging::log_startup(tenant, routes.len());

    let runner = Arc::new(JobRunner::new(
        config.clone(),
        Arc::new(ChromiumSessionFactory::from_config(&config)),
        provider,
        Arc::new(PreparedArtifactDir::new(&config.artifacts_folder)),
    ));
    let dispatcher = Dispatcher::start(runner, JobStateStore::new());

    let mut submitted = Vec::new();
    for route in &routes {
        let key = JobKey::new(tenant.as_str(), route.as_str());
        match dispatcher.enqueue(&key, credentials.clone()).await {
            Ok(status) => {
                info!("[{}] 提交结果: {}", key, status);
                submitted.push(key);
            }
            Err(e) => warn!("[{}] ⚠️ 提交被拒绝: {}", key, e),
        }
    }

    dispatcher.wait_idle(Duration::from_millis(500)).await;

    let (mut success, mut failed, mut cancelled) = (0, 0, 0);
    for key in &submitted {
        let view = dispatcher.status(key);
        match view.status {
            JobStatus::Success => success += 1,
            JobStatus::Cancelled => cancelled += 1,
            _ => {
                error!(
                    "[{}] 失败步骤: {}，原因: {}",
                    key,
                    view.failed_step.as_deref().unwrap_or("-"),
                    view.message
                );
                failed += 1;
            }
        }
    }
    logging::print_final_stats(success, failed, cancelled, routes.len());

    Ok(())
}
