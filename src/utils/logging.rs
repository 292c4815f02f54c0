//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::models::{JobKey, JobStatus};

/// 初始化日志
///
/// 设置了 `RUST_LOG` 时以其为准，否则默认 `info`，详细模式为 `debug`
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // 测试中可能重复初始化
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `tenant`: 租户
/// - `routes`: 本次提交的路线数
pub fn log_startup(tenant: &str, routes: usize) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 路线订单自动上传");
    info!("🏢 租户: {}", tenant);
    info!("📋 路线数: {}", routes);
    info!("{}", "=".repeat(60));
}

/// 记录任务开始
pub fn log_job_start(key: &JobKey) {
    info!("\n{}", "─".repeat(60));
    info!("[{}] ▶ 开始执行任务", key);
    info!("{}", "─".repeat(60));
}

/// 记录任务结束
pub fn log_job_finished(key: &JobKey, status: JobStatus, message: &str) {
    let message = truncate_text(message, 200);
    match status {
        JobStatus::Success => info!("[{}] ✅ 任务完成: {}", key, message),
        JobStatus::Cancelled => warn!("[{}] ⏹ 任务已取消", key),
        _ => error!("[{}] ❌ 任务失败: {}", key, message),
    }
}

/// 打印最终统计信息
///
/// # 参数
/// - `success`: 成功数量
/// - `failed`: 失败数量
/// - `cancelled`: 取消数量
/// - `total`: 总数
pub fn print_final_stats(success: usize, failed: usize, cancelled: usize, total: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 成功: {}/{}", success, total);
    info!("❌ 失败: {}", failed);
    if cancelled > 0 {
        info!("⏹ 取消: {}", cancelled);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
