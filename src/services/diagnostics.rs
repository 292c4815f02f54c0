//! 门户连通性诊断
//!
//! 解析门户域名并对登录页、上传页发起一次 GET，用于排查网络问题

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Url};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// 单项检查结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeResult {
    Ok(String),
    Error(String),
}

impl ProbeResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeResult::Ok(_))
    }
}

/// 诊断报告：检查项名称 → 结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReachabilityReport {
    pub checks: BTreeMap<String, ProbeResult>,
}

impl ReachabilityReport {
    pub fn all_ok(&self) -> bool {
        self.checks.values().all(ProbeResult::is_ok)
    }
}

/// 检查门户的 DNS 解析与页面可达性
pub async fn probe_reachability(config: &Config) -> Result<ReachabilityReport> {
    let base = Url::parse(&config.portal_base_url)
        .with_context(|| format!("门户地址无效: {}", config.portal_base_url))?;
    let host = base.host_str().unwrap_or_default().to_string();
    let port = base.port_or_known_default().unwrap_or(443);

    let mut report = ReachabilityReport::default();

    let dns = match tokio::net::lookup_host((host.as_str(), port)).await {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => ProbeResult::Ok(format!("{} -> {}", host, addr.ip())),
            None => ProbeResult::Error(format!("{} 没有解析结果", host)),
        },
        Err(e) => ProbeResult::Error(format!("{}: {}", host, e)),
    };
    report.checks.insert("dns".to_string(), dns);

    let client = Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .context("创建 HTTP 客户端失败")?;

    for (name, url) in [
        ("login.url", &config.portal_base_url),
        ("upload.url", &config.portal_upload_url),
    ] {
        let result = match client.get(url.as_str()).send().await {
            Ok(response) => ProbeResult::Ok(response.status().as_u16().to_string()),
            Err(e) => ProbeResult::Error(e.to_string()),
        };
        report.checks.insert(name.to_string(), result);
    }

    for (name, result) in &report.checks {
        match result {
            ProbeResult::Ok(detail) => info!("✓ {}: {}", name, detail),
            ProbeResult::Error(detail) => warn!("❌ {}: {}", name, detail),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_base_url_is_error() {
        let config = Config {
            portal_base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(probe_reachability(&config).await.is_err());
    }

    #[test]
    fn test_report_all_ok() {
        let mut report = ReachabilityReport::default();
        report
            .checks
            .insert("dns".into(), ProbeResult::Ok("host -> 127.0.0.1".into()));
        assert!(report.all_ok());
        report
            .checks
            .insert("login.url".into(), ProbeResult::Error("timeout".into()));
        assert!(!report.all_ok());
    }
}
