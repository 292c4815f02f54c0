//! 订单数据读取 - 业务能力层
//!
//! 核心只需要"某条路线有哪些订单、车牌是什么"这一窄接口

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::{normalize_plate, OrderLine};

/// 订单数据提供者
#[async_trait]
pub trait OrderDataProvider: Send + Sync {
    /// 路线下需要下单的订单行（数量为 0 的不返回）
    async fn orders_for_route(&self, tenant: &str, route: &str) -> AppResult<Vec<OrderLine>>;

    /// 路线对应的车牌，未登记时返回路线号
    async fn vehicle_plate(&self, tenant: &str, route: &str) -> AppResult<String>;

    /// 租户已登记的路线
    async fn routes(&self, tenant: &str) -> AppResult<Vec<String>>;
}

#[derive(Debug, Default, Deserialize)]
struct TenantFile {
    #[serde(default)]
    routes: Vec<RouteEntry>,
    #[serde(default)]
    orders: Vec<OrderLine>,
}

#[derive(Debug, Deserialize)]
struct RouteEntry {
    route: String,
    #[serde(default)]
    plate: String,
}

/// 从 `<folder>/<tenant>.toml` 读取订单
///
/// ```toml
/// [[routes]]
/// route = "R1"
/// plate = "ABC123"
///
/// [[orders]]
/// route = "R1"
/// product_code = 1015235
/// product = "SALCHICHA RANCHERA X 120G"
/// quantity = 5
/// ```
pub struct TomlOrderProvider {
    folder: PathBuf,
}

impl TomlOrderProvider {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn tenant_path(&self, tenant: &str) -> PathBuf {
        self.folder.join(format!("{}.toml", tenant))
    }

    async fn load(&self, tenant: &str) -> AppResult<TenantFile> {
        let path = self.tenant_path(tenant);
        load_tenant_file(&path)
            .await
            .map_err(|e| AppError::orders_unavailable(tenant, format!("{:#}", e)))
    }
}

/// 租户文件不存在视为没有任何数据
async fn load_tenant_file(path: &Path) -> anyhow::Result<TenantFile> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!("订单文件不存在: {}", path.display());
        return Ok(TenantFile::default());
    }
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取订单文件: {}", path.display()))?;
    let file: TenantFile = toml::from_str(&content)
        .with_context(|| format!("无法解析订单文件: {}", path.display()))?;
    Ok(file)
}

#[async_trait]
impl OrderDataProvider for TomlOrderProvider {
    async fn orders_for_route(&self, tenant: &str, route: &str) -> AppResult<Vec<OrderLine>> {
        let file = self.load(tenant).await?;
        Ok(file
            .orders
            .into_iter()
            .filter(|line| line.route.trim() == route && line.quantity > 0)
            .collect())
    }

    async fn vehicle_plate(&self, tenant: &str, route: &str) -> AppResult<String> {
        let file = self.load(tenant).await?;
        let plate = file
            .routes
            .iter()
            .find(|entry| entry.route.trim() == route)
            .map(|entry| entry.plate.as_str())
            .unwrap_or_default();
        Ok(normalize_plate(plate, route))
    }

    /// 路线表与订单中出现过的路线的并集，排序去重
    async fn routes(&self, tenant: &str) -> AppResult<Vec<String>> {
        let file = self.load(tenant).await?;
        let mut routes: Vec<String> = file
            .routes
            .iter()
            .map(|entry| entry.route.trim().to_string())
            .chain(file.orders.iter().map(|line| line.route.trim().to_string()))
            .filter(|route| !route.is_empty())
            .collect();
        routes.sort();
        routes.dedup();
        Ok(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ACME: &str = r#"
[[routes]]
route = "R1"
plate = "ABC123"

[[routes]]
route = "R2"

[[orders]]
route = "R1"
product_code = 1015235
product = "SALCHICHA RANCHERA X 120G"
quantity = 5

[[orders]]
route = "R1"
product_code = 1075657
product = "CHORIZO X 175 G"
quantity = 0

[[orders]]
route = "R3"
product_code = 1075657
product = "CHORIZO X 175 G"
unit = "CJ"
quantity = 2
"#;

    fn provider() -> (TempDir, TomlOrderProvider) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("acme.toml"), ACME).unwrap();
        let provider = TomlOrderProvider::new(dir.path());
        (dir, provider)
    }

    #[tokio::test]
    async fn test_orders_skip_zero_quantity() {
        let (_dir, provider) = provider();
        let orders = provider.orders_for_route("acme", "R1").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].product_code, 1015235);
        assert_eq!(orders[0].unit, "UN");

        let orders = provider.orders_for_route("acme", "R3").await.unwrap();
        assert_eq!(orders[0].unit, "CJ");
    }

    #[tokio::test]
    async fn test_plate_falls_back_to_route() {
        let (_dir, provider) = provider();
        assert_eq!(provider.vehicle_plate("acme", "R1").await.unwrap(), "ABC123");
        assert_eq!(provider.vehicle_plate("acme", "R2").await.unwrap(), "R2");
        assert_eq!(provider.vehicle_plate("acme", "R9").await.unwrap(), "R9");
    }

    #[tokio::test]
    async fn test_routes_union_sorted() {
        let (_dir, provider) = provider();
        assert_eq!(provider.routes("acme").await.unwrap(), vec!["R1", "R2", "R3"]);
        assert!(provider.routes("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broken_file_is_data_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.toml"), "routes = 3").unwrap();
        let provider = TomlOrderProvider::new(dir.path());
        let err = provider.routes("bad").await.unwrap_err();
        assert!(matches!(err, AppError::Data(_)));
    }
}
