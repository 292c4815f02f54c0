//! 上传文件定位
//!
//! 表格由外部协作方生成，这里只负责找到路线对应的文件路径

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppResult, DataError};
use crate::models::{JobKey, RouteRecord};

#[async_trait]
pub trait UploadArtifacts: Send + Sync {
    /// 路线上传所用的本地文件
    async fn artifact_for(&self, key: &JobKey, record: &RouteRecord) -> AppResult<PathBuf>;
}

/// 预先生成的表格目录：`<folder>/<tenant>/<route>.xlsx`
pub struct PreparedArtifactDir {
    folder: PathBuf,
}

impl PreparedArtifactDir {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn path_for(&self, tenant: &str, route: &str) -> PathBuf {
        self.folder.join(tenant).join(format!("{}.xlsx", route))
    }
}

#[async_trait]
impl UploadArtifacts for PreparedArtifactDir {
    async fn artifact_for(&self, key: &JobKey, record: &RouteRecord) -> AppResult<PathBuf> {
        let path = self.path_for(&key.tenant, &record.route);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("[{}] 上传文件: {}", key, path.display());
            Ok(path)
        } else {
            Err(DataError::ArtifactMissing {
                path: path.display().to_string(),
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use tempfile::TempDir;

    fn record(route: &str) -> RouteRecord {
        RouteRecord {
            route: route.into(),
            plate: route.into(),
            orders: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_existing_artifact_resolves() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("acme")).unwrap();
        std::fs::write(dir.path().join("acme").join("R1.xlsx"), b"xlsx").unwrap();

        let artifacts = PreparedArtifactDir::new(dir.path());
        let path = artifacts
            .artifact_for(&JobKey::new("acme", "R1"), &record("R1"))
            .await
            .unwrap();
        assert!(path.ends_with("acme/R1.xlsx"));
    }

    #[tokio::test]
    async fn test_missing_artifact_errors() {
        let dir = TempDir::new().unwrap();
        let artifacts = PreparedArtifactDir::new(dir.path());
        let err = artifacts
            .artifact_for(&JobKey::new("acme", "R2"), &record("R2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Data(DataError::ArtifactMissing { .. })));
    }
}
