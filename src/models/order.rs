use std::fmt;

use serde::{Deserialize, Serialize};

/// 车牌最大长度，超出部分截断
pub const PLATE_MAX_LEN: usize = 17;

/// 一行订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub route: String,
    pub product_code: u64,
    pub product: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    pub quantity: u32,
}

fn default_unit() -> String {
    "UN".to_string()
}

/// 一条路线的上传数据
#[derive(Debug, Clone, PartialEq)]
pub struct RouteRecord {
    pub route: String,
    pub plate: String,
    pub orders: Vec<OrderLine>,
}

impl RouteRecord {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// 门户登录凭据，仅在一次任务执行中传递
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"***")
            .finish()
    }
}

/// 规范化车牌：为空时使用路线号，超长截断
pub fn normalize_plate(plate: &str, route: &str) -> String {
    let plate = plate.trim();
    let plate = if plate.is_empty() { route.trim() } else { plate };
    plate.chars().take(PLATE_MAX_LEN).collect()
}
