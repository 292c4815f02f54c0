use std::time::Duration;

/// 车辆单号填写位置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlateField {
    /// 备注字段（#formValue）
    Observations,
    /// 采购单号字段
    PurchaseOrder,
}

impl PlateField {
    /// 解析配置值，无法识别时返回 None
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "observations" | "observaciones" => Some(Self::Observations),
            "purchase_order" => Some(Self::PurchaseOrder),
            _ => None,
        }
    }
}

/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    // --- 门户地址 ---
    pub portal_base_url: String,
    pub portal_upload_url: String,
    pub portal_cart_url: String,
    // --- 浏览器 ---
    /// 已有浏览器的调试端口；为空时启动无头浏览器
    pub browser_debug_port: Option<u16>,
    pub chrome_binary: Option<String>,
    pub browser_headless: bool,
    // --- 超时（毫秒） ---
    pub step_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub fallback_click_timeout_ms: u64,
    pub outcome_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// 任务结束时关闭浏览器会话的最长等待
    pub close_timeout_ms: u64,
    // --- 表单 ---
    pub plate_field: PlateField,
    pub purchase_channel: String,
    // --- 数据目录 ---
    /// 订单 TOML 文件存放目录
    pub orders_folder: String,
    /// 上传用表格文件存放目录
    pub artifacts_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal_base_url: "https://portal.gruponutresa.com".to_string(),
            portal_upload_url: "https://portal.gruponutresa.com/p/nuevo/pedido-masivo/excel"
                .to_string(),
            portal_cart_url: "https://portal.gruponutresa.com/carrito/resumen".to_string(),
            browser_debug_port: None,
            chrome_binary: None,
            browser_headless: true,
            step_timeout_ms: 30_000,
            navigation_timeout_ms: 60_000,
            fallback_click_timeout_ms: 10_000,
            outcome_timeout_ms: 20_000,
            poll_interval_ms: 300,
            close_timeout_ms: 15_000,
            plate_field: PlateField::Observations,
            purchase_channel: "20".to_string(),
            orders_folder: "orders".to_string(),
            artifacts_folder: "artifacts".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从任意键值来源构建配置，无法解析的值回退为默认值
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        let parsed = |name: &str| lookup(name).and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            portal_base_url: lookup("PORTAL_BASE_URL").unwrap_or(default.portal_base_url),
            portal_upload_url: lookup("PORTAL_UPLOAD_URL").unwrap_or(default.portal_upload_url),
            portal_cart_url: lookup("PORTAL_CART_URL").unwrap_or(default.portal_cart_url),
            browser_debug_port: lookup("BROWSER_DEBUG_PORT").and_then(|v| v.trim().parse().ok()),
            chrome_binary: lookup("CHROME_BINARY").or(default.chrome_binary),
            browser_headless: lookup("BROWSER_HEADLESS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default.browser_headless),
            step_timeout_ms: parsed("STEP_TIMEOUT_MS").unwrap_or(default.step_timeout_ms),
            navigation_timeout_ms: parsed("NAVIGATION_TIMEOUT_MS")
                .unwrap_or(default.navigation_timeout_ms),
            fallback_click_timeout_ms: parsed("FALLBACK_CLICK_TIMEOUT_MS")
                .unwrap_or(default.fallback_click_timeout_ms),
            outcome_timeout_ms: parsed("OUTCOME_TIMEOUT_MS").unwrap_or(default.outcome_timeout_ms),
            poll_interval_ms: parsed("POLL_INTERVAL_MS")
                .filter(|v| *v > 0)
                .unwrap_or(default.poll_interval_ms),
            close_timeout_ms: parsed("CLOSE_TIMEOUT_MS").unwrap_or(default.close_timeout_ms),
            plate_field: lookup("PLATE_FIELD")
                .and_then(|v| PlateField::parse(&v))
                .unwrap_or(default.plate_field),
            purchase_channel: lookup("PURCHASE_CHANNEL").unwrap_or(default.purchase_channel),
            orders_folder: lookup("ORDERS_FOLDER").unwrap_or(default.orders_folder),
            artifacts_folder: lookup("ARTIFACTS_FOLDER").unwrap_or(default.artifacts_folder),
            verbose_logging: lookup("VERBOSE_LOGGING")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default.verbose_logging),
        }
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn fallback_click_timeout(&self) -> Duration {
        Duration::from_millis(self.fallback_click_timeout_ms)
    }

    pub fn outcome_timeout(&self) -> Duration {
        Duration::from_millis(self.outcome_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}
