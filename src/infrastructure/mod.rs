pub mod chromium;
pub mod js_executor;
pub mod session;

pub use chromium::{BrowserMode, ChromiumSession, ChromiumSessionFactory};
pub use js_executor::JsExecutor;
pub use session::{BrowserSession, OptionChoice, SessionFactory};
