//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `dispatcher` - 任务调度器
//! - 入队校验与状态登记
//! - FIFO 队列与唯一的 Worker
//! - 取消、状态查询
//!
//! ### `job_runner` - 单个任务执行器
//! - 准备订单数据
//! - 打开并独占浏览器会话
//! - 登录后逐条路线执行上传流程
//!
//! ### `job_control` - 任务控制句柄
//! - 取消标记与当前会话
//!
//! ## 层次关系
//!
//! ```text
//! dispatcher (Vec<JobKey>, FIFO)
//!     ↓
//! job_runner (单个 JobKey)
//!     ↓
//! workflow::FlowInterpreter (单个 Flow)
//!     ↓
//! infrastructure (BrowserSession)
//! ```

pub mod dispatcher;
pub mod job_control;
pub mod job_runner;

pub use dispatcher::Dispatcher;
pub use job_control::JobControl;
pub use job_runner::{JobRunner, JobSummary};
