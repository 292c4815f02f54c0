//! # Route Order Submit
//!
//! 通过浏览器自动化，把配送路线的订单批量提交到只有网页界面的订货门户
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（浏览器会话），只暴露能力
//! - `BrowserSession` - 导航、填写、选择、点击、上传、探测、关闭
//! - `ChromiumSession` - 基于 chromiumoxide 的实现，`JsExecutor` 负责页面脚本
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `OrderDataProvider` - 路线订单与车牌
//! - `UploadArtifacts` - 路线上传文件
//! - `diagnostics` - 门户连通性检查
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 声明式步骤与解释执行
//! - `Flow` / `Step` - 登录流程、单条路线上传流程
//! - `FlowInterpreter` - 逐步执行，超时与取消约束，结果轮询
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/dispatcher` - FIFO 队列与唯一 Worker，入队、取消、状态查询
//! - `orchestrator/job_runner` - 单个任务：会话 → 登录 → 上传
//!
//! 任务状态统一保存在 `store::JobStateStore`。
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, PlateField};
pub use error::{AppError, AppResult};
pub use infrastructure::{BrowserSession, ChromiumSessionFactory, SessionFactory};
pub use models::{Credentials, JobKey, JobState, JobStatus, JobStatusView};
pub use orchestrator::{Dispatcher, JobControl, JobRunner, JobSummary};
pub use store::JobStateStore;
pub use workflow::{Flow, FlowInterpreter, Step};
