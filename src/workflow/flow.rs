//! 声明式流程模型
//!
//! 一个 `Flow` 是若干 `Step` 加上成功/失败判定标记，
//! 描述一次完整的页面交互（登录、上传一条路线）

use std::fmt::{self, Display};
use std::path::PathBuf;
use std::time::Duration;

pub use crate::infrastructure::OptionChoice;

/// 步骤动作
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    Navigate {
        url: String,
    },
    Fill {
        target: String,
        value: String,
    },
    Select {
        target: String,
        choice: OptionChoice,
    },
    /// 主目标在 `fallback_window` 内不可点击时改点备用目标
    Click {
        target: String,
        fallback: Option<String>,
    },
    Upload {
        target: String,
        file: PathBuf,
    },
}

/// 步骤类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Navigate,
    Fill,
    Select,
    Click,
    Upload,
}

impl Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Navigate => "navigate",
            StepKind::Fill => "fill",
            StepKind::Select => "select",
            StepKind::Click => "click",
            StepKind::Upload => "upload",
        };
        f.write_str(name)
    }
}

impl StepAction {
    pub fn kind(&self) -> StepKind {
        match self {
            StepAction::Navigate { .. } => StepKind::Navigate,
            StepAction::Fill { .. } => StepKind::Fill,
            StepAction::Select { .. } => StepKind::Select,
            StepAction::Click { .. } => StepKind::Click,
            StepAction::Upload { .. } => StepKind::Upload,
        }
    }

    /// 动作作用的目标（地址或选择器）
    pub fn target(&self) -> &str {
        match self {
            StepAction::Navigate { url } => url,
            StepAction::Fill { target, .. }
            | StepAction::Select { target, .. }
            | StepAction::Click { target, .. }
            | StepAction::Upload { target, .. } => target,
        }
    }
}

/// 单个步骤
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub name: String,
    pub action: StepAction,
    pub timeout: Duration,
    /// 带备用目标的点击，主目标只等待这么久
    pub fallback_window: Option<Duration>,
}

impl Step {
    pub fn new(name: impl Into<String>, action: StepAction, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            action,
            timeout,
            fallback_window: None,
        }
    }

    pub fn navigate(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(name, StepAction::Navigate { url: url.into() }, timeout)
    }

    pub fn fill(
        name: impl Into<String>,
        target: impl Into<String>,
        value: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self::new(
            name,
            StepAction::Fill {
                target: target.into(),
                value: value.into(),
            },
            timeout,
        )
    }

    pub fn select(
        name: impl Into<String>,
        target: impl Into<String>,
        choice: OptionChoice,
        timeout: Duration,
    ) -> Self {
        Self::new(
            name,
            StepAction::Select {
                target: target.into(),
                choice,
            },
            timeout,
        )
    }

    pub fn click(name: impl Into<String>, target: impl Into<String>, timeout: Duration) -> Self {
        Self::new(
            name,
            StepAction::Click {
                target: target.into(),
                fallback: None,
            },
            timeout,
        )
    }

    pub fn click_with_fallback(
        name: impl Into<String>,
        target: impl Into<String>,
        fallback: impl Into<String>,
        fallback_window: Duration,
        timeout: Duration,
    ) -> Self {
        let mut step = Self::new(
            name,
            StepAction::Click {
                target: target.into(),
                fallback: Some(fallback.into()),
            },
            timeout,
        );
        step.fallback_window = Some(fallback_window);
        step
    }

    pub fn upload(
        name: impl Into<String>,
        target: impl Into<String>,
        file: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self::new(
            name,
            StepAction::Upload {
                target: target.into(),
                file: file.into(),
            },
            timeout,
        )
    }

    pub fn kind(&self) -> StepKind {
        self.action.kind()
    }
}

/// 一次完整的页面交互
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub name: String,
    pub steps: Vec<Step>,
    pub success_probe: String,
    pub error_probe: Option<String>,
    pub overall_timeout: Duration,
}

impl Flow {
    pub fn new(
        name: impl Into<String>,
        success_probe: impl Into<String>,
        overall_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
            success_probe: success_probe.into(),
            error_probe: None,
            overall_timeout,
        }
    }

    pub fn with_error_probe(mut self, probe: impl Into<String>) -> Self {
        self.error_probe = Some(probe.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// 结果轮询阶段使用的合成步骤名
    pub fn outcome_step_name(&self) -> String {
        format!("{} outcome", self.name)
    }
}
