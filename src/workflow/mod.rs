pub mod flow;
pub mod interpreter;
pub mod portal_flows;

pub use flow::{Flow, OptionChoice, Step, StepAction, StepKind};
pub use interpreter::{FlowInterpreter, JobContext, DEFAULT_POLL_INTERVAL};
pub use portal_flows::{describe_step, login_flow, upload_flow};
