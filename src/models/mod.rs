pub mod job;
pub mod order;

pub use job::{JobKey, JobState, JobStatePatch, JobStatus, JobStatusView};
pub use order::{normalize_plate, Credentials, OrderLine, RouteRecord, PLATE_MAX_LEN};
