pub mod job_state_store;

pub use job_state_store::{Admission, JobEntry, JobStateStore};
