pub mod artifacts;
pub mod diagnostics;
pub mod order_provider;

pub use artifacts::{PreparedArtifactDir, UploadArtifacts};
pub use diagnostics::{probe_reachability, ProbeResult, ReachabilityReport};
pub use order_provider::{OrderDataProvider, TomlOrderProvider};
