pub mod executor;
pub mod reporter;
pub mod types;

pub use executor::{RunEnvironment, TestExecutor};
pub use reporter::TestReporter;
pub use types::{RequestOutcome, RequestResult, RunReport, RunSummary};
