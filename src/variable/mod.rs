pub mod capture;
pub mod config;
pub mod resolver;
pub mod types;

pub use capture::{CaptureError, CaptureSource, VariableCapture, apply_captures, run_captures};
pub use config::{VariableFileError, VariableFileFormat, VariableFileLoader};
pub use resolver::{VariableResolver, resolve_variables};
pub use types::{Environment, EnvironmentSet, VariableStore};
