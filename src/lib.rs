pub mod assertion;
pub mod config;
pub mod error;
pub mod http;
pub mod logger;
pub mod parser;
pub mod runner;
pub mod utils;
pub mod variable;

// Re-export commonly used types
pub use assertion::{AssertionReport, run_assertions};
pub use error::{RestbundleError, Result};
pub use http::{CancelToken, Client, ResponseRecord};
pub use parser::{EffectiveRequest, ValidationError, merge_request};
pub use variable::{VariableStore, resolve_variables, run_captures};
