pub mod formatter;
pub mod json_path;
pub mod value;

pub use formatter::{ResponseFormat, ResponseFormatter};
pub use value::{to_text, type_name};
