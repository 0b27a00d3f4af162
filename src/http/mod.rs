pub mod cancel;
pub mod client;
pub mod request;
pub mod response;
pub mod types;

pub use cancel::CancelToken;
pub use client::{Client, ClientConfig};
pub use request::Request;
pub use response::{ResponseRecord, TransportError, TransportErrorKind};
pub use types::{Method, Status};
