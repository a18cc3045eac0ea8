#![allow(unreachable_pub)]

mod error;
mod message;
mod request;

pub use error::ErrorKind;
pub use message::{Answer, Block, SseMessage, WebResult};
pub use request::{API_VERSION, QueryParams, QueryRequest};

/// The plexi `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
