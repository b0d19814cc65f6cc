pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod predictions;
pub mod prompt;
pub mod types;

pub use error::{LlmError, LlmResult};
