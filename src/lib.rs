pub mod config;
pub mod core;
pub mod errors;

// Re-export commonly used items for convenience
pub use config::{ClientConfig, TranscriptPolicy};
pub use core::*;
pub use errors::{ClientError, ClientResult};
