//! Utility functions for common operations.
//!
//! - **Files**: atomic write-then-rename replacement of output files
//! - **Text**: Unicode-aware truncation of episode titles for console output
//! - **URLs**: validation of the configured feed URLs

mod fs;
mod text;
mod url_validator;

pub use fs::atomic_write;
pub use text::{episode_label, truncate_to_width};
pub use url_validator::{validate_http_url, UrlValidationError};
