//! Utility functions shared by the providers and the terminal renderer.
//!
//! - **URL validation**: provider base URLs must be HTTPS (localhost excepted
//!   so tests can point at a mock server); article URLs must be http(s).
//! - **Text processing**: sanitising provider text before it reaches a
//!   terminal, and width-aware truncation for card rendering.

mod text;
mod url_validator;

pub use text::{sanitize_line, truncate_to_width};
pub use url_validator::{validate_article_url, validate_base_url, UrlValidationError};
