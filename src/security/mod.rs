//! Keeping credentials out of logs and error messages.

pub mod credential_scrubber;

pub use credential_scrubber::{is_sensitive_path, safe_error_message, scrub_credentials, scrub_path};
