//! Security utilities and validation functions.
//!
//! This module provides:
//! - Credential scrubbing for errors and log lines
//! - Validation of caller-supplied remote paths and file names
//! - Traversal-free joining of remote path fragments

pub mod credential_scrubber;
pub mod path_validator;

pub use credential_scrubber::{safe_error_message, scrub_credentials, scrub_path};
pub use path_validator::{
    join_relative, join_remote, segments, validate_file_name, validate_logical_path,
    validate_relative_path,
};
