//! # indigo-upload
//!
//! File upload pipeline for services that keep user content on an SFTP host.
//!
//! ## Overview
//!
//! A caller hands over a byte stream, a logical path and a file name. The
//! pipeline sniffs the stream's magic number, recompresses it when it is an
//! image, opens a fresh SFTP session, makes sure a dated directory exists and
//! uploads the file. The session is closed on every exit path and the caller
//! receives the stored relative path or a typed [`error::UploadError`].
//!
//! ## Features
//!
//! - **Magic-number sniffing**: JPEG, PNG, GIF and BMP detection without consuming the stream
//! - **Size-driven recompression**: re-encoding in the source format, scaled by a factor picked from the input size
//! - **Scoped sessions**: one session per operation, released by a drop guard
//! - **Dated layout**: `{base}/{logical}/{YYYYMMDD}/{file}`
//! - **Tri-state lookups**: not-found is a normal outcome for fetch and delete
//! - **Async facade**: tokio wrapper with an overall deadline
//!
//! ## Usage
//!
//! ```no_run
//! use indigo_upload::config::load_or_create_config;
//! use indigo_upload::pipeline::Uploader;
//! use std::fs::File;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = load_or_create_config(Some(Path::new("upload.yaml")))?;
//! let uploader = Uploader::from_config(&config)?;
//!
//! let stored = uploader.store(File::open("/tmp/a.jpg")?, "avatars", "a.jpg")?;
//! println!("Stored at {}", stored.relative_path);
//!
//! let bytes = uploader.fetch(&stored.relative_path)?;
//! println!("Fetched {} bytes", bytes.map(|b| b.len()).unwrap_or(0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: Session, credential and image settings
//! - [`constants`]: Compression brackets and session defaults
//! - [`error`]: Error types and validation helpers
//! - [`imaging`]: Magic-number sniffing and recompression
//! - [`remote`]: Remote file store sessions (SFTP and in-memory)
//! - [`pipeline`]: The upload/fetch/delete entry points
//! - [`response`]: API response envelope
//! - [`security`]: Credential scrubbing and path validation

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Remote session configuration loading
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Error types returned at the pipeline boundary
pub mod error;

/// Image detection and recompression
pub mod imaging;

/// Remote file store sessions
pub mod remote;

/// Upload, fetch and delete orchestration
pub mod pipeline;

/// Response envelope for calling services
pub mod response;

/// Security utilities for path validation and credential protection
pub mod security;

pub use error::{ErrorKind, UploadError};
pub use pipeline::{AsyncUploader, CompressionOutcome, DeleteOutcome, StoredFileRef, Uploader};
