//! Upload pipeline: sniff → compress → connect → ensure directory → put.
//!
//! [`Uploader`] is the entry point calling services use. Each call opens
//! its own remote session through the configured [`Connector`] and releases
//! it before returning; nothing is pooled or retried.
//!
//! ## Remote layout
//!
//! ```text
//! {base_path}/{logical_path}/{YYYYMMDD}/{file_name}
//! ```
//!
//! The caller gets back `{logical_path}/{YYYYMMDD}/{file_name}`, which is
//! what [`Uploader::fetch`] and [`Uploader::delete`] accept.
//!
//! ## Usage
//!
//! ```no_run
//! use indigo_upload::config::load_or_create_config;
//! use indigo_upload::pipeline::Uploader;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = load_or_create_config(Some(Path::new("upload.yaml")))?;
//! let uploader = Uploader::from_config(&config)?;
//!
//! let stored = uploader.store_file(Path::new("/tmp/avatar.png"), "avatars")?;
//! println!("stored at {}", stored.relative_path);
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{ImageSettings, SftpConfig};
use crate::constants::DATE_DIR_FORMAT;
use crate::error::{Result, UploadError};
use crate::imaging::{compress, quality_for_size, ImageFormat, PeekReader};
use crate::remote::{Connector, Removal, SessionGuard, SftpConnector};
use crate::security::{
    join_relative, join_remote, validate_file_name, validate_logical_path, validate_relative_path,
};

/// Tokio facade with deadlines
pub mod async_uploader;

pub use async_uploader::AsyncUploader;

/// What happened to the payload before upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompressionOutcome {
    /// Stream did not sniff as an image and was uploaded as-is
    NotImage,
    /// Image detected but recompression is switched off
    Disabled,
    Compressed {
        quality: f32,
        original_size: u64,
        compressed_size: u64,
    },
    /// Recompression failed and the original bytes were uploaded.
    /// `quality` is the factor the size bracket selected; it was not applied.
    FellBack { quality: f32, reason: String },
}

/// Reference to a stored file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFileRef {
    /// Path relative to the base path, as accepted by fetch/delete
    pub relative_path: String,
    /// Absolute path on the remote host
    pub remote_path: String,
    pub format: ImageFormat,
    /// Bytes written to the remote file
    pub size: u64,
    pub compression: CompressionOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

impl DeleteOutcome {
    pub fn is_deleted(self) -> bool {
        self == DeleteOutcome::Deleted
    }
}

enum Payload<R> {
    Buffered(Vec<u8>),
    Streamed(PeekReader<R>),
}

type DateSource = Box<dyn Fn() -> NaiveDate + Send + Sync>;

/// Stores, fetches and deletes files on a remote file store.
pub struct Uploader {
    connector: Box<dyn Connector>,
    base_path: String,
    image: ImageSettings,
    today: DateSource,
}

impl Uploader {
    pub fn new(connector: impl Connector + 'static, base_path: &str, image: ImageSettings) -> Self {
        Self {
            connector: Box::new(connector),
            base_path: base_path.to_string(),
            image,
            today: Box::new(|| Local::now().date_naive()),
        }
    }

    /// Build an SFTP-backed uploader from configuration.
    pub fn from_config(config: &SftpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            SftpConnector::new(config.clone()),
            &config.base_path,
            config.image.clone(),
        ))
    }

    /// Replace the clock used for the dated directory.
    pub fn with_date_source(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Box::new(today);
        self
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Store `content` under `logical_path` as `file_name`.
    ///
    /// Images are recompressed first; if that fails the original bytes are
    /// uploaded instead. Empty content is rejected without connecting.
    pub fn store<R: Read>(&self, content: R, logical_path: &str, file_name: &str) -> Result<StoredFileRef> {
        let start = Instant::now();
        let result = self.store_inner(content, logical_path, file_name);
        match &result {
            Ok(stored) => info!(
                "Stored {} ({} bytes, {:?}) in {:?}",
                stored.remote_path,
                stored.size,
                stored.compression,
                start.elapsed()
            ),
            Err(e) => error!("Upload of {} under '{}' failed: {}", file_name, logical_path, e),
        }
        result
    }

    /// Store an in-memory buffer.
    pub fn store_bytes(&self, content: &[u8], logical_path: &str, file_name: &str) -> Result<StoredFileRef> {
        self.store(Cursor::new(content), logical_path, file_name)
    }

    /// Store a local file, keeping its file name.
    pub fn store_file(&self, local_path: &Path, logical_path: &str) -> Result<StoredFileRef> {
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                UploadError::Validation(format!("{} has no file name", local_path.display()))
            })?;
        let file = fs::File::open(local_path)?;
        self.store(file, logical_path, &file_name)
    }

    fn store_inner<R: Read>(&self, content: R, logical_path: &str, file_name: &str) -> Result<StoredFileRef> {
        validate_logical_path(logical_path)?;
        validate_file_name(file_name)?;

        let mut reader = PeekReader::new(content);
        let format = reader.sniff()?;

        let (mut payload, compression) = if format.is_image() {
            let mut raw = Vec::new();
            reader.read_to_end(&mut raw)?;
            let (bytes, outcome) = self.prepare_image(raw);
            (Payload::Buffered(bytes), outcome)
        } else {
            (Payload::Streamed(reader), CompressionOutcome::NotImage)
        };

        let has_content = match &mut payload {
            Payload::Buffered(bytes) => !bytes.is_empty(),
            Payload::Streamed(reader) => reader.has_content()?,
        };
        if !has_content {
            return Err(UploadError::Validation("no content to upload".into()));
        }

        let date_dir = (self.today)().format(DATE_DIR_FORMAT).to_string();
        let target_dir = join_remote(&[self.base_path.as_str(), logical_path, date_dir.as_str()]);
        let remote_path = join_remote(&[target_dir.as_str(), file_name]);

        let mut session = SessionGuard::acquire(self.connector.as_ref())?;
        session.ensure_directory(&target_dir)?;
        let size = match &mut payload {
            Payload::Buffered(bytes) => session.put(&mut bytes.as_slice(), &remote_path)?,
            Payload::Streamed(reader) => session.put(reader, &remote_path)?,
        };
        drop(session);

        Ok(StoredFileRef {
            relative_path: join_relative(&[logical_path, date_dir.as_str(), file_name]),
            remote_path,
            format,
            size,
            compression,
        })
    }

    fn prepare_image(&self, raw: Vec<u8>) -> (Vec<u8>, CompressionOutcome) {
        if !self.image.enabled {
            return (raw, CompressionOutcome::Disabled);
        }

        match compress(&raw, &self.image) {
            Ok(compressed) => {
                let outcome = CompressionOutcome::Compressed {
                    quality: compressed.quality,
                    original_size: raw.len() as u64,
                    compressed_size: compressed.compressed_size() as u64,
                };
                (compressed.bytes, outcome)
            }
            Err(e) => {
                let quality = quality_for_size(raw.len() as u64);
                warn!("Image compression failed, uploading original bytes: {}", e);
                (
                    raw,
                    CompressionOutcome::FellBack {
                        quality,
                        reason: e.to_string(),
                    },
                )
            }
        }
    }

    /// Read back a file stored earlier. `None` when it does not exist.
    pub fn fetch(&self, relative_path: &str) -> Result<Option<Vec<u8>>> {
        validate_relative_path(relative_path)?;
        let remote_path = join_remote(&[self.base_path.as_str(), relative_path]);

        let result = SessionGuard::acquire(self.connector.as_ref())
            .and_then(|mut session| session.get(&remote_path));

        match &result {
            Ok(Some(bytes)) => debug!("Fetched {} ({} bytes)", remote_path, bytes.len()),
            Ok(None) => debug!("Fetch of {}: not found", remote_path),
            Err(e) => error!("Fetch of {} failed: {}", remote_path, e),
        }
        result
    }

    /// Delete a file stored earlier.
    pub fn delete(&self, relative_path: &str) -> Result<DeleteOutcome> {
        validate_relative_path(relative_path)?;
        let remote_path = join_remote(&[self.base_path.as_str(), relative_path]);

        let result = SessionGuard::acquire(self.connector.as_ref())
            .and_then(|mut session| session.remove(&remote_path))
            .map(|removal| match removal {
                Removal::Removed => DeleteOutcome::Deleted,
                Removal::NotFound => DeleteOutcome::NotFound,
            });

        match &result {
            Ok(DeleteOutcome::Deleted) => info!("Deleted {}", remote_path),
            Ok(DeleteOutcome::NotFound) => warn!("Delete of {}: not found", remote_path),
            Err(e) => error!("Delete of {} failed: {}", remote_path, e),
        }
        result
    }
}
