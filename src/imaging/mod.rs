//! Image detection and recompression.
//!
//! Uploads are classified by magic number before anything else happens.
//! Streams that look like JPEG, PNG, GIF or BMP are decoded, scaled and
//! re-encoded in the same format at a factor picked from their size;
//! everything else is passed through untouched.
//!
//! ```no_run
//! use indigo_upload::config::ImageSettings;
//! use indigo_upload::imaging::{compress, PeekReader};
//! use std::io::Read;
//!
//! # fn example(file: std::fs::File) -> anyhow::Result<()> {
//! let mut reader = PeekReader::new(file);
//! if reader.sniff()?.is_image() {
//!     let mut raw = Vec::new();
//!     reader.read_to_end(&mut raw)?;
//!     let compressed = compress(&raw, &ImageSettings::default())?;
//!     println!("{} -> {} bytes", raw.len(), compressed.compressed_size());
//! }
//! # Ok(())
//! # }
//! ```

/// Magic-number classification and non-consuming peeks
pub mod sniffer;

/// Size-driven, format-preserving recompression
pub mod compressor;

pub use compressor::{compress, quality_for_size, Compressed};
pub use sniffer::{classify, ImageFormat, PeekReader};
