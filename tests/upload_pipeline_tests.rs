//! Integration tests for the upload pipeline.
//!
//! These tests drive `Uploader` end to end against the in-memory store so
//! directory creation, session release and the returned paths can be
//! asserted without an SSH server.

use std::fs;
use std::io::Cursor;

use anyhow::Result;
use chrono::NaiveDate;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::TempDir;

use indigo_upload::config::ImageSettings;
use indigo_upload::imaging::ImageFormat;
use indigo_upload::remote::MemoryConnector;
use indigo_upload::{CompressionOutcome, DeleteOutcome, ErrorKind, Uploader};

fn uploader_on(connector: &MemoryConnector, date: NaiveDate) -> Uploader {
    Uploader::new(connector.clone(), "/data", ImageSettings::default())
        .with_date_source(move || date)
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, if x % 2 == 0 { 255 } else { 64 }])
    });
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
        .unwrap();
    bytes
}

/// A 500-byte JPEG-signature upload lands in the dated directory
#[test]
fn test_store_jpeg_signature_end_to_end() -> Result<()> {
    let connector = MemoryConnector::new();
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());

    let mut content = vec![0xFF, 0xD8, 0xFF, 0xE0];
    content.resize(500, 0x20);

    let stored = uploader.store(Cursor::new(content.clone()), "avatars/", "a.jpg")?;

    assert_eq!(stored.relative_path, "avatars/20240309/a.jpg");
    assert_eq!(stored.remote_path, "/data/avatars/20240309/a.jpg");
    assert_eq!(stored.format, ImageFormat::Jpeg);
    // 500 bytes is 0 KB: the lightest bracket applies
    match &stored.compression {
        CompressionOutcome::FellBack { quality, .. } => assert_eq!(*quality, 0.85),
        other => panic!("unexpected compression outcome {:?}", other),
    }
    assert_eq!(connector.file(&stored.remote_path), Some(content));
    assert_eq!(connector.open_sessions(), 0);
    Ok(())
}

/// A real PNG is recompressed and stays a PNG under its own name
#[test]
fn test_store_png_is_recompressed() -> Result<()> {
    let connector = MemoryConnector::new();
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 5, 17).unwrap());
    let png = png_bytes(120, 80);

    let stored = uploader.store_bytes(&png, "gallery", "p.png")?;

    assert_eq!(stored.format, ImageFormat::Png);
    match stored.compression {
        CompressionOutcome::Compressed {
            quality,
            original_size,
            compressed_size,
        } => {
            assert_eq!(quality, 0.85);
            assert_eq!(original_size, png.len() as u64);
            assert_eq!(compressed_size, stored.size);
        }
        other => panic!("unexpected compression outcome {:?}", other),
    }

    let remote = connector.file("/data/gallery/20240517/p.png").unwrap();
    assert_eq!(image::guess_format(&remote)?, image::ImageFormat::Png);
    let decoded = image::load_from_memory(&remote)?;
    assert_eq!((decoded.width(), decoded.height()), (102, 68));
    // Transparency survives; only JPEG output is flattened
    assert!(decoded.to_rgba8().pixels().any(|pixel| pixel[3] < 255));
    Ok(())
}

/// A decodable JPEG is re-encoded at the lightest bracket's quality
#[test]
fn test_store_real_jpeg_applies_quality() -> Result<()> {
    let connector = MemoryConnector::new();
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 5, 17).unwrap());

    let photo = RgbImage::from_fn(80, 60, |x, y| Rgb([(x * 3) as u8, (y * 4) as u8, 200]));
    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(photo).write_to(&mut Cursor::new(&mut jpeg), ImageOutputFormat::Jpeg(95))?;

    let stored = uploader.store_bytes(&jpeg, "avatars", "a.jpg")?;

    match stored.compression {
        CompressionOutcome::Compressed { quality, .. } => assert_eq!(quality, 0.85),
        other => panic!("unexpected compression outcome {:?}", other),
    }
    let remote = connector.file(&stored.remote_path).unwrap();
    assert_eq!(image::guess_format(&remote)?, image::ImageFormat::Jpeg);
    Ok(())
}

/// Empty input is rejected without opening a session
#[test]
fn test_store_empty_input_is_validation_error() {
    let connector = MemoryConnector::new();
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    let err = uploader.store(Cursor::new(Vec::new()), "avatars", "a.jpg").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.code(), 100);
    assert_eq!(connector.sessions_opened(), 0);
}

/// An unreachable host fails the store and leaves nothing open
#[test]
fn test_connection_failure_leaves_no_session() {
    let connector = MemoryConnector::new();
    connector.refuse_connections(true);
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    let err = uploader.store_bytes(b"report body", "docs", "r.txt").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(connector.open_sessions(), 0);
    assert!(connector.file_paths().is_empty());
}

/// Transfer failures still release the session
#[test]
fn test_transfer_failure_releases_session() {
    let connector = MemoryConnector::new();
    connector.fail_transfers(true);
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    let err = uploader.store_bytes(b"report body", "docs", "r.txt").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transfer);
    assert_eq!(connector.sessions_opened(), 1);
    assert_eq!(connector.open_sessions(), 0);
    // The dated directory was created before the put failed
    assert!(connector.has_directory("/data/docs/20240101"));
}

/// A failed directory lookup is a directory error and releases the session
#[test]
fn test_directory_lookup_failure_is_directory_error() {
    let connector = MemoryConnector::new();
    connector.fail_lookups(true);
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    let err = uploader.store_bytes(b"report body", "docs", "r.txt").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Directory);
    assert_eq!(err.code(), 500);
    assert_eq!(connector.open_sessions(), 0);
    assert!(connector.file_paths().is_empty());
}

/// Repeated stores into the same day reuse the directory and overwrite
#[test]
fn test_repeated_store_overwrites() -> Result<()> {
    let connector = MemoryConnector::new();
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

    uploader.store_bytes(b"first", "docs", "same.txt")?;
    let stored = uploader.store_bytes(b"second", "docs", "same.txt")?;

    assert_eq!(stored.relative_path, "docs/20240229/same.txt");
    assert_eq!(connector.file(&stored.remote_path), Some(b"second".to_vec()));
    assert_eq!(connector.file_paths().len(), 1);
    Ok(())
}

/// A directory created by another client mid-upload is not an error
#[test]
fn test_concurrent_directory_creation_tolerated() -> Result<()> {
    let connector = MemoryConnector::new();
    connector.race_directory_creation("/data/docs/20240101");
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    let stored = uploader.store_bytes(b"body", "docs", "r.txt")?;
    assert_eq!(connector.file(&stored.remote_path), Some(b"body".to_vec()));
    Ok(())
}

/// Local files keep their name
#[test]
fn test_store_file_uses_local_name() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let local = temp_dir.path().join("notes.txt");
    fs::write(&local, b"meeting notes")?;

    let connector = MemoryConnector::new();
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2023, 11, 28).unwrap());
    let stored = uploader.store_file(&local, "users/42")?;

    assert_eq!(stored.relative_path, "users/42/20231128/notes.txt");
    assert_eq!(
        connector.file("/data/users/42/20231128/notes.txt"),
        Some(b"meeting notes".to_vec())
    );
    Ok(())
}

/// A missing local file is an I/O error and never connects
#[test]
fn test_store_file_missing_local_file() {
    let connector = MemoryConnector::new();
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    let err = uploader
        .store_file(std::path::Path::new("/definitely/not/here.bin"), "docs")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(connector.sessions_opened(), 0);
}

/// Fetch returns stored bytes, and None for missing files
#[test]
fn test_fetch_found_and_missing() -> Result<()> {
    let connector = MemoryConnector::new();
    connector.insert_file("/data/docs/20240101/r.txt", b"stored".to_vec());
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    assert_eq!(uploader.fetch("docs/20240101/r.txt")?, Some(b"stored".to_vec()));
    assert_eq!(uploader.fetch("docs/20240101/missing.txt")?, None);
    assert_eq!(connector.open_sessions(), 0);
    Ok(())
}

/// Deleting a missing file is reported as NotFound, distinct from transport errors
#[test]
fn test_delete_missing_is_distinguished_from_transport_error() -> Result<()> {
    let connector = MemoryConnector::new();
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    let outcome = uploader.delete("docs/20240101/ghost.txt")?;
    assert_eq!(outcome, DeleteOutcome::NotFound);
    assert!(!outcome.is_deleted());

    connector.fail_transfers(true);
    let err = uploader.delete("docs/20240101/ghost.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transfer);

    assert_eq!(connector.open_sessions(), 0);
    Ok(())
}

/// Deleting an existing file removes it
#[test]
fn test_delete_existing_file() -> Result<()> {
    let connector = MemoryConnector::new();
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    let stored = uploader.store_bytes(b"temporary", "tmp", "t.bin")?;
    assert_eq!(uploader.delete(&stored.relative_path)?, DeleteOutcome::Deleted);
    assert_eq!(connector.file(&stored.remote_path), None);
    Ok(())
}

/// Traversal in caller paths is rejected up front
#[test]
fn test_traversal_rejected() {
    let connector = MemoryConnector::new();
    let uploader = uploader_on(&connector, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

    assert_eq!(
        uploader.store_bytes(b"x", "../../etc", "passwd").unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert_eq!(
        uploader.fetch("docs/../../etc/passwd").unwrap_err().kind(),
        ErrorKind::Validation
    );
    assert_eq!(connector.sessions_opened(), 0);
}
