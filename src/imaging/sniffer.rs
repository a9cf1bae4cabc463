use std::fmt;
use std::io::{self, Read};

use serde::{Deserialize, Serialize};

use crate::constants::SNIFF_LEN;

/// Image format recognised from a stream's magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Unknown,
}

impl ImageFormat {
    pub fn is_image(self) -> bool {
        !matches!(self, ImageFormat::Unknown)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

// Byte 0 of the PNG signature (0x89) is deliberately not compared.
const PNG_SIGNATURE_TAIL: [u8; 7] = [0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Classify the leading bytes of a stream.
///
/// Anything shorter than eight bytes is [`ImageFormat::Unknown`].
pub fn classify(head: &[u8]) -> ImageFormat {
    if head.len() < SNIFF_LEN {
        return ImageFormat::Unknown;
    }

    match head {
        [0xFF, 0xD8, ..] => ImageFormat::Jpeg,
        [_, rest @ ..] if rest.starts_with(&PNG_SIGNATURE_TAIL) => ImageFormat::Png,
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => ImageFormat::Gif,
        [b'B', b'M' | b'A', ..] => ImageFormat::Bmp,
        _ => ImageFormat::Unknown,
    }
}

/// Reader wrapper that can look ahead without consuming.
///
/// Peeked bytes are kept in a small head buffer and handed out again by
/// subsequent reads, so the wrapped stream is observed exactly once and in
/// order.
pub struct PeekReader<R> {
    inner: R,
    head: Vec<u8>,
}

impl<R: Read> PeekReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            head: Vec::with_capacity(SNIFF_LEN),
        }
    }

    /// Return up to `n` upcoming bytes without consuming them.
    ///
    /// Short reads from the inner stream are retried until `n` bytes are
    /// buffered or the stream ends.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.head.len() < n {
            let mut chunk = vec![0u8; n - self.head.len()];
            match self.inner.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => self.head.extend_from_slice(&chunk[..read]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(&self.head[..n.min(self.head.len())])
    }

    /// Classify the stream from its first eight bytes.
    pub fn sniff(&mut self) -> io::Result<ImageFormat> {
        Ok(classify(self.peek(SNIFF_LEN)?))
    }

    /// Whether at least one more byte is available.
    pub fn has_content(&mut self) -> io::Result<bool> {
        Ok(!self.peek(1)?.is_empty())
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.head.is_empty() {
            return self.inner.read(buf);
        }
        let n = buf.len().min(self.head.len());
        buf[..n].copy_from_slice(&self.head[..n]);
        self.head.drain(..n);
        Ok(n)
    }
}
