// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A seekable byte stream over encoded image data.
///
/// Anything that can be read and seeked from any thread qualifies.
pub trait ImageSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ImageSource for T {}

/// Errors raised while opening an [`ImageSource`].
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The underlying bytes could not be opened.
    #[error("failed to open image source '{key}': {source}")]
    Io {
        /// Key of the source that failed.
        key: String,
        /// The I/O failure.
        #[source]
        source: io::Error,
    },
}

/// Opens fresh [`ImageSource`] streams over the same image.
///
/// A factory is re-openable: every call to [`ImageSourceFactory::create`]
/// yields an independent stream positioned at the start. Each region decoder
/// in a pool holds its own stream. Two factories with the same
/// [`key`](ImageSourceFactory::key) are assumed to produce the same bytes;
/// the key also identifies the image in tile cache keys.
pub trait ImageSourceFactory: fmt::Debug + Send + Sync {
    /// Stable identity of the image.
    fn key(&self) -> &str;

    /// Opens a new stream positioned at the first byte.
    fn create(&self) -> Result<Box<dyn ImageSource>, SourceError>;
}

/// In-memory encoded image bytes.
#[derive(Clone)]
pub struct BytesImageSourceFactory {
    key: String,
    bytes: Arc<[u8]>,
}

impl BytesImageSourceFactory {
    /// Wraps `bytes` under the given cache `key`.
    pub fn new(key: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            key: key.into(),
            bytes: bytes.into(),
        }
    }

    /// The encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for BytesImageSourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BytesImageSourceFactory")
            .field("key", &self.key)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ImageSourceFactory for BytesImageSourceFactory {
    fn key(&self) -> &str {
        &self.key
    }

    fn create(&self) -> Result<Box<dyn ImageSource>, SourceError> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.bytes))))
    }
}

/// Encoded image stored in a file.
#[derive(Clone, Debug)]
pub struct FileImageSourceFactory {
    key: String,
    path: PathBuf,
}

impl FileImageSourceFactory {
    /// Creates a factory for `path`. The key is `file://` followed by the path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            key: format!("file://{}", path.display()),
            path,
        }
    }

    /// The file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ImageSourceFactory for FileImageSourceFactory {
    fn key(&self) -> &str {
        &self.key
    }

    fn create(&self) -> Result<Box<dyn ImageSource>, SourceError> {
        let file = File::open(&self.path).map_err(|source| SourceError::Io {
            key: self.key.clone(),
            source,
        })?;
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::SeekFrom;

    #[test]
    fn bytes_factory_reopens_independent_streams() {
        let factory = BytesImageSourceFactory::new("mem", vec![1_u8, 2, 3, 4]);
        let mut a = factory.create().unwrap();
        let mut b = factory.create().unwrap();
        let mut buf = [0_u8; 2];
        a.seek(SeekFrom::Start(2)).unwrap();
        a.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [3, 4], "seek within the first stream");
        b.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2], "second stream starts at the beginning");
        assert_eq!(factory.key(), "mem", "key is kept");
    }

    #[test]
    fn missing_file_reports_key() {
        let factory = FileImageSourceFactory::new("/definitely/not/here.png");
        let err = factory.create().err().unwrap();
        assert!(
            err.to_string().contains("file:///definitely/not/here.png"),
            "error should name the source, got {err}"
        );
    }
}
