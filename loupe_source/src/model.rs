// Copyright 2025 the Loupe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Turning loader-specific models into image sources.
//!
//! Image loading libraries describe "what to show" with their own model
//! values: paths, URIs, byte buffers, or library specific request types. A
//! [`ModelToImageSource`] recognizes some of those models and produces an
//! [`ImageSourceFactory`] for them. Integrations register converters in a
//! [`ModelToImageSourceChain`], which asks each converter in order and uses
//! the first answer.

use std::any::Any;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use crate::{BytesImageSourceFactory, FileImageSourceFactory, ImageSourceFactory};

/// Converts a model value into an image source, if recognized.
pub trait ModelToImageSource: fmt::Debug + Send + Sync {
    /// Returns a factory for `model`, or `None` to let the next converter try.
    fn image_source(&self, model: &dyn Any) -> Option<Arc<dyn ImageSourceFactory>>;
}

/// Recognizes local files.
///
/// Accepted models: [`PathBuf`], and `String` or `&'static str` holding either
/// a plain absolute path or a `file://` URI.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileModelToImageSource;

impl FileModelToImageSource {
    fn from_path_str(s: &str) -> Option<Arc<dyn ImageSourceFactory>> {
        let path = if let Some(rest) = s.strip_prefix("file://") {
            rest
        } else if s.starts_with('/') {
            s
        } else {
            return None;
        };
        Some(Arc::new(FileImageSourceFactory::new(path)))
    }
}

impl ModelToImageSource for FileModelToImageSource {
    fn image_source(&self, model: &dyn Any) -> Option<Arc<dyn ImageSourceFactory>> {
        if let Some(path) = model.downcast_ref::<PathBuf>() {
            return Some(Arc::new(FileImageSourceFactory::new(path.clone())));
        }
        if let Some(s) = model.downcast_ref::<String>() {
            return Self::from_path_str(s);
        }
        if let Some(s) = model.downcast_ref::<&'static str>() {
            return Self::from_path_str(s);
        }
        None
    }
}

/// Recognizes in-memory encoded bytes.
///
/// Accepted models: `Vec<u8>` and `Arc<[u8]>`. The key is derived from the
/// length and a content hash, so equal buffers share cache entries.
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesModelToImageSource;

impl BytesModelToImageSource {
    fn key_for(bytes: &[u8]) -> String {
        // Only needs to be stable within a process.
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        format!("bytes://{}-{:016x}", bytes.len(), hasher.finish())
    }
}

impl ModelToImageSource for BytesModelToImageSource {
    fn image_source(&self, model: &dyn Any) -> Option<Arc<dyn ImageSourceFactory>> {
        let bytes: Arc<[u8]> = if let Some(v) = model.downcast_ref::<Vec<u8>>() {
            Arc::from(v.as_slice())
        } else if let Some(a) = model.downcast_ref::<Arc<[u8]>>() {
            Arc::clone(a)
        } else {
            return None;
        };
        let key = Self::key_for(&bytes);
        Some(Arc::new(BytesImageSourceFactory::new(key, bytes)))
    }
}

/// Ordered list of converters; the first non-`None` answer wins.
#[derive(Debug)]
pub struct ModelToImageSourceChain {
    converters: Vec<Box<dyn ModelToImageSource>>,
}

impl ModelToImageSourceChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            converters: Vec::new(),
        }
    }

    /// Appends a converter, tried after those already registered.
    pub fn push(&mut self, converter: impl ModelToImageSource + 'static) {
        self.converters.push(Box::new(converter));
    }

    /// Inserts a converter that is tried before all others.
    pub fn push_front(&mut self, converter: impl ModelToImageSource + 'static) {
        self.converters.insert(0, Box::new(converter));
    }

    /// Number of registered converters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.converters.len()
    }

    /// Returns `true` if no converters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Converts `model` with the first converter that recognizes it.
    pub fn image_source(&self, model: &dyn Any) -> Option<Arc<dyn ImageSourceFactory>> {
        let found = self.converters.iter().find_map(|c| c.image_source(model));
        if found.is_none() {
            tracing::debug!("no image source converter recognized the model");
        }
        found
    }
}

impl Default for ModelToImageSourceChain {
    /// A chain that knows files and byte buffers.
    fn default() -> Self {
        let mut chain = Self::empty();
        chain.push(FileModelToImageSource);
        chain.push(BytesModelToImageSource);
        chain
    }
}
