//! Provides an immutable view on the bytes of a cached value.
//!
//! A [ByteView] is what a cache lookup hands out. It is backed by an immutable, shared buffer,
//! therefore cloning a view is cheap (no data is copied) and a view can never be used to modify
//! the bytes kept in the cache. Every accessor which exposes raw bytes yields a defensive copy,
//! so even a caller which mutates the returned buffer cannot corrupt the cached value.
use bytes::Bytes;

use crate::lru::ByteSize;

/// Wraps the bytes of a cached value in an immutable, cheaply clonable handle.
///
/// # Examples
/// ```
/// # use peercache::view::ByteView;
/// let view = ByteView::from("Hello");
/// assert_eq!(view.len(), 5);
/// assert_eq!(view.as_text(), "Hello");
///
/// // Mutating the copy obtained via to_vec() has no effect on the view itself...
/// let mut copy = view.to_vec();
/// copy[0] = b'J';
/// assert_eq!(view.as_text(), "Hello");
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Returns the number of bytes being held.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Determines if the view contains any bytes at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a copy of the underlying bytes.
    ///
    /// The returned buffer is owned by the caller. Changing its contents will neither affect
    /// this view nor the entry kept in the cache.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Decodes the underlying bytes as text.
    ///
    /// The decoding is lossy: invalid UTF-8 sequences are replaced by U+FFFD. As a cache stores
    /// arbitrary bytes, rendering a value as text must never fail - callers which require strict
    /// decoding can run [std::str::from_utf8] on [ByteView::to_vec] themselves.
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        ByteView {
            data: Bytes::from(data),
        }
    }
}

impl From<&[u8]> for ByteView {
    fn from(data: &[u8]) -> Self {
        ByteView {
            data: Bytes::copy_from_slice(data),
        }
    }
}

impl From<&str> for ByteView {
    fn from(data: &str) -> Self {
        ByteView {
            data: Bytes::copy_from_slice(data.as_bytes()),
        }
    }
}

impl ByteSize for ByteView {
    fn allocated_size(&self) -> usize {
        self.data.len()
    }
}
