//! # Source Buffer Lifecycle
//!
//! A [`SourceBuffer`] pairs borrowed, untrusted bytes with an optional
//! release callback. The callback fires exactly once:
//!
//! - explicitly, through [`SourceBuffer::release`];
//! - implicitly, when the buffer is dropped (including on every decode error
//!   path, since the decoder takes the buffer by value);
//! - or later, through the [`PendingRelease`] returned by
//!   [`SourceBuffer::defer`], for callers whose resource manager frees the
//!   memory after an asynchronous upload.
//!
//! The callback is an `FnOnce` moved out of an `Option`, so double release
//! cannot be expressed, and release-before-use cannot happen because the
//! decoder owns the buffer for the whole read.
//!
//! ```rust,ignore
//! let bytes = std::fs::read("suzanne.filamesh")?;
//! let released = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&released);
//! let buffer = SourceBuffer::with_release(&bytes, move |_| flag.store(true, Ordering::SeqCst));
//! let mesh = filamesh_io::decode(buffer)?;
//! assert!(released.load(Ordering::SeqCst));
//! ```

use std::fmt;

/// Release callback. Receives the bytes it was registered with.
pub type ReleaseCallback<'a> = Box<dyn FnOnce(&'a [u8]) + Send + 'a>;

/// Borrowed source bytes plus their one-shot release callback.
pub struct SourceBuffer<'a> {
    bytes: &'a [u8],
    release: Option<ReleaseCallback<'a>>,
}

impl<'a> SourceBuffer<'a> {
    /// Wraps bytes that need no release notification.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, release: None }
    }

    /// Wraps bytes with a callback fired once they are no longer read.
    #[must_use]
    pub fn with_release<F>(bytes: &'a [u8], release: F) -> Self
    where
        F: FnOnce(&'a [u8]) + Send + 'a,
    {
        Self {
            bytes,
            release: Some(Box::new(release)),
        }
    }

    /// Wraps bytes with a callback and an opaque user token handed back to
    /// it on release.
    #[must_use]
    pub fn with_token<T, F>(bytes: &'a [u8], token: T, release: F) -> Self
    where
        T: Send + 'a,
        F: FnOnce(&'a [u8], T) + Send + 'a,
    {
        Self::with_release(bytes, move |b| release(b, token))
    }

    /// The wrapped bytes.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether a release callback is attached.
    #[must_use]
    pub fn has_release(&self) -> bool {
        self.release.is_some()
    }

    /// Fires the release callback now. Equivalent to dropping the buffer.
    pub fn release(self) {
        drop(self);
    }

    /// Hands the release callback to a [`PendingRelease`] without firing it.
    #[must_use = "dropping the pending release fires the callback immediately"]
    pub fn defer(mut self) -> PendingRelease<'a> {
        PendingRelease {
            bytes: self.bytes,
            release: self.release.take(),
        }
    }

    fn fire(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::trace!(len = self.bytes.len(), "releasing source buffer");
            release(self.bytes);
        }
    }
}

impl Drop for SourceBuffer<'_> {
    fn drop(&mut self) {
        self.fire();
    }
}

impl fmt::Debug for SourceBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBuffer")
            .field("len", &self.bytes.len())
            .field("has_release", &self.release.is_some())
            .finish()
    }
}

/// A release callback whose firing has been deferred past decoding.
///
/// The decoder no longer reads the bytes; the holder decides when the
/// memory may go away. Fires on [`PendingRelease::release`] or on drop,
/// whichever comes first, and never twice.
pub struct PendingRelease<'a> {
    bytes: &'a [u8],
    release: Option<ReleaseCallback<'a>>,
}

impl<'a> PendingRelease<'a> {
    /// The bytes still awaiting release.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Whether a callback is still waiting to fire.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.release.is_some()
    }

    /// Fires the release callback now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PendingRelease<'_> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::trace!(len = self.bytes.len(), "releasing deferred source buffer");
            release(self.bytes);
        }
    }
}

impl fmt::Debug for PendingRelease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRelease")
            .field("len", &self.bytes.len())
            .field("armed", &self.release.is_some())
            .finish()
    }
}
