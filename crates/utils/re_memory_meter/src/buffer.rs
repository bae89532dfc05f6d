//! Accounting for byte buffers that may share their backing storage.
//!
//! A single view cannot know how many sibling views share its backing store,
//! so exact accounting needs whole-heap knowledge. Instead the caller picks
//! which way to be wrong with a [`BufferPolicy`].

use std::sync::Arc;

use crate::{BufferPolicyParseError, IntrospectionError, Measurable, ReferenceVisitor, Shape};

/// Fixed cost of any buffer-like node: a reference to the backing storage plus an `i32` offset.
pub const BUFFER_HEADER_BYTES: u64 = 8 + 4;

/// The visible part of a buffer-like node, relative to its backing storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferWindow {
    /// Bytes visible through this view.
    pub window_len: u64,

    /// Bytes in the backing storage.
    pub capacity: u64,
}

impl BufferWindow {
    #[inline]
    pub fn new(window_len: u64, capacity: u64) -> Self {
        Self {
            window_len,
            capacity,
        }
    }

    /// A view that does not expose all of its backing storage,
    /// so other views may be sharing it.
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.window_len != self.capacity
    }
}

/// How to price a buffer whose visible window is smaller than its backing storage.
///
/// Unshared buffers always cost [`BUFFER_HEADER_BYTES`] plus their length, whatever the policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BufferPolicy {
    /// Only the header. Undercounts: the shared storage is treated as free.
    Ignore,

    /// Header plus the visible bytes.
    ///
    /// Undercounts when the backing store is fragmented over several views,
    /// since the bytes no view exposes are never priced.
    #[default]
    IgnoreOverhead,

    /// Header plus the whole backing storage.
    ///
    /// Overcounts when several views share the backing store,
    /// since each of them prices all of it.
    Include,
}

impl BufferPolicy {
    pub const ALL: [Self; 3] = [Self::Ignore, Self::IgnoreOverhead, Self::Include];

    /// The cost of a shared buffer, including the header.
    #[inline]
    pub fn shared_buffer_size(self, window: BufferWindow) -> u64 {
        match self {
            Self::Ignore => BUFFER_HEADER_BYTES,
            Self::IgnoreOverhead => BUFFER_HEADER_BYTES + window.window_len,
            Self::Include => BUFFER_HEADER_BYTES + window.capacity,
        }
    }

    /// The cost of any buffer, shared or not, including the header.
    #[inline]
    pub fn buffer_size(self, window: BufferWindow) -> u64 {
        if window.is_shared() {
            self.shared_buffer_size(window)
        } else {
            BUFFER_HEADER_BYTES + window.window_len
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "ignore",
            Self::IgnoreOverhead => "ignore_overhead",
            Self::Include => "include",
        }
    }
}

impl std::fmt::Display for BufferPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BufferPolicy {
    type Err = BufferPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == normalized)
            .ok_or_else(|| BufferPolicyParseError(s.to_owned()))
    }
}

// ----------------------------------------------------------------------------

/// A cheaply clonable window into shared, immutable bytes.
///
/// Slicing never copies: all slices share the same backing storage,
/// which is what makes them interesting to measure.
#[derive(Clone, Debug)]
pub struct SharedBytes {
    backing: Arc<Vec<u8>>,
    offset: usize,
    len: usize,
}

impl From<Vec<u8>> for SharedBytes {
    fn from(bytes: Vec<u8>) -> Self {
        let len = bytes.len();
        Self {
            backing: Arc::new(bytes),
            offset: 0,
            len,
        }
    }
}

impl SharedBytes {
    /// Number of visible bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of bytes in the backing storage.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.backing.len()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.backing[self.offset..self.offset + self.len]
    }

    /// A sub-view sharing the same backing storage.
    ///
    /// Returns `None` if the range is out of bounds of this view.
    pub fn slice(&self, range: std::ops::Range<usize>) -> Option<Self> {
        if range.start > range.end || self.len < range.end {
            return None;
        }
        Some(Self {
            backing: Arc::clone(&self.backing),
            offset: self.offset + range.start,
            len: range.end - range.start,
        })
    }

    #[inline]
    pub fn window(&self) -> BufferWindow {
        BufferWindow::new(self.len as u64, self.capacity() as u64)
    }
}

impl Measurable for SharedBytes {
    #[inline]
    fn shape(&self) -> Shape {
        Shape::Buffer(self.window())
    }

    /// The backing storage, which only node counting ever expands.
    fn visit_references<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        visitor.visit(&*self.backing);
        Ok(())
    }
}

/// A `BytesMut` owns its spare capacity exclusively (splitting hands out disjoint regions),
/// so it is priced as an unshared buffer spanning its whole capacity, whatever the policy.
#[cfg(feature = "bytes")]
impl Measurable for bytes::BytesMut {
    #[inline]
    fn shape(&self) -> Shape {
        let capacity = self.capacity() as u64;
        Shape::Buffer(BufferWindow::new(capacity, capacity))
    }

    #[inline]
    fn visit_references<'a>(
        &'a self,
        _visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        Ok(())
    }
}

/// Any `Buffer` whose length differs from the capacity of its allocation counts as shared.
///
/// That includes unsliced buffers whose allocation was padded (e.g. to 64 bytes), which
/// are then undercounted by [`BufferPolicy::Ignore`] and [`BufferPolicy::IgnoreOverhead`].
#[cfg(feature = "arrow")]
impl Measurable for arrow::buffer::Buffer {
    #[inline]
    fn shape(&self) -> Shape {
        Shape::Buffer(BufferWindow::new(self.len() as u64, self.capacity() as u64))
    }

    #[inline]
    fn visit_references<'a>(
        &'a self,
        _visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        Ok(())
    }
}
