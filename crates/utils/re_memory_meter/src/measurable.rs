//! How a value exposes itself to the traversal.
//!
//! Rust has no runtime reflection, so every measured type describes itself:
//! what kind of node it is, which heap bytes it owns outright,
//! and which other nodes it references.

use std::any::{Any, TypeId};

use crate::{BufferWindow, IntrospectionError};

/// How the traversal treats a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// An ordered sequence of slots, each enumerated independently.
    Array,

    /// A byte window that may be a view into a larger, shared allocation.
    ///
    /// Deep measurement prices it with the configured [`crate::BufferPolicy`]
    /// instead of expanding its references.
    Buffer(BufferWindow),

    /// Anything else. Its reference-typed fields are enumerated.
    Composite,
}

/// A value that can be a node in a measured object graph.
///
/// Only values that live in their own allocation (the root, or the pointee of a
/// `Box`, `Rc` or `Arc`) are nodes. Inline fields belong to their parent: their
/// bytes are part of the parent's layout, and their owned buffers go into the
/// parent's [`Self::heap_size_bytes`].
///
/// Most types should use [`crate::impl_measurable`] rather than implementing this by hand.
pub trait Measurable: Any {
    /// Classification used by the traversal. Defaults to [`Shape::Composite`].
    #[inline]
    fn shape(&self) -> Shape {
        Shape::Composite
    }

    /// Heap bytes owned exclusively by this node that are not nodes themselves,
    /// e.g. the slot array of an inline `Vec`, or the text of a `String`.
    #[inline]
    fn heap_size_bytes(&self) -> u64 {
        0
    }

    /// Report every outgoing reference to the visitor.
    ///
    /// Arrays report their elements, composites their fields, including the fields
    /// of embedded structs. Primitive fields and `&'static` singletons are never reported.
    ///
    /// Failing to read a reference is an error; never skip it silently.
    fn visit_references<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError>;

    /// Used for diagnostics and per-type breakdowns.
    #[inline]
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Receives the outgoing references of a node.
pub trait ReferenceVisitor<'a> {
    fn visit(&mut self, node: &'a dyn Measurable);
}

/// A field or element position inside a node.
///
/// Reference-typed slots (`Box`, `Rc`, `Arc`, possibly wrapped in `Option`, `OnceCell` or `OnceLock`)
/// report their pointee. Primitives report nothing. Inline containers (`Vec`, `VecDeque`, arrays,
/// `HashMap`, embedded structs) report whatever their own slots report.
pub trait Slot {
    /// Heap bytes owned by this slot that are not nodes themselves.
    #[inline]
    fn owned_heap_bytes(&self) -> u64 {
        0
    }

    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError>;
}

// ----------------------------------------------------------------------------

/// Identity of a node: where it lives, and what concrete type it is.
///
/// Two value-equal nodes at different addresses are different nodes.
/// The value itself is never compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    addr: usize,
    type_id: TypeId,
}

impl NodeId {
    #[inline]
    pub fn of(node: &dyn Measurable) -> Self {
        let any: &dyn Any = node;
        Self {
            addr: std::ptr::from_ref(node).cast::<()>().addr(),
            type_id: any.type_id(),
        }
    }

    /// Address of the node.
    #[inline]
    pub fn addr(&self) -> usize {
        self.addr
    }
}
