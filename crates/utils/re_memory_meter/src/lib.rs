//! Measure how much memory an object graph occupies.
//!
//! * [`MemoryMeter::measure`]: the shallow size of one node.
//! * [`MemoryMeter::measure_deep`]: the retained size of everything reachable from a root,
//!   each node counted once, cycles included.
//! * [`MemoryMeter::count_children`]: how many distinct nodes are reachable from a root.
//!
//! Types opt in by implementing [`Measurable`], usually with [`impl_measurable`].
//! Shallow sizes come from a process-wide [`SizeOracle`] that must be installed with
//! [`install_oracle`] (or [`install_layout_oracle`]) before the first measurement.
//!
//! Buffers that may share their backing storage with other views are priced by a
//! [`BufferPolicy`], since no single view knows how many others share it.
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

mod buffer;
mod config;
mod error;
mod footprint;
mod measurable;
mod meter;
mod oracle;
mod std_impls;
mod tracker;

pub use self::buffer::{BUFFER_HEADER_BYTES, BufferPolicy, BufferWindow, SharedBytes};
pub use self::config::{BUFFER_POLICY_ENV_VAR, MeasurementConfig};
pub use self::error::{BufferPolicyParseError, InstallError, IntrospectionError, MeasureError};
pub use self::footprint::{Footprint, TypeFootprint};
pub use self::measurable::{Measurable, NodeId, ReferenceVisitor, Shape, Slot};
pub use self::meter::MemoryMeter;
pub use self::oracle::{
    LayoutOracle, SizeOracle, install_layout_oracle, install_oracle, is_oracle_installed,
};
pub use self::tracker::{IdentitySet, Tracker, TrackerFactory};

/// Implement [`Measurable`] and [`Slot`] for a struct, given the fields that may hold references
/// or own heap memory.
///
/// Fields that are plain values (numbers, `bool`s, …) can be left out.
/// A struct embedded in another one is walked through as part of its parent,
/// so list it like any other field.
///
/// ```
/// use std::sync::Arc;
/// use re_memory_meter::impl_measurable;
///
/// struct Header {
///     name: String,
/// }
///
/// struct Message {
///     header: Header,
///     id: u64,
///     payload: Vec<Arc<Vec<u8>>>,
/// }
///
/// impl_measurable!(Header { name });
/// impl_measurable!(Message { header, payload });
/// ```
///
/// Tuple structs use field indices: `impl_measurable!(Wrapper { 0 })`.
#[macro_export]
macro_rules! impl_measurable {
    ($ty:ty { $($field:tt),* $(,)? }) => {
        impl $crate::Slot for $ty {
            #[inline]
            fn owned_heap_bytes(&self) -> u64 {
                0 $(+ $crate::Slot::owned_heap_bytes(&self.$field))*
            }

            #[inline]
            fn visit_slot<'a>(
                &'a self,
                visitor: &mut dyn $crate::ReferenceVisitor<'a>,
            ) -> ::core::result::Result<(), $crate::IntrospectionError> {
                $($crate::Slot::visit_slot(&self.$field, visitor)?;)*
                let _ = visitor;
                ::core::result::Result::Ok(())
            }
        }

        impl $crate::Measurable for $ty {
            #[inline]
            fn heap_size_bytes(&self) -> u64 {
                $crate::Slot::owned_heap_bytes(self)
            }

            #[inline]
            fn visit_references<'a>(
                &'a self,
                visitor: &mut dyn $crate::ReferenceVisitor<'a>,
            ) -> ::core::result::Result<(), $crate::IntrospectionError> {
                $crate::Slot::visit_slot(self, visitor)
            }
        }
    };
}
