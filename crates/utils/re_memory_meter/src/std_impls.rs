use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use crate::{IntrospectionError, Measurable, ReferenceVisitor, Shape, Slot};

// --- Primitives ---

macro_rules! impl_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Slot for $ty {
                #[inline]
                fn visit_slot<'a>(
                    &'a self,
                    _visitor: &mut dyn ReferenceVisitor<'a>,
                ) -> Result<(), IntrospectionError> {
                    Ok(())
                }
            }

            impl Measurable for $ty {
                #[inline]
                fn visit_references<'a>(
                    &'a self,
                    _visitor: &mut dyn ReferenceVisitor<'a>,
                ) -> Result<(), IntrospectionError> {
                    Ok(())
                }
            }
        )*
    };
}

impl_primitive!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
);

impl Slot for String {
    #[inline]
    fn owned_heap_bytes(&self) -> u64 {
        self.capacity() as u64
    }

    #[inline]
    fn visit_slot<'a>(
        &'a self,
        _visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        Ok(())
    }
}

impl Measurable for String {
    #[inline]
    fn heap_size_bytes(&self) -> u64 {
        Slot::owned_heap_bytes(self)
    }

    #[inline]
    fn visit_references<'a>(
        &'a self,
        _visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        Ok(())
    }
}

// --- References ---

impl<T: Measurable> Slot for Box<T> {
    #[inline]
    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        visitor.visit(&**self);
        Ok(())
    }
}

impl<T: Measurable> Slot for Rc<T> {
    #[inline]
    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        visitor.visit(&**self);
        Ok(())
    }
}

impl<T: Measurable> Slot for Arc<T> {
    #[inline]
    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        visitor.visit(&**self);
        Ok(())
    }
}

/// `'static` references point at process-wide singletons, which are not part of any graph.
impl<T: ?Sized> Slot for &'static T {
    #[inline]
    fn visit_slot<'a>(
        &'a self,
        _visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        Ok(())
    }
}

impl<S: Slot> Slot for Option<S> {
    #[inline]
    fn owned_heap_bytes(&self) -> u64 {
        self.as_ref().map_or(0, Slot::owned_heap_bytes)
    }

    #[inline]
    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        match self {
            Some(slot) => slot.visit_slot(visitor),
            None => Ok(()),
        }
    }
}

impl<S: Slot> Slot for std::cell::OnceCell<S> {
    #[inline]
    fn owned_heap_bytes(&self) -> u64 {
        self.get().map_or(0, Slot::owned_heap_bytes)
    }

    #[inline]
    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        match self.get() {
            Some(slot) => slot.visit_slot(visitor),
            None => Ok(()),
        }
    }
}

impl<S: Slot> Slot for std::sync::OnceLock<S> {
    #[inline]
    fn owned_heap_bytes(&self) -> u64 {
        self.get().map_or(0, Slot::owned_heap_bytes)
    }

    #[inline]
    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        match self.get() {
            Some(slot) => slot.visit_slot(visitor),
            None => Ok(()),
        }
    }
}

// --- Containers ---

fn visit_all<'a, S: Slot + 'a>(
    slots: impl IntoIterator<Item = &'a S>,
    visitor: &mut dyn ReferenceVisitor<'a>,
) -> Result<(), IntrospectionError> {
    for slot in slots {
        slot.visit_slot(visitor)?;
    }
    Ok(())
}

fn slots_heap_size_bytes<'a, S: Slot + 'a>(slots: impl IntoIterator<Item = &'a S>) -> u64 {
    slots.into_iter().map(Slot::owned_heap_bytes).sum()
}

impl<S: Slot> Slot for Vec<S> {
    #[inline]
    fn owned_heap_bytes(&self) -> u64 {
        (self.capacity() * std::mem::size_of::<S>()) as u64 + slots_heap_size_bytes(self)
    }

    #[inline]
    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        visit_all(self, visitor)
    }
}

impl<S: Slot + 'static> Measurable for Vec<S> {
    #[inline]
    fn shape(&self) -> Shape {
        Shape::Array
    }

    #[inline]
    fn heap_size_bytes(&self) -> u64 {
        Slot::owned_heap_bytes(self)
    }

    #[inline]
    fn visit_references<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        visit_all(self, visitor)
    }
}

impl<S: Slot> Slot for VecDeque<S> {
    #[inline]
    fn owned_heap_bytes(&self) -> u64 {
        (self.capacity() * std::mem::size_of::<S>()) as u64 + slots_heap_size_bytes(self)
    }

    #[inline]
    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        visit_all(self, visitor)
    }
}

impl<S: Slot + 'static> Measurable for VecDeque<S> {
    #[inline]
    fn shape(&self) -> Shape {
        Shape::Array
    }

    #[inline]
    fn heap_size_bytes(&self) -> u64 {
        Slot::owned_heap_bytes(self)
    }

    #[inline]
    fn visit_references<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        visit_all(self, visitor)
    }
}

impl<S: Slot, const N: usize> Slot for [S; N] {
    #[inline]
    fn owned_heap_bytes(&self) -> u64 {
        slots_heap_size_bytes(self)
    }

    #[inline]
    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        visit_all(self, visitor)
    }
}

impl<S: Slot + 'static, const N: usize> Measurable for [S; N] {
    #[inline]
    fn shape(&self) -> Shape {
        Shape::Array
    }

    #[inline]
    fn heap_size_bytes(&self) -> u64 {
        slots_heap_size_bytes(self)
    }

    #[inline]
    fn visit_references<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        visit_all(self, visitor)
    }
}

impl<K: Slot, V: Slot, H> Slot for HashMap<K, V, H> {
    /// Assumes one `(K, V)` bucket per unit of capacity, and ignores the control bytes.
    #[inline]
    fn owned_heap_bytes(&self) -> u64 {
        let buckets = (self.capacity() * std::mem::size_of::<(K, V)>()) as u64;
        buckets
            + self
                .iter()
                .map(|(key, value)| key.owned_heap_bytes() + value.owned_heap_bytes())
                .sum::<u64>()
    }

    #[inline]
    fn visit_slot<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        for (key, value) in self {
            key.visit_slot(visitor)?;
            value.visit_slot(visitor)?;
        }
        Ok(())
    }
}

impl<K: Slot + 'static, V: Slot + 'static, H: 'static> Measurable for HashMap<K, V, H> {
    #[inline]
    fn heap_size_bytes(&self) -> u64 {
        Slot::owned_heap_bytes(self)
    }

    #[inline]
    fn visit_references<'a>(
        &'a self,
        visitor: &mut dyn ReferenceVisitor<'a>,
    ) -> Result<(), IntrospectionError> {
        Slot::visit_slot(self, visitor)
    }
}
