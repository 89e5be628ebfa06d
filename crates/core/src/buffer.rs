use crate::{HostType, TypeInfo, TypeMeta, Value};
use std::{marker::PhantomData, num::NonZeroU32};

/// A GPU-side buffer object shared between host and device.
///
/// `synchronized` is cleared while a host-to-GPU transfer is pending; such a buffer must not be bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SharedBufferHandle {
    pub gpu_buffer: NonZeroU32,
    pub synchronized: bool,
}

/// Buffer layout reported by [`BufferPtr`] through [`TypeMeta::Buffer`].
#[derive(Clone, Copy, Debug)]
pub struct BufferMeta {
    pub header: Option<TypeInfo>,
    pub element: Option<TypeInfo>,
    pub handle: fn(&Value) -> Option<SharedBufferHandle>,
}

impl BufferMeta {
    /// Byte offset of the first flexible element in host memory.
    pub fn host_first_element_offset(&self) -> usize {
        let header_size = self.header.map(|h| h.size()).unwrap_or(0);
        match self.element {
            Some(element) => header_size.next_multiple_of(element.align().max(1)),
            None => header_size,
        }
    }
}

/// Typed pointer to a shared buffer holding an `H` header followed by an array of `E`.
///
/// Use `()` for either part to leave it out.
pub struct BufferPtr<H, E> {
    handle: SharedBufferHandle,
    _marker: PhantomData<fn() -> (H, E)>,
}

impl<H, E> BufferPtr<H, E> {
    pub fn new(handle: SharedBufferHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    pub fn handle(&self) -> SharedBufferHandle {
        self.handle
    }

    pub fn set_synchronized(&mut self, synchronized: bool) {
        self.handle.synchronized = synchronized;
    }
}

impl<H, E> Clone for BufferPtr<H, E> {
    fn clone(&self) -> Self {
        Self::new(self.handle)
    }
}

fn non_void<T: HostType>() -> Option<TypeInfo> {
    Some(TypeInfo::of::<T>()).filter(|t| !t.is_void())
}

impl<H: HostType, E: HostType> HostType for BufferPtr<H, E> {
    fn type_meta() -> TypeMeta {
        TypeMeta::Buffer(BufferMeta {
            header: non_void::<H>(),
            element: non_void::<E>(),
            handle: |value| value.get::<Self>().map(Self::handle),
        })
    }
}
