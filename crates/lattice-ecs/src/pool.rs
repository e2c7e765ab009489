//! Type-erased growable byte pool.
//!
//! A [`GrowablePool`] is the allocation primitive under every
//! [`ComponentArena`](crate::arena::ComponentArena): a single heap buffer of
//! `capacity * stride` bytes, aligned for the component type it stores.
//! Growth is geometric (factor 1.5, minimum step 1) and never shrinks.
//!
//! # Safety
//!
//! This module owns the only raw allocation in the crate. Every byte of the
//! allocation is initialised (zeroed on allocation and on growth), so handing
//! out `&[u8]` / `&mut [u8]` views over `0..capacity * stride` is sound.
// Note: unsafe_code is allowed on this module via #[allow(unsafe_code)] in lib.rs

use std::alloc::{self, Layout};
use std::ptr;

use crate::EcsError;

/// Growth factor applied to the current capacity when the pool must grow.
pub const GROWTH_FACTOR: f64 = 1.5;

/// A raw, reallocating byte buffer holding `capacity` elements of `stride`
/// bytes each.
pub struct GrowablePool {
    /// Pointer to the heap allocation (null while `capacity == 0`).
    data: *mut u8,
    /// Number of elements that fit in the current allocation.
    capacity: usize,
    /// Size of a single element in bytes. Never zero.
    stride: usize,
    /// Alignment of the allocation.
    align: usize,
}

impl GrowablePool {
    /// Create an empty pool for elements of `stride` bytes aligned to `align`.
    ///
    /// Nothing is allocated until the first [`reserve`](Self::reserve).
    pub fn new(stride: usize, align: usize) -> Self {
        debug_assert!(stride > 0, "pools never store zero-sized elements");
        debug_assert!(align.is_power_of_two());
        Self {
            data: ptr::null_mut(),
            capacity: 0,
            stride,
            align,
        }
    }

    /// Number of elements the current allocation can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Element size in bytes.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Alignment of the backing allocation.
    #[inline]
    pub fn align(&self) -> usize {
        self.align
    }

    /// The capacity the pool grows to when asked to hold `required` elements.
    fn grown_capacity(&self, required: usize) -> usize {
        let scaled = (self.capacity as f64 * GROWTH_FACTOR).ceil() as usize;
        let stepped = self.capacity.saturating_add(1);
        required.max(scaled).max(stepped)
    }

    fn layout_for(&self, capacity: usize) -> Option<Layout> {
        let bytes = capacity.checked_mul(self.stride)?;
        Layout::from_size_align(bytes, self.align).ok()
    }

    /// Grow the backing storage so it holds at least `required` elements.
    ///
    /// Existing bytes are preserved and new bytes are zeroed. A `required`
    /// value at or below the current capacity is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AllocationFailed`] if the byte size overflows or
    /// the allocator returns null. The pool is left unchanged in that case.
    pub fn reserve(&mut self, required: usize) -> Result<(), EcsError> {
        if required <= self.capacity {
            return Ok(());
        }
        let new_capacity = self.grown_capacity(required);
        let failed = || EcsError::AllocationFailed {
            component: None,
            requested: required,
        };
        let new_layout = self.layout_for(new_capacity).ok_or_else(failed)?;

        #[allow(unsafe_code)]
        let new_data = unsafe {
            if self.capacity == 0 {
                alloc::alloc_zeroed(new_layout)
            } else {
                let old_layout = self.layout_for(self.capacity).ok_or_else(failed)?;
                let grown = alloc::realloc(self.data, old_layout, new_layout.size());
                if !grown.is_null() {
                    // realloc leaves the tail uninitialised.
                    ptr::write_bytes(
                        grown.add(old_layout.size()),
                        0,
                        new_layout.size() - old_layout.size(),
                    );
                }
                grown
            }
        };
        if new_data.is_null() {
            return Err(failed());
        }

        tracing::trace!(
            stride = self.stride,
            from = self.capacity,
            to = new_capacity,
            "pool grown"
        );
        self.data = new_data;
        self.capacity = new_capacity;
        Ok(())
    }

    /// The whole allocation as bytes (`capacity * stride` long).
    pub fn as_bytes(&self) -> &[u8] {
        if self.capacity == 0 {
            return &[];
        }
        #[allow(unsafe_code)]
        unsafe {
            std::slice::from_raw_parts(self.data, self.capacity * self.stride)
        }
    }

    /// The whole allocation as mutable bytes.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        if self.capacity == 0 {
            return &mut [];
        }
        #[allow(unsafe_code)]
        unsafe {
            std::slice::from_raw_parts_mut(self.data, self.capacity * self.stride)
        }
    }

    /// Raw pointer to the element at `index`, or `None` when out of range.
    ///
    /// The pointer is derived from the allocation itself rather than from a
    /// borrow of the pool, so callers holding exclusive access to the owning
    /// store may turn disjoint element pointers into disjoint `&mut T`.
    #[inline]
    pub(crate) fn element_ptr(&self, index: usize) -> Option<*mut u8> {
        if index >= self.capacity {
            return None;
        }
        #[allow(unsafe_code)]
        let ptr = unsafe { self.data.add(index * self.stride) };
        Some(ptr)
    }
}

// SAFETY: the pool uniquely owns its allocation and only stores `Pod` bytes;
// shared access is read-only through `&self`.
#[allow(unsafe_code)]
unsafe impl Send for GrowablePool {}
#[allow(unsafe_code)]
unsafe impl Sync for GrowablePool {}

impl Drop for GrowablePool {
    fn drop(&mut self) {
        if self.capacity == 0 {
            return;
        }
        if let Some(layout) = self.layout_for(self.capacity) {
            #[allow(unsafe_code)]
            unsafe {
                alloc::dealloc(self.data, layout);
            }
        }
    }
}

impl std::fmt::Debug for GrowablePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrowablePool")
            .field("capacity", &self.capacity)
            .field("stride", &self.stride)
            .field("align", &self.align)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
