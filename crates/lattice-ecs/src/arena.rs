//! Per-type component arenas.
//!
//! Each component type owns one [`ComponentArena`]: a [`GrowablePool`] shared
//! by every group that stores that type. Groups reserve fixed-size chunks out
//! of it with [`ComponentArena::get_or_create_chunk`]; all offsets and lengths
//! here are in elements, not bytes.
//!
//! Typed access goes through `bytemuck`, which re-checks size and alignment
//! on every cast. The arena additionally checks the Rust `TypeId` so a slice
//! of one component type can never be viewed as another.

use std::any::TypeId;

use crate::component::{Component, ComponentInfo, ComponentTypeId};
use crate::pool::GrowablePool;
use crate::EcsError;

/// A reusable range of elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRange {
    pub start: usize,
    pub len: usize,
}

// ---------------------------------------------------------------------------
// ComponentArena
// ---------------------------------------------------------------------------

/// Growable storage for every instance of one component type.
#[derive(Debug)]
pub struct ComponentArena {
    info: ComponentInfo,
    pool: GrowablePool,
    /// High-water mark: elements handed out so far.
    len: usize,
    /// Ranges below `len` available for reuse, first-fit in list order.
    free: Vec<FreeRange>,
}

impl ComponentArena {
    /// Create an empty arena for the type described by `info`.
    pub fn new(info: ComponentInfo) -> Self {
        let pool = GrowablePool::new(info.size, info.align);
        Self {
            info,
            pool,
            len: 0,
            free: Vec::new(),
        }
    }

    #[inline]
    pub fn info(&self) -> &ComponentInfo {
        &self.info
    }

    #[inline]
    pub fn component_id(&self) -> ComponentTypeId {
        self.info.id
    }

    /// Elements handed out so far (including ones sitting in the free list).
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements the backing pool can hold without growing.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Element size in bytes.
    #[inline]
    pub fn stride(&self) -> usize {
        self.pool.stride()
    }

    /// Ranges currently available for reuse.
    #[inline]
    pub fn free_ranges(&self) -> &[FreeRange] {
        &self.free
    }

    /// Reserve `n` contiguous elements and return the first element's offset.
    ///
    /// Takes the first free range long enough to hold `n` elements; any
    /// leftover is put back in the same place. When nothing fits, the pool
    /// grows by `n` elements and the previous high-water mark is returned.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AllocationFailed`] if the pool cannot grow.
    pub fn get_or_create_chunk(&mut self, n: usize) -> Result<usize, EcsError> {
        if let Some(position) = self.free.iter().position(|range| range.len >= n) {
            let range = self.free.remove(position);
            if range.len > n {
                self.free.insert(
                    position,
                    FreeRange {
                        start: range.start + n,
                        len: range.len - n,
                    },
                );
            }
            tracing::trace!(
                component = %self.info.name,
                start = range.start,
                len = n,
                "chunk reused"
            );
            return Ok(range.start);
        }

        let start = self.len;
        let end = start.checked_add(n).ok_or_else(|| self.allocation_failed(n))?;
        self.pool
            .reserve(end)
            .map_err(|_| self.allocation_failed(end))?;
        self.len = end;
        Ok(start)
    }

    /// Hand `len` elements starting at `start` back for reuse.
    ///
    /// A free range ending at `start` or beginning at `start + len` absorbs
    /// the returned chunk, so neighbouring chunks can later serve one larger
    /// request. Otherwise the chunk goes to the back of the free list.
    pub fn return_chunk(&mut self, start: usize, len: usize) {
        debug_assert!(start + len <= self.len, "returned chunk lies outside the arena");
        if len == 0 {
            return;
        }
        let end = start + len;
        let before = self.free.iter().position(|range| range.start + range.len == start);
        let after = self.free.iter().position(|range| range.start == end);
        match (before, after) {
            (Some(b), Some(a)) => {
                self.free[b].len += len + self.free[a].len;
                self.free.remove(a);
            }
            (Some(b), None) => self.free[b].len += len,
            (None, Some(a)) => {
                self.free[a].start = start;
                self.free[a].len += len;
            }
            (None, None) => self.free.push(FreeRange { start, len }),
        }
    }

    fn allocation_failed(&self, requested: usize) -> EcsError {
        EcsError::AllocationFailed {
            component: Some(self.info.name.clone()),
            requested,
        }
    }

    fn check_type<T: Component>(&self) -> Result<(), EcsError> {
        if self.info.type_id == TypeId::of::<T>() {
            Ok(())
        } else {
            Err(EcsError::ComponentLayout {
                component: self.info.name.clone(),
                details: format!("arena does not store {}", std::any::type_name::<T>()),
            })
        }
    }

    fn layout_error(&self, err: bytemuck::PodCastError) -> EcsError {
        EcsError::ComponentLayout {
            component: self.info.name.clone(),
            details: format!("{err:?}"),
        }
    }

    /// Every element handed out so far, typed.
    pub fn as_slice<T: Component>(&self) -> Result<&[T], EcsError> {
        self.check_type::<T>()?;
        if self.len == 0 {
            return Ok(&[]);
        }
        let bytes = &self.pool.as_bytes()[..self.len * self.stride()];
        bytemuck::try_cast_slice(bytes).map_err(|e| self.layout_error(e))
    }

    /// Every element handed out so far, typed and mutable.
    pub fn as_mut_slice<T: Component>(&mut self) -> Result<&mut [T], EcsError> {
        self.check_type::<T>()?;
        if self.len == 0 {
            return Ok(&mut []);
        }
        let byte_len = self.len * self.stride();
        let name = self.info.name.clone();
        let bytes = &mut self.pool.as_bytes_mut()[..byte_len];
        bytemuck::try_cast_slice_mut(bytes).map_err(|e| EcsError::ComponentLayout {
            component: name,
            details: format!("{e:?}"),
        })
    }

    /// Overwrite the element at `index` with zero bytes.
    pub fn zero(&mut self, index: usize) {
        if index >= self.len {
            return;
        }
        let stride = self.stride();
        self.pool.as_bytes_mut()[index * stride..(index + 1) * stride].fill(0);
    }

    /// Raw pointer to the element at `index` within the handed-out range.
    #[inline]
    pub(crate) fn element_ptr(&self, index: usize) -> Option<*mut u8> {
        if index >= self.len {
            return None;
        }
        self.pool.element_ptr(index)
    }

    /// Whether the arena stores `T`.
    #[inline]
    pub(crate) fn stores<T: 'static>(&self) -> bool {
        self.info.type_id == TypeId::of::<T>()
    }
}

// ---------------------------------------------------------------------------
// ArenaSet
// ---------------------------------------------------------------------------

/// Arenas indexed by [`ComponentTypeId`], created lazily.
#[derive(Debug, Default)]
pub struct ArenaSet {
    arenas: Vec<Option<ComponentArena>>,
}

impl ArenaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The arena for `id`, if one has been created.
    pub fn get(&self, id: ComponentTypeId) -> Option<&ComponentArena> {
        self.arenas.get(id.index())?.as_ref()
    }

    pub fn get_mut(&mut self, id: ComponentTypeId) -> Option<&mut ComponentArena> {
        self.arenas.get_mut(id.index())?.as_mut()
    }

    /// The arena for `info.id`, created (and the table resized) on demand.
    pub fn get_or_create(&mut self, info: &ComponentInfo) -> &mut ComponentArena {
        let index = info.id.index();
        if index >= self.arenas.len() {
            self.arenas.resize_with(index + 1, || None);
        }
        self.arenas[index].get_or_insert_with(|| ComponentArena::new(info.clone()))
    }

    /// Number of arenas created so far.
    pub fn len(&self) -> usize {
        self.arenas.iter().filter(|a| a.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
