//! Paged primitive arrays addressed by 64-bit global indices.
//!
//! A [`PagedArray`] owns an ordered sequence of fixed-size pages. Capacities
//! that fit into a single page use a flat buffer instead so lookups skip the
//! page table. Memory is registered with an [`AllocationTracker`] before any
//! page is allocated and handed back on [`PagedArray::release`] or drop.

use std::{fmt, mem::size_of, sync::Arc};

use tracing::debug;

use crate::{
    cursor::ArrayCursor,
    element::{BitElement, Element},
    error::{PagedError, Result},
    memory::{AllocationTracker, TaskId},
    paging::{
        PAGE_SIZE, exclusive_index_of_page, index_in_page, number_of_pages, page_index,
        page_start,
    },
};

const STRUCTURE: &str = "paged array";

enum Storage<T> {
    Single(Box<[T]>),
    Paged(Vec<Box<[T]>>),
    Released,
}

/// Fixed-capacity array of primitive values split into pages.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use colmena_core::{AllocationTracker, MemoryBudget, PagedArray};
///
/// let budget = Arc::new(MemoryBudget::new(1 << 20));
/// let mut array = PagedArray::<u64>::new(100, budget.clone())?;
/// array.set(42, 7)?;
/// array.add_to(42, 3)?;
/// assert_eq!(array.get(42)?, 10);
///
/// let freed = array.release();
/// assert_eq!(freed, PagedArray::<u64>::memory_requirements(100));
/// assert_eq!(budget.tracked(), 0);
/// assert!(array.get(42).is_err());
/// # Ok::<(), colmena_core::PagedError>(())
/// ```
pub struct PagedArray<T: Element> {
    capacity: u64,
    storage: Storage<T>,
    tracked_bytes: u64,
    tracker: Arc<dyn AllocationTracker>,
}

impl<T: Element> PagedArray<T> {
    /// Allocates a zero-filled array of `capacity` elements.
    ///
    /// # Errors
    /// Returns [`PagedError::AllocationRefused`] when the tracker refuses the
    /// footprint or the allocator cannot satisfy it, and
    /// [`PagedError::CapacityOverflow`] when the page table cannot be addressed
    /// on this host. No memory stays registered on failure.
    pub fn new(capacity: u64, tracker: Arc<dyn AllocationTracker>) -> Result<Self> {
        Self::allocate(capacity, T::default(), tracker, TaskId::UNASSIGNED)
    }

    /// Allocates an array of `capacity` elements, each set to `value`.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::new`].
    pub fn with_fill(capacity: u64, value: T, tracker: Arc<dyn AllocationTracker>) -> Result<Self> {
        Self::allocate(capacity, value, tracker, TaskId::UNASSIGNED)
    }

    pub(crate) fn allocate(
        capacity: u64,
        fill: T,
        tracker: Arc<dyn AllocationTracker>,
        task: TaskId,
    ) -> Result<Self> {
        let bytes = Self::memory_requirements(capacity);
        let owner = format!("PagedArray<{}>", T::NAME);
        tracker.track(&owner, task, bytes)?;

        let storage = match build_storage(capacity, fill) {
            Ok(storage) => storage,
            Err(error) => {
                tracker.release(bytes);
                return Err(match error {
                    BuildError::Overflow => PagedError::CapacityOverflow { capacity },
                    BuildError::Allocator => PagedError::AllocationRefused {
                        owner,
                        requested: bytes,
                        available: tracker.available_memory(),
                    },
                });
            }
        };

        debug!(
            element = T::NAME,
            capacity,
            pages = number_of_pages(capacity),
            bytes,
            "paged array allocated"
        );
        Ok(Self {
            capacity,
            storage,
            tracked_bytes: bytes,
            tracker,
        })
    }

    pub(crate) fn tracker(&self) -> Arc<dyn AllocationTracker> {
        Arc::clone(&self.tracker)
    }

    /// Returns the exact number of bytes a constructor registers for
    /// `capacity` elements, without allocating anything.
    ///
    /// Single-page arrays account for their elements only; paged arrays add
    /// one page-table slot per page.
    ///
    /// # Examples
    /// ```
    /// use colmena_core::{PagedArray, paging::PAGE_SIZE};
    ///
    /// assert_eq!(PagedArray::<u64>::memory_requirements(10), 80);
    /// let two_pages = PagedArray::<u64>::memory_requirements(PAGE_SIZE as u64 + 1);
    /// assert!(two_pages > 8 * (PAGE_SIZE as u64 + 1));
    /// ```
    #[must_use]
    pub fn memory_requirements(capacity: u64) -> u64 {
        let elements = capacity.saturating_mul(size_of::<T>() as u64);
        if capacity <= PAGE_SIZE as u64 {
            return elements;
        }
        let table = number_of_pages(capacity).saturating_mul(size_of::<Box<[T]>>() as u64);
        elements.saturating_add(table)
    }

    /// Returns the fixed number of elements.
    #[rustfmt::skip]
    #[must_use]
    pub const fn capacity(&self) -> u64 { self.capacity }

    /// Returns `true` once [`Self::release`] has been called.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        matches!(self.storage, Storage::Released)
    }

    /// Returns the bytes currently held, zero after release.
    #[must_use]
    pub const fn size_of(&self) -> u64 {
        if self.is_released() {
            0
        } else {
            self.tracked_bytes
        }
    }

    /// Returns the value stored at `index`.
    ///
    /// # Errors
    /// Returns [`PagedError::IndexOutOfBounds`] for indices outside
    /// `[0, capacity)` and [`PagedError::Released`] after release.
    #[inline]
    pub fn get(&self, index: u64) -> Result<T> {
        self.slot(index).copied()
    }

    /// Stores `value` at `index`.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::get`].
    #[inline]
    pub fn set(&mut self, index: u64, value: T) -> Result<()> {
        *self.slot_mut(index)? = value;
        Ok(())
    }

    /// Adds `delta` to the value stored at `index`.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::get`].
    #[inline]
    pub fn add_to(&mut self, index: u64, delta: T) -> Result<()> {
        let slot = self.slot_mut(index)?;
        *slot = slot.wrapping_add(delta);
        Ok(())
    }

    /// Assigns `value` to every element.
    ///
    /// # Errors
    /// Returns [`PagedError::Released`] after release.
    pub fn fill(&mut self, value: T) -> Result<()> {
        for page in self.pages_mut()? {
            page.fill(value);
        }
        Ok(())
    }

    /// Assigns `generator(index)` to every element, in index order.
    ///
    /// # Errors
    /// Returns [`PagedError::Released`] after release.
    pub fn set_all(&mut self, mut generator: impl FnMut(u64) -> T) -> Result<()> {
        let mut index = 0_u64;
        for page in self.pages_mut()? {
            for slot in page.iter_mut() {
                *slot = generator(index);
                index += 1;
            }
        }
        Ok(())
    }

    /// Copies the first `length` elements into `dest` and zero-fills the rest
    /// of `dest`. `length` is clamped to both capacities.
    ///
    /// # Errors
    /// Returns [`PagedError::Released`] when either array has been released.
    pub fn copy_to(&self, dest: &mut Self, length: u64) -> Result<()> {
        let dest_capacity = dest.capacity;
        let length = length.min(self.capacity).min(dest_capacity);
        let mut source = self.cursor()?;
        source.set_range(0, length)?;
        let mut dest_pages = dest.pages_mut()?.into_iter();
        let mut current: &mut [T] = &mut [];
        let mut written = 0_usize;

        while source.next() {
            let mut chunk = source.slice();
            while !chunk.is_empty() {
                if written == current.len() {
                    current = dest_pages.next().ok_or(PagedError::IndexOutOfBounds {
                        index: length,
                        capacity: dest_capacity,
                    })?;
                    written = 0;
                }
                let take = chunk.len().min(current.len() - written);
                let (head, tail) = chunk.split_at(take);
                if let Some(target) = current.get_mut(written..written + take) {
                    target.copy_from_slice(head);
                }
                written += take;
                chunk = tail;
            }
        }

        if let Some(rest) = current.get_mut(written..) {
            rest.fill(T::default());
        }
        for page in dest_pages {
            page.fill(T::default());
        }
        Ok(())
    }

    /// Returns a new array of `new_length` elements holding a prefix copy of
    /// this one, zero-extended when `new_length` exceeds the capacity.
    ///
    /// # Errors
    /// Fails when this array is released or the new allocation is refused.
    pub fn copy_of(&self, new_length: u64, tracker: Arc<dyn AllocationTracker>) -> Result<Self> {
        if self.is_released() {
            return Err(PagedError::Released {
                structure: STRUCTURE,
            });
        }
        let mut copy = Self::new(new_length, tracker)?;
        self.copy_to(&mut copy, new_length)?;
        Ok(copy)
    }

    /// Collects every element into a contiguous vector.
    ///
    /// # Errors
    /// Returns [`PagedError::Released`] after release and
    /// [`PagedError::CapacityOverflow`] when the capacity exceeds `usize`.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let len = usize::try_from(self.capacity).map_err(|_| PagedError::CapacityOverflow {
            capacity: self.capacity,
        })?;
        let mut values = Vec::with_capacity(len);
        for page in self.pages()? {
            values.extend_from_slice(page);
        }
        Ok(values)
    }

    /// Finds the last index whose value is `<= value` in an ascending array.
    ///
    /// Returns `None` when every element is greater than `value` or the array
    /// is empty.
    ///
    /// # Errors
    /// Returns [`PagedError::Released`] after release.
    pub fn binary_search(&self, value: T) -> Result<Option<u64>> {
        let mut low = 0_u64;
        let mut high = self.capacity;
        while low < high {
            let mid = low + (high - low) / 2;
            if self.get(mid)? <= value {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        Ok(low.checked_sub(1))
    }

    /// Returns a cursor covering the whole array.
    ///
    /// # Errors
    /// Returns [`PagedError::Released`] after release.
    pub fn cursor(&self) -> Result<ArrayCursor<'_, T>> {
        let mut cursor = self.new_cursor()?;
        cursor.set_full_range();
        Ok(cursor)
    }

    /// Returns an unpositioned cursor; call `set_range` before `next`.
    ///
    /// # Errors
    /// Returns [`PagedError::Released`] after release.
    pub fn new_cursor(&self) -> Result<ArrayCursor<'_, T>> {
        match &self.storage {
            Storage::Single(page) => Ok(ArrayCursor::single(page, self.capacity)),
            Storage::Paged(pages) => Ok(ArrayCursor::paged(pages, self.capacity)),
            Storage::Released => Err(PagedError::Released {
                structure: STRUCTURE,
            }),
        }
    }

    /// Drops every page and deregisters the tracked memory.
    ///
    /// Returns the number of bytes freed; a second call frees nothing and
    /// returns zero. Every accessor fails with [`PagedError::Released`]
    /// afterwards.
    pub fn release(&mut self) -> u64 {
        if self.is_released() {
            return 0;
        }
        self.storage = Storage::Released;
        let freed = self.tracked_bytes;
        self.tracker.release(freed);
        debug!(
            element = T::NAME,
            capacity = self.capacity,
            bytes = freed,
            "paged array released"
        );
        freed
    }

    fn slot(&self, index: u64) -> Result<&T> {
        let slot = match &self.storage {
            Storage::Single(page) => usize::try_from(index).ok().and_then(|i| page.get(i)),
            Storage::Paged(pages) => usize::try_from(page_index(index))
                .ok()
                .and_then(|page| pages.get(page))
                .and_then(|page| page.get(index_in_page(index))),
            Storage::Released => {
                return Err(PagedError::Released {
                    structure: STRUCTURE,
                });
            }
        };
        slot.ok_or(PagedError::IndexOutOfBounds {
            index,
            capacity: self.capacity,
        })
    }

    fn slot_mut(&mut self, index: u64) -> Result<&mut T> {
        let capacity = self.capacity;
        let slot = match &mut self.storage {
            Storage::Single(page) => usize::try_from(index).ok().and_then(|i| page.get_mut(i)),
            Storage::Paged(pages) => usize::try_from(page_index(index))
                .ok()
                .and_then(|page| pages.get_mut(page))
                .and_then(|page| page.get_mut(index_in_page(index))),
            Storage::Released => {
                return Err(PagedError::Released {
                    structure: STRUCTURE,
                });
            }
        };
        slot.ok_or(PagedError::IndexOutOfBounds { index, capacity })
    }

    fn pages(&self) -> Result<Vec<&[T]>> {
        match &self.storage {
            Storage::Single(page) => Ok(vec![&**page]),
            Storage::Paged(pages) => Ok(pages.iter().map(|page| &**page).collect()),
            Storage::Released => Err(PagedError::Released {
                structure: STRUCTURE,
            }),
        }
    }

    fn pages_mut(&mut self) -> Result<Vec<&mut [T]>> {
        match &mut self.storage {
            Storage::Single(page) => Ok(vec![&mut **page]),
            Storage::Paged(pages) => Ok(pages.iter_mut().map(|page| &mut **page).collect()),
            Storage::Released => Err(PagedError::Released {
                structure: STRUCTURE,
            }),
        }
    }
}

impl<T: BitElement> PagedArray<T> {
    /// Stores the bit-wise OR of the current value and `bits` at `index`.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::get`].
    pub fn or(&mut self, index: u64, bits: T) -> Result<()> {
        let slot = self.slot_mut(index)?;
        *slot = *slot | bits;
        Ok(())
    }

    /// Stores the bit-wise AND of the current value and `bits` at `index` and
    /// returns the new value.
    ///
    /// # Errors
    /// Fails under the same conditions as [`Self::get`].
    pub fn and(&mut self, index: u64, bits: T) -> Result<T> {
        let slot = self.slot_mut(index)?;
        *slot = *slot & bits;
        Ok(*slot)
    }
}

impl<T: Element> Drop for PagedArray<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T: Element> fmt::Debug for PagedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = match &self.storage {
            Storage::Single(_) => "single",
            Storage::Paged(_) => "paged",
            Storage::Released => "released",
        };
        f.debug_struct("PagedArray")
            .field("element", &T::NAME)
            .field("capacity", &self.capacity)
            .field("layout", &layout)
            .field("bytes", &self.size_of())
            .finish_non_exhaustive()
    }
}

enum BuildError {
    Overflow,
    Allocator,
}

fn build_storage<T: Element>(capacity: u64, fill: T) -> core::result::Result<Storage<T>, BuildError> {
    if capacity <= PAGE_SIZE as u64 {
        let len = usize::try_from(capacity).map_err(|_| BuildError::Overflow)?;
        return Ok(Storage::Single(filled_page(len, fill)?));
    }

    let page_count =
        usize::try_from(number_of_pages(capacity)).map_err(|_| BuildError::Overflow)?;
    let mut pages = Vec::new();
    pages
        .try_reserve_exact(page_count)
        .map_err(|_| BuildError::Allocator)?;
    let last = page_count - 1;
    for page in 0..page_count {
        let len = if page == last {
            exclusive_index_of_page(capacity)
        } else {
            PAGE_SIZE
        };
        pages.push(filled_page(len, fill)?);
    }
    debug_assert_eq!(
        page_start(last as u64) + exclusive_index_of_page(capacity) as u64,
        capacity
    );
    Ok(Storage::Paged(pages))
}

fn filled_page<T: Element>(len: usize, fill: T) -> core::result::Result<Box<[T]>, BuildError> {
    let mut page = Vec::new();
    page.try_reserve_exact(len)
        .map_err(|_| BuildError::Allocator)?;
    page.resize(len, fill);
    Ok(page.into_boxed_slice())
}
