//! Zero-copy page-slice iteration over paged arrays.
//!
//! An [`ArrayCursor`] exposes one page at a time as a borrowed slice together
//! with the bookkeeping needed to recover global indices: for every
//! `local` in `offset()..limit()`, `array()[local]` is the element at global
//! index `base() + local`. Cursors are reusable: calling
//! [`ArrayCursor::set_range`] again restarts the scan without allocating.

use std::ops::Range;

use crate::{
    error::{PagedError, Result},
    paging::{exclusive_index_of_page, index_in_page, page_index, page_start},
};

enum Pages<'a, T> {
    Single(&'a [T]),
    Paged(&'a [Box<[T]>]),
}

// Derived impls would require `T: Copy`; only the borrows are copied.
impl<T> Clone for Pages<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Pages<'_, T> {}

impl<'a, T> Pages<'a, T> {
    fn page(self, page: u64) -> Option<&'a [T]> {
        match self {
            Self::Single(values) => (page == 0).then_some(values),
            Self::Paged(pages) => usize::try_from(page)
                .ok()
                .and_then(|page| pages.get(page))
                .map(|page| &**page),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Unpositioned,
    Ready,
    Exhausted,
}

/// Single-owner cursor yielding borrowed page slices for a global range.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use colmena_core::{PagedArray, Untracked};
///
/// let mut array = PagedArray::<u32>::new(10, Arc::new(Untracked))?;
/// array.set_all(|index| index as u32)?;
///
/// let mut cursor = array.new_cursor()?;
/// cursor.set_range(3, 7)?;
/// let mut seen = Vec::new();
/// while cursor.next() {
///     seen.extend_from_slice(cursor.slice());
/// }
/// assert_eq!(seen, vec![3, 4, 5, 6]);
/// cursor.close();
/// # Ok::<(), colmena_core::PagedError>(())
/// ```
pub struct ArrayCursor<'a, T> {
    pages: Pages<'a, T>,
    capacity: u64,
    array: &'a [T],
    base: u64,
    offset: usize,
    limit: usize,
    next_page: u64,
    from_page: u64,
    max_page: u64,
    start_offset: usize,
    end_limit: usize,
    state: State,
}

impl<'a, T> ArrayCursor<'a, T> {
    pub(crate) const fn single(values: &'a [T], capacity: u64) -> Self {
        Self::unpositioned(Pages::Single(values), capacity)
    }

    pub(crate) const fn paged(pages: &'a [Box<[T]>], capacity: u64) -> Self {
        Self::unpositioned(Pages::Paged(pages), capacity)
    }

    const fn unpositioned(pages: Pages<'a, T>, capacity: u64) -> Self {
        Self {
            pages,
            capacity,
            array: &[],
            base: 0,
            offset: 0,
            limit: 0,
            next_page: 0,
            from_page: 0,
            max_page: 0,
            start_offset: 0,
            end_limit: 0,
            state: State::Unpositioned,
        }
    }

    /// Positions the cursor over the whole backing array.
    pub fn set_full_range(&mut self) {
        self.position(0, self.capacity);
    }

    /// Positions the cursor over the global range `[start, end)`.
    ///
    /// # Errors
    /// Returns [`PagedError::IndexOutOfBounds`] when `start > end` or
    /// `end > capacity`. The cursor is left exhausted in that case.
    pub fn set_range(&mut self, start: u64, end: u64) -> Result<()> {
        if end > self.capacity || start > end {
            self.exhaust();
            return Err(PagedError::IndexOutOfBounds {
                index: if end > self.capacity { end } else { start },
                capacity: self.capacity,
            });
        }
        self.position(start, end);
        Ok(())
    }

    fn position(&mut self, start: u64, end: u64) {
        if start == end {
            self.exhaust();
            return;
        }
        self.from_page = page_index(start);
        self.max_page = page_index(end - 1);
        self.start_offset = index_in_page(start);
        self.end_limit = exclusive_index_of_page(end);
        self.next_page = self.from_page;
        self.array = &[];
        self.offset = 0;
        self.limit = 0;
        self.state = State::Ready;
    }

    /// Advances to the next page slice.
    ///
    /// Returns `false` once the range is exhausted; further calls keep
    /// returning `false` until the cursor is re-ranged.
    #[expect(
        clippy::should_implement_trait,
        reason = "the cursor lends slices it overwrites on every advance"
    )]
    pub fn next(&mut self) -> bool {
        if self.state != State::Ready || self.next_page > self.max_page {
            self.exhaust();
            return false;
        }
        let Some(page) = self.pages.page(self.next_page) else {
            self.exhaust();
            return false;
        };
        self.array = page;
        self.base = page_start(self.next_page);
        self.offset = if self.next_page == self.from_page {
            self.start_offset
        } else {
            0
        };
        self.limit = if self.next_page == self.max_page {
            self.end_limit
        } else {
            page.len()
        };
        self.next_page += 1;
        true
    }

    fn exhaust(&mut self) {
        self.state = State::Exhausted;
        self.array = &[];
        self.offset = 0;
        self.limit = 0;
    }

    /// Returns the current page. Only `offset()..limit()` belongs to the range.
    #[rustfmt::skip]
    #[must_use]
    pub const fn array(&self) -> &'a [T] { self.array }

    /// Returns the global index of `array()[0]`.
    #[rustfmt::skip]
    #[must_use]
    pub const fn base(&self) -> u64 { self.base }

    /// Returns the first valid in-page index.
    #[rustfmt::skip]
    #[must_use]
    pub const fn offset(&self) -> usize { self.offset }

    /// Returns the exclusive end of the valid in-page indices.
    #[rustfmt::skip]
    #[must_use]
    pub const fn limit(&self) -> usize { self.limit }

    /// Returns the valid part of the current page.
    #[must_use]
    pub fn slice(&self) -> &'a [T] {
        self.array.get(self.offset..self.limit).unwrap_or(&[])
    }

    /// Returns the global indices covered by the current slice.
    #[must_use]
    pub const fn global_range(&self) -> Range<u64> {
        (self.base + self.offset as u64)..(self.base + self.limit as u64)
    }

    /// Releases the page reference held by the cursor.
    ///
    /// Dropping the cursor has the same effect, so early returns release the
    /// borrow as well.
    pub fn close(self) {}
}
