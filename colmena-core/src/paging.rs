//! Page index arithmetic.
//!
//! Paged structures split a logical array of `capacity` elements into pages of
//! exactly [`PAGE_SIZE`] elements (the last page may be shorter). Because the
//! page size is a power of two, a global index maps to its page and in-page
//! offset with a shift and a mask. All functions here are total and
//! allocation-free.

/// Number of bits used for the in-page offset.
pub const PAGE_SHIFT: u32 = 14;

/// Number of elements held by every page except possibly the last.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

const PAGE_MASK: u64 = (1 << PAGE_SHIFT) - 1;

/// Returns the page that holds the global `index`.
///
/// # Examples
/// ```
/// use colmena_core::paging::{PAGE_SIZE, page_index};
///
/// assert_eq!(page_index(0), 0);
/// assert_eq!(page_index(PAGE_SIZE as u64), 1);
/// ```
#[must_use]
#[inline]
pub const fn page_index(index: u64) -> u64 {
    index >> PAGE_SHIFT
}

/// Returns the offset of the global `index` within its page.
#[must_use]
#[inline]
pub const fn index_in_page(index: u64) -> usize {
    (index & PAGE_MASK) as usize
}

/// Returns the number of valid elements in the page that ends at the global
/// exclusive bound `index`.
///
/// For a multiple of [`PAGE_SIZE`] this is a full page, never zero.
///
/// # Examples
/// ```
/// use colmena_core::paging::{PAGE_SIZE, exclusive_index_of_page};
///
/// assert_eq!(exclusive_index_of_page(1), 1);
/// assert_eq!(exclusive_index_of_page(PAGE_SIZE as u64), PAGE_SIZE);
/// assert_eq!(exclusive_index_of_page(PAGE_SIZE as u64 + 3), 3);
/// ```
#[must_use]
#[inline]
pub const fn exclusive_index_of_page(index: u64) -> usize {
    ((index.wrapping_sub(1) & PAGE_MASK) + 1) as usize
}

/// Returns the number of pages required to hold `capacity` elements.
#[must_use]
#[inline]
pub const fn number_of_pages(capacity: u64) -> u64 {
    capacity.div_ceil(1 << PAGE_SHIFT)
}

/// Returns the global index of the first element of `page`.
#[must_use]
#[inline]
pub const fn page_start(page: u64) -> u64 {
    page << PAGE_SHIFT
}
