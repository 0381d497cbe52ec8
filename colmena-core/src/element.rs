//! Primitive element types that can live inside a paged array.

use std::{
    fmt,
    ops::{BitAnd, BitOr},
};

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width primitive stored in pages.
///
/// The trait is sealed: paged arrays only hold plain numeric values so that
/// their byte footprint is exactly `size_of::<T>() * capacity` plus page
/// bookkeeping.
pub trait Element:
    sealed::Sealed + Copy + Default + PartialEq + PartialOrd + fmt::Debug + Send + Sync + 'static
{
    /// Short name used in allocation owner labels.
    const NAME: &'static str;

    /// Adds `delta` to `self`, wrapping on integer overflow.
    #[must_use]
    fn wrapping_add(self, delta: Self) -> Self;
}

/// Integer elements that additionally support bit-wise updates.
pub trait BitElement: Element + BitOr<Output = Self> + BitAnd<Output = Self> {}

macro_rules! integer_elements {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Element for $ty {
                const NAME: &'static str = stringify!($ty);

                #[inline]
                fn wrapping_add(self, delta: Self) -> Self {
                    <$ty>::wrapping_add(self, delta)
                }
            }

            impl BitElement for $ty {}
        )+
    };
}

integer_elements!(u8, i32, u32, i64, u64);

impl sealed::Sealed for f64 {}

impl Element for f64 {
    const NAME: &'static str = "f64";

    #[inline]
    fn wrapping_add(self, delta: Self) -> Self {
        self + delta
    }
}
