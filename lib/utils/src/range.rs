//! Extensions for `Range<T>` used when reasoning about address windows.

use core::ops::Range;

pub trait RangeExt<T>
where
    Self: Sized,
    T: Copy + Ord,
{
    /// Check if this range overlaps with another range.
    ///
    /// Always return false if either range is empty.
    fn overlap(&self, another: &Self) -> bool;

    /// Check if `inner` lies entirely within this range.
    ///
    /// An empty `inner` is never contained.
    fn contains_range(&self, inner: &Self) -> bool;
}

impl<T> RangeExt<T> for Range<T>
where
    T: Copy + Ord,
{
    #[inline(always)]
    fn overlap(&self, another: &Range<T>) -> bool {
        if self.is_empty() || another.is_empty() {
            return false;
        }
        if self.end <= another.start {
            return false;
        }
        if self.start >= another.end {
            return false;
        }
        true
    }

    #[inline(always)]
    fn contains_range(&self, inner: &Range<T>) -> bool {
        !inner.is_empty() && self.start <= inner.start && inner.end <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::RangeExt;

    #[test]
    fn overlap_is_half_open() {
        assert!((0x1000..0x2000).overlap(&(0x1fff..0x3000)));
        assert!(!(0x1000..0x2000).overlap(&(0x2000..0x3000)));
        assert!(!(0x1000..0x2000).overlap(&(0x0..0x1000)));
        assert!((0x1000..0x2000).overlap(&(0x0..0x4000)));
    }

    #[test]
    fn empty_ranges_never_overlap() {
        assert!(!(0x1000..0x1000).overlap(&(0x0..0x4000)));
        assert!(!(0x0..0x4000).overlap(&(0x1000..0x1000)));
    }

    #[test]
    fn containment() {
        let window = 0x01c0_0000usize..0x0200_0000;
        assert!(window.contains_range(&(0x01c0_9000..0x01c0_a000)));
        assert!(window.contains_range(&window.clone()));
        assert!(!window.contains_range(&(0x01bf_f000..0x01c0_1000)));
        assert!(!window.contains_range(&(0x01c0_9000..0x01c0_9000)));
    }
}
