//! Work splitting for fork/join passes.

use std::ops::Range;

/// Slice of `0..extent` handled by worker `index` out of `count`.
///
/// Every worker gets `extent / count` items; the last worker additionally
/// takes the remainder, so the ranges are disjoint and cover `0..extent`
/// exactly. When `count > extent` all workers but the last get empty ranges.
///
/// # Panics
///
/// Debug builds assert `count > 0` and `index < count`.
#[inline]
pub fn partition(extent: usize, index: usize, count: usize) -> Range<usize> {
    debug_assert!(count > 0, "partition count must be positive");
    debug_assert!(index < count, "worker index {index} out of {count}");

    let slice = extent / count;
    let start = index * slice;
    let end = if index + 1 == count {
        extent
    } else {
        start + slice
    };
    start..end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_split() {
        assert_eq!(partition(100, 0, 4), 0..25);
        assert_eq!(partition(100, 3, 4), 75..100);
    }

    #[test]
    fn test_last_takes_remainder() {
        assert_eq!(partition(10, 0, 3), 0..3);
        assert_eq!(partition(10, 1, 3), 3..6);
        assert_eq!(partition(10, 2, 3), 6..10);
    }

    #[test]
    fn test_more_workers_than_items() {
        let ranges: Vec<_> = (0..8).map(|i| partition(3, i, 8)).collect();
        assert!(ranges[..7].iter().all(|r| r.is_empty()));
        assert_eq!(ranges[7], 0..3);
    }

    #[test]
    fn test_cover_is_exact() {
        for extent in [0usize, 1, 17, 512, 10_007] {
            for count in [1usize, 2, 5, 16, 33] {
                let mut next = 0;
                for index in 0..count {
                    let range = partition(extent, index, count);
                    assert_eq!(range.start, next);
                    next = range.end;
                }
                assert_eq!(next, extent);
            }
        }
    }
}
