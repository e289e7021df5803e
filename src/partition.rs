//! Division of a resource into contiguous byte ranges.
use crate::state::Range;
use std::num::NonZeroU64;

/// Most ranges a single run will open. Each range holds a file handle and a
/// task for the whole fetch phase.
pub const MAX_RANGES: usize = 1024;

/// How a resource is split into ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// `n` equal ranges of `len / n` bytes, plus one trailing range holding
    /// the `len % n` remainder when it is non-zero.
    FixedCount(NonZeroU64),
    /// Ranges of at most this many bytes; the last one holds whatever is left.
    BlockSize(NonZeroU64),
}

/// What the core decided to do with a probed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Fetch these ranges in parallel.
    Ranged(Vec<Range>),
    /// The server cannot serve ranges (or did not report a length): the
    /// resource has to be fetched with a single plain GET.
    SingleStream,
}

/// Chooses between parallel ranges and a single stream.
pub fn plan(total_len: Option<u64>, accepts_ranges: bool, partition: Partition) -> Plan {
    match total_len {
        Some(len) if len > 0 && accepts_ranges => Plan::Ranged(split(len, partition)),
        _ => Plan::SingleStream,
    }
}

/// Splits `total_len` bytes into ordered, inclusive ranges covering
/// `[0, total_len)` exactly once. Returns no ranges for an empty resource.
pub fn split(total_len: u64, partition: Partition) -> Vec<Range> {
    if total_len == 0 {
        return Vec::new();
    }

    match partition {
        Partition::FixedCount(n) => fixed_count(total_len, n.get()),
        Partition::BlockSize(block) => block_size(total_len, block.get()),
    }
}

fn fixed_count(total_len: u64, n: u64) -> Vec<Range> {
    // More ranges than bytes would produce empty ranges.
    let n = n.min(total_len);
    let chunk_size = total_len / n;
    let remainder = total_len % n;

    let mut ranges = Vec::with_capacity(n as usize + 1);
    for i in 0..n {
        let start = i * chunk_size;
        ranges.push(Range::new(ranges.len(), start, start + chunk_size - 1));
    }

    if remainder > 0 {
        ranges.push(Range::new(ranges.len(), n * chunk_size, total_len - 1));
    }

    ranges
}

fn block_size(total_len: u64, block: u64) -> Vec<Range> {
    let count = total_len.div_ceil(block);

    (0..count)
        .map(|i| {
            let start = i * block;
            let end = (start + block).min(total_len) - 1;
            Range::new(i as usize, start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    fn assert_covers(ranges: &[Range], total_len: u64) {
        assert!(!ranges.is_empty());
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges.last().unwrap().end, total_len - 1);
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + 1, "gap or overlap in {:?}", pair);
        }
        for (i, r) in ranges.iter().enumerate() {
            assert_eq!(r.index, i);
            assert!(r.start <= r.end);
        }
        assert_eq!(ranges.iter().map(Range::len).sum::<u64>(), total_len);
    }

    #[test]
    fn test_fixed_count_even_split() {
        // 10,000,000 bytes over 4 -> four ranges of 2,500,000, no remainder range
        let ranges = split(10_000_000, Partition::FixedCount(nz(4)));
        assert_eq!(ranges.len(), 4);
        assert!(ranges.iter().all(|r| r.len() == 2_500_000));
        assert_eq!(ranges[3].end, 9_999_999);
    }

    #[test]
    fn test_fixed_count_trailing_remainder() {
        // one extra byte becomes its own trailing range
        let ranges = split(10_000_001, Partition::FixedCount(nz(4)));
        assert_eq!(ranges.len(), 5);
        assert!(ranges[..4].iter().all(|r| r.len() == 2_500_000));
        assert_eq!(ranges[4].start, 10_000_000);
        assert_eq!(ranges[4].end, 10_000_000);
        assert_eq!(ranges[4].len(), 1);
    }

    #[test]
    fn test_fixed_count_more_ranges_than_bytes() {
        let ranges = split(3, Partition::FixedCount(nz(8)));
        assert_eq!(ranges.len(), 3);
        assert_covers(&ranges, 3);
    }

    #[test]
    fn test_block_size_with_remainder() {
        let ranges = split(250, Partition::BlockSize(nz(100)));
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[2].start, 200);
        assert_eq!(ranges[2].len(), 50);
    }

    #[test]
    fn test_block_size_exact_multiple() {
        let ranges = split(300, Partition::BlockSize(nz(100)));
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[2].len(), 100);
    }

    #[test]
    fn test_partitions_cover_resource() {
        for total_len in [1, 2, 7, 99, 100, 101, 1024, 65_537] {
            for n in [1, 2, 3, 4, 7, 16, 200] {
                assert_covers(&split(total_len, Partition::FixedCount(nz(n))), total_len);
                assert_covers(&split(total_len, Partition::BlockSize(nz(n))), total_len);
            }
        }
    }

    #[test]
    fn test_plan_falls_back_to_single_stream() {
        let fixed = Partition::FixedCount(nz(4));
        assert_eq!(plan(Some(100), false, fixed), Plan::SingleStream);
        assert_eq!(plan(None, true, fixed), Plan::SingleStream);
        assert_eq!(plan(Some(0), true, fixed), Plan::SingleStream);
        assert!(matches!(plan(Some(100), true, fixed), Plan::Ranged(r) if r.len() == 4));
    }
}
