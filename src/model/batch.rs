//! Fixed-stride partitioning of a mailbox's sequence numbers.

use std::fmt;

/// Default number of messages requested per metadata fetch.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// An inclusive range of sequence numbers `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRange {
    pub start: u32,
    pub end: u32,
}

impl BatchRange {
    /// Number of messages covered by the range.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// IMAP sequence-set syntax, e.g. `"1:100"`.
    pub fn to_sequence_set(&self) -> String {
        format!("{}:{}", self.start, self.end)
    }
}

impl fmt::Display for BatchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Iterator over the batches covering `[1, total]`.
#[derive(Debug, Clone)]
pub struct Batches {
    next: u32,
    total: u32,
    size: u32,
}

impl Iterator for Batches {
    type Item = BatchRange;

    fn next(&mut self) -> Option<BatchRange> {
        if self.next == 0 || self.next > self.total {
            return None;
        }
        let start = self.next;
        let end = start.saturating_add(self.size - 1).min(self.total);
        // `end == u32::MAX` means the range is exhausted
        self.next = end.checked_add(1).unwrap_or(0);
        Some(BatchRange { start, end })
    }
}

/// Partition `[1, total]` into contiguous ranges of at most `size` messages.
///
/// `size` is clamped to at least 1.
pub fn batches(total: u32, size: u32) -> Batches {
    Batches {
        next: 1,
        total,
        size: size.max(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mailbox_has_no_batches() {
        assert_eq!(batches(0, 100).count(), 0);
    }

    #[test]
    fn test_exact_multiple() {
        let ranges: Vec<_> = batches(200, 100).collect();
        assert_eq!(
            ranges,
            vec![
                BatchRange { start: 1, end: 100 },
                BatchRange { start: 101, end: 200 },
            ]
        );
    }

    #[test]
    fn test_last_batch_is_truncated() {
        let ranges: Vec<_> = batches(250, 100).collect();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[2], BatchRange { start: 201, end: 250 });
        assert_eq!(ranges[2].len(), 50);
    }

    #[test]
    fn test_partition_has_no_gaps_or_overlaps() {
        for total in [1u32, 2, 7, 99, 100, 101, 1000, 1234] {
            for size in [1u32, 3, 10, 100] {
                let ranges: Vec<_> = batches(total, size).collect();
                assert_eq!(ranges.len() as u32, total.div_ceil(size));
                let mut expected = 1;
                for r in &ranges {
                    assert_eq!(r.start, expected);
                    assert!(r.len() <= size);
                    expected = r.end + 1;
                }
                assert_eq!(expected, total + 1);
            }
        }
    }

    #[test]
    fn test_zero_size_is_clamped() {
        assert_eq!(batches(3, 0).count(), 3);
    }

    #[test]
    fn test_near_u32_max_terminates() {
        let ranges: Vec<_> = batches(u32::MAX, u32::MAX / 2 + 1).collect();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[1].end, u32::MAX);
    }

    #[test]
    fn test_sequence_set_syntax() {
        assert_eq!(BatchRange { start: 101, end: 200 }.to_sequence_set(), "101:200");
    }
}
