//! Two-level segregated-fit heap model.
//!
//! Manages a logical address range (offsets, no backing memory) with the
//! TLSF block discipline: free blocks are filed into first-level
//! (power-of-two) and second-level (linear subdivision) size classes
//! tracked by bitmaps, allocation takes the head of the first non-empty
//! class that is guaranteed to fit and splits off the remainder, and
//! release immediately coalesces with free physical neighbors on both
//! sides. Because the layout is inspectable, this is the allocator the
//! workload tests use to check that worst cases are really constructed.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use super::{Allocator, Handle, InspectNeighbors, Neighbors};

/// First offset handed out; keeps address tokens non-zero.
const BASE_OFFSET: usize = 0x1000;
/// Block sizes are multiples of this.
pub const ALIGN: usize = 8;
/// Smallest block the heap will create, including split remainders.
pub const MIN_BLOCK: usize = 16;
/// Largest capacity whose end offset still fits in a `usize`.
const MAX_CAPACITY: usize = (usize::MAX - BASE_OFFSET) & !(ALIGN - 1);

const SL_LOG2: u32 = 4;
const SL_COUNT: usize = 1 << SL_LOG2;
/// Sizes below `1 << FL_SHIFT` are classed linearly in first level 0.
const FL_SHIFT: u32 = SL_LOG2 + 3;
const SMALL_BLOCK: usize = 1 << FL_SHIFT;
const FL_COUNT: usize = (usize::BITS - FL_SHIFT + 1) as usize;

#[derive(Debug, Clone, Copy)]
struct Block {
    size: usize,
    free: bool,
    /// Size the caller asked for; 0 while free.
    requested: usize,
}

/// Heap lifecycle log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapLogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Structured heap lifecycle record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapLogRecord {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Correlation id for this record.
    pub trace_id: String,
    /// Severity level.
    pub level: HeapLogLevel,
    /// API symbol (`allocate`, `release`).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `split`, `coalesce`, `oom`, ...).
    pub event: &'static str,
    /// Block offset involved in the event.
    pub offset: Option<usize>,
    /// Size value involved in the event.
    pub size: Option<usize>,
    /// `(first_level, second_level)` size class.
    pub bin: Option<(usize, usize)>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Free-form details for debugging.
    pub details: String,
    /// Snapshot: live block count.
    pub used_blocks: usize,
    /// Snapshot: free block count.
    pub free_blocks: usize,
    /// Snapshot: free bytes.
    pub free_bytes: usize,
}

/// Point-in-time heap occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    pub capacity: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
    pub free_bytes: usize,
    pub largest_free: usize,
}

/// Size class holding blocks of exactly/at least `size` bytes.
fn mapping(size: usize) -> (usize, usize) {
    if size < SMALL_BLOCK {
        (0, size / (SMALL_BLOCK / SL_COUNT))
    } else {
        let msb = usize::BITS - 1 - size.leading_zeros();
        let sl = (size >> (msb - SL_LOG2)) & (SL_COUNT - 1);
        ((msb - FL_SHIFT + 1) as usize, sl)
    }
}

/// Size class whose every block is large enough for `size`.
fn mapping_search(size: usize) -> Option<(usize, usize)> {
    let rounded = if size < SMALL_BLOCK {
        size
    } else {
        let msb = usize::BITS - 1 - size.leading_zeros();
        size.checked_add((1usize << (msb - SL_LOG2)) - 1)?
    };
    let (fl, sl) = mapping(rounded);
    (fl < FL_COUNT).then_some((fl, sl))
}

fn block_size_for(request: usize) -> Option<usize> {
    let aligned = request.checked_add(ALIGN - 1)? & !(ALIGN - 1);
    Some(aligned.max(MIN_BLOCK))
}

/// In-process TLSF model over `capacity` logical bytes.
pub struct SegregatedHeap {
    capacity: usize,
    /// Physical block map (offset -> block), tiling the whole range.
    blocks: BTreeMap<usize, Block>,
    /// Free offsets per `(fl, sl)` class, flattened.
    free_lists: Vec<Vec<usize>>,
    fl_bitmap: u64,
    sl_bitmap: [u32; FL_COUNT],
    used_blocks: usize,
    free_blocks: usize,
    free_bytes: usize,
    trace_enabled: bool,
    next_decision_id: u64,
    lifecycle_logs: Vec<HeapLogRecord>,
}

impl SegregatedHeap {
    /// Creates a heap whose whole range is one free block.
    ///
    /// `capacity` is rounded down to [`ALIGN`] and clamped so the end offset
    /// fits in a `usize`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_CAPACITY) & !(ALIGN - 1);
        let mut heap = Self {
            capacity,
            blocks: BTreeMap::new(),
            free_lists: (0..FL_COUNT * SL_COUNT).map(|_| Vec::new()).collect(),
            fl_bitmap: 0,
            sl_bitmap: [0; FL_COUNT],
            used_blocks: 0,
            free_blocks: 0,
            free_bytes: 0,
            trace_enabled: false,
            next_decision_id: 1,
            lifecycle_logs: Vec::new(),
        };
        if capacity >= MIN_BLOCK {
            heap.blocks.insert(
                BASE_OFFSET,
                Block {
                    size: capacity,
                    free: true,
                    requested: 0,
                },
            );
            heap.insert_free(BASE_OFFSET, capacity);
        }
        heap
    }

    /// Enables lifecycle records for every allocate/release.
    ///
    /// Records are built inside the allocator calls, so a traced heap times
    /// slower than an untraced one.
    #[must_use]
    pub fn with_lifecycle_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// Current occupancy.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let largest_free = self
            .blocks
            .values()
            .filter(|b| b.free)
            .map(|b| b.size)
            .max()
            .unwrap_or(0);
        HeapStats {
            capacity: self.capacity,
            used_blocks: self.used_blocks,
            free_blocks: self.free_blocks,
            free_bytes: self.free_bytes,
            largest_free,
        }
    }

    /// No live blocks and the free space is a single span.
    #[must_use]
    pub fn is_single_free_span(&self) -> bool {
        self.used_blocks == 0 && self.free_blocks == 1
    }

    fn list_index(fl: usize, sl: usize) -> usize {
        fl * SL_COUNT + sl
    }

    fn insert_free(&mut self, offset: usize, size: usize) {
        let (fl, sl) = mapping(size);
        self.free_lists[Self::list_index(fl, sl)].push(offset);
        self.fl_bitmap |= 1 << fl;
        self.sl_bitmap[fl] |= 1 << sl;
        self.free_blocks += 1;
        self.free_bytes += size;
    }

    fn remove_free(&mut self, offset: usize, size: usize) {
        let (fl, sl) = mapping(size);
        let list = &mut self.free_lists[Self::list_index(fl, sl)];
        if let Some(pos) = list.iter().position(|&o| o == offset) {
            list.swap_remove(pos);
        }
        if list.is_empty() {
            self.sl_bitmap[fl] &= !(1 << sl);
            if self.sl_bitmap[fl] == 0 {
                self.fl_bitmap &= !(1 << fl);
            }
        }
        self.free_blocks -= 1;
        self.free_bytes -= size;
    }

    fn find_suitable(&self, fl: usize, sl: usize) -> Option<(usize, usize)> {
        let sl_map = self.sl_bitmap[fl] & (!0u32 << sl);
        if sl_map != 0 {
            return Some((fl, sl_map.trailing_zeros() as usize));
        }
        let fl_map = if fl + 1 >= u64::BITS as usize {
            0
        } else {
            self.fl_bitmap & (!0u64 << (fl + 1))
        };
        if fl_map == 0 {
            return None;
        }
        let fl = fl_map.trailing_zeros() as usize;
        Some((fl, self.sl_bitmap[fl].trailing_zeros() as usize))
    }

    fn take_head(&mut self, fl: usize, sl: usize) -> Option<(usize, Block)> {
        let offset = *self.free_lists[Self::list_index(fl, sl)].last()?;
        let block = *self.blocks.get(&offset)?;
        self.remove_free(offset, block.size);
        Some((offset, block))
    }

    #[allow(clippy::too_many_arguments)]
    fn record_lifecycle(
        &mut self,
        level: HeapLogLevel,
        symbol: &'static str,
        event: &'static str,
        offset: Option<usize>,
        size: Option<usize>,
        bin: Option<(usize, usize)>,
        outcome: &'static str,
        details: impl Into<String>,
    ) {
        if !self.trace_enabled {
            return;
        }
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        self.lifecycle_logs.push(HeapLogRecord {
            decision_id,
            trace_id: format!("core::tlsf::{symbol}::{decision_id:016x}"),
            level,
            symbol,
            event,
            offset,
            size,
            bin,
            outcome,
            details: details.into(),
            used_blocks: self.used_blocks,
            free_blocks: self.free_blocks,
            free_bytes: self.free_bytes,
        });
    }
}

impl Allocator for SegregatedHeap {
    fn name(&self) -> &'static str {
        "segregated"
    }

    fn allocate(&mut self, size: usize) -> Option<Handle> {
        let request = size.max(1);
        let found = block_size_for(request).and_then(|block_size| {
            let (fl, sl) = mapping_search(block_size)?;
            let (fl, sl) = self.find_suitable(fl, sl)?;
            Some((block_size, fl, sl))
        });
        let Some((block_size, fl, sl)) = found else {
            self.record_lifecycle(
                HeapLogLevel::Warn,
                "allocate",
                "oom",
                None,
                Some(request),
                None,
                "oom",
                "no_suitable_free_class",
            );
            return None;
        };
        let (offset, block) = self.take_head(fl, sl)?;
        debug_assert!(block.size >= block_size);

        let remainder = block.size - block_size;
        let used_size = if remainder >= MIN_BLOCK {
            let split_offset = offset + block_size;
            self.blocks.insert(
                split_offset,
                Block {
                    size: remainder,
                    free: true,
                    requested: 0,
                },
            );
            self.insert_free(split_offset, remainder);
            self.record_lifecycle(
                HeapLogLevel::Debug,
                "allocate",
                "split",
                Some(split_offset),
                Some(remainder),
                Some(mapping(remainder)),
                "remainder_filed",
                format!("parent_size={}", block.size),
            );
            block_size
        } else {
            block.size
        };

        self.blocks.insert(
            offset,
            Block {
                size: used_size,
                free: false,
                requested: request,
            },
        );
        self.used_blocks += 1;
        self.record_lifecycle(
            HeapLogLevel::Trace,
            "allocate",
            "alloc",
            Some(offset),
            Some(request),
            Some((fl, sl)),
            "success",
            format!("block_size={used_size}"),
        );
        NonZeroUsize::new(offset).map(|addr| Handle::from_raw_parts(addr, request))
    }

    fn release(&mut self, handle: Handle) {
        let offset = handle.addr();
        let block = match self.blocks.get(&offset) {
            Some(b) if !b.free => *b,
            Some(_) => {
                self.record_lifecycle(
                    HeapLogLevel::Warn,
                    "release",
                    "release_of_free_block",
                    Some(offset),
                    Some(handle.size()),
                    None,
                    "ignored",
                    "block_already_free",
                );
                return;
            }
            None => {
                self.record_lifecycle(
                    HeapLogLevel::Warn,
                    "release",
                    "unknown_handle",
                    Some(offset),
                    Some(handle.size()),
                    None,
                    "ignored",
                    "offset_not_a_block_boundary",
                );
                return;
            }
        };
        self.used_blocks -= 1;

        let mut start = offset;
        let mut size = block.size;
        let mut merged_left = false;
        let mut merged_right = false;

        let left = self
            .blocks
            .range(..offset)
            .next_back()
            .map(|(&o, &b)| (o, b));
        if let Some((left_offset, left_block)) = left {
            if left_block.free && left_offset + left_block.size == offset {
                self.remove_free(left_offset, left_block.size);
                self.blocks.remove(&offset);
                start = left_offset;
                size += left_block.size;
                merged_left = true;
            }
        }

        let right_offset = offset + block.size;
        if let Some(&right_block) = self.blocks.get(&right_offset) {
            if right_block.free {
                self.remove_free(right_offset, right_block.size);
                self.blocks.remove(&right_offset);
                size += right_block.size;
                merged_right = true;
            }
        }

        self.blocks.insert(
            start,
            Block {
                size,
                free: true,
                requested: 0,
            },
        );
        self.insert_free(start, size);

        let event = match (merged_left, merged_right) {
            (true, true) => "coalesce_both",
            (true, false) => "coalesce_left",
            (false, true) => "coalesce_right",
            (false, false) => "free",
        };
        self.record_lifecycle(
            HeapLogLevel::Trace,
            "release",
            event,
            Some(start),
            Some(size),
            Some(mapping(size)),
            "success",
            format!(
                "released_offset={offset} released_size={} requested={}",
                block.size, block.requested
            ),
        );
    }

    fn drain_lifecycle_logs(&mut self) -> Vec<HeapLogRecord> {
        std::mem::take(&mut self.lifecycle_logs)
    }
}

impl InspectNeighbors for SegregatedHeap {
    fn free_neighbors(&self, handle: &Handle) -> Option<Neighbors> {
        let offset = handle.addr();
        let block = self.blocks.get(&offset).filter(|b| !b.free)?;
        let left_free = self
            .blocks
            .range(..offset)
            .next_back()
            .filter(|(o, b)| b.free && *o + b.size == offset)
            .map_or(0, |(_, b)| b.size);
        let right_free = self
            .blocks
            .get(&(offset + block.size))
            .filter(|b| b.free)
            .map_or(0, |b| b.size);
        Some(Neighbors {
            left_free,
            right_free,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPACITY: usize = 1 << 20;

    fn forged(offset: usize, size: usize) -> Handle {
        Handle::from_raw_parts(NonZeroUsize::new(offset).unwrap(), size)
    }

    #[test]
    fn new_heap_is_one_free_span() {
        let heap = SegregatedHeap::new(CAPACITY);
        assert!(heap.is_single_free_span());
        let stats = heap.stats();
        assert_eq!(stats.free_bytes, CAPACITY);
        assert_eq!(stats.largest_free, CAPACITY);
    }

    #[test]
    fn mapping_classes() {
        assert_eq!(mapping(16), (0, 2));
        assert_eq!(mapping(120), (0, 15));
        assert_eq!(mapping(128), (1, 0));
        assert_eq!(mapping(255), (1, 15));
        assert_eq!(mapping(256), (2, 0));
        assert_eq!(mapping(512), (3, 0));
    }

    #[test]
    fn mapping_search_rounds_up_to_a_class_that_fits() {
        // 129 would land in (1, 0) whose blocks start at 128; search must
        // skip to the next class.
        assert_eq!(mapping_search(129), Some((1, 1)));
        assert_eq!(mapping_search(128), Some((1, 0)));
        assert_eq!(mapping_search(usize::MAX), None);
    }

    #[test]
    fn small_allocation_splits_the_single_block() {
        let mut heap = SegregatedHeap::new(CAPACITY);
        let handle = heap.allocate(40).unwrap();
        assert_eq!(handle.size(), 40);
        assert_eq!(heap.free_neighbors(&handle).map(|n| n.left_free), Some(0));
        let stats = heap.stats();
        assert_eq!(stats.used_blocks, 1);
        assert_eq!(stats.free_blocks, 1);
        assert_eq!(stats.free_bytes, CAPACITY - 40);
        heap.release(handle);
        assert!(heap.is_single_free_span());
    }

    #[test]
    fn tiny_requests_use_min_block() {
        let mut heap = SegregatedHeap::new(CAPACITY);
        let handle = heap.allocate(0).unwrap();
        assert_eq!(handle.size(), 1);
        assert_eq!(heap.stats().free_bytes, CAPACITY - MIN_BLOCK);
        heap.release(handle);
    }

    #[test]
    fn release_coalesces_with_both_neighbors() {
        let mut heap = SegregatedHeap::new(CAPACITY).with_lifecycle_trace();
        let r1 = heap.allocate(512).unwrap();
        let r2 = heap.allocate(512).unwrap();
        let r3 = heap.allocate(512).unwrap();
        let guard = heap.allocate(512).unwrap();
        assert_eq!(r2.addr(), r1.addr() + 512);
        assert_eq!(r3.addr(), r2.addr() + 512);

        heap.release(r1);
        heap.release(r3);
        let neighbors = heap.free_neighbors(&r2).unwrap();
        assert_eq!(neighbors.left_free, 512);
        assert_eq!(neighbors.right_free, 512);
        assert!(neighbors.both_free());

        heap.drain_lifecycle_logs();
        heap.release(r2);
        let logs = heap.drain_lifecycle_logs();
        assert!(logs.iter().any(|r| r.event == "coalesce_both"));
        assert_eq!(heap.stats().largest_free, CAPACITY - 4 * 512);

        heap.release(guard);
        assert!(heap.is_single_free_span());
    }

    #[test]
    fn free_neighbors_of_unknown_handle_is_none() {
        let heap = SegregatedHeap::new(CAPACITY);
        assert_eq!(heap.free_neighbors(&forged(0xDEAD, 8)), None);
    }

    #[test]
    fn exhaustion_returns_none_and_logs_oom() {
        let mut heap = SegregatedHeap::new(1024).with_lifecycle_trace();
        let whole = heap.allocate(1024).unwrap();
        assert!(heap.allocate(8).is_none());
        let logs = heap.drain_lifecycle_logs();
        assert!(
            logs.iter()
                .any(|r| r.level == HeapLogLevel::Warn && r.event == "oom")
        );
        heap.release(whole);
        assert!(heap.is_single_free_span());
    }

    #[test]
    fn oversized_request_fails_cleanly() {
        let mut heap = SegregatedHeap::new(CAPACITY);
        assert!(heap.allocate(CAPACITY + 1).is_none());
        assert!(heap.allocate(usize::MAX).is_none());
        assert!(heap.is_single_free_span());
    }

    #[test]
    fn address_space_sized_heap_releases_its_tail() {
        let mut heap = SegregatedHeap::new(usize::MAX);
        let cap = heap.stats().capacity;
        assert_eq!(cap, MAX_CAPACITY);
        assert!(BASE_OFFSET.checked_add(cap).is_some());

        let tail_size = 1 << (usize::BITS - 2);
        let head = heap.allocate(cap - tail_size).unwrap();
        let tail = heap.allocate(tail_size).unwrap();
        assert_eq!(tail.addr() + tail_size, BASE_OFFSET + cap);
        assert_eq!(heap.stats().free_blocks, 0);

        let neighbors = heap.free_neighbors(&tail).unwrap();
        assert_eq!(neighbors.right_free, 0);
        heap.release(tail);
        assert_eq!(heap.stats().free_bytes, tail_size);
        heap.release(head);
        assert!(heap.is_single_free_span());
        assert_eq!(heap.stats().largest_free, cap);
    }

    #[test]
    fn degenerate_capacity_never_allocates() {
        let mut heap = SegregatedHeap::new(4);
        assert!(heap.allocate(1).is_none());
        assert_eq!(heap.stats().free_blocks, 0);
    }

    #[test]
    fn forged_releases_are_ignored_and_logged() {
        let mut heap = SegregatedHeap::new(CAPACITY).with_lifecycle_trace();
        let a = heap.allocate(64).unwrap();
        let offset = a.addr();
        let b = heap.allocate(64).unwrap();
        heap.release(a);
        heap.release(forged(offset, 64));
        heap.release(forged(0xDEAD, 64));

        let logs = heap.drain_lifecycle_logs();
        assert!(logs.iter().any(|r| r.event == "release_of_free_block"));
        assert!(logs.iter().any(|r| r.event == "unknown_handle"));
        assert_eq!(heap.stats().used_blocks, 1);
        heap.release(b);
        assert!(heap.is_single_free_span());
    }

    #[test]
    fn lifecycle_trace_is_off_by_default() {
        let mut heap = SegregatedHeap::new(CAPACITY);
        let h = heap.allocate(32).unwrap();
        heap.release(h);
        assert!(heap.drain_lifecycle_logs().is_empty());
    }

    #[test]
    fn lifecycle_records_carry_ids() {
        let mut heap = SegregatedHeap::new(CAPACITY).with_lifecycle_trace();
        let h = heap.allocate(32).unwrap();
        heap.release(h);
        let logs = heap.drain_lifecycle_logs();
        assert!(!logs.is_empty());
        assert!(logs.iter().all(|r| r.decision_id > 0));
        assert!(logs.iter().all(|r| r.trace_id.starts_with("core::tlsf::")));
    }

    #[test]
    fn accounting_invariant_under_deterministic_trace() {
        fn lcg(state: &mut u64) -> u64 {
            *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            *state
        }

        let mut heap = SegregatedHeap::new(CAPACITY);
        let mut live: Vec<Handle> = Vec::new();
        let mut rng = 0xA5A5_5A5A_DEAD_BEEFu64;

        for _ in 0..2000 {
            let r = lcg(&mut rng);
            if r % 2 == 0 || live.is_empty() {
                let size = ((r >> 8) as usize % 4096).max(1);
                if let Some(h) = heap.allocate(size) {
                    live.push(h);
                }
            } else {
                let idx = (r as usize >> 4) % live.len();
                heap.release(live.swap_remove(idx));
            }

            let stats = heap.stats();
            assert_eq!(stats.used_blocks, live.len());
            let used_bytes: usize = heap
                .blocks
                .values()
                .filter(|b| !b.free)
                .map(|b| b.size)
                .sum();
            assert_eq!(stats.free_bytes + used_bytes, CAPACITY);
            // Immediate coalescing: no two free blocks are adjacent.
            let mut prev_free_end = None;
            for (&o, b) in &heap.blocks {
                if b.free {
                    assert_ne!(prev_free_end, Some(o));
                    prev_free_end = Some(o + b.size);
                } else {
                    prev_free_end = None;
                }
            }
        }

        for h in live.drain(..) {
            heap.release(h);
        }
        assert!(heap.is_single_free_span());
    }

    #[test]
    fn release_trace_reports_the_requested_size() {
        let mut heap = SegregatedHeap::new(CAPACITY).with_lifecycle_trace();
        let handle = heap.allocate(42).unwrap();
        heap.release(handle);
        let logs = Allocator::drain_lifecycle_logs(&mut heap);
        let release = logs.iter().find(|r| r.symbol == "release").unwrap();
        assert!(release.details.contains("requested=42"), "{}", release.details);
        assert!(Allocator::drain_lifecycle_logs(&mut heap).is_empty());
    }
}
