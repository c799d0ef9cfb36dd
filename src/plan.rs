//! Range planner: decides copy-vs-fetch and coalesces fetches into ranges
//!
//! Local copies have a fixed per-run overhead, so short scattered runs of
//! matched blocks are cheaper to just re-download. The threshold is expressed
//! in blocks: the number of blocks the assumed network speed delivers per
//! second. Only runs strictly longer than that stay local copies.

use crate::matcher::SyncOperation;

/// A contiguous run of remote block indices fetched in one range request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRange {
    /// First block index covered by this range
    pub block_start: u64,

    /// Number of blocks covered
    pub size: u64,
}

/// Finalized plan for the patch executor
#[derive(Debug, Default)]
pub struct PatchPlan {
    /// Matched blocks worth copying from the seed file, ordered by remote index
    pub copy_ops: Vec<SyncOperation>,

    /// Coalesced download ranges: non-overlapping, ordered, covering every
    /// block that must be fetched exactly once
    pub ranges: Vec<DownloadRange>,
}

impl PatchPlan {
    /// Total blocks that will be fetched over the network
    pub fn blocks_to_fetch(&self) -> u64 {
        self.ranges.iter().map(|r| r.size).sum()
    }
}

/// Build a patch plan from the matcher's operations.
///
/// Operations must be ordered by remote block index (the matcher's output
/// already is). Matched operations are grouped into maximal runs of
/// contiguous remote indices; a run is kept as local copies only when its
/// length exceeds `min_copy_block_count`, otherwise every block in it is
/// reclassified as a fetch.
pub fn plan_patch(ops: Vec<SyncOperation>, min_copy_block_count: u64) -> PatchPlan {
    let (matched, mut fetches): (Vec<_>, Vec<_>) =
        ops.into_iter().partition(|op| op.local.is_some());

    let mut copy_ops = Vec::new();
    let mut run: Vec<SyncOperation> = Vec::new();

    let flush = |run: &mut Vec<SyncOperation>,
                 copy_ops: &mut Vec<SyncOperation>,
                 fetches: &mut Vec<SyncOperation>| {
        if run.len() as u64 > min_copy_block_count {
            copy_ops.append(run);
        } else {
            fetches.append(run);
        }
    };

    for op in matched {
        if let Some(last) = run.last() {
            if op.remote.block_start != last.remote.block_start + 1 {
                flush(&mut run, &mut copy_ops, &mut fetches);
            }
        }
        run.push(op);
    }
    flush(&mut run, &mut copy_ops, &mut fetches);

    fetches.sort_by_key(|op| op.remote.block_start);
    let ranges = merge_ranges(
        fetches
            .iter()
            .map(|op| DownloadRange {
                block_start: op.remote.block_start,
                size: 1,
            })
            .collect(),
    );

    tracing::debug!(
        copy_blocks = copy_ops.len(),
        fetch_blocks = fetches.len(),
        ranges = ranges.len(),
        "Patch plan built"
    );

    PatchPlan { copy_ops, ranges }
}

/// Merge adjacent ranges into the minimal contiguous set.
///
/// Input must be sorted by `block_start` and non-overlapping. Idempotent:
/// merging an already-merged list yields the same list.
pub fn merge_ranges(ranges: Vec<DownloadRange>) -> Vec<DownloadRange> {
    let mut merged: Vec<DownloadRange> = Vec::new();

    for range in ranges {
        if let Some(current) = merged.last_mut() {
            if range.block_start == current.block_start + current.size {
                current.size += range.size;
                continue;
            }
        }
        merged.push(range);
    }

    merged
}
