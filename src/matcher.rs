//! Block matcher: compares the remote and local checksum tables

use crate::control::BlockSum;

/// A remote block that needs work, paired with a reusable local block if one
/// exists anywhere in the seed file
#[derive(Debug, Clone)]
pub struct SyncOperation {
    /// The remote block to produce
    pub remote: BlockSum,

    /// A matching local block, or None when the bytes must be fetched.
    /// The planner may still turn a matched block into a fetch.
    pub local: Option<BlockSum>,
}

/// Result of comparing the two tables
#[derive(Debug, Default)]
pub struct MatchOutcome {
    /// Remote block indices already correct at the same index in the seed.
    /// These carry no SyncOperation and bypass the planner's threshold, but
    /// the executor still copies their bytes into the output.
    pub in_place: Vec<u64>,

    /// One operation per remaining remote block, ordered by remote index
    pub ops: Vec<SyncOperation>,
}

impl MatchOutcome {
    /// Total remote blocks that differ from the seed at their own index
    pub fn changed_blocks(&self) -> usize {
        self.ops.len()
    }
}

/// Compare the remote table against the local table.
///
/// For each remote index: a local block at the same index that matches means
/// the block is already correct. Otherwise the entire local table is searched
/// linearly and the first match wins. O(remote x local) worst case, which is
/// fine at block-count scale.
pub fn compare_tables(remote: &[BlockSum], local: &[BlockSum]) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for (i, remote_block) in remote.iter().enumerate() {
        if i < local.len() && local[i].checksums_match(remote_block) {
            outcome.in_place.push(i as u64);
            continue;
        }

        let found = local
            .iter()
            .find(|candidate| candidate.checksums_match(remote_block))
            .cloned();

        outcome.ops.push(SyncOperation {
            remote: remote_block.clone(),
            local: found,
        });
    }

    tracing::debug!(
        remote_blocks = remote.len(),
        in_place = outcome.in_place.len(),
        changed = outcome.ops.len(),
        "Block comparison complete"
    );

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::CHECKSUM_SIZE;

    fn sum(index: u64, weak: u32, tag: u8) -> BlockSum {
        let mut strong = [0u8; CHECKSUM_SIZE];
        strong[0] = tag;
        BlockSum::new(index, weak, strong)
    }

    #[test]
    fn test_identical_tables_produce_no_ops() {
        let remote = vec![sum(0, 1, 1), sum(1, 2, 2), sum(2, 3, 3)];
        let local = remote.clone();

        let outcome = compare_tables(&remote, &local);
        assert!(outcome.ops.is_empty());
        assert_eq!(outcome.in_place, vec![0, 1, 2]);
    }

    #[test]
    fn test_shifted_block_found_by_search() {
        // Remote block 0 lives at local index 2
        let remote = vec![sum(0, 10, 10)];
        let local = vec![sum(0, 1, 1), sum(1, 2, 2), sum(2, 10, 10)];

        let outcome = compare_tables(&remote, &local);
        assert_eq!(outcome.ops.len(), 1);
        assert_eq!(outcome.ops[0].local.as_ref().unwrap().block_start, 2);
    }

    #[test]
    fn test_first_match_wins() {
        let remote = vec![sum(0, 10, 10)];
        let local = vec![sum(0, 1, 1), sum(1, 10, 10), sum(2, 10, 10)];

        let outcome = compare_tables(&remote, &local);
        assert_eq!(outcome.ops[0].local.as_ref().unwrap().block_start, 1);
    }

    #[test]
    fn test_no_match_yields_fetch() {
        let remote = vec![sum(0, 10, 10)];
        let local = vec![sum(0, 1, 1)];

        let outcome = compare_tables(&remote, &local);
        assert!(outcome.ops[0].local.is_none());
    }

    #[test]
    fn test_weak_collision_is_not_a_match() {
        // Same weak checksum, different strong checksum
        let remote = vec![sum(0, 10, 1)];
        let local = vec![sum(0, 10, 2)];

        let outcome = compare_tables(&remote, &local);
        assert_eq!(outcome.ops.len(), 1);
        assert!(outcome.ops[0].local.is_none());
        assert!(outcome.in_place.is_empty());
    }

    #[test]
    fn test_local_table_shorter_than_remote() {
        let remote = vec![sum(0, 1, 1), sum(1, 2, 2), sum(2, 3, 3)];
        let local = vec![sum(0, 1, 1)];

        let outcome = compare_tables(&remote, &local);
        assert_eq!(outcome.in_place, vec![0]);
        assert_eq!(outcome.ops.len(), 2);
    }
}
