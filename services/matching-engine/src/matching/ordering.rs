//! Deterministic ordering and partitioning of fills
//!
//! Fills are sorted by (account, ticker, executed_at, external_id). The
//! trailing external id makes the order total, so two fills landing in the
//! same microsecond are always processed the same way.

use types::fill::{Fill, PartitionKey};

/// Fills for one (account, ticker) pair, in matching order
#[derive(Debug, Clone)]
pub struct Partition<'a> {
    pub key: PartitionKey,
    pub fills: Vec<&'a Fill>,
}

/// Sort fills into matching order without copying them
pub fn sort_fills(fills: &[Fill]) -> Vec<&Fill> {
    let mut sorted: Vec<&Fill> = fills.iter().collect();
    sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    sorted
}

/// Split sorted fills into contiguous (account, ticker) partitions
pub fn partition<'a>(sorted: Vec<&'a Fill>) -> Vec<Partition<'a>> {
    let mut partitions: Vec<Partition<'a>> = Vec::new();

    for fill in sorted {
        match partitions.last_mut() {
            Some(current)
                if current.key.0 == fill.account_id && current.key.1 == fill.ticker =>
            {
                current.fills.push(fill);
            }
            _ => partitions.push(Partition {
                key: fill.partition_key(),
                fills: vec![fill],
            }),
        }
    }

    partitions
}

/// Fills whose (executed_at, external_id) collides with another fill.
///
/// Input must already be sorted, so collisions are adjacent. Each colliding
/// fill is reported once.
pub fn find_ambiguous<'a>(sorted: &[&'a Fill]) -> Vec<&'a Fill> {
    let mut ambiguous: Vec<&'a Fill> = Vec::new();

    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a.executed_at == b.executed_at && a.external_id == b.external_id {
            if !ambiguous.last().is_some_and(|last| std::ptr::eq(*last, a)) {
                ambiguous.push(a);
            }
            ambiguous.push(b);
        }
    }

    ambiguous
}
