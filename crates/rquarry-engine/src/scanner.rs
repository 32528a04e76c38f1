//! Buffer scanning: run every compiled pattern against a byte buffer and
//! record match occurrences.
//!
//! Scanning is a pure function of (buffer, patterns): no state survives
//! a scan, and identical inputs produce identical results. Buffers are
//! held wholly in memory — the shipped rules cap eligible files at 10MB
//! through their `filesize` predicates, so there is no chunked scanning
//! and no match can straddle a boundary.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::matcher::CompiledPattern;

/// Match occurrences for a single pattern within one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternHits {
    /// Number of occurrences. Overlapping occurrences count for
    /// literals; regex counts are leftmost-first non-overlapping.
    pub count: u64,
    /// Byte offset of each occurrence, ascending.
    pub offsets: Vec<usize>,
}

/// Per-pattern results for one scan of one buffer.
///
/// Every scanned pattern has an entry, with a zero count when absent —
/// the evaluator relies on that seeding to treat a missing identifier
/// as an invariant violation rather than an absence. Results are
/// created fresh per scan and discarded after evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResults {
    hits: HashMap<String, PatternHits>,
}

impl ScanResults {
    /// Occurrence count for a pattern, `None` if it was not scanned.
    pub fn count(&self, id: &str) -> Option<u64> {
        self.hits.get(id).map(|h| h.count)
    }

    /// Full hit record for a pattern.
    pub fn hits(&self, id: &str) -> Option<&PatternHits> {
        self.hits.get(id)
    }

    /// Whether a scanned pattern occurred at least once.
    pub fn is_present(&self, id: &str) -> bool {
        self.count(id).is_some_and(|c| c > 0)
    }
}

/// A wall-clock deadline used to bound a scan.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Deadline(Instant::now() + timeout)
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.0
    }
}

/// Scan a buffer with a set of compiled patterns.
pub fn scan(buffer: &[u8], patterns: &[CompiledPattern]) -> ScanResults {
    match scan_with_deadline(buffer, patterns, None) {
        Some(results) => results,
        None => unreachable!("scan without a deadline cannot time out"),
    }
}

/// Scan a buffer with an optional wall-clock deadline.
///
/// Returns `None` if the deadline expires before every pattern has been
/// run. The deadline is checked between patterns: the regex engine is
/// non-backtracking and literal search is linear in the buffer, so each
/// individual pattern scan is already time-bounded.
pub fn scan_with_deadline(
    buffer: &[u8],
    patterns: &[CompiledPattern],
    deadline: Option<&Deadline>,
) -> Option<ScanResults> {
    let mut hits = HashMap::with_capacity(patterns.len());
    for pattern in patterns {
        if let Some(d) = deadline
            && d.expired()
        {
            return None;
        }
        let offsets = pattern.find_all(buffer);
        hits.insert(
            pattern.id.clone(),
            PatternHits {
                count: offsets.len() as u64,
                offsets,
            },
        );
    }
    Some(ScanResults { hits })
}
