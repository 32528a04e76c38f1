//! Compiled byte-level matchers.
//!
//! Each pattern is compiled once at rule load time into a form the
//! scanner can run repeatedly: a `memmem` finder for literals, a
//! byte-oriented regex for expressions. Matchers are immutable after
//! construction and safe to share across threads.

use memchr::memmem;
use regex::bytes::Regex;

/// A pre-compiled matcher for a single pattern.
#[derive(Debug, Clone)]
pub enum CompiledMatcher {
    /// Case-sensitive byte substring search.
    Literal(memmem::Finder<'static>),
    /// ASCII case-insensitive byte substring search.
    LiteralNoCase(Vec<u8>),
    /// Regular expression over raw bytes.
    Regex(Regex),
}

/// A compiled pattern: identifier plus matcher.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// Identifier unique within the owning rule, without the `$` sigil.
    pub id: String,
    pub matcher: CompiledMatcher,
}

impl CompiledPattern {
    /// Find every match offset in the buffer.
    ///
    /// Literal matches count every starting offset, overlapping
    /// occurrences included (`aa` occurs three times in `aaaa`). Regex
    /// matches are leftmost-first and non-overlapping.
    pub fn find_all(&self, buffer: &[u8]) -> Vec<usize> {
        match &self.matcher {
            CompiledMatcher::Literal(finder) => {
                let mut offsets = Vec::new();
                let mut at = 0;
                while let Some(pos) = finder.find(&buffer[at..]) {
                    offsets.push(at + pos);
                    // Re-seek from the next byte so overlapping hits count.
                    at += pos + 1;
                }
                offsets
            }
            CompiledMatcher::LiteralNoCase(needle) => {
                if needle.is_empty() || needle.len() > buffer.len() {
                    return Vec::new();
                }
                buffer
                    .windows(needle.len())
                    .enumerate()
                    .filter(|(_, window)| window.eq_ignore_ascii_case(needle))
                    .map(|(i, _)| i)
                    .collect()
            }
            CompiledMatcher::Regex(re) => re.find_iter(buffer).map(|m| m.start()).collect(),
        }
    }
}
