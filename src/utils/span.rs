//! Source location tracking

/// A span represents a range in the source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Start char offset
    pub start: usize,
    /// End char offset (exclusive)
    pub end: usize,
    /// 1-based line of `start`
    pub line: usize,
    /// 1-based column of `start`
    pub column: usize,
    /// File ID (index into the compilation unit's file table)
    pub file_id: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize, line: usize, column: usize, file_id: usize) -> Self {
        Self { start, end, line, column, file_id }
    }

    /// Create a dummy span (builtins, tests)
    pub fn dummy() -> Self {
        Self { start: 0, end: 0, line: 0, column: 0, file_id: 0 }
    }

    /// Merge two spans. The position of the earlier one wins.
    pub fn merge(&self, other: &Span) -> Span {
        let (line, column) = if other.start < self.start && other.file_id == self.file_id {
            (other.line, other.column)
        } else {
            (self.line, self.column)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line,
            column,
            file_id: self.file_id,
        }
    }

    /// Get the length of the span
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Check if the span is empty
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::dummy()
    }
}
