//! Source positions and ranges for configuration files.

/// A position within a source file.
///
/// Byte offsets are retained for editors and tooling but carry no semantic
/// meaning across re-parses; comparisons that survive the process boundary
/// should rely on line and column only (see
/// [`Range::same_location`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pos {
    /// One-based line number.
    pub line: usize,
    /// One-based column number.
    pub column: usize,
    /// Zero-based byte offset into the file.
    pub byte: usize,
}

impl Pos {
    /// Creates a position.
    #[must_use]
    pub const fn new(line: usize, column: usize, byte: usize) -> Self {
        Self { line, column, byte }
    }
}

/// A contiguous span within a single source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Range {
    /// Name of the file the span belongs to.
    pub filename: String,
    /// Inclusive start of the span.
    pub start: Pos,
    /// Exclusive end of the span.
    pub end: Pos,
}

impl Range {
    /// Creates a range covering `start..end` in `filename`.
    #[must_use]
    pub fn new(filename: impl Into<String>, start: Pos, end: Pos) -> Self {
        Self {
            filename: filename.into(),
            start,
            end,
        }
    }

    /// Compares two ranges ignoring byte offsets.
    ///
    /// Byte offsets differ between parses of semantically identical text,
    /// so equality across the process boundary only considers filename,
    /// line, and column.
    #[must_use]
    pub fn same_location(&self, other: &Self) -> bool {
        self.filename == other.filename
            && self.start.line == other.start.line
            && self.start.column == other.start.column
            && self.end.line == other.end.line
            && self.end.column == other.end.column
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.filename, self.start.line, self.start.column
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn same_location_ignores_byte_offsets() {
        let a = Range::new("main.tf", Pos::new(1, 1, 0), Pos::new(1, 10, 9));
        let b = Range::new("main.tf", Pos::new(1, 1, 42), Pos::new(1, 10, 51));
        assert!(a.same_location(&b));
        assert_ne!(a, b);
    }

    #[rstest]
    fn same_location_respects_filename() {
        let a = Range::new("main.tf", Pos::new(1, 1, 0), Pos::new(1, 10, 9));
        let b = Range::new("other.tf", Pos::new(1, 1, 0), Pos::new(1, 10, 9));
        assert!(!a.same_location(&b));
    }

    #[rstest]
    fn displays_filename_and_start() {
        let r = Range::new("main.tf", Pos::new(3, 5, 40), Pos::new(3, 9, 44));
        assert_eq!(r.to_string(), "main.tf:3:5");
    }
}
