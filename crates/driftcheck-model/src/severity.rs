//! Issue severity levels.

/// Severity of a reported issue.
///
/// A closed three-valued enum. Unrecognised values received from the wire
/// decode to [`Severity::Error`]; that fallback lives in the wire layer,
/// not here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Severity {
    /// A critical finding, e.g. a change forcing resource recreation.
    #[default]
    Error,
    /// A potential problem that may need attention.
    Warning,
    /// An informational finding.
    Notice,
}

impl Severity {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Notice => "NOTICE",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Severity::Error, "ERROR")]
    #[case(Severity::Warning, "WARNING")]
    #[case(Severity::Notice, "NOTICE")]
    fn displays_canonical_name(#[case] severity: Severity, #[case] expected: &str) {
        assert_eq!(severity.to_string(), expected);
    }

    #[rstest]
    fn defaults_to_error() {
        assert_eq!(Severity::default(), Severity::Error);
    }
}
