//! Failure reports for unmet expectations.

use std::fmt;

use similar::TextDiff;

use crate::error::HarnessResult;
use crate::model::screen::Screen;
use crate::playbook::snapshot_xml;

/// Expected/actual screen pair captured when an expectation is not met.
///
/// Both sides are rendered with the same snapshot serializer the recorder
/// uses, so the report can be pasted straight back into a playbook.
#[derive(Clone, Debug)]
pub struct FailureReport {
    /// Snapshot the playbook expected.
    pub expected: String,
    /// Snapshot of the screen as it actually stood.
    pub actual: String,
    /// Unified diff from expected to actual.
    pub diff: String,
}

impl FailureReport {
    /// Build a report from the expected and live screens.
    pub fn new(expected: &Screen, actual: &Screen) -> HarnessResult<Self> {
        let expected = snapshot_xml(expected)?;
        let actual = snapshot_xml(actual)?;
        let diff = TextDiff::from_lines(&expected, &actual)
            .unified_diff()
            .context_radius(3)
            .header("expected", "actual")
            .to_string();
        Ok(Self {
            expected,
            actual,
            diff,
        })
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Expected screen:")?;
        writeln!(f, "{}", self.expected)?;
        writeln!(f, "Current screen:")?;
        writeln!(f, "{}", self.actual)?;
        writeln!(f, "Differences:")?;
        write!(f, "{}", self.diff)
    }
}
