//! Informational hooks around the gate.
//!
//! Both advisories only print text back into the agent's context; they never
//! block anything and always exit 0.

/// PostToolUse: inspects test runner output for failures and partial runs.
pub mod test_report;
/// SessionStart: reports new upstream commits in a tracked repository.
pub mod updates;

/// Wrap `body` in the tag the host surfaces to the agent as a reminder.
pub fn reminder(body: &str) -> String {
    format!("<system-reminder>\n{}\n</system-reminder>", body.trim_end())
}
