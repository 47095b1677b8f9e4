//! Block message rendering.

use std::borrow::Cow;
use std::fmt::Write;

use crate::catalog::{CatalogError, RuleCategory};
use crate::config::Config;

/// Characters of the offending command echoed before truncation.
pub const DEFAULT_DISPLAY_BUDGET: usize = 300;

/// Appended to a truncated command echo.
pub const ELLIPSIS: &str = "...";

/// Shown when the dangerous operation sits inside a remote-shell wrapper.
pub const INDIRECTION_NOTICE: &str = "⚠️  SSH-wrapped command detected - same rules apply.";

const GUIDANCE: &str = "\
This hook exists because of incidents where an agent killed the user's session.
If you believe this is a false positive, ask the user for explicit approval.
Do not retry with a differently-phrased variant of the same command.";

/// Turns a blocking rule into the explanation returned to the agent.
#[derive(Debug, Clone)]
pub struct Renderer {
    display_budget: usize,
    incidents: Vec<String>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(DEFAULT_DISPLAY_BUDGET, Vec::new())
    }
}

impl Renderer {
    pub fn new(display_budget: usize, incidents: Vec<String>) -> Self {
        Self {
            display_budget,
            incidents,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.settings.display_budget, config.incidents.clone())
    }

    /// Render the message for a command blocked by `rule`.
    pub fn render(&self, rule: &RuleCategory, command: &str, via_indirection: bool) -> String {
        let mut out = format!(
            "⛔ BLOCKED [{}]\n\nDETECTED COMMAND:\n{}\n\n",
            rule.category,
            truncate(command, self.display_budget)
        );
        if via_indirection {
            out.push_str(INDIRECTION_NOTICE);
            out.push_str("\n\n");
        }
        let _ = write!(
            out,
            "REASON: {}\n\nSUGGESTION: {}\n\n{GUIDANCE}",
            rule.reason, rule.suggestion
        );
        self.push_incidents(&mut out);
        out
    }

    /// Render the message used when no rule catalog could be loaded.
    pub fn render_unavailable(&self, command: &str, error: &CatalogError) -> String {
        let mut out = format!(
            "⛔ BLOCKED [{}]\n\nDETECTED COMMAND:\n{}\n\n",
            crate::eval::CATALOG_UNAVAILABLE,
            truncate(command, self.display_budget)
        );
        let _ = write!(
            out,
            "REASON: the safety rule catalog failed to load ({error}), so no command can be vetted\n\n\
             SUGGESTION: Ask the user to fix the cc-sessionguard configuration or approve this command explicitly"
        );
        out
    }

    fn push_incidents(&self, out: &mut String) {
        if self.incidents.is_empty() {
            return;
        }
        out.push_str("\n\nINCIDENT HISTORY:");
        for incident in &self.incidents {
            let _ = write!(out, "\n- {incident}");
        }
    }
}

/// Cut `text` to at most `budget` characters, appending [`ELLIPSIS`] when cut.
pub fn truncate(text: &str, budget: usize) -> Cow<'_, str> {
    match text.char_indices().nth(budget) {
        Some((end, _)) => Cow::Owned(format!("{}{ELLIPSIS}", &text[..end])),
        None => Cow::Borrowed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Group, RuleCatalog};
    use crate::config::RuleConfig;

    fn rule() -> RuleCatalog {
        let rules = [RuleConfig {
            id: "compose-down".into(),
            group: Group::ContainerLifecycle,
            category: "CONTAINER_DESTRUCTION".into(),
            pattern: "docker compose down".into(),
            reason: "stops every container".into(),
            suggestion: "ask the user".into(),
        }];
        RuleCatalog::compile(1, &rules, &[]).unwrap()
    }

    #[test]
    fn truncate_short_text_is_borrowed() {
        assert!(matches!(truncate("ls", 300), Cow::Borrowed("ls")));
    }

    #[test]
    fn truncate_at_exact_budget_is_unchanged() {
        let text = "x".repeat(300);
        assert_eq!(truncate(&text, 300), text);
    }

    #[test]
    fn truncate_over_budget_cuts_to_budget() {
        let text = "y".repeat(301);
        let cut = truncate(&text, 300);
        assert_eq!(cut, format!("{}...", "y".repeat(300)));
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        let text = "é".repeat(5);
        assert_eq!(truncate(&text, 3), "ééé...");
    }

    #[test]
    fn message_contains_rule_text() {
        let catalog = rule();
        let r = &catalog.rules()[0];
        let msg = Renderer::default().render(r, "docker compose down", false);
        assert!(msg.starts_with("⛔ BLOCKED [CONTAINER_DESTRUCTION]"));
        assert!(msg.contains("DETECTED COMMAND:\ndocker compose down\n"));
        assert!(msg.contains("REASON: stops every container"));
        assert!(msg.contains("SUGGESTION: ask the user"));
        assert!(msg.contains("explicit approval"));
        assert!(!msg.contains(INDIRECTION_NOTICE));
        assert!(!msg.contains("INCIDENT HISTORY"));
    }

    #[test]
    fn message_mentions_indirection() {
        let catalog = rule();
        let msg = Renderer::default().render(
            &catalog.rules()[0],
            "ssh host 'docker compose down'",
            true,
        );
        assert!(msg.contains(INDIRECTION_NOTICE));
    }

    #[test]
    fn message_lists_incidents() {
        let catalog = rule();
        let renderer = Renderer::new(300, vec!["first".into(), "second".into()]);
        let msg = renderer.render(&catalog.rules()[0], "docker compose down", false);
        assert!(msg.ends_with("INCIDENT HISTORY:\n- first\n- second"));
    }

    #[test]
    fn message_truncates_long_command() {
        let catalog = rule();
        let command = format!("docker compose down {}", "a".repeat(500));
        let renderer = Renderer::new(40, Vec::new());
        let msg = renderer.render(&catalog.rules()[0], &command, false);
        let expected = format!("{}...", &command[..40]);
        assert!(msg.contains(&expected));
        assert!(!msg.contains(&command));
    }

    #[test]
    fn unavailable_message_names_error() {
        let msg = Renderer::default().render_unavailable("reboot", &CatalogError::Empty);
        assert!(msg.contains("CATALOG_UNAVAILABLE"));
        assert!(msg.contains("rule catalog is empty"));
    }
}
