//! Test report advisory.
//!
//! Runs after a shell command and looks at what the test runner printed:
//! a `N tests, M failures` summary with failures, a run of a single test
//! file instead of the whole suite, or a runner that is not installed.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::config::{AdvisoryConfig, Config};

/// `12 tests, 3 failures` as printed by TAP-style runners.
static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s+tests?,\s+(\d+)\s+failures?").expect("summary pattern compiles")
});

/// Tokens that end one command and start another.
const SEPARATORS: [&str; 5] = [";", "&&", "||", "|", "&"];

/// Something worth telling the agent about a finished test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// One test file was run instead of the suite directory.
    PartialRun { command: String, full_suite: String },
    /// The summary reports failures.
    Failures {
        total: u64,
        failed: u64,
        full_suite: String,
    },
    /// The summary reports a clean run.
    AllPassed { total: u64 },
    /// The runner was invoked but the shell could not find it.
    RunnerMissing { runner: String },
}

impl Finding {
    pub fn render(&self) -> String {
        let body = match self {
            Finding::PartialRun {
                command,
                full_suite,
            } => format!(
                "⚠️ TEST SUITE WARNING: only a single test file was run, not the full suite.\n\n\
                 COMMAND: {command}\n\n\
                 Run the entire suite directory instead:\n  {full_suite}\n\n\
                 Run the full suite before claiming work is complete."
            ),
            Finding::Failures {
                total,
                failed,
                full_suite,
            } => format!(
                "🚫 TEST FAILURES DETECTED: {failed} of {total} tests failed.\n\n\
                 The work is NOT complete. Before marking any task as done:\n\
                 1. Investigate every failing test\n\
                 2. Fix the failures (or update tests that are outdated)\n\
                 3. Re-run the full suite: {full_suite}\n\
                 4. Confirm zero failures"
            ),
            Finding::AllPassed { total } => {
                format!("✅ Tests: {total} tests, 0 failures. Good to proceed.")
            }
            Finding::RunnerMissing { runner } => format!(
                "⚠️ {} NOT FOUND: the test suite cannot run.\n\n\
                 Install {runner} on the target system (or in the container image) first.",
                runner.to_uppercase()
            ),
        };
        super::reminder(&body)
    }
}

/// The parts of a PostToolUse record the advisory needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolRun {
    pub tool_kind: String,
    pub command: String,
    /// Tool output; non-string responses are kept as their JSON text.
    pub output: String,
}

impl ToolRun {
    /// Parse a PostToolUse record. Missing fields become empty strings.
    pub fn from_json(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        let map = value.as_object()?;

        let tool_kind = ["tool_name", "tool"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .unwrap_or_default();
        let command = ["tool_input", "input"]
            .iter()
            .find_map(|k| map.get(*k))
            .and_then(|input| input.get("command"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let output = match ["tool_response", "response"]
            .iter()
            .find_map(|k| map.get(*k))
        {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        Some(Self {
            tool_kind: tool_kind.into(),
            command: command.into(),
            output,
        })
    }
}

/// Checks test runs against the configured runner and suite directory.
#[derive(Debug)]
pub struct TestReportChecker {
    runner: String,
    suite_dir: String,
    test_extension: String,
}

impl TestReportChecker {
    pub fn from_config(config: &AdvisoryConfig) -> Self {
        Self {
            runner: config.runner.clone(),
            suite_dir: config.suite_dir.trim_end_matches('/').to_string(),
            test_extension: config.test_extension.clone(),
        }
    }

    fn full_suite(&self) -> String {
        format!("{} {}/", self.runner, self.suite_dir)
    }

    /// All findings for one command and its output, in reporting order.
    pub fn check(&self, command: &str, output: &str) -> Vec<Finding> {
        let mut findings = Vec::new();

        if self.is_partial_run(command) {
            findings.push(Finding::PartialRun {
                command: command.to_string(),
                full_suite: self.full_suite(),
            });
        }

        if let Some(caps) = SUMMARY.captures(output)
            && let (Ok(total), Ok(failed)) = (caps[1].parse::<u64>(), caps[2].parse::<u64>())
        {
            if failed > 0 {
                findings.push(Finding::Failures {
                    total,
                    failed,
                    full_suite: self.full_suite(),
                });
            } else if total > 0 {
                findings.push(Finding::AllPassed { total });
            }
        }

        if command.contains(self.runner.as_str()) && output.contains("command not found") {
            findings.push(Finding::RunnerMissing {
                runner: self.runner.clone(),
            });
        }

        findings
    }

    /// A single suite file is passed to the runner and the suite directory is not.
    pub fn is_partial_run(&self, command: &str) -> bool {
        let args = self.runner_args(command);
        let single = args.iter().any(|a| self.is_single_file(a));
        let full = args.iter().any(|a| self.is_suite_dir(a));
        single && !full
    }

    /// Arguments passed to every runner invocation in `command`.
    fn runner_args(&self, command: &str) -> Vec<String> {
        let words = shlex::split(command)
            .unwrap_or_else(|| command.split_whitespace().map(String::from).collect());

        let mut args = Vec::new();
        let mut in_runner = false;
        for word in words {
            if SEPARATORS.contains(&word.as_str()) {
                in_runner = false;
            } else if basename(&word) == self.runner {
                in_runner = true;
            } else if in_runner {
                args.push(word);
            }
        }
        args
    }

    fn is_suite_dir(&self, arg: &str) -> bool {
        let arg = arg.trim_end_matches('/');
        let arg = arg.strip_prefix("./").unwrap_or(arg);
        arg == self.suite_dir || arg.ends_with(&format!("/{}", self.suite_dir))
    }

    fn is_single_file(&self, arg: &str) -> bool {
        let prefix = format!("{}/", self.suite_dir);
        let Some(pos) = arg.rfind(&prefix) else {
            return false;
        };
        // the suite path must start a path component
        if pos > 0 && !arg[..pos].ends_with('/') {
            return false;
        }
        let file = &arg[pos + prefix.len()..];
        !file.is_empty() && !file.contains('/') && file.ends_with(&self.test_extension)
    }
}

fn basename(word: &str) -> &str {
    word.rsplit('/').next().unwrap_or(word)
}

/// Entry point for the `post-tool` subcommand.
pub fn run(config: &Config) {
    let timeout = Duration::from_millis(config.settings.read_timeout_ms);
    let input = crate::hook::read_with_timeout(std::io::stdin(), timeout);

    let Some(run) = ToolRun::from_json(&input) else {
        log::debug!("post-tool: unreadable input ignored");
        return;
    };
    if run.tool_kind != config.settings.shell_tool {
        return;
    }

    let checker = TestReportChecker::from_config(&config.advisory);
    for finding in checker.check(&run.command, &run.output) {
        log::info!("post-tool advisory: {finding:?}");
        println!("{}\n", finding.render());
    }
}
