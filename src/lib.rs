//! cc-sessionguard: a PreToolUse hook that stops an agent from killing its own session.
//!
//! Shell commands are matched against an ordered catalog of dangerous
//! operation patterns (container lifecycle, power control, process kills,
//! destructive filesystem operations, permission destruction, resource
//! exhaustion). The first matching rule blocks the command with an
//! explanation; everything else is allowed.
//!
//! # Architecture
//!
//! - **[`catalog`]** — Rule catalog: compiled, ordered, immutable rules.
//! - **[`eval`]** — Request normalization, the policy engine, decisions and fault policy.
//! - **[`render`]** — Block message rendering.
//! - **[`hook`]** — stdin/stdout transport with a bounded read.
//! - **[`advisory`]** — PostToolUse test report and SessionStart update notices.
//! - **[`config`]** — Configuration loading: embedded defaults + user overlay merge.
//! - **[`logging`]** — File logging to `~/.local/share/cc-sessionguard/guard.log`.

/// Informational hooks: test report checker and upstream update notifier.
pub mod advisory;
/// Rule catalog types and compilation.
pub mod catalog;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Evaluation engine: requests, decisions, fault handling.
pub mod eval;
/// Hook transport: bounded stdin read, JSON egress.
pub mod hook;
/// File-based logging.
pub mod logging;
/// Block message rendering.
pub mod render;

use eval::{Decision, InvocationRequest, PolicyEngine};

/// Build the engine from the default config and evaluate one invocation.
///
/// This is the main entry point for tests and simple usage.
/// Long-lived callers should build a [`PolicyEngine`] once and reuse it.
pub fn evaluate(tool_kind: &str, command: &str) -> Decision {
    let config = config::Config::default_config();
    let engine = PolicyEngine::from_config(&config).expect("embedded default catalog must compile");
    engine.evaluate(&InvocationRequest::new(tool_kind, command))
}

/// Run a raw hook payload through the default gate, faults included.
pub fn gate_json(raw: &str) -> Decision {
    hook::gate(raw, &config::Config::default_config()).1
}
