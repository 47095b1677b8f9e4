//! PreToolUse transport: stdin → decision → stdout.
//!
//! The process always exits 0. Decisions travel only in the JSON written to
//! stdout, so a crashing gate is never mistaken for a block.

use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::Duration;

use serde::Serialize;

use crate::catalog::{CatalogError, RuleCatalog};
use crate::config::Config;
use crate::eval::{Decision, Fault, InvocationRequest, PolicyEngine, compile_markers};
use crate::render::Renderer;

/// Egress record written to the hosting runtime.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HookOutput {
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&Decision> for HookOutput {
    fn from(decision: &Decision) -> Self {
        Self {
            allow: decision.is_allowed(),
            message: decision.message().map(str::to_owned),
        }
    }
}

impl HookOutput {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"allow":true}"#.into())
    }
}

/// Read all of `reader` on a helper thread, giving up after `timeout`.
///
/// A timeout or read error yields whatever was not received: an empty
/// string, which the gate treats as "no request" and allows.
pub fn read_with_timeout<R>(mut reader: R, timeout: Duration) -> String
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = String::new();
        let result = reader.read_to_string(&mut buf).map(|_| buf);
        let _ = tx.send(result);
    });
    match rx.recv_timeout(timeout) {
        Ok(Ok(input)) => input,
        Ok(Err(e)) => {
            log::warn!("failed to read hook input: {e}");
            String::new()
        }
        Err(_) => {
            log::warn!("no hook input within {}ms", timeout.as_millis());
            String::new()
        }
    }
}

/// Build the engine from `config`.
///
/// When the merged rules or markers do not compile, the built-in ones take
/// their place. The shell tool, protected containers and renderer settings
/// still come from `config`.
pub fn build_engine(config: &Config) -> Result<PolicyEngine, CatalogError> {
    PolicyEngine::from_config(config).or_else(|e| -> Result<PolicyEngine, CatalogError> {
        log::error!("configured rule catalog rejected ({e}); using built-in rules");
        let builtin = Config::default_config();
        let catalog = RuleCatalog::compile(
            builtin.version,
            &builtin.rules,
            &config.containers.protected,
        )?;
        let markers = compile_markers(&config.indirection.markers).or_else(|e| {
            log::error!("{e}; using built-in indirection markers");
            compile_markers(&builtin.indirection.markers)
        })?;
        Ok(PolicyEngine::new(
            catalog,
            config.settings.shell_tool.clone(),
            markers,
            Renderer::from_config(config),
        ))
    })
}

/// Run the whole pipeline on one raw payload, resolving every fault.
pub fn gate(raw: &str, config: &Config) -> (Option<InvocationRequest>, Decision) {
    let request = match InvocationRequest::from_json(raw) {
        Ok(request) => request,
        Err(e) => {
            let fault = Fault::from(e);
            log::warn!("{fault}; allowing");
            let decision = fault.resolve(None, &config.settings.shell_tool, &Renderer::default());
            return (None, decision);
        }
    };

    let engine = match build_engine(config) {
        Ok(engine) => engine,
        Err(e) => {
            let fault = Fault::from(e);
            log::error!("{fault}");
            let decision = fault.resolve(
                Some(&request),
                &config.settings.shell_tool,
                &Renderer::from_config(config),
            );
            return (Some(request), decision);
        }
    };

    let decision = evaluate_guarded(&engine, &request);
    (Some(request), decision)
}

/// Evaluate, converting a panic into a fail-open decision.
pub fn evaluate_guarded(engine: &PolicyEngine, request: &InvocationRequest) -> Decision {
    match panic::catch_unwind(AssertUnwindSafe(|| engine.evaluate(request))) {
        Ok(decision) => decision,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            let fault = Fault::Evaluation(detail);
            log::error!("{fault}; allowing");
            fault.resolve(Some(request), engine.shell_tool(), engine.renderer())
        }
    }
}

/// Entry point for the `pre-tool` subcommand.
pub fn run(config: &Config) {
    let timeout = Duration::from_millis(config.settings.read_timeout_ms);
    let input = read_with_timeout(std::io::stdin(), timeout);

    let (request, decision) = gate(&input, config);
    if let Some(ref request) = request {
        crate::logging::log_decision(request, &decision, &config.settings.shell_tool);
    }

    println!("{}", HookOutput::from(&decision).to_json());
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stalled;

    impl Read for Stalled {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_secs(5));
            Ok(0)
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("pipe closed"))
        }
    }

    fn decide(raw: &str) -> Decision {
        gate(raw, &Config::default_config()).1
    }

    #[test]
    fn reads_complete_input() {
        let reader = std::io::Cursor::new(b"{\"a\":1}".to_vec());
        let input = read_with_timeout(reader, Duration::from_secs(1));
        assert_eq!(input, "{\"a\":1}");
    }

    #[test]
    fn stalled_input_times_out_empty() {
        let input = read_with_timeout(Stalled, Duration::from_millis(20));
        assert_eq!(input, "");
    }

    #[test]
    fn read_error_is_empty() {
        assert_eq!(read_with_timeout(Broken, Duration::from_secs(1)), "");
    }

    #[test]
    fn empty_input_allows() {
        assert!(decide("").is_allowed());
    }

    #[test]
    fn malformed_input_allows() {
        assert!(decide("{\"tool_name\": \"Bash\", ").is_allowed());
        assert!(decide("not json at all").is_allowed());
        assert!(decide("\"just a string\"").is_allowed());
    }

    #[test]
    fn blocks_through_full_pipeline() {
        let d = decide(r#"{"tool_name":"Bash","tool_input":{"command":"rm -rf /"}}"#);
        assert_eq!(d.category(), Some("DESTRUCTIVE_DELETE"));
    }

    #[test]
    fn output_for_allow_has_no_message() {
        assert_eq!(HookOutput::from(&Decision::Allow).to_json(), r#"{"allow":true}"#);
    }

    #[test]
    fn output_for_block_carries_message() {
        let d = decide(r#"{"tool":"Bash","input":{"command":"reboot"}}"#);
        let json: serde_json::Value =
            serde_json::from_str(&HookOutput::from(&d).to_json()).unwrap();
        assert_eq!(json["allow"], false);
        assert!(json["message"].as_str().unwrap().contains("SYSTEM_REBOOT"));
    }

    #[test]
    fn broken_overlay_falls_back_to_defaults() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [[rules]]
            id = "broken"
            group = "system-power"
            category = "X"
            pattern = "(unclosed"
            reason = "r"
            suggestion = "s"
        "#,
        );
        let (_, d) = gate(
            r#"{"tool_name":"Bash","tool_input":{"command":"halt"}}"#,
            &config,
        );
        assert_eq!(d.rule_id(), Some("halt"));
    }

    #[test]
    fn broken_overlay_keeps_user_settings() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [settings]
            shell_tool = "shell"

            [containers]
            replace = true
            protected = ["db"]

            [[rules]]
            id = "broken"
            group = "system-power"
            category = "X"
            pattern = "(unclosed"
            reason = "r"
            suggestion = "s"
        "#,
        );
        let shell = |cmd: &str| {
            let raw = serde_json::json!({"tool_name": "shell", "tool_input": {"command": cmd}});
            gate(&raw.to_string(), &config).1
        };
        assert_eq!(shell("reboot").rule_id(), Some("reboot"));
        assert_eq!(shell("docker stop db").rule_id(), Some("docker-protected"));
        assert!(shell("docker stop vai").is_allowed());

        let (_, bash) = gate(
            r#"{"tool_name":"Bash","tool_input":{"command":"reboot"}}"#,
            &config,
        );
        assert!(bash.is_allowed());
    }

    #[test]
    fn broken_marker_falls_back_to_builtin_markers() {
        let mut config = Config::default_config();
        config.apply_overlay_str(
            r#"
            [indirection]
            replace = true
            markers = ["(unclosed"]
        "#,
        );
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.shell_tool(), "Bash");
        assert!(engine.is_indirect("ssh host reboot"));
    }

    #[test]
    fn guarded_evaluation_matches_plain() {
        let engine = PolicyEngine::from_config(&Config::default_config()).unwrap();
        let req = InvocationRequest::new("Bash", "kill -9 1234");
        assert_eq!(evaluate_guarded(&engine, &req), engine.evaluate(&req));
    }
}
