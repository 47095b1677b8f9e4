use std::path::PathBuf;

use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};

use crate::catalog::Group;
use crate::config::Settings;
use crate::eval::{Decision, InvocationRequest};

/// Environment variable overriding `settings.log_level`.
pub const LOG_ENV: &str = "CC_SESSIONGUARD_LOG";

const LOG_DIR: &str = "~/.local/share/cc-sessionguard";

/// Characters of the command kept in a log line.
const LOG_COMMAND_BUDGET: usize = 200;

/// Install a file logger appending to ~/.local/share/cc-sessionguard/guard.log.
/// Best-effort: on any failure no logger is installed and `log` macros are no-ops.
pub fn init(settings: &Settings) {
    let level = resolve_level(std::env::var(LOG_ENV).ok().as_deref(), &settings.log_level);
    if level == LevelFilter::Off {
        return;
    }
    let Some(path) = log_path() else {
        return;
    };
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
    else {
        return;
    };
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Off)
        .build();
    let _ = WriteLogger::init(level, config, file);
}

/// Level from the environment override, else the configured name, else `info`.
fn resolve_level(env: Option<&str>, configured: &str) -> LevelFilter {
    env.and_then(|v| v.trim().parse().ok())
        .or_else(|| configured.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

fn log_path() -> Option<PathBuf> {
    let dir = shellexpand::tilde(LOG_DIR);
    if dir.starts_with('~') {
        return None;
    }
    Some(PathBuf::from(dir.as_ref()).join("guard.log"))
}

/// Record one decision. Shell invocations log at info, others at debug.
pub fn log_decision(request: &InvocationRequest, decision: &Decision, shell_tool: &str) {
    // Compact single-line command for the log
    let cmd: String = request
        .command_text
        .chars()
        .take(LOG_COMMAND_BUDGET)
        .collect::<String>()
        .replace('\n', "; ");

    match decision {
        Decision::Block(block) => log::info!(
            "{}\t{}\t{}\t{}\tindirect={}\t{cmd}",
            decision.label(),
            block.category,
            block.group.map_or("-", Group::as_str),
            block.rule_id,
            block.via_indirection,
        ),
        Decision::Allow if request.tool_kind == shell_tool => {
            log::info!("{}\t{cmd}", decision.label())
        }
        Decision::Allow => log::debug!("{}\ttool={}", decision.label(), request.tool_kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_configured_level() {
        assert_eq!(resolve_level(Some("debug"), "warn"), LevelFilter::Debug);
    }

    #[test]
    fn configured_level_used_without_env() {
        assert_eq!(resolve_level(None, "warn"), LevelFilter::Warn);
        assert_eq!(resolve_level(None, "OFF"), LevelFilter::Off);
    }

    #[test]
    fn invalid_levels_fall_back_to_info() {
        assert_eq!(resolve_level(Some("loud"), "verbose"), LevelFilter::Info);
    }

    #[test]
    fn invalid_env_uses_configured() {
        assert_eq!(resolve_level(Some("loud"), "error"), LevelFilter::Error);
    }
}
