//! cc-sessionguard: hooks that keep an agent from destroying its own session.
//!
//! Subcommands:
//!   pre-tool (default)      read a PreToolUse record, write an allow/block decision
//!   post-tool               read a PostToolUse record, print test report reminders
//!   session-start [REPO]    print a notice when upstream has new commits
//!
//! Every subcommand exits 0; results travel on stdout only.

use cc_sessionguard::{advisory, config::Config, hook, logging};

const USAGE: &str = "usage: cc-sessionguard [pre-tool | post-tool | session-start [REPO] | --version]";

fn main() {
    let mut args = std::env::args().skip(1);
    let subcommand = args.next();

    if matches!(subcommand.as_deref(), Some("--version" | "-V")) {
        println!("cc-sessionguard {}", env!("CARGO_PKG_VERSION"));
        return;
    }
    if matches!(subcommand.as_deref(), Some("--help" | "-h")) {
        println!("{USAGE}");
        return;
    }

    let config = Config::load();
    logging::init(&config.settings);

    match subcommand.as_deref() {
        None | Some("pre-tool") => hook::run(&config),
        Some("post-tool") => advisory::test_report::run(&config),
        Some("session-start") => advisory::updates::run(&config, args.next()),
        Some(other) => {
            log::warn!("unknown subcommand: {other}");
            eprintln!("cc-sessionguard: unknown subcommand `{other}`\n{USAGE}");
        }
    }
}
