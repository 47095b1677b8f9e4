use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog::Group;

/// Embedded default configuration, including the default rule catalog.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Environment variable naming an alternative user overlay file.
pub const CONFIG_ENV: &str = "CC_SESSIONGUARD_CONFIG";

/// Default location of the user overlay.
const OVERLAY_PATH: &str = "~/.config/cc-sessionguard/config.toml";

// ── Final (merged) config types ──

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Catalog format version. Bumped when rule semantics change.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub containers: ContainerConfig,
    #[serde(default)]
    pub indirection: IndirectionConfig,
    /// Lines appended to every block message under "INCIDENT HISTORY".
    #[serde(default)]
    pub incidents: Vec<String>,
    /// The ordered rule catalog. Order is precedence.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub advisory: AdvisoryConfig,
    #[serde(default)]
    pub updates: UpdateConfig,
}

fn default_version() -> u32 {
    1
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Tool name of the shell-execution capability. Other tools are never evaluated.
    pub shell_tool: String,
    /// Maximum number of characters of the command echoed in a block message.
    pub display_budget: usize,
    /// How long to wait for the hook payload on stdin.
    pub read_timeout_ms: u64,
    /// `log` level filter name (`off`, `error`, `warn`, `info`, `debug`, `trace`).
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell_tool: "Bash".into(),
            display_budget: crate::render::DEFAULT_DISPLAY_BUDGET,
            read_timeout_ms: 1000,
            log_level: "info".into(),
        }
    }
}

/// Containers whose lifecycle is session-critical.
///
/// Spliced into rule patterns through the `{protected}` placeholder.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct ContainerConfig {
    #[serde(default)]
    pub protected: Vec<String>,
}

/// Patterns that reveal a command wrapped in a remote shell.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct IndirectionConfig {
    #[serde(default)]
    pub markers: Vec<String>,
}

/// One declarative rule as written in TOML.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RuleConfig {
    pub id: String,
    pub group: Group,
    pub category: String,
    pub pattern: String,
    pub reason: String,
    pub suggestion: String,
}

/// Settings for the post-execution test report advisory.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    /// Test runner executable whose output is inspected.
    pub runner: String,
    /// Directory holding the suite that must be run as a whole.
    pub suite_dir: String,
    /// Extension of individual test files in the suite.
    pub test_extension: String,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            runner: "bats".into(),
            suite_dir: "tests/smoke".into(),
            test_extension: ".bats".into(),
        }
    }
}

/// Settings for the session-start upstream update notifier.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Repository to check. Empty disables the notifier unless a path is given on the command line.
    pub repo_path: String,
    pub remote: String,
    pub branch: String,
    /// Number of commit subjects shown in the notice.
    pub preview: usize,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            repo_path: String::new(),
            remote: "upstream".into(),
            branch: "main".into(),
            preview: 3,
        }
    }
}

// ── Overlay types (user config that merges with defaults) ──

#[derive(Debug, Deserialize, Default)]
struct ConfigOverlay {
    #[serde(default)]
    settings: SettingsOverlay,
    #[serde(default)]
    containers: ContainersOverlay,
    #[serde(default)]
    indirection: IndirectionOverlay,
    incidents: Option<Vec<String>>,
    #[serde(default)]
    catalog: CatalogOverlay,
    #[serde(default)]
    rules: Vec<RuleConfig>,
    #[serde(default)]
    advisory: AdvisoryOverlay,
    #[serde(default)]
    updates: UpdatesOverlay,
}

#[derive(Debug, Deserialize, Default)]
struct SettingsOverlay {
    shell_tool: Option<String>,
    display_budget: Option<usize>,
    read_timeout_ms: Option<u64>,
    log_level: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ContainersOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    protected: Vec<String>,
    #[serde(default)]
    remove_protected: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct IndirectionOverlay {
    #[serde(default)]
    replace: bool,
    #[serde(default)]
    markers: Vec<String>,
    #[serde(default)]
    remove_markers: Vec<String>,
}

/// Controls how overlay `[[rules]]` combine with the default catalog.
#[derive(Debug, Deserialize, Default)]
struct CatalogOverlay {
    /// Drop every default rule; the overlay's rules become the catalog.
    #[serde(default)]
    replace: bool,
    /// Default rule ids to drop.
    #[serde(default)]
    remove: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AdvisoryOverlay {
    runner: Option<String>,
    suite_dir: Option<String>,
    test_extension: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct UpdatesOverlay {
    repo_path: Option<String>,
    remote: Option<String>,
    branch: Option<String>,
    preview: Option<usize>,
}

// ── Merge logic ──

/// Merge a user list into a default list.
/// In replace mode: user list replaces default entirely.
/// In merge mode: remove items first, then extend with additions (deduped).
fn merge_list(base: &mut Vec<String>, add: Vec<String>, remove: &[String], replace: bool) {
    if replace {
        *base = add;
    } else {
        base.retain(|item| !remove.contains(item));
        for item in add {
            if !base.contains(&item) {
                base.push(item);
            }
        }
    }
}

/// Merge overlay rules into the catalog.
///
/// A rule whose id already exists replaces it in place and keeps its
/// precedence; new ids are appended after the defaults.
fn merge_rules(base: &mut Vec<RuleConfig>, add: Vec<RuleConfig>, catalog: &CatalogOverlay) {
    if catalog.replace {
        *base = add;
        return;
    }
    base.retain(|rule| !catalog.remove.contains(&rule.id));
    for rule in add {
        match base.iter_mut().find(|existing| existing.id == rule.id) {
            Some(existing) => *existing = rule,
            None => base.push(rule),
        }
    }
}

fn set_if<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Start with embedded defaults
    /// 2. Merge the user overlay (`$CC_SESSIONGUARD_CONFIG`, else
    ///    `~/.config/cc-sessionguard/config.toml`) if it exists
    ///
    /// Lists extend, scalars override. Set `replace = true` in a section to
    /// replace its defaults entirely; use `remove_<field>` lists (or
    /// `[catalog] remove` for rules) to subtract specific defaults.
    pub fn load() -> Self {
        let mut config = Self::default_config();
        if let Some(overlay) = Self::load_overlay() {
            config.apply_overlay(overlay);
        }
        config
    }

    /// Path of the user overlay file, if one can be resolved.
    pub fn overlay_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        let expanded = shellexpand::tilde(OVERLAY_PATH);
        // No home directory: tilde stays unexpanded
        if expanded.starts_with('~') {
            return None;
        }
        Some(PathBuf::from(expanded.as_ref()))
    }

    fn load_overlay() -> Option<ConfigOverlay> {
        let path = Self::overlay_path()?;
        let content = std::fs::read_to_string(path).ok()?;
        match toml::from_str(&content) {
            Ok(overlay) => Some(overlay),
            Err(e) => {
                eprintln!("cc-sessionguard: config parse error: {e}");
                None
            }
        }
    }

    /// Apply an overlay on top of this config (merge semantics).
    fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        let s = overlay.settings;
        set_if(&mut self.settings.shell_tool, s.shell_tool);
        set_if(&mut self.settings.display_budget, s.display_budget);
        set_if(&mut self.settings.read_timeout_ms, s.read_timeout_ms);
        set_if(&mut self.settings.log_level, s.log_level);

        let c = overlay.containers;
        merge_list(
            &mut self.containers.protected,
            c.protected,
            &c.remove_protected,
            c.replace,
        );

        let i = overlay.indirection;
        merge_list(
            &mut self.indirection.markers,
            i.markers,
            &i.remove_markers,
            i.replace,
        );

        set_if(&mut self.incidents, overlay.incidents);

        merge_rules(&mut self.rules, overlay.rules, &overlay.catalog);

        let a = overlay.advisory;
        set_if(&mut self.advisory.runner, a.runner);
        set_if(&mut self.advisory.suite_dir, a.suite_dir);
        set_if(&mut self.advisory.test_extension, a.test_extension);

        let u = overlay.updates;
        set_if(&mut self.updates.repo_path, u.repo_path);
        set_if(&mut self.updates.remote, u.remote);
        set_if(&mut self.updates.branch, u.branch);
        set_if(&mut self.updates.preview, u.preview);
    }

    /// Apply an overlay from a TOML string.
    #[cfg(test)]
    pub(crate) fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}
