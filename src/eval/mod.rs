pub mod decision;
pub mod fault;
pub mod request;

pub use decision::{Block, Decision};
pub use fault::{CATALOG_UNAVAILABLE, Fault, FaultPolicy};
pub use request::{InvocationRequest, RequestError};

use regex::Regex;

use crate::catalog::{CatalogError, RuleCatalog, case_insensitive};
use crate::config::Config;
use crate::render::Renderer;

/// Evaluates invocations against an immutable rule catalog.
///
/// Holds no mutable state: `evaluate` is a pure function of the request and
/// the catalog, and the engine can be shared across threads as-is.
#[derive(Debug)]
pub struct PolicyEngine {
    catalog: RuleCatalog,
    shell_tool: String,
    indirection: Vec<Regex>,
    renderer: Renderer,
}

impl PolicyEngine {
    pub fn new(
        catalog: RuleCatalog,
        shell_tool: impl Into<String>,
        indirection: Vec<Regex>,
        renderer: Renderer,
    ) -> Self {
        Self {
            catalog,
            shell_tool: shell_tool.into(),
            indirection,
            renderer,
        }
    }

    /// Build the engine from configuration: compile the catalog and the
    /// indirection markers.
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        let catalog = RuleCatalog::from_config(config)?;
        let indirection = compile_markers(&config.indirection.markers)?;
        log::debug!(
            "rule catalog v{} compiled: {} rules",
            catalog.version(),
            catalog.rules().len()
        );
        Ok(Self::new(
            catalog,
            config.settings.shell_tool.clone(),
            indirection,
            Renderer::from_config(config),
        ))
    }

    pub fn shell_tool(&self) -> &str {
        &self.shell_tool
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Whether the command is wrapped in a remote shell.
    ///
    /// Reported alongside a block; never changes the decision.
    pub fn is_indirect(&self, command: &str) -> bool {
        self.indirection.iter().any(|re| re.is_match(command))
    }

    /// Evaluate one invocation.
    ///
    /// 1. Non-shell tools → allow, without touching the catalog
    /// 2. Empty command → allow
    /// 3. First rule (catalog order) matching anywhere in the text → block
    /// 4. No match → allow
    pub fn evaluate(&self, request: &InvocationRequest) -> Decision {
        if request.tool_kind != self.shell_tool {
            return Decision::Allow;
        }

        let command = request.command_text.as_str();
        if command.trim().is_empty() {
            return Decision::Allow;
        }

        let Some(rule) = self.catalog.first_match(command) else {
            return Decision::Allow;
        };

        let via_indirection = self.is_indirect(command);
        Decision::Block(Block {
            rule_id: rule.id.clone(),
            category: rule.category.clone(),
            group: Some(rule.group),
            via_indirection,
            message: self.renderer.render(rule, command, via_indirection),
        })
    }
}

/// Compile indirection markers with the catalog's regex options.
pub(crate) fn compile_markers(markers: &[String]) -> Result<Vec<Regex>, CatalogError> {
    markers
        .iter()
        .map(|m| {
            case_insensitive(m).map_err(|source| CatalogError::InvalidMarker {
                marker: m.clone(),
                source,
            })
        })
        .collect()
}
