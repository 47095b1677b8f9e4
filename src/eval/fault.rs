//! What the gate answers when it cannot reach a verdict normally.

use crate::catalog::CatalogError;
use crate::eval::{Block, Decision, InvocationRequest, RequestError};
use crate::render::Renderer;

/// Category reported when the catalog itself is unusable.
pub const CATALOG_UNAVAILABLE: &str = "CATALOG_UNAVAILABLE";

/// Anything that stops the gate from evaluating a request normally.
#[derive(Debug, thiserror::Error)]
pub enum Fault {
    /// The ingress record was missing, empty, or not a JSON object.
    #[error("unreadable request: {0}")]
    Ingress(#[from] RequestError),
    /// Evaluation panicked.
    #[error("evaluation failed: {0}")]
    Evaluation(String),
    /// No rule catalog could be compiled.
    #[error("rule catalog unavailable: {0}")]
    Catalog(#[from] CatalogError),
}

/// Resolution applied to a [`Fault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPolicy {
    /// Treat the fault as an explicit allow.
    FailOpen,
    /// Block shell invocations; other tools stay allowed.
    FailClosed,
}

impl Fault {
    /// Ingress and evaluation faults fail open. A missing catalog fails
    /// closed: without rules the gate would silently enforce nothing.
    pub fn policy(&self) -> FaultPolicy {
        match self {
            Fault::Ingress(_) | Fault::Evaluation(_) => FaultPolicy::FailOpen,
            Fault::Catalog(_) => FaultPolicy::FailClosed,
        }
    }

    /// Turn the fault into a decision for `request` (if one was recovered).
    pub fn resolve(
        &self,
        request: Option<&InvocationRequest>,
        shell_tool: &str,
        renderer: &Renderer,
    ) -> Decision {
        let Some(request) = request else {
            return Decision::Allow;
        };
        match (self.policy(), self) {
            (FaultPolicy::FailClosed, Fault::Catalog(error))
                if request.tool_kind == shell_tool && !request.command_text.trim().is_empty() =>
            {
                Decision::Block(Block {
                    rule_id: CATALOG_UNAVAILABLE.to_ascii_lowercase(),
                    category: CATALOG_UNAVAILABLE.into(),
                    group: None,
                    via_indirection: false,
                    message: renderer.render_unavailable(&request.command_text, error),
                })
            }
            _ => Decision::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bash(cmd: &str) -> InvocationRequest {
        InvocationRequest::new("Bash", cmd)
    }

    #[test]
    fn ingress_fault_fails_open() {
        let fault = Fault::Ingress(RequestError::Empty);
        assert_eq!(fault.policy(), FaultPolicy::FailOpen);
        assert!(
            fault
                .resolve(None, "Bash", &Renderer::default())
                .is_allowed()
        );
    }

    #[test]
    fn evaluation_fault_fails_open() {
        let fault = Fault::Evaluation("boom".into());
        assert_eq!(fault.policy(), FaultPolicy::FailOpen);
        assert!(
            fault
                .resolve(Some(&bash("rm -rf /")), "Bash", &Renderer::default())
                .is_allowed()
        );
    }

    #[test]
    fn catalog_fault_blocks_shell_commands() {
        let fault = Fault::Catalog(CatalogError::Empty);
        assert_eq!(fault.policy(), FaultPolicy::FailClosed);
        let decision = fault.resolve(Some(&bash("ls")), "Bash", &Renderer::default());
        assert_eq!(decision.category(), Some(CATALOG_UNAVAILABLE));
        assert_eq!(decision.group(), None);
        assert!(decision.message().unwrap().contains("ls"));
    }

    #[test]
    fn catalog_fault_allows_other_tools() {
        let fault = Fault::Catalog(CatalogError::Empty);
        let request = InvocationRequest::new("Read", "reboot");
        assert!(
            fault
                .resolve(Some(&request), "Bash", &Renderer::default())
                .is_allowed()
        );
    }

    #[test]
    fn catalog_fault_allows_empty_command() {
        let fault = Fault::Catalog(CatalogError::Empty);
        assert!(
            fault
                .resolve(Some(&bash("")), "Bash", &Renderer::default())
                .is_allowed()
        );
    }
}
