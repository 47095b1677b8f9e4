use crate::catalog::Group;

/// Outcome of evaluating one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Block(Block),
}

/// Details of a blocked invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Id of the rule that fired.
    pub rule_id: String,
    /// Human-facing category label, e.g. `CONTAINER_DESTRUCTION`.
    pub category: String,
    /// `None` when the block did not come from a catalog rule.
    pub group: Option<Group>,
    /// The command was wrapped in a remote shell.
    pub via_indirection: bool,
    /// Fully rendered explanation.
    pub message: String,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn block(&self) -> Option<&Block> {
        match self {
            Decision::Allow => None,
            Decision::Block(block) => Some(block),
        }
    }

    pub fn category(&self) -> Option<&str> {
        self.block().map(|b| b.category.as_str())
    }

    pub fn group(&self) -> Option<Group> {
        self.block().and_then(|b| b.group)
    }

    pub fn rule_id(&self) -> Option<&str> {
        self.block().map(|b| b.rule_id.as_str())
    }

    pub fn message(&self) -> Option<&str> {
        self.block().map(|b| b.message.as_str())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Block(_) => "BLOCK",
        }
    }
}
