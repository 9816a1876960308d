//! Operation identifiers.
//!
//! Each route in the table resolves to exactly one `Operation`. The
//! operation is the canonical route key: the dispatcher keys its handler map
//! by it, and metrics/logs label requests with its string id.

use std::fmt;

/// Canonical identifier of a gateway operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Status,
    List,
    Get,
    Install,
    Upgrade,
    Uninstall,
    History,
    Rollback,
}

impl Operation {
    /// All operations, in route-table order.
    pub const ALL: [Operation; 8] = [
        Operation::Status,
        Operation::List,
        Operation::Get,
        Operation::Install,
        Operation::Upgrade,
        Operation::Uninstall,
        Operation::History,
        Operation::Rollback,
    ];

    /// Stable string id used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Status => "status",
            Operation::List => "list",
            Operation::Get => "get",
            Operation::Install => "install",
            Operation::Upgrade => "upgrade",
            Operation::Uninstall => "uninstall",
            Operation::History => "history",
            Operation::Rollback => "rollback",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
