//! Per-operation presentation table.

use serde::Serialize;
use std::fmt;

use crate::request::OperationKind;

/// How risky an operation is to approve
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    /// Reads state only
    Low,
    /// Changes state, recoverably
    Medium,
    /// Destroys data, runs arbitrary code, or is not understood
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}

/// Display affordance for one operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Affordance {
    /// Icon name, in the lucide naming scheme
    pub icon: &'static str,
    /// Short heading, e.g. "Delete file"
    pub label: &'static str,
    /// Verb phrase completing "<requester> wants to ..."
    pub verb: &'static str,
    /// Risk tier used to style the prompt
    pub risk: RiskTier,
}

const UNKNOWN: Affordance = Affordance {
    icon: "help-circle",
    label: "Unknown operation",
    verb: "perform an unrecognized operation on",
    risk: RiskTier::High,
};

/// Classify an operation for display
///
/// Total over every [`OperationKind`]; anything outside the known set gets the
/// high-risk "unknown operation" affordance.
///
/// # Examples
///
/// ```
/// use permission_broker::request::OperationKind;
/// use permission_broker::surface::{classify, RiskTier};
///
/// assert_eq!(classify(&OperationKind::Delete).risk, RiskTier::High);
/// assert_eq!(classify(&OperationKind::Other("chmod".into())).label, "Unknown operation");
/// ```
pub fn classify(operation: &OperationKind) -> Affordance {
    match operation {
        OperationKind::Read => Affordance {
            icon: "file-text",
            label: "Read file",
            verb: "read",
            risk: RiskTier::Low,
        },
        OperationKind::List => Affordance {
            icon: "folder-open",
            label: "List directory",
            verb: "list the contents of",
            risk: RiskTier::Low,
        },
        OperationKind::Write => Affordance {
            icon: "file-edit",
            label: "Write file",
            verb: "write to",
            risk: RiskTier::Medium,
        },
        OperationKind::CreateDirectory => Affordance {
            icon: "folder-plus",
            label: "Create directory",
            verb: "create the directory",
            risk: RiskTier::Medium,
        },
        OperationKind::Delete => Affordance {
            icon: "trash",
            label: "Delete file",
            verb: "delete",
            risk: RiskTier::High,
        },
        OperationKind::Execute => Affordance {
            icon: "terminal",
            label: "Execute command",
            verb: "execute",
            risk: RiskTier::High,
        },
        OperationKind::Other(_) => UNKNOWN,
    }
}
