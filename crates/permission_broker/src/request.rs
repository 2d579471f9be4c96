//! Request and decision types exchanged with the broker.
//!
//! A [`PermissionRequest`] describes one ask from an agent; a [`Decision`] is what
//! the human answered. Both are plain values that serialize to the same shape a
//! UI front-end or an IPC peer would see.
//!
//! # Examples
//!
//! ```
//! use permission_broker::request::{Decision, OperationKind, PermissionRequest, Scope};
//!
//! let request = PermissionRequest::new("agent-7", OperationKind::Delete, "/tmp/build")
//!     .with_reason("Clean stale build output")
//!     .with_requester_name("Build Agent");
//!
//! assert_eq!(request.operation.as_str(), "delete_file");
//! assert_eq!(Decision::deny(), Decision { allowed: false, scope: Scope::Once });
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of filesystem operation a requester wants to perform
///
/// The known kinds form a closed set; anything else is carried verbatim in
/// [`OperationKind::Other`] so an unfamiliar operation never fails to parse.
///
/// # Examples
///
/// ```
/// use permission_broker::request::OperationKind;
///
/// let op: OperationKind = serde_json::from_str(r#""delete_file""#).unwrap();
/// assert_eq!(op, OperationKind::Delete);
///
/// let op: OperationKind = serde_json::from_str(r#""chmod""#).unwrap();
/// assert_eq!(op, OperationKind::Other("chmod".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OperationKind {
    /// Read a file's contents
    Read,
    /// Write or overwrite a file
    Write,
    /// List a directory
    List,
    /// Delete a file
    Delete,
    /// Create a directory
    CreateDirectory,
    /// Execute a command
    Execute,
    /// Any operation outside the known set
    Other(String),
}

impl OperationKind {
    /// Wire name of the operation (e.g. `"write_file"`)
    pub fn as_str(&self) -> &str {
        match self {
            OperationKind::Read => "read_file",
            OperationKind::Write => "write_file",
            OperationKind::List => "list_directory",
            OperationKind::Delete => "delete_file",
            OperationKind::CreateDirectory => "create_directory",
            OperationKind::Execute => "execute_command",
            OperationKind::Other(name) => name,
        }
    }
}

impl From<String> for OperationKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "read_file" => OperationKind::Read,
            "write_file" => OperationKind::Write,
            "list_directory" => OperationKind::List,
            "delete_file" => OperationKind::Delete,
            "create_directory" => OperationKind::CreateDirectory,
            "execute_command" => OperationKind::Execute,
            _ => OperationKind::Other(name),
        }
    }
}

impl From<&str> for OperationKind {
    fn from(name: &str) -> Self {
        OperationKind::from(name.to_string())
    }
}

impl From<OperationKind> for String {
    fn from(op: OperationKind) -> Self {
        match op {
            OperationKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ask from an agent, as presented to the human
///
/// Requests are never mutated once handed to the broker. Two requests with
/// identical fields are still two separate asks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    /// Operation the requester wants to perform
    pub operation: OperationKind,
    /// Target resource, treated as an opaque string
    pub path: String,
    /// Human-readable justification supplied by the requester
    #[serde(default)]
    pub reason: String,
    /// Stable identifier of the calling agent
    pub requester_id: String,
    /// Display name of the calling agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_name: Option<String>,
}

impl PermissionRequest {
    /// Create a request with an empty reason and no display name
    pub fn new(
        requester_id: impl Into<String>,
        operation: impl Into<OperationKind>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            path: path.into(),
            reason: String::new(),
            requester_id: requester_id.into(),
            requester_name: None,
        }
    }

    /// Set the justification shown to the human
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the requester's display name
    pub fn with_requester_name(mut self, name: impl Into<String>) -> Self {
        self.requester_name = Some(name.into());
        self
    }

    /// Name to show for the requester, falling back to its id
    pub fn requester_display(&self) -> &str {
        self.requester_name.as_deref().unwrap_or(&self.requester_id)
    }
}

/// Lifetime of a grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// This invocation only
    Once,
    /// Persisted by the grant authority for the rest of the session
    Session,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Once => write!(f, "once"),
            Scope::Session => write!(f, "session"),
        }
    }
}

/// The human's answer to a request
///
/// `scope` is always present; it is [`Scope::Once`] whenever `allowed` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the operation may proceed
    pub allowed: bool,
    /// How long the approval lasts
    pub scope: Scope,
}

impl Decision {
    /// Denied. Also the outcome of a dismissal.
    pub const fn deny() -> Self {
        Self {
            allowed: false,
            scope: Scope::Once,
        }
    }

    /// Allowed for this invocation only
    pub const fn allow_once() -> Self {
        Self {
            allowed: true,
            scope: Scope::Once,
        }
    }

    /// Allowed and persisted for the session
    pub const fn allow_session() -> Self {
        Self {
            allowed: true,
            scope: Scope::Session,
        }
    }

    /// Build a decision, normalizing the scope of a denial to `once`
    pub const fn new(allowed: bool, scope: Scope) -> Self {
        if allowed {
            Self { allowed, scope }
        } else {
            Self::deny()
        }
    }

    /// True when the grant authority must be told about this decision
    pub const fn is_session_grant(&self) -> bool {
        self.allowed && matches!(self.scope, Scope::Session)
    }
}
