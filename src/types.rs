//! Shared types used across the codebase

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Abstract operation kinds an access decision is requested for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// Map an HTTP method to the operation it implies. Methods that never
    /// touch a record (HEAD, OPTIONS, ...) have no operation kind.
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Operation::Read),
            Method::POST => Some(Operation::Create),
            Method::PUT | Method::PATCH => Some(Operation::Update),
            Method::DELETE => Some(Operation::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
