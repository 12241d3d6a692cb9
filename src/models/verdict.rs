//! Outcome of validating a product group.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a validation issue is.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Required input missing; the group is not packaged.
    Error,
    /// Reported but the group still proceeds.
    Warning,
}

/// One human-readable validation finding.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

impl Issue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Pass/fail decision plus every issue found, in evaluation order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct ValidationVerdict {
    pub issues: Vec<Issue>,
}

impl ValidationVerdict {
    /// True unless a hard failure was recorded.
    pub fn passed(&self) -> bool {
        !self.issues.iter().any(Issue::is_error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|issue| !issue.is_error())
    }

    /// Issue messages in evaluation order.
    pub fn messages(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.message.as_str()).collect()
    }

    pub(crate) fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }
}
