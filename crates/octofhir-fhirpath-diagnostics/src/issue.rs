//! Supplemental evaluation issues
//!
//! Issues convey additional information about an evaluation to the client
//! without failing it, e.g. a code that is not a member of a preferred-binding
//! value set. They accumulate on the evaluation context and are rendered into
//! operation outcomes by the surrounding system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Issue severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// The expression result should not be trusted
    Error,
    /// Potential problem, evaluation continued
    Warning,
    /// Informational note
    Information,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Information => write!(f, "information"),
        }
    }
}

/// A supplemental issue raised during evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Severity level
    pub severity: Severity,
    /// Issue type code (FHIR issue-type vocabulary, e.g. "code-invalid")
    pub code: String,
    /// Human-readable description
    pub description: String,
    /// Expression or path the issue applies to
    pub expression: Option<String>,
}

impl Issue {
    /// Create a new issue
    pub fn new(
        severity: Severity,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            description: description.into(),
            expression: None,
        }
    }

    /// Create a warning issue
    pub fn warning(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, description)
    }

    /// Create an information issue
    pub fn information(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Information, code, description)
    }

    /// Set the expression this issue applies to
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.description)?;
        if let Some(expr) = &self.expression {
            write!(f, " at {expr}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_expression_when_set() {
        let issue = Issue::warning("code-invalid", "Code 'x' is not in value set")
            .with_expression("Patient.maritalStatus");
        assert_eq!(
            issue.to_string(),
            "warning: code-invalid - Code 'x' is not in value set at Patient.maritalStatus"
        );
    }
}
