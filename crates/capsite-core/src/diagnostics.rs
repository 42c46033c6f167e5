//! Issue collection for feeder data checks.
//!
//! Validation walks every table and records what it finds instead of
//! stopping at the first problem, so a `validate` run can report the whole
//! picture at once. Model construction then refuses to proceed if any
//! issue has [`Severity::Error`].
//!
//! ```
//! use capsite_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("profile", "multiplier above 1.0", "period 19");
//! diag.add_error("impedance", "negative resistance", "branch 4");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! assert!(diag.to_result().is_err());
//! ```

use crate::error::{CapsiteError, CapsiteResult};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Legal but suspicious data; the model is still built
    Warning,
    /// Data the model cannot be built from
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping (e.g. "slack", "topology", "profile", "cost")
    pub category: String,
    pub message: String,
    /// Entity reference (e.g. "bus 14", "branch 3", "capacitor 2")
    pub entity: String,
}

impl DiagnosticIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
        entity: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: entity.into(),
        }
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(
            f,
            "[{}:{}] {} ({})",
            severity, self.category, self.message, self.entity
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, category: &str, message: impl Into<String>, entity: &str) {
        self.issues.push(DiagnosticIssue::new(
            Severity::Warning,
            category,
            message,
            entity,
        ));
    }

    pub fn add_error(&mut self, category: &str, message: impl Into<String>, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message, entity));
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// First error as a configuration error; `Ok(())` when only warnings were recorded.
    pub fn to_result(&self) -> CapsiteResult<()> {
        match self.errors().next() {
            Some(issue) => Err(CapsiteError::config(
                issue.entity.clone(),
                issue.message.clone(),
            )),
            None => Ok(()),
        }
    }

    /// One-line summary, e.g. "2 errors, 1 warning"
    pub fn summary(&self) -> String {
        let errors = self.error_count();
        let warnings = self.warning_count();
        format!(
            "{} error{}, {} warning{}",
            errors,
            if errors == 1 { "" } else { "s" },
            warnings,
            if warnings == 1 { "" } else { "s" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_summary() {
        let mut diag = Diagnostics::new();
        diag.add_warning("load", "bus has load but no type", "bus 5");
        diag.add_warning("profile", "multiplier above 1.0", "period 3");
        diag.add_error("slack", "no slack bus", "network");

        assert_eq!(diag.warning_count(), 2);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.has_errors());
        assert_eq!(diag.summary(), "1 error, 2 warnings");
    }

    #[test]
    fn test_to_result_uses_first_error_entity() {
        let mut diag = Diagnostics::new();
        diag.add_warning("impedance", "zero impedance", "branch 1");
        diag.add_error("cost", "negative capacitor cost", "capacitor 2");
        diag.add_error("cost", "negative loss price", "config");

        let err = diag.to_result().unwrap_err();
        assert_eq!(err.entity(), Some("capacitor 2"));
    }

    #[test]
    fn test_warnings_only_is_ok() {
        let mut diag = Diagnostics::new();
        diag.add_warning("catalog", "no capacitor options", "network");
        assert!(diag.to_result().is_ok());
    }

    #[test]
    fn test_display_and_serialize() {
        let issue = DiagnosticIssue::new(Severity::Error, "topology", "loop", "branch 9");
        assert_eq!(issue.to_string(), "[error:topology] loop (branch 9)");

        let mut diag = Diagnostics::new();
        diag.add(issue);
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"severity\":\"error\""));
    }
}
