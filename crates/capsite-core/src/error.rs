//! Error taxonomy for feeder modeling
//!
//! [`CapsiteError`] separates the failures that abort a model build:
//! configuration problems in the input data or settings, formulation
//! problems found while wiring the model together, and solver set-up
//! failures. Solver *outcomes* such as infeasibility are not errors; they
//! travel as a status alongside the result.
//!
//! Configuration and formulation errors carry the entity that caused them
//! (`"bus 7"`, `"branch 12"`, `"config"`) so the offending record can be
//! found in the input tables.

use thiserror::Error;

/// Unified error type for capacitor placement operations.
#[derive(Error, Debug)]
pub enum CapsiteError {
    /// I/O errors (reading case tables, writing results)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid input data or settings (slack count, radiality, negative costs, ...)
    #[error("Configuration error at {entity}: {message}")]
    Config { entity: String, message: String },

    /// Inconsistent references discovered while building the model
    #[error("Formulation error at {entity}: {message}")]
    Formulation { entity: String, message: String },

    /// Backend could not be set up or invoked
    #[error("Solver error: {0}")]
    Solver(String),
}

impl CapsiteError {
    pub fn config(entity: impl Into<String>, message: impl Into<String>) -> Self {
        CapsiteError::Config {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn formulation(entity: impl Into<String>, message: impl Into<String>) -> Self {
        CapsiteError::Formulation {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Entity reference for configuration and formulation errors
    pub fn entity(&self) -> Option<&str> {
        match self {
            CapsiteError::Config { entity, .. } | CapsiteError::Formulation { entity, .. } => {
                Some(entity)
            }
            _ => None,
        }
    }
}

/// Convenience type alias for Results using CapsiteError.
pub type CapsiteResult<T> = Result<T, CapsiteError>;

impl From<anyhow::Error> for CapsiteError {
    fn from(err: anyhow::Error) -> Self {
        CapsiteError::Solver(err.to_string())
    }
}

impl From<serde_json::Error> for CapsiteError {
    fn from(err: serde_json::Error) -> Self {
        CapsiteError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display_names_entity() {
        let err = CapsiteError::config("bus 7", "second slack bus");
        let text = err.to_string();
        assert!(text.contains("Configuration error"));
        assert!(text.contains("bus 7"));
        assert!(text.contains("second slack bus"));
        assert_eq!(err.entity(), Some("bus 7"));
    }

    #[test]
    fn test_formulation_error_entity() {
        let err = CapsiteError::formulation("branch 3", "unknown to-bus 99");
        assert!(matches!(err, CapsiteError::Formulation { .. }));
        assert_eq!(err.entity(), Some("branch 3"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "bus.csv");
        let err: CapsiteError = io_err.into();
        assert!(matches!(err, CapsiteError::Io(_)));
        assert_eq!(err.entity(), None);
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> CapsiteResult<()> {
            Err(CapsiteError::Solver("clarabel settings".into()))
        }

        fn outer() -> CapsiteResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
