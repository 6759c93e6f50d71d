//! Structured error types shared across matbench crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::template::TemplateError;

/// Structured payload attached to every [`MatbenchError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (settings keys, paths, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for matbench.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum MatbenchError {
    /// A single combination could not be prepared (template, `extra` override).
    #[error("validation error: {0}")]
    Validation(ErrorInfo),
    /// A benchmark could not be launched or reported a failure.
    #[error("execution error: {0}")]
    Execution(ErrorInfo),
    /// Two distinct records canonicalized to the same registry key.
    #[error("registry collision: {0}")]
    Collision(ErrorInfo),
    /// The operator interrupted a blocking execution.
    #[error("interrupted: {0}")]
    Interrupted(ErrorInfo),
    /// Filesystem failures.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Invalid or incomplete configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl MatbenchError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            MatbenchError::Validation(info)
            | MatbenchError::Execution(info)
            | MatbenchError::Collision(info)
            | MatbenchError::Interrupted(info)
            | MatbenchError::Io(info)
            | MatbenchError::Serde(info)
            | MatbenchError::Config(info) => info,
        }
    }

    /// Adds a context entry, keeping the family and code.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (MatbenchError::Validation(info)
        | MatbenchError::Execution(info)
        | MatbenchError::Collision(info)
        | MatbenchError::Interrupted(info)
        | MatbenchError::Io(info)
        | MatbenchError::Serde(info)
        | MatbenchError::Config(info)) = &mut self;
        info.context.insert(key.into(), value.into());
        self
    }

    /// Returns true when the error stems from an operator interrupt.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, MatbenchError::Interrupted(_))
    }
}

impl From<TemplateError> for MatbenchError {
    fn from(err: TemplateError) -> Self {
        let info = match &err {
            TemplateError::MissingPlaceholder { template, name } => {
                ErrorInfo::new("matbench.template.missing", err.to_string())
                    .with_context("template", template.clone())
                    .with_context("placeholder", name.clone())
            }
            TemplateError::Malformed { template, offset } => {
                ErrorInfo::new("matbench.template.malformed", err.to_string())
                    .with_context("template", template.clone())
                    .with_context("offset", offset.to_string())
            }
        };
        MatbenchError::Validation(info)
    }
}

/// Wraps a filesystem error with the offending path.
pub fn io_error(code: &str, path: &std::path::Path, err: impl ToString) -> MatbenchError {
    MatbenchError::Io(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Wraps a serialization error.
pub fn serde_error(code: &str, err: impl ToString) -> MatbenchError {
    MatbenchError::Serde(ErrorInfo::new(code, err.to_string()))
}
