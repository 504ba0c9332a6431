// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Modulwerk.
//
// `BridgeError` covers everything the bridge itself can fail at: dispatch,
// discovery, registration and configuration.  Every variant maps to a wire
// code via `BridgeError::code()`, which is what the script side sees in a
// rejected settlement.  Provider-specific failures travel as `CodedError`.

use thiserror::Error;

use crate::types::Rejection;

/// Wire codes for dispatch-layer failures.
pub mod codes {
    pub const UNDEFINED_METHOD: &str = "E_UNDEFINED_METHOD";
    pub const INVALID_ARGS_COUNT: &str = "E_INVALID_ARGS_COUNT";
    pub const ARGS_TYPES_MISMATCH: &str = "E_ARGS_TYPES_MISMATCH";
    pub const UNEXPECTED_ERROR: &str = "E_UNEXPECTED_ERROR";
    /// Fallback for errors that carry no code of their own.
    pub const UNKNOWN_ERROR: &str = "E_UNKNOWN_ERROR";
    pub const DUPLICATE_EXPORT: &str = "E_DUPLICATE_EXPORT";
    pub const INVALID_DECLARATION: &str = "E_INVALID_DECLARATION";
    pub const DUPLICATE_REGISTRATION: &str = "E_DUPLICATE_REGISTRATION";
    pub const UNDEFINED_VIEW_MANAGER: &str = "E_UNDEFINED_VIEW_MANAGER";
    pub const UNDEFINED_PROP: &str = "E_UNDEFINED_PROP";
    pub const VIEW_NOT_MOUNTED: &str = "E_VIEW_NOT_MOUNTED";
    pub const CONFIG: &str = "E_CONFIG";
    pub const IO: &str = "E_IO";
    pub const SERIALIZATION: &str = "E_SERIALIZATION";
}

/// A value could not be coerced into the parameter type a native method or
/// prop setter declared.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("expected {expected}, received {received}{}", path_suffix(.path))]
pub struct CoercionError {
    /// Declared parameter type, e.g. `int` or `array<string>`.
    pub expected: String,
    /// Dynamic type actually received, e.g. `string`.
    pub received: String,
    /// Location inside a nested array/map, empty at the top level.
    pub path: String,
}

fn path_suffix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" at {path}")
    }
}

impl CoercionError {
    pub fn new(expected: impl Into<String>, received: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            received: received.into(),
            path: String::new(),
        }
    }

    /// Prefix the error location with an array index or map key.
    pub fn nested(mut self, segment: &str) -> Self {
        self.path = if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{segment}.{}", self.path)
        };
        self
    }
}

/// Top-level error type for all bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Dispatch errors (reported to the caller as a rejected settlement) --
    #[error("no exported module named `{0}`")]
    UndefinedModule(String),

    #[error("method `{method}` of module `{module}` is undefined")]
    UndefinedMethod { module: String, method: String },

    #[error("method `{method}` expects {expected} argument(s), received {received}")]
    InvalidArgsCount {
        method: String,
        expected: usize,
        received: usize,
    },

    #[error("argument {index} of `{method}`: {source}")]
    ArgsTypesMismatch {
        method: String,
        index: usize,
        #[source]
        source: CoercionError,
    },

    #[error("unexpected error in `{context}`: {cause}")]
    Unexpected { context: String, cause: String },

    // -- Discovery / registration (build time) --
    #[error("duplicate exported {kind} `{name}` in `{owner}`")]
    DuplicateExport {
        kind: &'static str,
        owner: String,
        name: String,
    },

    #[error("invalid declaration of `{name}` in `{owner}`: {reason}")]
    InvalidDeclaration {
        owner: String,
        name: String,
        reason: String,
    },

    #[error("{kind} `{name}` is already registered")]
    DuplicateRegistration { kind: &'static str, name: String },

    // -- View dispatch --
    #[error("no view manager named `{0}`")]
    UndefinedViewManager(String),

    #[error("view manager `{manager}` has no prop `{prop}`")]
    UndefinedProp { manager: String, prop: String },

    #[error("prop `{prop}` of `{manager}`: {source}")]
    PropTypeMismatch {
        manager: String,
        prop: String,
        #[source]
        source: CoercionError,
    },

    #[error("view {0} is not mounted")]
    ViewNotMounted(String),

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// The wire code the script side sees for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UndefinedModule(_) | Self::UndefinedMethod { .. } => codes::UNDEFINED_METHOD,
            Self::InvalidArgsCount { .. } => codes::INVALID_ARGS_COUNT,
            Self::ArgsTypesMismatch { .. } | Self::PropTypeMismatch { .. } => {
                codes::ARGS_TYPES_MISMATCH
            }
            Self::Unexpected { .. } => codes::UNEXPECTED_ERROR,
            Self::DuplicateExport { .. } => codes::DUPLICATE_EXPORT,
            Self::InvalidDeclaration { .. } => codes::INVALID_DECLARATION,
            Self::DuplicateRegistration { .. } => codes::DUPLICATE_REGISTRATION,
            Self::UndefinedViewManager(_) => codes::UNDEFINED_VIEW_MANAGER,
            Self::UndefinedProp { .. } => codes::UNDEFINED_PROP,
            Self::ViewNotMounted(_) => codes::VIEW_NOT_MOUNTED,
            Self::Config(_) => codes::CONFIG,
            Self::Io(_) => codes::IO,
            Self::Serialization(_) => codes::SERIALIZATION,
        }
    }

    /// The `(code, message, cause)` triple delivered to the script side.
    pub fn to_rejection(&self) -> Rejection {
        let cause = match self {
            Self::Unexpected { cause, .. } => Some(cause.clone()),
            other => std::error::Error::source(other).map(|source| source.to_string()),
        };
        Rejection {
            code: self.code().to_string(),
            message: self.to_string(),
            cause,
        }
    }

    /// Whether this error is raised while building the registry rather than
    /// while dispatching a call.
    pub fn is_build_time(&self) -> bool {
        matches!(
            self,
            Self::DuplicateExport { .. }
                | Self::InvalidDeclaration { .. }
                | Self::DuplicateRegistration { .. }
        )
    }
}

/// A provider-defined error carrying its own wire code.
///
/// Capability providers convert their domain errors into this type (or
/// construct it directly) and hand it to `Promise::reject_with`, which passes
/// the code through unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct CodedError {
    pub code: String,
    pub message: String,
    pub cause: Option<String>,
}

impl CodedError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl std::fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
