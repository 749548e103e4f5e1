//! Error types for the epidemic replica simulator.
//!
//! Every error explains what went wrong, why, and how to fix it. Errors are
//! organized by category and carry stable machine-readable codes.
//!
//! # Error Code Ranges
//!
//! | Range | Category                                  |
//! |-------|--------------------------------------------|
//! | E1xxx | Configuration / boundary                   |
//! | E2xxx | Protocol (fatal programming errors, §7.1)  |

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidValue,
    ConfigParseError,
    ConfigNotFound,
    SnapshotParseFailed,
    WorkloadParseFailed,
    UnknownOperationKind,
    UnknownMessageKind,
    UnknownDestinationReplica,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigInvalidValue => "E1001",
            Self::ConfigParseError => "E1002",
            Self::ConfigNotFound => "E1003",
            Self::SnapshotParseFailed => "E1004",
            Self::WorkloadParseFailed => "E1005",
            Self::UnknownOperationKind => "E2001",
            Self::UnknownMessageKind => "E2002",
            Self::UnknownDestinationReplica => "E2003",
        }
    }

    /// Short human-facing summary.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigInvalidValue => "Invalid scenario configuration value",
            Self::ConfigParseError => "Scenario configuration parse error",
            Self::ConfigNotFound => "Scenario configuration file not found",
            Self::SnapshotParseFailed => "Initial snapshot parse failed",
            Self::WorkloadParseFailed => "Workload parse failed",
            Self::UnknownOperationKind => "Unknown operation kind",
            Self::UnknownMessageKind => "Unknown message kind",
            Self::UnknownDestinationReplica => "Unknown destination replica",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Top-level error type for all epidemic-core and epidemic-sim operations.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// Configuration loading or validation failures (boundary error, §7 category 5).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Snapshot/workload file parsing failures (boundary error, §7 category 5).
    #[error(transparent)]
    Io(#[from] IoError),

    /// Fatal programming errors per §7 category 1: corrupt workload or
    /// mismatched algorithm, never recovered.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ScenarioError {
    /// Machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(e) => e.error_code(),
            Self::Io(e) => e.error_code(),
            Self::Protocol(e) => e.error_code(),
        }
    }

    /// Human-readable suggestion for how to fix the error.
    #[must_use]
    pub fn suggestion(&self) -> String {
        match self {
            Self::Config(e) => e.suggestion(),
            Self::Io(e) => e.suggestion(),
            Self::Protocol(e) => e.suggestion(),
        }
    }

    /// Structured error payload for JSON output.
    #[must_use]
    pub fn to_json_error(&self) -> JsonError {
        JsonError {
            error_code: self.error_code().to_string(),
            message: self.to_string(),
            suggestion: self.suggestion(),
        }
    }
}

/// JSON-serializable error payload for `--format json` output.
#[derive(Debug, Clone, Serialize)]
pub struct JsonError {
    pub error_code: String,
    pub message: String,
    pub suggestion: String,
}

/// Errors related to scenario configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "Error: Config file not found at {path}\nCause: The path does not exist\nFix: Pass an existing TOML config with --config, or omit the flag to use defaults."
    )]
    NotFound { path: PathBuf },

    #[error(
        "Error: Invalid config value for '{key}': '{value}'\nCause: {reason}\nFix: Edit the config file and correct the value for '{key}'."
    )]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error(
        "Error: Failed to parse config file at {path}\nCause: {reason}\nFix: Fix the TOML syntax and retry."
    )]
    ParseFailed { path: PathBuf, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => ErrorCode::ConfigNotFound.code(),
            Self::InvalidValue { .. } => ErrorCode::ConfigInvalidValue.code(),
            Self::ParseFailed { .. } => ErrorCode::ConfigParseError.code(),
        }
    }

    #[must_use]
    pub fn suggestion(&self) -> String {
        match self {
            Self::NotFound { .. } => {
                "Pass an existing TOML config with --config, or omit the flag to use defaults."
                    .into()
            }
            Self::InvalidValue { key, .. } => {
                format!("Edit the config file and correct the value for '{key}'.")
            }
            Self::ParseFailed { .. } => "Fix the TOML syntax in the config file and retry.".into(),
        }
    }
}

/// Errors related to loading the external snapshot/workload artifacts (§6).
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error(
        "Error: Failed to parse initial snapshot at {path}\nCause: {reason}\nFix: Check that the file is a JSON object mapping key to Record."
    )]
    SnapshotParseFailed { path: PathBuf, reason: String },

    #[error(
        "Error: Failed to parse workload at {path}:{line}\nCause: {reason}\nFix: Check that each non-empty line is a JSON-encoded Operation."
    )]
    WorkloadParseFailed {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Error: I/O error at {path}\nCause: {reason}\nFix: Check that the path exists and is accessible.")]
    Generic { path: PathBuf, reason: String },
}

impl IoError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SnapshotParseFailed { .. } => ErrorCode::SnapshotParseFailed.code(),
            Self::WorkloadParseFailed { .. } => ErrorCode::WorkloadParseFailed.code(),
            Self::Generic { .. } => ErrorCode::WorkloadParseFailed.code(),
        }
    }

    #[must_use]
    pub fn suggestion(&self) -> String {
        match self {
            Self::SnapshotParseFailed { .. } => {
                "Check that the file is a JSON object mapping key to Record.".into()
            }
            Self::WorkloadParseFailed { .. } => {
                "Check that each non-empty line is a JSON-encoded Operation.".into()
            }
            Self::Generic { .. } => "Check that the path exists and is accessible.".into(),
        }
    }
}

/// Fatal programming errors per §7 category 1: a corrupt workload or a
/// mismatched algorithm. These abort the run rather than being tolerated.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(
        "Error: Unknown operation kind '{kind}' for op {op_id}\nCause: Operation.op must be SET or DEL\nFix: Check the workload generator for a corrupt or mismatched schema version."
    )]
    UnknownOperationKind { op_id: String, kind: String },

    #[error(
        "Error: Unknown message kind '{kind}'\nCause: The receiving algorithm does not declare a handler for this message shape\nFix: Check that sender and receiver are running the same dissemination algorithm."
    )]
    UnknownMessageKind { kind: String },

    #[error(
        "Error: Destination replica '{replica_id}' does not exist\nCause: A message or injected operation referenced a replica id outside the configured replica set\nFix: Check that `replicas` in the config matches the ids used in the workload."
    )]
    UnknownDestinationReplica { replica_id: String },
}

impl ProtocolError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownOperationKind { .. } => ErrorCode::UnknownOperationKind.code(),
            Self::UnknownMessageKind { .. } => ErrorCode::UnknownMessageKind.code(),
            Self::UnknownDestinationReplica { .. } => ErrorCode::UnknownDestinationReplica.code(),
        }
    }

    #[must_use]
    pub fn suggestion(&self) -> String {
        match self {
            Self::UnknownOperationKind { .. } => {
                "Check the workload generator for a corrupt or mismatched schema version.".into()
            }
            Self::UnknownMessageKind { .. } => {
                "Check that sender and receiver are running the same dissemination algorithm."
                    .into()
            }
            Self::UnknownDestinationReplica { .. } => {
                "Check that `replicas` in the config matches the ids used in the workload.".into()
            }
        }
    }
}
