//! Failures of the `glstate` binary and the exit codes they map to.
//!
//! | code | kind            | raised when                                        |
//! |------|-----------------|----------------------------------------------------|
//! | 2    | (clap)          | arguments do not parse                             |
//! | 10   | `context`       | the context layer refused or caught a misuse       |
//! | 11   | `io`            | a workload file cannot be read                     |
//! | 12   | `input`         | workload values or a pixel format name are invalid |
//! | 13   | `serialization` | a report cannot be encoded                         |

use glstate_core::ContextError;
use std::fmt;

#[derive(Debug)]
pub enum CliError {
    /// Raised by the context layer while the workload ran.
    Context(ContextError),
    Io(String),
    /// Bad workload values, a malformed workload file or an unknown preset.
    Input(String),
    Serialization(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Context(_) => 10,
            CliError::Io(_) => 11,
            CliError::Input(_) => 12,
            CliError::Serialization(_) => 13,
        }
    }

    /// Short label used in `--json` error output.
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Context(e) if e.is_usage_violation() => "context-misuse",
            CliError::Context(_) => "context",
            CliError::Io(_) => "io",
            CliError::Input(_) => "input",
            CliError::Serialization(_) => "serialization",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Context(e) => write!(f, "{e}"),
            CliError::Io(msg) | CliError::Input(msg) | CliError::Serialization(msg) => {
                f.write_str(msg)
            }
        }
    }
}

impl From<ContextError> for CliError {
    /// A bad pixel format is the user's input, not a driver failure.
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::InvalidFormat(msg) => CliError::Input(format!("pixel format: {msg}")),
            other => CliError::Context(other),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glstate_core::{ContextId, ObjectKind, SharingGroupId};

    #[test]
    fn refused_activation_exits_with_context_code() {
        let err = CliError::from(ContextError::Activation {
            context: ContextId::new(2),
            reason: "drawable lost".into(),
        });
        assert_eq!(err.exit_code(), 10);
        assert_eq!(err.kind(), "context");
        assert!(err.to_string().contains("drawable lost"));
    }

    #[test]
    fn foreign_object_is_labelled_as_misuse() {
        let err = CliError::from(ContextError::ForeignObject {
            kind: ObjectKind::Buffer,
            object_group: SharingGroupId::from(ContextId::new(1)),
            context: ContextId::new(4),
            context_group: SharingGroupId::from(ContextId::new(4)),
        });
        assert_eq!(err.exit_code(), 10);
        assert_eq!(err.kind(), "context-misuse");
    }

    #[test]
    fn unknown_preset_is_input_not_context() {
        let err = CliError::from(ContextError::InvalidFormat("unknown preset rgb565".into()));
        assert_eq!(err.exit_code(), 12);
        assert_eq!(err.kind(), "input");
        assert_eq!(err.to_string(), "pixel format: unknown preset rgb565");
    }

    #[test]
    fn unreadable_workload_file_exits_with_io_code() {
        let err = CliError::Io("workload.json: permission denied".into());
        assert_eq!((err.exit_code(), err.kind()), (11, "io"));
    }

    #[test]
    fn report_encoding_failure_exits_with_serialization_code() {
        let encode = serde_json::from_str::<serde_json::Value>("{\"threads\": ");
        let err = CliError::from(encode.unwrap_err());
        assert_eq!((err.exit_code(), err.kind()), (13, "serialization"));
    }
}
