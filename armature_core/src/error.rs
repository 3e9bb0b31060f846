//! Unified error handling for ARMATURE
//!
//! This module provides a centralized error type for the controller manager
//! core, ensuring consistent error handling across all components.
//!
//! Errors on the real-time path are never propagated as `Result`s across the
//! cycle boundary. They are logged and translated into deactivation requests
//! by the update scheduler; the variants below are what the non-real-time
//! API surfaces to callers.

use thiserror::Error;

/// Main error type for controller manager operations
#[derive(Debug, Error)]
pub enum ArmatureError {
    /// No controller with the requested name is loaded
    #[error("Controller not found: {0}")]
    NotFound(String),

    /// Lifecycle precondition not met (e.g. configure from active)
    #[error("Invalid lifecycle state: {0}")]
    InvalidState(String),

    /// A required command or state interface is not present or not available
    #[error("Interface unavailable: {0}")]
    InterfaceUnavailable(String),

    /// Claim collision during activation, or chain invariant violated
    #[error("Resource conflict: {0}")]
    Conflict(String),

    /// The hardware layer rejected a command mode switch
    #[error("Hardware rejected mode switch: {0}")]
    HardwareRejected(String),

    /// A controller switch was not applied within its timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Controller code failed or panicked inside a lifecycle hook
    #[error("Controller '{controller}' error: {message}")]
    Controller { controller: String, message: String },

    /// Configuration validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation not supported on this platform
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Internal errors with source location for debugging.
    /// Use the `armature_internal!()` macro to create these — it captures
    /// file/line automatically.
    #[error("Internal error: {message} (at {file}:{line})")]
    Internal {
        message: String,
        file: &'static str,
        line: u32,
    },
}

/// Create an internal error with automatic file/line capture.
///
/// ```rust,ignore
/// use armature_core::armature_internal;
/// return Err(armature_internal!("request list not empty: {:?}", list));
/// ```
#[macro_export]
macro_rules! armature_internal {
    ($($arg:tt)*) => {
        $crate::error::ArmatureError::Internal {
            message: format!($($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Convenience type alias for Results using ArmatureError
pub type ArmatureResult<T> = std::result::Result<T, ArmatureError>;

/// Short alias — `Result<T>` is equivalent to `ArmatureResult<T>`
pub type Result<T> = ArmatureResult<T>;

// NOTE: From<String> and From<&str> intentionally absent.
// Use specific variants so callers can match on the failure kind.

// Helper methods
impl ArmatureError {
    /// Create a not-found error for a controller name
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        ArmatureError::NotFound(name.into())
    }

    /// Create an invalid-state error with a custom message
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        ArmatureError::InvalidState(msg.into())
    }

    /// Create an interface-unavailable error
    pub fn interface_unavailable<S: Into<String>>(msg: S) -> Self {
        ArmatureError::InterfaceUnavailable(msg.into())
    }

    /// Create a conflict error
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        ArmatureError::Conflict(msg.into())
    }

    /// Create a controller error with controller name and message
    pub fn controller<S: Into<String>, T: Into<String>>(controller: S, message: T) -> Self {
        ArmatureError::Controller {
            controller: controller.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        ArmatureError::Config(msg.into())
    }

    /// Create an internal error (without file/line — prefer armature_internal!)
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        ArmatureError::Internal {
            message: msg.into(),
            file: "unknown",
            line: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_kind() {
        let err = ArmatureError::not_found("pos_controller");
        assert_eq!(err.to_string(), "Controller not found: pos_controller");

        let err = ArmatureError::conflict("joint1/effort already claimed");
        assert!(err.to_string().starts_with("Resource conflict"));
    }

    #[test]
    fn test_internal_macro_captures_location() {
        let err = armature_internal!("state {} is wrong", 42);
        match err {
            ArmatureError::Internal { message, file, line } => {
                assert_eq!(message, "state 42 is wrong");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            other => panic!("expected Internal, got {:?}", other),
        }
    }

    #[test]
    fn test_controller_error_carries_name() {
        let err = ArmatureError::controller("pid", "update panicked");
        assert_eq!(err.to_string(), "Controller 'pid' error: update panicked");
    }
}
