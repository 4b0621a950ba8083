//! Error types for the jsembed runtime extension

/// Error raised by native module lookups and native function calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModuleError {
    /// No native module registered under this name
    #[error("No such native module: {0}")]
    NotFound(String),
    /// The module exists but does not export the function
    #[error("Native module \"{module}\" has no function \"{function}\"")]
    FunctionNotFound { module: String, function: String },
    /// The native function reported a failure
    #[error("{0}")]
    Failed(String),
    /// A module file was found but could not be read
    #[error("Cannot read module {path}: {message}")]
    Read { path: String, message: String },
}

impl ModuleError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Error raised by the timer ops
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    #[error("Timers are not accepted while the engine is shutting down")]
    Closed,
    #[error("Timer {0} is already pending")]
    Duplicate(u32),
}

crate::impl_js_error_class!(ModuleError, |err| match err {
    ModuleError::FunctionNotFound { .. } => "TypeError",
    _ => "Error",
});
crate::impl_js_error_class!(TimerError);
