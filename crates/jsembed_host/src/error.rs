use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HostError>;

/// An exception raised by script code
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ScriptError {
    /// V8's report of the exception, e.g. `Uncaught TypeError: nope`
    pub message: String,
    pub stack: Option<String>,
}

impl ScriptError {
    pub(crate) fn from_js_error(error: &deno_core::error::JsError) -> Self {
        Self {
            message: error.exception_message.clone(),
            stack: error.stack.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum HostError {
    /// An engine operation was attempted while the host is not running
    #[error("{operation} called while the host is not initialized")]
    NotInitialized { operation: &'static str },

    #[error("Another engine is already running in this process")]
    EngineBusy,

    #[error("run_event_loop called from inside a running event loop")]
    LoopReentry,

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("No member named \"{0}\"")]
    MissingMember(String),

    #[error("\"{0}\" is not a function")]
    NotCallable(String),

    #[error("Script error: {0}")]
    Script(ScriptError),

    /// An exception nobody caught, raised while the event loop was pumped
    #[error("Uncaught error: {0}")]
    Uncaught(ScriptError),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    /// A value handle was used with an engine other than the one that made it
    #[error("Value belongs to an engine that is no longer running")]
    ForeignValue,
}

impl HostError {
    /// The script exception behind this error, if there is one
    pub fn script_error(&self) -> Option<&ScriptError> {
        match self {
            Self::Script(err) | Self::Uncaught(err) => Some(err),
            _ => None,
        }
    }
}
