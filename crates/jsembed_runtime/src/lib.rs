//! # jsembed runtime
//!
//! The Deno extension installed into every embedded engine.
//!
//! ## Overview
//!
//! The extension gives scripts the small host environment an embedding
//! application expects:
//! - **Native modules**: Rust functions registered by the host, reachable as
//!   `process.binding(name)` and optionally as a global
//! - **Module loading**: `require(request)` for CommonJS and JSON files found
//!   on disk (relative paths, `node_modules`, configured search paths)
//! - **Timers**: `setTimeout`, `setInterval`, their `clear*` counterparts and
//!   `queueMicrotask`, all driven by the host's event loop passes
//! - **Console**: `console.*` forwarded to the host `log` logger under the
//!   `jsembed::console` target
//! - **Process**: `process.argv`, `process.title`, `process.exitCode` and
//!   `exit` listeners
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deno_core::{JsRuntime, RuntimeOptions};
//! use jsembed_runtime::{ModuleBuilder, ModuleRegistry, ModuleResolver, ProcessInfo, jsembed_ext};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ModuleRegistry::new();
//! let mut math = ModuleBuilder::new("math", None);
//! math.function("double", |_ctx, args| {
//!     let n = args.first().and_then(serde_json::Value::as_f64).unwrap_or_default();
//!     Ok(serde_json::json!(n * 2.0))
//! });
//! registry.register(math.build());
//!
//! let mut runtime = JsRuntime::new(RuntimeOptions {
//!     extensions: vec![jsembed_ext::init(
//!         registry,
//!         ProcessInfo::new("app", &[]),
//!         ModuleResolver::default(),
//!     )],
//!     ..Default::default()
//! });
//!
//! runtime.execute_script("<main>", "process.binding('math').double(21)")?;
//! # Ok(())
//! # }
//! ```

mod error;
mod js_error_impl;
pub mod ops;
mod registry;
mod resolver;
mod timers;

#[cfg(test)]
mod tests;

use serde::Serialize;

pub use error::{ModuleError, TimerError};
pub use registry::{
    CallContext, ModuleBuilder, ModuleDescriptor, ModuleRegistry, NativeFunction, NativeModule,
    PrivateData,
};
pub use resolver::{ModuleResolver, ModuleSource, SourceKind};
pub use timers::{MAX_TIMER_DELAY_MS, MAX_TIMER_ID, TimerTable};

/// Log target used for script console output
pub const CONSOLE_TARGET: &str = "jsembed::console";

/// Symbol key (`Symbol.for(...)`) under which `runtime.js` publishes the
/// internals the host bridge relies on
pub const INTERNALS_KEY: &str = "jsembed.internals";

/// The program name and arguments scripts see in `process.argv`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub program_name: String,
    pub args: Vec<String>,
}

impl ProcessInfo {
    pub fn new(program_name: &str, args: &[String]) -> Self {
        Self {
            program_name: program_name.to_string(),
            args: args.to_vec(),
        }
    }
}

// Deno extension providing native modules, require, timers, console and process.
// Initialize with the shared ModuleRegistry, the ProcessInfo and a ModuleResolver.
deno_core::extension!(
    jsembed_ext,
    ops = [
        ops::op_process_info,
        ops::op_module_describe,
        ops::op_module_call,
        ops::op_require_resolve,
        ops::op_require_read,
        ops::op_timer_next_id,
        ops::op_timer_sleep,
        ops::op_timer_cancel,
        ops::op_console,
    ],
    esm_entry_point = "ext:jsembed_ext/runtime.js",
    esm = [ dir "src", "runtime.js" ],
    options = {
        registry: ModuleRegistry,
        process: ProcessInfo,
        resolver: ModuleResolver,
    },
    state = |state, options| {
        state.put(options.registry);
        state.put(options.process);
        state.put(options.resolver);
        state.put(TimerTable::default());
    },
);
