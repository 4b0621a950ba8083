//! # jsembed host
//!
//! Embeds a JavaScript engine in a native application and drives it from the
//! host's own thread.
//!
//! - **Lifecycle**: [`Host::initialize`] starts the engine,
//!   [`Host::deinitialize`] drains pending work and tears it down. One engine
//!   may run per process; a host can be initialized again after teardown.
//! - **Event loop**: [`Host::process_events`] runs one pass over queued work,
//!   [`Host::run_event_loop`] repeats passes and calls a host tick in between
//!   until [`Host::stop_event_loop`] is observed.
//! - **Interop**: evaluate source or script files, read members, call script
//!   functions, register native modules and load script modules by name.
//!
//! Every fallible operation returns a [`Result`] whose error tells failures
//! apart; a script value of `undefined` is a successful result.
//!
//! ```rust,no_run
//! use jsembed_host::Host;
//! use serde_json::json;
//!
//! # fn example() -> Result<(), jsembed_host::HostError> {
//! let mut host = Host::new();
//! host.initialize("app", &[])?;
//!
//! host.register_module(
//!     "math",
//!     |module| {
//!         module.function("add", |_ctx, args| {
//!             let sum: f64 = args.iter().filter_map(serde_json::Value::as_f64).sum();
//!             Ok(json!(sum))
//!         });
//!     },
//!     None,
//!     Some("math"),
//! )?;
//!
//! let answer = host.evaluate("math.add(40, 2)")?;
//! assert_eq!(host.to_json(&answer)?, json!(42));
//!
//! let mut ticks = 0;
//! host.evaluate("setTimeout(() => {}, 5)")?;
//! host.run_event_loop(|host| {
//!     ticks += 1;
//!     if ticks == 10 {
//!         host.stop_event_loop();
//!     }
//! })?;
//!
//! assert_eq!(host.deinitialize(), 0);
//! # Ok(())
//! # }
//! ```

mod bindings;
mod engine;
mod error;
mod event_loop;
mod host;
mod value;

pub use bindings::GlobalBindings;
pub use engine::{Engine, engine_active};
pub use error::{HostError, Result, ScriptError};
pub use event_loop::{EventLoopState, StopHandle};
pub use host::Host;
pub use value::{JsObject, JsValue, ValueKind};

pub use jsembed_runtime::{
    CONSOLE_TARGET, CallContext, ModuleBuilder, ModuleError, NativeFunction, PrivateData,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests;
