use crate::engine::Engine;
use crate::error::{HostError, Result};
use crate::event_loop::{EventLoopState, StopHandle};
use crate::value::{JsObject, JsValue, ValueKind};
use jsembed_config::Config;
use jsembed_runtime::{ModuleBuilder, NativeFunction, PrivateData};
use log::{debug, error, info, trace, warn};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Embeds a script engine and drives it from the host thread.
///
/// A `Host` is either uninitialized or running an [`Engine`]. Every
/// operation that needs the engine fails with
/// [`HostError::NotInitialized`] while there is none. The engine cannot
/// leave the thread that initialized it, so `Host` is neither `Send` nor
/// `Sync`; use a [`StopHandle`] to reach a running event loop from elsewhere.
///
/// Dropping a running host deinitializes it.
#[derive(Debug)]
pub struct Host {
    config: Config,
    engine: Option<Engine>,
    event_loop: EventLoopState,
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

impl Host {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            engine: None,
            event_loop: EventLoopState::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // lifecycle

    /// Starts the engine. Scripts see `program_name` and `args` as
    /// `process.argv`. Initializing a running host does nothing.
    ///
    /// # Errors
    ///
    /// Returns `EngineBusy` if another host in this process is running an
    /// engine, or `Engine` if the engine could not be set up
    pub fn initialize(&mut self, program_name: &str, args: &[String]) -> Result<()> {
        if self.engine.is_some() {
            warn!("initialize called on a running host, ignoring");
            return Ok(());
        }

        let engine = Engine::new(&self.config, program_name, args)
            .inspect_err(|e| error!("Failed to initialize engine: {e}"))?;
        info!("Engine {} started for {program_name}", engine.id());
        self.engine = Some(engine);
        Ok(())
    }

    /// Stops the event loop, drains pending work, fires the script's `exit`
    /// listeners and tears the engine down.
    ///
    /// Returns 0 on a clean shutdown, the script's `process.exitCode` if it
    /// set a non-zero one, and 1 if draining or the `exit` listeners failed.
    /// Deinitializing a host that is not running returns 0.
    pub fn deinitialize(&mut self) -> i32 {
        self.event_loop.request_stop();
        let Some(mut engine) = self.engine.take() else {
            return 0;
        };

        let id = engine.id();
        let status = engine.shutdown(self.config.shutdown.drain_timeout());
        drop(engine);
        info!("Engine {id} stopped with status {status}");
        status
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// The running engine, `None` unless the host is initialized
    pub fn engine(&self) -> Option<&Engine> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut Engine> {
        self.engine.as_mut()
    }

    fn engine_for(&mut self, operation: &'static str) -> Result<&mut Engine> {
        self.engine.as_mut().ok_or_else(|| {
            error!("{operation} called while the host is not initialized");
            HostError::NotInitialized { operation }
        })
    }

    // ------------------------------------------------------------------
    // event loop

    /// Runs one pass over already queued work (expired timers, completed
    /// async operations and their microtasks) without waiting.
    ///
    /// Returns whether work is still pending afterwards.
    ///
    /// # Errors
    ///
    /// Returns `Uncaught` if a callback run by the pass threw and nothing
    /// caught it
    pub fn process_events(&mut self) -> Result<bool> {
        self.engine_for("process_events")?.pump_once()
    }

    /// Drives the event loop until [`Host::stop_event_loop`] (or a
    /// [`StopHandle`]) is observed, calling `tick` once after every pass.
    ///
    /// A pass waits at most `event_loop.tick_interval_ms` for pending work.
    /// When nothing is pending the loop sleeps `event_loop.idle_sleep_ms`
    /// between ticks. The loop also ends when `tick` deinitializes the host.
    ///
    /// # Errors
    ///
    /// Returns `LoopReentry` when called from inside a tick, and the engine's
    /// error when a pass fails; the loop has stopped in both cases
    pub fn run_event_loop<F>(&mut self, mut tick: F) -> Result<()>
    where
        F: FnMut(&mut Host),
    {
        self.engine_for("run_event_loop")?;
        if self.event_loop.is_running() {
            error!("run_event_loop called from inside a running event loop");
            return Err(HostError::LoopReentry);
        }

        self.event_loop.begin();
        debug!("Event loop started");
        let result = self.drive_event_loop(&mut tick);
        self.event_loop.finish();

        match &result {
            Ok(()) => debug!("Event loop stopped"),
            Err(err) => error!("Event loop failed: {err}"),
        }
        result
    }

    fn drive_event_loop(&mut self, tick: &mut dyn FnMut(&mut Host)) -> Result<()> {
        let tick_interval = self.config.event_loop.tick_interval();
        let idle_sleep = self.config.event_loop.idle_sleep();

        loop {
            if self.event_loop.take_stop() {
                return Ok(());
            }
            let Some(engine) = self.engine.as_mut() else {
                return Ok(());
            };

            let pending = engine.pump_for(tick_interval)?;
            trace!("Event loop pass finished, pending work: {pending}");
            tick(self);

            if !pending && !self.event_loop.is_stop_requested() && !idle_sleep.is_zero() {
                std::thread::sleep(idle_sleep);
            }
        }
    }

    /// Asks a running event loop to stop at its next iteration boundary.
    /// Has no effect when no loop is running.
    pub fn stop_event_loop(&self) {
        if self.event_loop.request_stop() {
            debug!("Event loop stop requested");
        }
    }

    pub fn event_loop_is_running(&self) -> bool {
        self.event_loop.is_running()
    }

    /// A handle that can stop the event loop from another thread
    pub fn stop_handle(&self) -> StopHandle {
        self.event_loop.stop_handle()
    }

    // ------------------------------------------------------------------
    // interop

    /// Compiles and runs `source` as a classic script and returns its
    /// completion value. Callbacks the script queues run only when the
    /// event loop is pumped.
    ///
    /// # Errors
    ///
    /// Returns `Script` for syntax errors and uncaught exceptions; the engine
    /// stays usable
    pub fn evaluate(&mut self, source: &str) -> Result<JsValue> {
        self.engine_for("evaluate")?
            .execute("<eval>".to_string(), source.to_string())
            .inspect_err(|e| debug!("Evaluation failed: {e}"))
    }

    /// Loads the script at `path` and runs it like [`Host::evaluate`].
    ///
    /// While it runs, `require` resolves relative to the script's
    /// directory and `__filename`/`__dirname` describe it. These globals keep
    /// pointing at the script after it succeeds, so its callbacks can still
    /// `require`; a script that fails gets the previous values restored.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as `evaluate`
    pub fn run(&mut self, path: impl AsRef<Path>) -> Result<JsValue> {
        let path = path.as_ref();
        let engine = self.engine_for("run")?;

        let source = std::fs::read_to_string(path).map_err(|source| {
            warn!("Failed to read script {}: {source}", path.display());
            HostError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let filename = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let dirname = filename
            .parent()
            .map(|dir| dir.display().to_string())
            .unwrap_or_default();
        let filename = filename.display().to_string();

        engine.enter_script(&filename, &dirname)?;
        engine.execute(filename, source).inspect_err(|e| {
            debug!("Script {} failed: {e}", path.display());
            if let Err(restore) = engine.leave_script() {
                warn!("Failed to restore script globals: {restore}");
            }
        })
    }

    /// The global object of the engine's main context
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the host is not running
    pub fn root_object(&mut self) -> Result<JsObject> {
        self.engine_for("root_object")?.root().map(JsObject::new)
    }

    /// Reads the member `name` of `object`
    ///
    /// # Errors
    ///
    /// Returns `MissingMember` if `object` has no such member and `Script`
    /// if reading it threw
    pub fn get_value(&mut self, object: &JsObject, name: &str) -> Result<JsValue> {
        self.engine_for("get_value")?
            .get_value(object.as_value(), name)
    }

    /// Calls the method `name` of `object` with `object` as receiver
    ///
    /// # Errors
    ///
    /// Returns `MissingMember` if there is no such member, `NotCallable` if
    /// it is not a function and `Script` if the call threw
    pub fn call(&mut self, object: &JsObject, name: &str, args: &[JsValue]) -> Result<JsValue> {
        self.engine_for("call")?
            .call_member(object.as_value(), name, args)
            .inspect_err(|e| debug!("Call to {name} failed: {e}"))
    }

    /// Calls `function` with `receiver` as `this`
    ///
    /// # Errors
    ///
    /// Returns `NotCallable` if `function` is not a function and `Script` if
    /// the call threw
    pub fn call_function(
        &mut self,
        receiver: &JsValue,
        function: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue> {
        self.engine_for("call_function")?
            .call_function(receiver, function, args)
            .inspect_err(|e| debug!("Function call failed: {e}"))
    }

    /// Registers a native module built by `init`.
    ///
    /// Scripts reach the module as `process.binding(name)`. When `target` is
    /// given the module is also bound to `globalThis[target]` right away.
    /// Registering a name again replaces the module.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the host is not running, or `Script` if
    /// binding the global threw
    pub fn register_module<F>(
        &mut self,
        name: &str,
        init: F,
        private: Option<PrivateData>,
        target: Option<&str>,
    ) -> Result<()>
    where
        F: FnOnce(&mut ModuleBuilder),
    {
        let engine = self.engine_for("register_module")?;
        let mut builder = ModuleBuilder::new(name, private);
        init(&mut builder);
        engine.register(builder.build(), target)
    }

    /// Registers a native module made of the given functions
    ///
    /// # Errors
    ///
    /// As [`Host::register_module`]
    pub fn register_module_functions<I>(
        &mut self,
        name: &str,
        functions: I,
        target: Option<&str>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (String, NativeFunction)>,
    {
        self.register_module(
            name,
            |builder| {
                for (function_name, function) in functions {
                    builder.insert_function(function_name, function);
                }
            },
            None,
            target,
        )
    }

    /// Loads a module the way a top-level `require(name)` would and returns
    /// its exports
    ///
    /// # Errors
    ///
    /// Returns `ModuleNotFound` if nothing on the search path matches,
    /// `Script` if loading threw and `Conversion` if the module does not
    /// export an object
    pub fn include_module(&mut self, name: &str) -> Result<JsObject> {
        let exports = self
            .engine_for("include_module")?
            .include(name)
            .inspect_err(|e| match e {
                HostError::ModuleNotFound(_) => warn!("Module \"{name}\" not found"),
                _ => debug!("Loading module \"{name}\" failed: {e}"),
            })?;
        self.as_object(exports)
    }

    // ------------------------------------------------------------------
    // values

    /// Converts a script value to JSON
    ///
    /// # Errors
    ///
    /// Returns `Conversion` if the value has no JSON form
    pub fn to_json(&mut self, value: &JsValue) -> Result<serde_json::Value> {
        self.deserialize(value)
    }

    /// Creates a script value from JSON
    ///
    /// # Errors
    ///
    /// Returns `NotInitialized` if the host is not running
    pub fn from_json(&mut self, value: &serde_json::Value) -> Result<JsValue> {
        self.engine_for("from_json")?.serialize(value)
    }

    /// Deserializes a script value into any `serde` type
    ///
    /// # Errors
    ///
    /// Returns `Conversion` if the value does not fit `T`
    pub fn deserialize<T: DeserializeOwned>(&mut self, value: &JsValue) -> Result<T> {
        self.engine_for("deserialize")?.deserialize(value)
    }

    pub fn kind_of(&mut self, value: &JsValue) -> Result<ValueKind> {
        self.engine_for("kind_of")?.kind_of(value)
    }

    /// Narrows a value to an object
    ///
    /// # Errors
    ///
    /// Returns `Conversion` if the value is a primitive
    pub fn as_object(&mut self, value: JsValue) -> Result<JsObject> {
        let kind = self.kind_of(&value)?;
        if kind.is_object() {
            Ok(JsObject::new(value))
        } else {
            Err(HostError::Conversion(format!("Expected an object, found {kind:?}")))
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        if self.engine.is_some() {
            let status = self.deinitialize();
            debug!("Host dropped while running, engine stopped with status {status}");
        }
    }
}
