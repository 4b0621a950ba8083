use crate::bindings::GlobalBindings;
use crate::error::{HostError, Result, ScriptError};
use crate::value::{JsValue, ValueKind};
use deno_core::{FastString, JsRuntime, PollEventLoopOptions, RuntimeOptions, serde_v8, v8};
use jsembed_config::Config;
use jsembed_runtime::{
    ModuleRegistry, ModuleResolver, NativeModule, ProcessInfo, TimerTable, jsembed_ext,
};
use log::{debug, error, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::poll_fn;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::Poll;
use std::time::Duration;

const BRIDGE_SOURCE: &str = include_str!("bridge.js");

static ENGINE_LEASE: AtomicBool = AtomicBool::new(false);
static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Whether an engine is currently alive anywhere in this process
pub fn engine_active() -> bool {
    ENGINE_LEASE.load(Ordering::Acquire)
}

/// Claim on the one engine a process may run at a time
struct EngineLease;

impl EngineLease {
    fn acquire() -> Result<Self> {
        ENGINE_LEASE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self)
            .map_err(|_| HostError::EngineBusy)
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        ENGINE_LEASE.store(false, Ordering::Release);
    }
}

// Order matches the array returned by bridge.js
#[derive(Debug, Clone, Copy)]
enum BridgeFn {
    Root,
    GetValue,
    CallMember,
    CallFunction,
    KindOf,
    BindGlobal,
    Include,
    EnterScript,
    LeaveScript,
    Shutdown,
}

const BRIDGE_FUNCTIONS: u32 = 10;

const STATUS_OK: u32 = 0;
const STATUS_MISSING: u32 = 1;
const STATUS_NOT_CALLABLE: u32 = 2;
const STATUS_THROWN: u32 = 3;
const STATUS_NOT_FOUND: u32 = 4;

/// Result of one bridge call
enum Outcome {
    Value(v8::Global<v8::Value>),
    Missing,
    NotCallable,
    Thrown(ScriptError),
    NotFound,
}

enum Arg<'a> {
    Value(&'a JsValue),
    Str(&'a str),
    List(&'a [JsValue]),
}

/// The live engine: one `JsRuntime` (isolate and main context), the tokio
/// executor its async ops run on, and the native modules registered with it.
///
/// At most one engine exists per process at a time. It is created by
/// [`Host::initialize`](crate::Host::initialize) and dropped by
/// [`Host::deinitialize`](crate::Host::deinitialize).
pub struct Engine {
    id: u64,
    bridge: Vec<v8::Global<v8::Function>>,
    runtime: JsRuntime,
    executor: tokio::runtime::Runtime,
    registry: ModuleRegistry,
    bindings: GlobalBindings,
    _lease: EngineLease,
}

impl Engine {
    pub(crate) fn new(config: &Config, program_name: &str, args: &[String]) -> Result<Self> {
        let lease = EngineLease::acquire()?;

        let executor = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| HostError::Engine(format!("Failed to start the async executor: {e}")))?;

        let registry = ModuleRegistry::new();
        let resolver = ModuleResolver::new(
            config
                .module_paths
                .iter()
                .map(|path| path.clone().into_std_path_buf())
                .collect(),
        );
        let create_params = config
            .engine
            .max_heap_bytes()
            .map(|max| v8::CreateParams::default().heap_limits(0, max));

        let mut runtime = {
            let _guard = executor.enter();
            JsRuntime::new(RuntimeOptions {
                extensions: vec![jsembed_ext::init(
                    registry.clone(),
                    ProcessInfo::new(program_name, args),
                    resolver,
                )],
                create_params,
                ..Default::default()
            })
        };
        let bridge = install_bridge(&mut runtime)?;

        Ok(Self {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            bridge,
            runtime,
            executor,
            registry,
            bindings: GlobalBindings::default(),
            _lease: lease,
        })
    }

    /// Identifies this engine among all engines the process has started
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn global_bindings(&self) -> &GlobalBindings {
        &self.bindings
    }

    /// Direct access to the underlying `JsRuntime`.
    ///
    /// Use with caution: work scheduled through it bypasses the host's
    /// bookkeeping, and async ops need the engine's executor to be entered.
    pub fn js_runtime(&self) -> &JsRuntime {
        &self.runtime
    }

    /// Mutable variant of [`Engine::js_runtime`]
    pub fn js_runtime_mut(&mut self) -> &mut JsRuntime {
        &mut self.runtime
    }

    /// Compiles and runs a classic script
    pub(crate) fn execute(&mut self, name: String, source: String) -> Result<JsValue> {
        let _guard = self.executor.enter();
        let id = self.id;
        self.runtime
            .execute_script(FastString::from(name), source)
            .map(|global| JsValue::new(global, id))
            .map_err(|err| HostError::Script(ScriptError::from_js_error(&err)))
    }

    /// One non-blocking pass over work that is already queued, returns
    /// whether work is still pending afterwards
    pub(crate) fn pump_once(&mut self) -> Result<bool> {
        let runtime = &mut self.runtime;
        self.executor
            .block_on(async {
                // Let the executor fire expired timers before polling
                tokio::task::yield_now().await;
                poll_fn(|cx| match runtime.poll_event_loop(cx, PollEventLoopOptions::default()) {
                    Poll::Ready(result) => Poll::Ready(result.map(|()| false)),
                    Poll::Pending => Poll::Ready(Ok(true)),
                })
                .await
            })
            .map_err(uncaught)
    }

    /// One pass that waits up to `wait` for pending work to make progress
    pub(crate) fn pump_for(&mut self, wait: Duration) -> Result<bool> {
        let runtime = &mut self.runtime;
        self.executor
            .block_on(async {
                match tokio::time::timeout(
                    wait,
                    runtime.run_event_loop(PollEventLoopOptions::default()),
                )
                .await
                {
                    Ok(result) => result.map(|()| false),
                    Err(_elapsed) => Ok(true),
                }
            })
            .map_err(uncaught)
    }

    /// Runs pending work to completion, bounded by `limit` when given
    fn drain(&mut self, limit: Option<Duration>) -> Result<()> {
        match limit {
            Some(limit) => {
                if self.pump_for(limit)? {
                    return Err(HostError::Engine(format!(
                        "Pending work did not drain within {}ms",
                        limit.as_millis()
                    )));
                }
                Ok(())
            }
            None => {
                let runtime = &mut self.runtime;
                self.executor
                    .block_on(runtime.run_event_loop(PollEventLoopOptions::default()))
                    .map_err(uncaught)
            }
        }
    }

    /// Shuts the engine down and returns the process status: the script's
    /// `process.exitCode` when it set a non-zero one, otherwise 1 if draining
    /// or the `exit` listeners failed, otherwise 0
    pub(crate) fn shutdown(&mut self, drain_limit: Option<Duration>) -> i32 {
        self.runtime
            .op_state()
            .borrow_mut()
            .borrow_mut::<TimerTable>()
            .close();

        let mut faulted = false;
        if let Err(err) = self.drain(drain_limit) {
            error!("Failed to drain pending work during shutdown: {err}");
            faulted = true;
        }

        let exit_code = match self.call_bridge(BridgeFn::Shutdown, &[]) {
            Ok(Outcome::Value(code)) => self.deserialize_global::<i32>(&code).unwrap_or_else(|err| {
                error!("Failed to read process.exitCode: {err}");
                1
            }),
            Ok(Outcome::Thrown(err)) => {
                error!("An exit listener threw: {err}");
                faulted = true;
                0
            }
            Ok(_) => 0,
            Err(err) => {
                error!("Failed to run exit listeners: {err}");
                faulted = true;
                0
            }
        };

        if exit_code != 0 {
            exit_code
        } else {
            i32::from(faulted)
        }
    }

    pub(crate) fn root(&mut self) -> Result<JsValue> {
        let outcome = self.call_bridge(BridgeFn::Root, &[])?;
        self.outcome_value(outcome, "globalThis")
    }

    pub(crate) fn get_value(&mut self, object: &JsValue, name: &str) -> Result<JsValue> {
        let outcome = self.call_bridge(BridgeFn::GetValue, &[Arg::Value(object), Arg::Str(name)])?;
        self.outcome_value(outcome, name)
    }

    pub(crate) fn call_member(
        &mut self,
        object: &JsValue,
        name: &str,
        args: &[JsValue],
    ) -> Result<JsValue> {
        let outcome = self.call_bridge(
            BridgeFn::CallMember,
            &[Arg::Value(object), Arg::Str(name), Arg::List(args)],
        )?;
        self.outcome_value(outcome, name)
    }

    pub(crate) fn call_function(
        &mut self,
        receiver: &JsValue,
        function: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue> {
        let outcome = self.call_bridge(
            BridgeFn::CallFunction,
            &[Arg::Value(receiver), Arg::Value(function), Arg::List(args)],
        )?;
        self.outcome_value(outcome, "<function>")
    }

    pub(crate) fn kind_of(&mut self, value: &JsValue) -> Result<ValueKind> {
        let outcome = self.call_bridge(BridgeFn::KindOf, &[Arg::Value(value)])?;
        let kind = self.outcome_value(outcome, "<kind>")?;
        self.deserialize(&kind)
    }

    pub(crate) fn include(&mut self, request: &str) -> Result<JsValue> {
        let outcome = self.call_bridge(BridgeFn::Include, &[Arg::Str(request)])?;
        self.outcome_value(outcome, request)
    }

    /// Points `require`, `__filename` and `__dirname` at a script about to run
    pub(crate) fn enter_script(&mut self, filename: &str, dirname: &str) -> Result<()> {
        let outcome = self.call_bridge(
            BridgeFn::EnterScript,
            &[Arg::Str(filename), Arg::Str(dirname)],
        )?;
        self.outcome_value(outcome, filename).map(|_| ())
    }

    /// Restores the globals replaced by [`Engine::enter_script`]
    pub(crate) fn leave_script(&mut self) -> Result<()> {
        let outcome = self.call_bridge(BridgeFn::LeaveScript, &[])?;
        self.outcome_value(outcome, "script globals").map(|_| ())
    }

    /// Adds a module to the registry and refreshes every global bound to it.
    /// A target is recorded only once the global actually holds the module.
    pub(crate) fn register(&mut self, module: NativeModule, target: Option<&str>) -> Result<()> {
        let name = module.name().to_string();
        self.registry.register(module);

        let mut targets: Vec<String> = self
            .bindings
            .targets_of(&name)
            .map(str::to_string)
            .collect();
        if let Some(target) = target.filter(|target| !target.is_empty())
            && !targets.iter().any(|bound| bound == target)
        {
            targets.push(target.to_string());
        }

        for target in targets {
            let outcome = self.call_bridge(
                BridgeFn::BindGlobal,
                &[Arg::Str(&target), Arg::Str(&name)],
            )?;
            self.outcome_value(outcome, &target)?;

            if let Some(previous) = self.bindings.bind(&target, &name)
                && previous != name
            {
                warn!("Global \"{target}\" now exposes module \"{name}\" instead of \"{previous}\"");
            }
            debug!("Exposed native module \"{name}\" as global \"{target}\"");
        }
        Ok(())
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(&mut self, value: &JsValue) -> Result<T> {
        self.check_owner(value)?;
        self.deserialize_global(&value.global)
    }

    pub(crate) fn serialize<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<JsValue> {
        let id = self.id;
        deno_core::scope!(scope, &mut self.runtime);
        let local = serde_v8::to_v8(scope, value)
            .map_err(|e| HostError::Conversion(e.to_string()))?;
        Ok(JsValue::new(v8::Global::new(scope, local), id))
    }

    fn deserialize_global<T: DeserializeOwned>(&mut self, value: &v8::Global<v8::Value>) -> Result<T> {
        deno_core::scope!(scope, &mut self.runtime);
        let local = v8::Local::new(scope, value);
        serde_v8::from_v8::<T>(scope, local).map_err(|e| HostError::Conversion(e.to_string()))
    }

    fn check_owner(&self, value: &JsValue) -> Result<()> {
        if value.engine_id == self.id {
            Ok(())
        } else {
            Err(HostError::ForeignValue)
        }
    }

    fn outcome_value(&self, outcome: Outcome, member: &str) -> Result<JsValue> {
        match outcome {
            Outcome::Value(global) => Ok(JsValue::new(global, self.id)),
            Outcome::Missing => Err(HostError::MissingMember(member.to_string())),
            Outcome::NotCallable => Err(HostError::NotCallable(member.to_string())),
            Outcome::Thrown(err) => Err(HostError::Script(err)),
            Outcome::NotFound => Err(HostError::ModuleNotFound(member.to_string())),
        }
    }

    fn call_bridge(&mut self, function: BridgeFn, args: &[Arg<'_>]) -> Result<Outcome> {
        for arg in args {
            match arg {
                Arg::Value(value) => self.check_owner(value)?,
                Arg::List(values) => values.iter().try_for_each(|value| self.check_owner(value))?,
                Arg::Str(_) => {}
            }
        }

        let _guard = self.executor.enter();
        let bridge = &self.bridge;
        deno_core::scope!(scope, &mut self.runtime);

        let mut locals: Vec<v8::Local<v8::Value>> = Vec::with_capacity(args.len());
        for arg in args {
            let local = match arg {
                Arg::Value(value) => v8::Local::new(scope, &value.global),
                Arg::Str(text) => v8::String::new(scope, text)
                    .ok_or_else(|| HostError::Conversion("String is too long for the engine".into()))?
                    .into(),
                Arg::List(values) => {
                    let elements: Vec<v8::Local<v8::Value>> = values
                        .iter()
                        .map(|value| v8::Local::new(scope, &value.global))
                        .collect();
                    v8::Array::new_with_elements(scope, &elements).into()
                }
            };
            locals.push(local);
        }

        let callee = v8::Local::new(scope, &bridge[function as usize]);
        let receiver: v8::Local<v8::Value> = v8::undefined(scope).into();
        let result = callee
            .call(scope, receiver, &locals)
            .ok_or_else(|| HostError::Engine(format!("Host bridge call {function:?} did not complete")))?;

        let record = v8::Local::<v8::Array>::try_from(result)
            .map_err(|_| HostError::Engine(format!("Host bridge call {function:?} returned no record")))?;
        let status = record
            .get_index(scope, 0)
            .and_then(|status| status.uint32_value(scope))
            .ok_or_else(|| HostError::Engine(format!("Host bridge call {function:?} returned no status")))?;
        let payload = record
            .get_index(scope, 1)
            .unwrap_or_else(|| v8::undefined(scope).into());

        Ok(match status {
            STATUS_OK => Outcome::Value(v8::Global::new(scope, payload)),
            STATUS_MISSING => Outcome::Missing,
            STATUS_NOT_CALLABLE => Outcome::NotCallable,
            STATUS_THROWN => Outcome::Thrown(
                serde_v8::from_v8::<ScriptError>(scope, payload)
                    .map_err(|e| HostError::Conversion(e.to_string()))?,
            ),
            STATUS_NOT_FOUND => Outcome::NotFound,
            other => {
                return Err(HostError::Engine(format!(
                    "Host bridge call {function:?} returned unknown status {other}"
                )));
            }
        })
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("modules", &self.registry)
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

fn install_bridge(runtime: &mut JsRuntime) -> Result<Vec<v8::Global<v8::Function>>> {
    let table = runtime
        .execute_script("<jsembed:bridge>", BRIDGE_SOURCE)
        .map_err(|e| HostError::Engine(format!("Failed to install the host bridge: {e}")))?;

    deno_core::scope!(scope, &mut *runtime);
    let table = v8::Local::new(scope, table);
    let table = v8::Local::<v8::Array>::try_from(table)
        .map_err(|_| HostError::Engine("Host bridge did not return a function table".into()))?;

    let mut functions = Vec::with_capacity(BRIDGE_FUNCTIONS as usize);
    for index in 0..BRIDGE_FUNCTIONS {
        let entry = table
            .get_index(scope, index)
            .and_then(|entry| v8::Local::<v8::Function>::try_from(entry).ok())
            .ok_or_else(|| HostError::Engine(format!("Host bridge entry {index} is not a function")))?;
        functions.push(v8::Global::new(scope, entry));
    }
    Ok(functions)
}

fn uncaught(err: impl fmt::Display) -> HostError {
    HostError::Uncaught(ScriptError {
        message: err.to_string(),
        stack: None,
    })
}
