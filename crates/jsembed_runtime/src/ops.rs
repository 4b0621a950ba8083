//! Deno ops backing the script-visible runtime
//!
//! These ops expose native modules, module loading, timers and console
//! output to `runtime.js`

use deno_core::OpState;
use deno_core::op2;
use deno_core::CancelFuture;
use log::{Level, log};
use serde_json::Value;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::ProcessInfo;
use crate::error::{ModuleError, TimerError};
use crate::registry::{ModuleDescriptor, ModuleRegistry};
use crate::resolver::{ModuleResolver, ModuleSource};
use crate::timers::{TimerTable, timer_delay};

/// Program name and arguments for `process.argv`
#[op2]
#[serde]
pub(crate) fn op_process_info(state: &mut OpState) -> ProcessInfo {
    state.borrow::<ProcessInfo>().clone()
}

/// Describe a native module for `process.binding`
#[op2]
#[serde]
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn op_module_describe(
    state: &mut OpState,
    #[string] name: String,
) -> Option<ModuleDescriptor> {
    state.borrow::<ModuleRegistry>().describe(&name)
}

/// Call a native module function
#[op2]
#[serde]
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn op_module_call(
    state: &mut OpState,
    #[string] module: String,
    #[string] function: String,
    #[serde] args: Vec<Value>,
) -> Result<Value, ModuleError> {
    let registry = state.borrow::<ModuleRegistry>().clone();
    registry.call(&module, &function, args)
}

/// Resolve a `require` request relative to `base_dir` (empty for top level)
#[op2]
#[serde]
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn op_require_resolve(
    state: &mut OpState,
    #[string] request: String,
    #[string] base_dir: String,
) -> Option<String> {
    let base_dir = (!base_dir.is_empty()).then(|| Path::new(&base_dir));
    state
        .borrow::<ModuleResolver>()
        .resolve(&request, base_dir)
        .map(|path| path.display().to_string())
}

/// Read a resolved module file
#[op2]
#[serde]
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn op_require_read(
    state: &mut OpState,
    #[string] filename: String,
) -> Result<ModuleSource, ModuleError> {
    state.borrow::<ModuleResolver>().read(Path::new(&filename))
}

/// Sleep for `millis`, resolves to false if the timer was cancelled first
#[op2(async)]
#[serde]
pub(crate) async fn op_timer_sleep(
    state: Rc<RefCell<OpState>>,
    #[smi] id: u32,
    millis: f64,
) -> Result<bool, TimerError> {
    let cancel = {
        let mut borrowed = state.borrow_mut();
        borrowed.borrow_mut::<TimerTable>().insert(id)?
    };

    let fired = tokio::time::sleep(timer_delay(millis))
        .or_cancel(cancel)
        .await
        .is_ok();

    state.borrow_mut().borrow_mut::<TimerTable>().remove(id);
    Ok(fired)
}

/// Allocate an id for a new timer
#[op2(fast)]
#[smi]
pub(crate) fn op_timer_next_id(state: &mut OpState) -> u32 {
    state.borrow_mut::<TimerTable>().next_id()
}

/// Cancel a pending timer
#[op2(fast)]
pub(crate) fn op_timer_cancel(state: &mut OpState, #[smi] id: u32) -> bool {
    state.borrow_mut::<TimerTable>().cancel(id)
}

/// Forward console output to the host logger
#[op2(fast)]
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn op_console(#[smi] level: u32, #[string] message: String) {
    let level = match level {
        0 => Level::Error,
        1 => Level::Warn,
        2 => Level::Info,
        3 => Level::Debug,
        _ => Level::Trace,
    };
    log!(target: crate::CONSOLE_TARGET, level, "{message}");
}
