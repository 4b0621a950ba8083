pub mod eval;
pub mod init;
pub mod run;

use jsembed_host::{Host, HostError, StopHandle};
use log::{debug, error, info, warn};

use crate::utils::styles::{fmt_dimmed, fmt_error};

/// Drives the event loop until no callbacks are pending, the loop is stopped
/// or a callback throws
pub(crate) fn run_until_idle(host: &mut Host) -> Result<(), HostError> {
    let mut failure = None;

    host.run_event_loop(|host| match host.process_events() {
        Ok(true) => {}
        Ok(false) => host.stop_event_loop(),
        Err(err) => {
            failure = Some(err);
            host.stop_event_loop();
        }
    })?;

    failure.map_or(Ok(()), Err)
}

/// Stops the event loop on the first Ctrl-C and exits on the second
pub(crate) fn stop_on_ctrl_c(handle: StopHandle) {
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                warn!("Ctrl-C handling unavailable: {e}");
                return;
            }
        };

        rt.block_on(async {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            info!("Interrupted, finishing pending work (Ctrl-C again to exit)");
            handle.stop();

            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        });
    });
}

/// Reports a failed run, tears the engine down and picks the exit status
pub(crate) fn finish(mut host: Host, outcome: Result<(), HostError>) -> i32 {
    let failed = match outcome {
        Ok(()) => false,
        Err(err) => {
            error!("{}", fmt_error(&err.to_string()));
            if let Some(stack) = err.script_error().and_then(|e| e.stack.as_deref()) {
                debug!("{}", fmt_dimmed(stack));
            }
            true
        }
    };

    let status = host.deinitialize();
    if failed && status == 0 { 1 } else { status }
}
