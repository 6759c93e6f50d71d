use std::thread;

use matbench_exec::InterruptFlag;
use tracing::{error, warn};

/// Raises the returned flag on the first Ctrl-C.
///
/// The listener runs a single-threaded tokio runtime on its own thread so the
/// scheduler can stay synchronous. A running child shares the terminal's
/// process group and receives the SIGINT directly.
pub fn install_ctrl_c() -> InterruptFlag {
    let flag = InterruptFlag::new();
    let listener = flag.clone();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "cannot listen for Ctrl-C; interrupts will kill the process");
            return flag;
        }
    };
    let spawned = thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        warn!("interrupt received, stopping after the current combination");
                        listener.trigger();
                    }
                    Err(err) => error!(%err, "Ctrl-C listener failed"),
                }
            });
        });
    if let Err(err) = spawned {
        error!(%err, "cannot spawn the Ctrl-C listener");
    }
    flag
}
