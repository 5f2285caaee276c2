use color_eyre::Result;
use tokio::runtime::Runtime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::pipeline::QuitSignal;

/// Install the fmt subscriber, honouring `RUST_LOG` when set.
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();
}

/// Trigger `quit` on Ctrl-C.
///
/// The listener lives on the returned runtime; keep it alive for as long as
/// the signal should be honoured.
pub fn quit_on_ctrl_c(quit: QuitSignal) -> Result<Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("liveproc-signal")
        .enable_all()
        .build()?;

    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping after the current frame");
                quit.trigger();
            }
            Err(e) => warn!("Unable to listen for Ctrl-C: {}", e),
        }
    });
    Ok(runtime)
}
