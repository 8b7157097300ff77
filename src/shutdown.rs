//! Cooperative shutdown plumbing.
//!
//! Every stage shares one [`CancellationToken`]; a watcher task fires it on
//! SIGINT. Fetchers close their record channels when the token fires, main
//! loops observe the closed channel and drain, and the process exits 0.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Returns a token that is cancelled when the process receives SIGINT.
pub fn on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            watcher.cancel();
        }
    });
    token
}
