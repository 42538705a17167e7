//! One-off expiry sweep.
//!
//! Uses the server's configuration, so it removes files from whichever
//! content store the server writes to.

use chrono::Utc;
use printdrop_server::AppState;
use printdrop_server::config::ServerConfig;
use printdrop_server::services::reaper::Reaper;

/// Delete every expired order and its stored files.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the content store cannot
/// be opened or the order deletion fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    let ttl = config.order_ttl;
    let state = AppState::from_config(config).await?;

    let report = Reaper::new(state.backends(), ttl).sweep(Utc::now()).await?;

    tracing::info!(
        orders = report.orders_removed,
        files = report.files_removed,
        failed = report.files_failed,
        "Sweep complete"
    );
    #[allow(clippy::print_stdout)]
    {
        println!(
            "Removed {} expired order(s) and {} file(s); {} file deletion(s) failed",
            report.orders_removed, report.files_removed, report.files_failed
        );
    }
    Ok(())
}
