//! `depot serve`.

use anyhow::Result;

use depot::{Config, Depot, http};

/// Runs the server in the foreground until Ctrl+C.
pub async fn execute(depot: Depot, config: &Config) -> Result<()> {
    let data_dir = config.data_dir()?;
    tracing::info!(
        data_dir = %data_dir.display(),
        backend = ?config.storage.backend,
        clean_interval_secs = config.retention.clean_interval_secs,
        "Starting depot"
    );
    http::serve(depot, config).await
}
