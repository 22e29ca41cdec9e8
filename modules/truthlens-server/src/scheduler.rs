use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use truthlens_pipeline::orchestrator::Orchestrator;

/// Spawn the periodic fetch-then-analyze loop. The first run fires one full
/// interval after startup so a crash-looping deploy doesn't hammer the
/// provider.
pub fn spawn(orchestrator: Arc<Orchestrator>, interval_minutes: u64) {
    tokio::spawn(async move {
        let period = Duration::from_secs(interval_minutes.max(1) * 60);
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // consume the immediate first tick

        info!(interval_minutes, "Scheduler started");
        loop {
            interval.tick().await;
            info!("Scheduled fetch-and-analyze run starting");
            let outcome = orchestrator.run_fetch_then_analyze().await;
            info!(
                status = outcome.status,
                message = %outcome.message,
                "Scheduled run complete"
            );
        }
    });
}
