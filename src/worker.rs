use std::sync::Arc;

use tokio::time::{Duration, interval};
use tracing::{debug, info, warn};

use crate::metrics::set_tracked;
use crate::state::AppState;

// Evicts idle per-key records on a fixed interval. Only spawned when enabled.
pub async fn sweep_worker(state: Arc<AppState>, every: Duration) {
    let mut interval = interval(every);

    info!("Sweep worker started (interval: {:?})", every);

    loop {
        interval.tick().await;

        let swept = state.clock.now().and_then(|now| state.gate.sweep(now));
        match swept {
            Ok(0) => {}
            Ok(evicted) => debug!(evicted, "Evicted idle credential records"),
            Err(e) => warn!(error = %e, "Sweep skipped"),
        }

        set_tracked(state.gate.tracked());
    }
}
