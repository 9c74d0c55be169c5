//! Store readiness gate.
//!
//! The store is usually a co-located service (docker-compose `db`) that comes up
//! shortly after the ingestion job, so the gate polls with a fixed interval.

use std::fmt::Display;
use std::time::Duration;

use tracing::{info, warn};

use super::Store;

/// Probe `store` up to `retries` times, sleeping `delay` between attempts.
pub fn wait_for_store(store: &dyn Store, retries: u32, delay: Duration) -> bool {
    wait_for_store_with_sleep(|| store.probe(), retries, delay, std::thread::sleep)
}

/// Readiness loop with an injectable probe and sleep.
///
/// Returns `true` on the first successful probe and `false` once `retries`
/// attempts have failed. There is no sleep after the last attempt. `retries`
/// of zero still probes once.
pub fn wait_for_store_with_sleep<P, E, S>(mut probe: P, retries: u32, delay: Duration, mut sleep: S) -> bool
where
    P: FnMut() -> Result<(), E>,
    E: Display,
    S: FnMut(Duration),
{
    let retries = retries.max(1);
    for attempt in 1..=retries {
        match probe() {
            Ok(()) => {
                info!(attempt, "store is ready");
                return true;
            }
            Err(e) => {
                warn!(attempt, retries, "store not ready: {e}");
                if attempt < retries {
                    sleep(delay);
                }
            }
        }
    }
    false
}
