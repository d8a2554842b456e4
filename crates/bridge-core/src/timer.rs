use std::time::Duration;

/// Spawns a background task that calls `f` once every `interval`,
/// starting after the first tick (not immediately). Used by the reconciliation
/// processors to own the 5-hour wholesale wipe of the mapping cache and
/// credit ledger.
pub fn spawn_periodic<F>(interval: Duration, mut f: F) -> tokio::task::JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            f();
        }
    })
}
