use std::{future::Future, rc::Rc, time::Duration};

use tokio::{
    task::spawn_local,
    time::{interval, MissedTickBehavior},
};

use crate::{Readable, Subscription, SyncError};

#[cfg(test)]
mod tests;

/// A readable that calls `fetch` immediately, then every `period`.
///
/// All subscribers share one fetch loop. A result equal to the previous one is not emitted.
/// A failed fetch is emitted as `Error` and retried at the next tick.
/// The loop awaits each fetch before waiting for the next tick and skips missed ticks,
/// so fetches never overlap.
///
/// The loop is spawned with [`spawn_local`], so subscribing must happen inside a
/// [`LocalSet`](tokio::task::LocalSet).
pub fn poll_readable<T, F, Fut>(name: &'static str, period: Duration, fetch: F) -> Readable<T>
where
    T: Clone + PartialEq + 'static,
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<T, SyncError>> + 'static,
{
    let fetch = Rc::new(fetch);
    Readable::new(move |set| {
        let fetch = fetch.clone();
        tracing::debug!(name, "poll loop started");
        let task = spawn_local(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tracing::trace!(name, "poll tick");
                let result = fetch().await;
                if let Err(e) = &result {
                    tracing::warn!(name, error = %e, "fetch failed");
                }
                set.set_dedup(result.into());
            }
        });
        Subscription::from_task(task)
            .merge(Subscription::from_fn(move || tracing::debug!(name, "poll loop stopped")))
    })
}
