// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use chrono::Utc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::MAX_CHECK_INTERVAL_SECS;
use crate::context::CurrencyContext;

/// Background task that keeps a context's rates from going stale.
///
/// Issues the initial fetch when the context starts without fresh rates,
/// then re-checks the cache age every `check_interval`. Stops on
/// [`shutdown`](Self::shutdown); dropping the handle aborts the task.
pub struct Supervisor {
    handle: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Supervisor {
    pub fn spawn(context: CurrencyContext, check_interval: Duration) -> Self {
        // `interval_at` panics on zero and `Instant + Duration` on overflow
        let check_interval = check_interval.clamp(
            Duration::from_secs(1),
            Duration::from_secs(MAX_CHECK_INTERVAL_SECS),
        );
        let (tx, mut rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            if context.needs_refresh() {
                tokio::select! {
                    _ = &mut rx => return,
                    // Failures leave identity or stale rates in place
                    _ = context.refresh() => {}
                }
            }

            let mut ticker = interval_at(Instant::now() + check_interval, check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        if context.check_staleness(Utc::now()).await {
                            debug!(stale = context.is_stale(), "staleness check refetched rates");
                        }
                    }
                }
            }
            debug!("rate supervisor stopped");
        });

        info!(interval_secs = check_interval.as_secs(), "rate supervisor started");

        Self {
            handle: Some(handle),
            shutdown: Some(tx),
        }
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RateSource;
    use crate::cache::RateCache;
    use crate::context::InitOptions;
    use crate::error::{FxError, FxResult};
    use crate::models::{CachedRates, CurrencyCode, RateTable};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts calls; succeeds or fails on every call.
    struct CountingSource {
        calls: AtomicUsize,
        succeed: bool,
    }

    impl CountingSource {
        fn new(succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                succeed,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateSource for CountingSource {
        async fn fetch_rates(&self) -> FxResult<CachedRates> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(CachedRates::new(
                    RateTable::from_rates([(CurrencyCode::EUR, 0.92)]),
                    Utc::now(),
                ))
            } else {
                Err(FxError::FetchFailure("HTTP 503".into()))
            }
        }
    }

    async fn context_with(source: Arc<CountingSource>, cached: Option<CachedRates>) -> CurrencyContext {
        let cache = RateCache::new(Arc::new(MemoryStore::new()));
        if let Some(cached) = cached {
            cache.save(&cached).await;
        }
        CurrencyContext::initialize(source, cache, InitOptions::default()).await
    }

    const INTERVAL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_initial_fetch_then_quiet_while_fresh() {
        let source = CountingSource::new(true);
        let context = context_with(source.clone(), None).await;

        let supervisor = Supervisor::spawn(context.clone(), INTERVAL);
        tokio::time::sleep(Duration::from_secs(150)).await;

        assert_eq!(source.calls(), 1);
        assert!(!context.is_stale());
        assert_eq!(context.rates().get(CurrencyCode::EUR), 0.92);

        supervisor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_cache_needs_no_fetch() {
        let source = CountingSource::new(true);
        let cached = CachedRates::new(RateTable::identity(), Utc::now());
        let context = context_with(source.clone(), Some(cached)).await;

        let supervisor = Supervisor::spawn(context, INTERVAL);
        tokio::time::sleep(Duration::from_secs(150)).await;

        assert_eq!(source.calls(), 0);
        supervisor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_retried_once_per_tick() {
        let source = CountingSource::new(false);
        let context = context_with(source.clone(), None).await;

        let supervisor = Supervisor::spawn(context.clone(), INTERVAL);
        tokio::time::sleep(Duration::from_secs(150)).await;

        // Initial attempt plus the ticks at 60s and 120s
        assert_eq!(source.calls(), 3);
        assert!(context.is_stale());
        assert_eq!(context.convert(100.0), 100.0);

        supervisor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_ticking() {
        let source = CountingSource::new(false);
        let context = context_with(source.clone(), None).await;

        let supervisor = Supervisor::spawn(context, INTERVAL);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!supervisor.is_finished());
        supervisor.shutdown().await;

        let calls = source.calls();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let source = CountingSource::new(false);
        let context = context_with(source.clone(), None).await;

        let supervisor = Supervisor::spawn(context, INTERVAL);
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(supervisor);

        let calls = source.calls();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_intervals_are_clamped() {
        let source = CountingSource::new(false);
        let context = context_with(source.clone(), None).await;

        let supervisor = Supervisor::spawn(context.clone(), Duration::MAX);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert!(!supervisor.is_finished());
        assert_eq!(source.calls(), 1);
        supervisor.shutdown().await;

        let supervisor = Supervisor::spawn(context, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(!supervisor.is_finished());
        // Initial attempt plus the ticks at 1s and 2s
        assert_eq!(source.calls(), 4);
        supervisor.shutdown().await;
    }
}
