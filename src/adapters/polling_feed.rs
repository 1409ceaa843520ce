//! Live/paper market data feed: a worker thread polls for new bars and
//! pushes them into a bounded channel consumed by the engine loop.
//!
//! Poll errors are tolerated up to `max_consecutive_failures`; past that the
//! worker sends one fatal `FeedUnavailable` and exits. Stale and duplicate
//! bars are dropped so the engine only ever sees strictly increasing
//! timestamps.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver};

use crate::domain::bar::Bar;
use crate::domain::config_validation::FeedSettings;
use crate::domain::error::TradewindError;
use crate::domain::feed::MarketDataFeed;
use crate::ports::exchange_port::ExchangePort;

const CHANNEL_CAPACITY: usize = 64;

pub struct PollingFeed {
    receiver: Receiver<Result<Bar, TradewindError>>,
    skipped: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl PollingFeed {
    /// Spawn the polling worker. `poll` returns the newest bar, or `None`
    /// when nothing new is available yet.
    pub fn spawn<F>(mut poll: F, settings: FeedSettings, stop: Arc<AtomicBool>) -> Self
    where
        F: FnMut() -> Result<Option<Bar>, TradewindError> + Send + 'static,
    {
        let (sender, receiver) = bounded(CHANNEL_CAPACITY);
        let skipped = Arc::new(AtomicUsize::new(0));
        let skipped_worker = Arc::clone(&skipped);

        let handle = thread::spawn(move || {
            let mut failures = 0u32;
            let mut last_seen: Option<DateTime<Utc>> = None;

            while !stop.load(Ordering::Relaxed) {
                match poll() {
                    Ok(Some(bar)) => {
                        failures = 0;
                        if let Err(err) = bar.validate() {
                            log::warn!("dropping malformed bar: {}", err);
                            skipped_worker.fetch_add(1, Ordering::Relaxed);
                        } else if last_seen.is_some_and(|t| bar.timestamp <= t) {
                            log::debug!("dropping stale bar at {}", bar.timestamp);
                            skipped_worker.fetch_add(1, Ordering::Relaxed);
                        } else {
                            last_seen = Some(bar.timestamp);
                            if sender.send(Ok(bar)).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        failures += 1;
                        log::warn!("poll failure {}: {}", failures, err);
                        if failures >= settings.max_consecutive_failures {
                            let _ = sender.send(Err(TradewindError::FeedUnavailable {
                                failures,
                                reason: err.to_string(),
                            }));
                            return;
                        }
                    }
                }
                thread::sleep(settings.poll_interval);
            }
        });

        PollingFeed {
            receiver,
            skipped,
            handle: Some(handle),
        }
    }

    /// Poll the newest bar for one symbol through an `ExchangePort`.
    pub fn from_exchange<E>(
        mut exchange: E,
        symbol: String,
        settings: FeedSettings,
        stop: Arc<AtomicBool>,
    ) -> Self
    where
        E: ExchangePort + Send + 'static,
    {
        Self::spawn(
            move || Ok(exchange.recent_bars(&symbol, 1)?.pop()),
            settings,
            stop,
        )
    }
}

impl MarketDataFeed for PollingFeed {
    fn next_bar(&mut self) -> Result<Option<Bar>, TradewindError> {
        match self.receiver.recv() {
            Ok(Ok(bar)) => Ok(Some(bar)),
            Ok(Err(err)) => Err(err),
            // Worker exited cleanly (stop flag): end of stream.
            Err(_) => Ok(None),
        }
    }

    fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }
}

impl Drop for PollingFeed {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            // Receiver drops with self; the worker notices on its next send
            // or stop-flag check.
            let _ = handle.join();
        }
    }
}
