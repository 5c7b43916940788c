//! Price feed service
//!
//! Background loop that polls a price source for a fixed watch list and
//! broadcasts every fresh price to all connected WebSocket clients.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use ticker_core::{ServerMessage, Symbol};

use crate::price_source::PriceSource;
use crate::websocket::ConnectionRegistry;

/// Symbols polled when no watch list is configured
pub const DEFAULT_WATCH_LIST: &[&str] = &["BTC-USD", "ETH-USD", "AAPL", "MSFT"];

/// Configuration for PriceFeed
#[derive(Debug, Clone)]
pub struct PriceFeedConfig {
    /// Symbols polled on every tick, in order
    pub watch_list: Vec<Symbol>,
    /// Pause between ticks
    pub update_interval: Duration,
    /// Pause after a fault escaped a tick
    pub error_backoff: Duration,
    /// Upper bound on a single price fetch
    pub fetch_timeout: Duration,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            watch_list: DEFAULT_WATCH_LIST
                .iter()
                .filter_map(|s| Symbol::parse(s))
                .collect(),
            update_interval: Duration::from_secs(5),
            error_backoff: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(4),
        }
    }
}

impl PriceFeedConfig {
    /// Replace the watch list, skipping blank entries and duplicates
    pub fn with_watch_list<'a>(mut self, symbols: impl IntoIterator<Item = &'a str>) -> Self {
        let mut watch_list: Vec<Symbol> = Vec::new();
        for symbol in symbols.into_iter().filter_map(Symbol::parse) {
            if !watch_list.contains(&symbol) {
                watch_list.push(symbol);
            }
        }
        self.watch_list = watch_list;
        self
    }
}

/// Outcome of one pass over the watch list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Symbols whose price was broadcast
    pub updated: Vec<Symbol>,
    /// Symbols the source had no price for
    pub unavailable: Vec<Symbol>,
    /// Symbols whose fetch errored, panicked or timed out
    pub failed: Vec<Symbol>,
}

/// State shared between the feed handle and its background task
struct FeedWorker {
    registry: Arc<ConnectionRegistry>,
    source: Arc<dyn PriceSource>,
    config: PriceFeedConfig,
}

impl FeedWorker {
    async fn run(&self, running: Arc<AtomicBool>) {
        while running.load(Ordering::SeqCst) {
            match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(report) => {
                    debug!(
                        "Price tick: {} updated, {} unavailable, {} failed",
                        report.updated.len(),
                        report.unavailable.len(),
                        report.failed.len()
                    );
                    sleep(self.config.update_interval).await;
                }
                Err(panic) => {
                    error!("Error in price update loop: {}", panic_message(&*panic));
                    sleep(self.config.error_backoff).await;
                }
            }
        }
    }

    async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for symbol in &self.config.watch_list {
            let fetch = timeout(self.config.fetch_timeout, self.source.get_price(symbol));
            let fetched = match AssertUnwindSafe(fetch).catch_unwind().await {
                Ok(fetched) => fetched,
                Err(panic) => {
                    error!(
                        "Error fetching price for {}: {}",
                        symbol,
                        panic_message(&*panic)
                    );
                    report.failed.push(symbol.clone());
                    continue;
                }
            };

            match fetched {
                Ok(Ok(Some(mut quote))) if quote.is_valid() => {
                    quote.symbol = symbol.clone();
                    let state = self.registry.record_price(quote);
                    let reached = self.registry.broadcast(ServerMessage::price_update(state));
                    debug!("Broadcast {} price to {} clients", symbol, reached);
                    report.updated.push(symbol.clone());
                }
                Ok(Ok(Some(quote))) => {
                    warn!(
                        "{} returned a non-finite price for {}: {}",
                        self.source.name(),
                        symbol,
                        quote.price
                    );
                    report.unavailable.push(symbol.clone());
                }
                Ok(Ok(None)) => {
                    debug!("No price available for {}", symbol);
                    report.unavailable.push(symbol.clone());
                }
                Ok(Err(e)) => {
                    error!("Error fetching price for {}: {}", symbol, e);
                    report.failed.push(symbol.clone());
                }
                Err(_) => {
                    warn!(
                        "Price fetch for {} timed out after {:?}",
                        symbol, self.config.fetch_timeout
                    );
                    report.failed.push(symbol.clone());
                }
            }
        }

        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Periodic price poller and broadcaster
///
/// At most one background task exists per feed. `start` and `stop` are
/// idempotent, and once `stop` returns the task has fully terminated.
pub struct PriceFeed {
    worker: Arc<FeedWorker>,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PriceFeed {
    /// Create a new PriceFeed
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        source: Arc<dyn PriceSource>,
        config: PriceFeedConfig,
    ) -> Self {
        info!(
            "Initializing PriceFeed for {} symbols via {}",
            config.watch_list.len(),
            source.name()
        );
        Self {
            worker: Arc::new(FeedWorker {
                registry,
                source,
                config,
            }),
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PriceFeedConfig {
        &self.worker.config
    }

    /// Whether the background loop is scheduled
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the background loop; a no-op if it is already running
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if self.running.load(Ordering::SeqCst) {
            debug!("Price update loop already running");
            return;
        }

        self.running.store(true, Ordering::SeqCst);
        let worker = Arc::clone(&self.worker);
        let running = Arc::clone(&self.running);
        *task = Some(tokio::spawn(async move {
            worker.run(running).await;
        }));

        info!(
            "Price update loop started with {:?} interval",
            self.worker.config.update_interval
        );
    }

    /// Stop the background loop and wait for it to terminate
    ///
    /// A no-op when the loop is not running.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = task.take() {
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Price update loop terminated abnormally: {}", e);
                }
            }
        }

        info!("Price update loop stopped");
    }

    /// Run a single pass over the watch list
    pub async fn tick(&self) -> TickReport {
        self.worker.tick().await
    }
}

impl std::fmt::Debug for PriceFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceFeed")
            .field("config", &self.worker.config)
            .field("is_running", &self.is_running())
            .finish()
    }
}
