//! Parser runtime (C5): schedules each configured adapter's `parse_once`
//! on a fixed interval, in parallel across adapters and serially within
//! one adapter, and exposes the manual start/stop toggle spec.md's
//! `POST /async/start`/`POST /async/stop` use. Retry-with-backoff at
//! startup is grounded on the teacher's `2u64.pow(retry_count)` market-init
//! loop in the old `main.rs`.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapters::Adapter;

const STARTUP_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

/// Per-adapter health snapshot (spec.md §4.6/§6 health endpoint).
#[derive(Debug, Clone)]
pub struct AdapterHealth {
    pub name: &'static str,
    pub last_successful_cycle: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub struct ParserRuntime {
    index: Arc<crate::index::AggregationIndex>,
    adapters: Vec<Arc<dyn Adapter>>,
    interval: Duration,
    cycle_timeout: Duration,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    last_success: DashMap<&'static str, DateTime<Utc>>,
    last_error: DashMap<&'static str, String>,
}

impl ParserRuntime {
    pub fn new(
        index: Arc<crate::index::AggregationIndex>,
        adapters: Vec<Arc<dyn Adapter>>,
        interval: Duration,
        cycle_timeout: Duration,
    ) -> Self {
        Self {
            index,
            adapters,
            interval,
            cycle_timeout,
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            handles: Mutex::new(Vec::new()),
            last_success: DashMap::new(),
            last_error: DashMap::new(),
        }
    }

    pub fn adapter_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> Vec<AdapterHealth> {
        self.adapters
            .iter()
            .map(|a| AdapterHealth {
                name: a.name(),
                last_successful_cycle: self.last_success.get(a.name()).map(|v| *v),
                last_error: self.last_error.get(a.name()).map(|v| v.clone()),
            })
            .collect()
    }

    /// Dispatch every adapter's first cycle in the background and return as
    /// soon as the tasks are spawned — the runtime does not block server
    /// startup on a slow or down source warming the index. Each task
    /// retries its own cycle with exponential backoff; a source that keeps
    /// failing after `STARTUP_MAX_RETRIES` attempts just starts cold.
    pub async fn warm_start(&self) {
        let cancel = self.cancel.lock().await.clone();
        for adapter in self.adapters.iter().cloned() {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut attempt = 0u32;
                loop {
                    let now = Utc::now();
                    match tokio::time::timeout(Duration::from_secs(30), adapter.parse_once(now, cancel.clone())).await {
                        Ok(Ok(())) => {
                            info!(adapter = adapter.name(), "warm start cycle succeeded");
                            break;
                        }
                        Ok(Err(e)) => {
                            attempt += 1;
                            if attempt >= STARTUP_MAX_RETRIES {
                                error!(adapter = adapter.name(), attempts = attempt, error = %e, "warm start failed, starting cold");
                                break;
                            }
                            let wait = Duration::from_secs(2u64.pow(attempt));
                            warn!(adapter = adapter.name(), attempt, error = %e, wait_secs = wait.as_secs(), "warm start cycle failed, retrying");
                            tokio::time::sleep(wait).await;
                        }
                        Err(_) => {
                            warn!(adapter = adapter.name(), "warm start cycle timed out");
                            break;
                        }
                    }
                }
            });
        }
    }

    /// Idempotent: a second call while already running is a no-op.
    pub async fn start(self: &Arc<Self>) -> StartOutcome {
        if self.running.swap(true, Ordering::SeqCst) {
            return StartOutcome::AlreadyRunning;
        }

        let cancel = CancellationToken::new();
        *self.cancel.lock().await = cancel.clone();

        let mut handles = Vec::with_capacity(self.adapters.len() + 1);
        for adapter in self.adapters.iter().cloned() {
            let runtime = self.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                runtime.run_adapter_loop(adapter, cancel).await;
            }));
        }
        handles.push(tokio::spawn(Self::run_eviction_loop(self.index.clone(), cancel)));
        *self.handles.lock().await = handles;
        StartOutcome::Started
    }

    /// Sweeps matches whose grace window has passed (spec.md §4.4). Runs
    /// at a coarser cadence than the parse cycles themselves — eviction is
    /// cheap and doesn't need to race every fetch interval.
    async fn run_eviction_loop(index: Arc<crate::index::AggregationIndex>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(Duration::from_secs(900));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => return,
            }
            index.evict_expired(Utc::now());
        }
    }

    async fn run_adapter_loop(&self, adapter: Arc<dyn Adapter>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        // A cycle that overruns the interval is dropped, never queued —
        // spec.md's scheduling model explicitly rules out backlog buildup.
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = cancel.cancelled() => return,
            }

            let now = Utc::now();
            let cycle_cancel = cancel.child_token();
            let result = tokio::select! {
                result = tokio::time::timeout(self.cycle_timeout, adapter.parse_once(now, cycle_cancel.clone())) => result,
                _ = cancel.cancelled() => return,
            };

            match result {
                Ok(Ok(())) => {
                    self.last_success.insert(adapter.name(), now);
                    self.last_error.remove(adapter.name());
                }
                Ok(Err(e)) => {
                    warn!(adapter = adapter.name(), error = %e, "cycle failed, adapter stays scheduled");
                    self.last_error.insert(adapter.name(), e.to_string());
                }
                Err(_) => {
                    cycle_cancel.cancel();
                    warn!(adapter = adapter.name(), "cycle deadline exceeded, aborting in-flight work");
                    self.last_error.insert(adapter.name(), "cycle deadline exceeded".to_string());
                }
            }
        }
    }

    /// Idempotent: a second call while already stopped is a no-op.
    pub async fn stop(&self) -> StopOutcome {
        if !self.running.swap(false, Ordering::SeqCst) {
            return StopOutcome::AlreadyStopped;
        }

        self.cancel.lock().await.cancel();
        let handles = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            let _ = handle.await;
        }
        StopOutcome::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::AggregationIndex;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingAdapter {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Adapter for CountingAdapter {
        fn name(&self) -> &'static str {
            "counting"
        }
        async fn parse_once(
            &self,
            _now: DateTime<Utc>,
            _cancel: CancellationToken,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapter = Arc::new(CountingAdapter { calls: calls.clone() });
        let runtime = Arc::new(ParserRuntime::new(
            Arc::new(AggregationIndex::new()),
            vec![adapter],
            Duration::from_millis(20),
            Duration::from_secs(1),
        ));

        assert_eq!(runtime.start().await, StartOutcome::Started);
        assert_eq!(runtime.start().await, StartOutcome::AlreadyRunning);
        tokio::time::sleep(Duration::from_millis(80)).await;
        runtime.stop().await;

        assert!(calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let runtime = Arc::new(ParserRuntime::new(
            Arc::new(AggregationIndex::new()),
            vec![],
            Duration::from_secs(1),
            Duration::from_secs(1),
        ));
        runtime.start().await;
        assert_eq!(runtime.stop().await, StopOutcome::Stopped);
        assert_eq!(runtime.stop().await, StopOutcome::AlreadyStopped);
    }

    #[tokio::test]
    async fn health_reports_last_successful_cycle_per_adapter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let adapter = Arc::new(CountingAdapter { calls });
        let runtime = Arc::new(ParserRuntime::new(
            Arc::new(AggregationIndex::new()),
            vec![adapter],
            Duration::from_millis(10),
            Duration::from_secs(1),
        ));
        runtime.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        runtime.stop().await;

        let health = runtime.health();
        assert_eq!(health.len(), 1);
        assert!(health[0].last_successful_cycle.is_some());
    }
}
