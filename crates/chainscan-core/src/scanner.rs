//! The block scanner — walks the chain from the stored checkpoint toward the
//! head and feeds block headers to the downstream pipeline.
//!
//! # States
//!
//! - `Scanning`: pull the header at `current`, emit it, move on. Once the
//!   cursor passes the known head the head is re-read; if it is less than
//!   `hysteresis` blocks ahead the scanner switches to `Idling`.
//! - `Idling`: no headers are pulled. Externally observed blocks move the
//!   cursor forward. When the head drifts more than `hysteresis` blocks ahead
//!   the scanner switches back to `Scanning`.
//!
//! # Loop
//!
//! Each iteration handles at most one of: stop, head refresh tick, progress
//! log tick, observed block. Then it runs the advance step, the target check
//! and the idle check. While there is scanning work the event poll does not
//! wait; otherwise the loop sleeps until the next event.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::checkpoint::LastSeenBlock;
use crate::config::ScannerConfig;
use crate::cursor::ScanCursor;
use crate::error::ScanError;
use crate::manager::Service;
use crate::source::HeaderSource;
use crate::types::{BlockHeader, ScannerState};

/// Service name of the block scanner.
pub const SCANNER_NAME: &str = "block scanner";

/// Snapshot of the scanner's position, published after every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub current: u64,
    pub target: u64,
    pub state: ScannerState,
}

/// Consumer side of a [`BlockScanner`].
pub struct ScannerHandle {
    /// Scanned headers, strictly increasing within a scanning phase.
    pub headers: mpsc::Receiver<BlockHeader>,
    /// Best-effort state transitions; may miss some when nobody is reading.
    pub state_changes: mpsc::Receiver<ScannerState>,
    /// Heights of blocks seen by a live-head watcher.
    pub observed: mpsc::Sender<u64>,
    /// Latest cursor position and state.
    pub progress: watch::Receiver<ScanProgress>,
}

impl ScannerHandle {
    /// Current cursor position and state.
    pub fn progress(&self) -> ScanProgress {
        *self.progress.borrow()
    }
}

enum LoopEvent {
    Stop,
    RefreshHead,
    LogProgress,
    Observed(u64),
    Nothing,
}

/// Stateful polling engine that emits block headers from a checkpoint toward
/// the chain head.
pub struct BlockScanner {
    config: ScannerConfig,
    source: Arc<dyn HeaderSource>,
    checkpoint: Arc<dyn LastSeenBlock>,
    cursor: ScanCursor,
    state: ScannerState,
    headers: mpsc::Sender<BlockHeader>,
    state_changes: mpsc::Sender<ScannerState>,
    observed: mpsc::Receiver<u64>,
    progress: watch::Sender<ScanProgress>,
}

impl BlockScanner {
    /// Create a scanner and the handle its consumers use.
    ///
    /// Nothing is read from the source or the checkpoint until the scanner runs.
    /// Fails with [`ScanError::Config`] when `config` does not validate.
    pub fn new(
        config: ScannerConfig,
        source: Arc<dyn HeaderSource>,
        checkpoint: Arc<dyn LastSeenBlock>,
    ) -> Result<(Self, ScannerHandle), ScanError> {
        config.validate()?;
        let (headers_tx, headers_rx) = mpsc::channel(config.header_queue_capacity);
        let (state_tx, state_rx) = mpsc::channel(config.state_queue_capacity);
        let (observed_tx, observed_rx) = mpsc::channel(config.observed_queue_capacity);

        let cursor = ScanCursor::new(0, 0, config.hysteresis);
        let state = ScannerState::Scanning;
        let (progress_tx, progress_rx) = watch::channel(ScanProgress {
            current: cursor.current,
            target: cursor.target,
            state,
        });

        let scanner = Self {
            config,
            source,
            checkpoint,
            cursor,
            state,
            headers: headers_tx,
            state_changes: state_tx,
            observed: observed_rx,
            progress: progress_tx,
        };
        let handle = ScannerHandle {
            headers: headers_rx,
            state_changes: state_rx,
            observed: observed_tx,
            progress: progress_rx,
        };
        Ok((scanner, handle))
    }

    /// Resolve the starting point and scan until `shutdown` is cancelled.
    pub async fn scan(mut self, shutdown: CancellationToken) {
        self.init().await;
        info!(
            chain = %self.config.chain,
            start = self.cursor.current,
            target = self.cursor.target,
            "block scanner started"
        );
        self.run_loop(&shutdown).await;
        info!(
            chain = %self.config.chain,
            current = self.cursor.current,
            target = self.cursor.target,
            "block scanner terminated"
        );
    }

    async fn init(&mut self) {
        let start = self.start_height().await;
        let target = self.initial_target().await;
        self.cursor = ScanCursor::new(start, target, self.config.hysteresis);
        self.state = ScannerState::Scanning;
        self.publish_progress();
    }

    /// Starting height from the checkpoint.
    async fn start_height(&self) -> u64 {
        match self.checkpoint.last_seen_block_number().await {
            Ok(0) => self.config.default_start_block,
            Ok(number) => number,
            Err(e) => {
                // Known risk: a transient storage failure here means a rescan from genesis.
                error!(critical = true, error = %e, "can not pull the previous state; starting from genesis");
                0
            }
        }
    }

    async fn initial_target(&self) -> u64 {
        match self.source.current_head().await {
            Ok(head) => head,
            Err(e) => {
                error!(critical = true, error = %e, "can not pull the latest head number");
                0
            }
        }
    }

    async fn run_loop(&mut self, shutdown: &CancellationToken) {
        let mut head_tick = ticker(self.config.head_refresh());
        let mut log_tick = ticker(self.config.progress_log());

        loop {
            let busy = self.state == ScannerState::Scanning && self.cursor.has_pending();
            match self.next_event(shutdown, &mut head_tick, &mut log_tick, busy).await {
                LoopEvent::Stop => return,
                LoopEvent::RefreshHead => self.refresh_target().await,
                LoopEvent::LogProgress => self.log_progress(),
                LoopEvent::Observed(number) => self.on_observed(number),
                LoopEvent::Nothing => {}
            }

            if self.scan_next(shutdown).await.is_break() {
                return;
            }
            self.check_target().await;
            self.check_idle();
            self.publish_progress();
        }
    }

    async fn next_event(
        &mut self,
        shutdown: &CancellationToken,
        head_tick: &mut Interval,
        log_tick: &mut Interval,
        busy: bool,
    ) -> LoopEvent {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => LoopEvent::Stop,
            _ = head_tick.tick() => LoopEvent::RefreshHead,
            _ = log_tick.tick() => LoopEvent::LogProgress,
            Some(number) = self.observed.recv() => LoopEvent::Observed(number),
            _ = std::future::ready(()), if busy => LoopEvent::Nothing,
        }
    }

    /// Pull and emit the header at `current`, if there is work to do.
    async fn scan_next(&mut self, shutdown: &CancellationToken) -> ControlFlow<()> {
        if self.state != ScannerState::Scanning || !self.cursor.has_pending() {
            return ControlFlow::Continue(());
        }

        let number = self.cursor.current;
        let pulled = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return ControlFlow::Break(()),
            pulled = self.source.pull_header(number) => pulled,
        };

        let header = match pulled {
            Ok(header) => header,
            Err(e) => {
                error!(
                    block = number,
                    error = %e,
                    transient = e.is_transient(),
                    "block header not available"
                );
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return ControlFlow::Break(()),
                    _ = time::sleep(self.config.retry_delay()) => {}
                }
                return ControlFlow::Continue(());
            }
        };

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => ControlFlow::Break(()),
            sent = self.headers.send(header) => match sent {
                Ok(()) => {
                    self.cursor.advance();
                    ControlFlow::Continue(())
                }
                Err(_) => {
                    warn!(block = number, "header queue closed; no consumer left");
                    ControlFlow::Break(())
                }
            },
        }
    }

    /// Re-read the head once the cursor passed it and idle if we are close.
    async fn check_target(&mut self) {
        if self.state != ScannerState::Scanning || !self.cursor.passed_target() {
            return;
        }

        self.refresh_target().await;
        if self.cursor.within_band() {
            info!(
                current = self.cursor.current,
                target = self.cursor.target,
                "scanner reached head; idling"
            );
            self.switch_state(ScannerState::Idling);
        }
    }

    /// Resume scanning once the head drifted out of the band.
    fn check_idle(&mut self) {
        if self.state != ScannerState::Idling || !self.cursor.lost_head() {
            return;
        }

        info!(
            current = self.cursor.current,
            target = self.cursor.target,
            "scanner lost head; re-scan started"
        );
        self.switch_state(ScannerState::Scanning);
    }

    fn on_observed(&mut self, number: u64) {
        if self.state == ScannerState::Idling && self.cursor.fast_forward(number) {
            debug!(block = number, "idle cursor moved to observed block");
        }
    }

    /// Refresh `target`; a failed read keeps the last known head.
    async fn refresh_target(&mut self) {
        match self.source.current_head().await {
            Ok(head) => self.cursor.target = head,
            Err(e) => warn!(
                error = %e,
                target = self.cursor.target,
                "can not refresh the head number; keeping previous target"
            ),
        }
    }

    fn switch_state(&mut self, state: ScannerState) {
        self.state = state;
        match self.state_changes.try_send(state) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!(%state, "state change listener busy; notification dropped"),
            Err(TrySendError::Closed(_)) => debug!(%state, "no state change listener"),
        }
    }

    fn log_progress(&self) {
        info!(
            chain = %self.config.chain,
            state = %self.state,
            "block scanner at #{} of #{}",
            self.cursor.current,
            self.cursor.target
        );
    }

    fn publish_progress(&self) {
        let next = ScanProgress {
            current: self.cursor.current,
            target: self.cursor.target,
            state: self.state,
        };
        self.progress.send_if_modified(|progress| {
            if *progress == next {
                return false;
            }
            *progress = next;
            true
        });
    }
}

#[async_trait]
impl Service for BlockScanner {
    fn name(&self) -> &'static str {
        SCANNER_NAME
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) {
        (*self).scan(shutdown).await;
    }
}

/// Interval whose first tick is one full `period` away.
fn ticker(period: Duration) -> Interval {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

// ─── Tests ────────────────────────────────────────────────────────────────────
