//! Result Channel
//!
//! The asynchronous sink/source shared by every backend. A producer owns a
//! [`ResultSender`] and a consumer owns the matching [`ResultReceiver`].
//!
//! ```text
//!   producer                                  consumer
//!   ResultSender ── records (bounded) ──────▶ ResultReceiver
//!                ── errors  (bounded) ──────▶
//!                ── stat slot ──────────────▶ stat()
//!                ── done   (set once) ──────▶ done()
//!                ◀─ cancel (set once) ─────── cancel()
//! ```
//!
//! Closing is ordered: both streams are closed before `done` fires, so a
//! consumer that sees `done` may still find buffered frames and must drain
//! them. Counters are bumped only after a send was accepted.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::error::{SearchError, SearchResult};
use super::record::Record;
use super::stat::Stat;

/// Buffered records per result before the producer blocks
pub const RECORDS_CAPACITY: usize = 4096;

/// Buffered errors per result before the producer blocks
pub const ERRORS_CAPACITY: usize = 256;

/// One frame received from a result
#[derive(Debug)]
pub enum Event {
    Record(Record),
    Error(SearchError),
}

/// State visible to both sides of a result
struct Shared {
    records: AtomicU64,
    errors: AtomicU64,
    cancel: CancellationToken,
    done: watch::Sender<bool>,
    stat: Mutex<Option<Stat>>,
}

impl Shared {
    fn is_done(&self) -> bool {
        *self.done.borrow()
    }
}

/// Create a new open result channel
pub fn channel() -> (ResultSender, ResultReceiver) {
    let (rec_tx, rec_rx) = mpsc::channel(RECORDS_CAPACITY);
    let (err_tx, err_rx) = mpsc::channel(ERRORS_CAPACITY);
    let (done_tx, done_rx) = watch::channel(false);

    let shared = Arc::new(Shared {
        records: AtomicU64::new(0),
        errors: AtomicU64::new(0),
        cancel: CancellationToken::new(),
        done: done_tx,
        stat: Mutex::new(None),
    });

    let sender = ResultSender {
        records: Some(rec_tx),
        errors: Some(err_tx),
        shared: Arc::clone(&shared),
    };
    let receiver = ResultReceiver {
        records: rec_rx,
        errors: err_rx,
        records_open: true,
        errors_open: true,
        done: done_rx,
        shared,
    };
    (sender, receiver)
}

// ============================================================================
// Producer side
// ============================================================================

/// Producer half of a result. Dropping it is equivalent to `report_done`.
pub struct ResultSender {
    records: Option<mpsc::Sender<Record>>,
    errors: Option<mpsc::Sender<SearchError>>,
    shared: Arc<Shared>,
}

impl ResultSender {
    /// Deliver a record, waiting while the consumer lags
    pub async fn report_record(&self, rec: Record) -> SearchResult<()> {
        let tx = self.records.as_ref().ok_or(SearchError::ClosedChannel)?;
        tx.send(rec).await.map_err(|_| SearchError::ClosedChannel)?;
        self.shared.records.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Deliver an error frame, waiting while the consumer lags
    pub async fn report_error(&self, err: SearchError) -> SearchResult<()> {
        let tx = self.errors.as_ref().ok_or(SearchError::ClosedChannel)?;
        tx.send(err).await.map_err(|_| SearchError::ClosedChannel)?;
        self.shared.errors.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Blocking variant of [`report_record`](Self::report_record) for
    /// producers running outside the async runtime.
    pub fn blocking_report_record(&self, rec: Record) -> SearchResult<()> {
        let tx = self.records.as_ref().ok_or(SearchError::ClosedChannel)?;
        tx.blocking_send(rec).map_err(|_| SearchError::ClosedChannel)?;
        self.shared.records.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Blocking variant of [`report_error`](Self::report_error)
    pub fn blocking_report_error(&self, err: SearchError) -> SearchResult<()> {
        let tx = self.errors.as_ref().ok_or(SearchError::ClosedChannel)?;
        tx.blocking_send(err).map_err(|_| SearchError::ClosedChannel)?;
        self.shared.errors.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Fill the terminal statistics slot
    pub fn set_stat(&self, stat: Stat) {
        *self.shared.stat.lock() = Some(stat);
    }

    /// Non-blocking check of the cancel signal
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Resolves once the consumer asked for cancellation
    pub async fn cancelled(&self) {
        self.shared.cancel.cancelled().await
    }

    /// Token that fires with the cancel signal, for binding to I/O
    pub fn cancel_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Records accepted so far
    pub fn records_reported(&self) -> u64 {
        self.shared.records.load(Ordering::Acquire)
    }

    /// Errors accepted so far
    pub fn errors_reported(&self) -> u64 {
        self.shared.errors.load(Ordering::Acquire)
    }

    /// Close both streams, then signal completion
    pub fn report_done(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        self.records.take();
        self.errors.take();
        self.shared.done.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        });
    }
}

impl Drop for ResultSender {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// Consumer side
// ============================================================================

/// Consumer half of a result
pub struct ResultReceiver {
    records: mpsc::Receiver<Record>,
    errors: mpsc::Receiver<SearchError>,
    records_open: bool,
    errors_open: bool,
    done: watch::Receiver<bool>,
    shared: Arc<Shared>,
}

impl ResultReceiver {
    /// Next record, or `None` once the records stream is closed and empty
    pub async fn recv_record(&mut self) -> Option<Record> {
        self.records.recv().await
    }

    /// Next error, or `None` once the errors stream is closed and empty
    pub async fn recv_error(&mut self) -> Option<SearchError> {
        self.errors.recv().await
    }

    /// Next frame from either stream, `None` when both are exhausted.
    ///
    /// No order is kept between records and errors.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            if !self.records_open && !self.errors_open {
                return None;
            }

            tokio::select! {
                rec = self.records.recv(), if self.records_open => match rec {
                    Some(rec) => return Some(Event::Record(rec)),
                    None => self.records_open = false,
                },
                err = self.errors.recv(), if self.errors_open => match err {
                    Some(err) => return Some(Event::Error(err)),
                    None => self.errors_open = false,
                },
            }
        }
    }

    /// Resolves once the producer stopped writing
    pub async fn done(&self) {
        let mut done = self.done.clone();
        // the sender lives in `shared`, so this only fails if done already fired
        let _ = done.wait_for(|d| *d).await;
    }

    pub fn is_done(&self) -> bool {
        self.shared.is_done()
    }

    /// Ask the producer to stop early
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Terminal statistics, if the producer set any
    pub fn stat(&self) -> Option<Stat> {
        self.shared.stat.lock().clone()
    }

    pub fn records_reported(&self) -> u64 {
        self.shared.records.load(Ordering::Acquire)
    }

    pub fn errors_reported(&self) -> u64 {
        self.shared.errors.load(Ordering::Acquire)
    }

    /// Shareable control handle, e.g. to cancel from another task
    pub fn handle(&self) -> ResultHandle {
        ResultHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Collect every remaining frame until the producer is done
    pub async fn drain(&mut self) -> (Vec<Record>, Vec<SearchError>) {
        let mut records = Vec::new();
        let mut errors = Vec::new();

        while let Some(event) = self.next_event().await {
            match event {
                Event::Record(rec) => records.push(rec),
                Event::Error(err) => errors.push(err),
            }
        }
        self.done().await;

        (records, errors)
    }

    /// Cancel, then discard everything still produced.
    /// Returns the number of ignored records and errors.
    pub async fn cancel_and_drain(&mut self) -> (u64, u64) {
        self.cancel();

        let (mut records, mut errors) = (0, 0);
        while let Some(event) = self.next_event().await {
            match event {
                Event::Record(_) => records += 1,
                Event::Error(_) => errors += 1,
            }
        }
        self.done().await;

        if records != 0 || errors != 0 {
            tracing::debug!(records, errors, "ignored frames after cancel");
        }
        (records, errors)
    }
}

impl fmt::Display for ResultReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.handle(), f)
    }
}

/// Cloneable view of a result's signals, counters and statistics
#[derive(Clone)]
pub struct ResultHandle {
    shared: Arc<Shared>,
}

impl ResultHandle {
    pub fn cancel(&self) {
        self.shared.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub fn is_done(&self) -> bool {
        self.shared.is_done()
    }

    pub fn stat(&self) -> Option<Stat> {
        self.shared.stat.lock().clone()
    }

    pub fn records_reported(&self) -> u64 {
        self.shared.records.load(Ordering::Acquire)
    }

    pub fn errors_reported(&self) -> u64 {
        self.shared.errors.load(Ordering::Acquire)
    }
}

impl fmt::Display for ResultHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Result{{records:{}, errors:{}, done:{}, cancelled:{}, stat:",
            self.records_reported(),
            self.errors_reported(),
            self.is_done(),
            self.is_cancelled()
        )?;
        match self.stat() {
            Some(stat) => write!(f, "{}}}", stat),
            None => write!(f, "<nil>}}"),
        }
    }
}
