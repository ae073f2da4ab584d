//! Search Fan-Out
//!
//! One task per child copies frames into the merged result; a coordinator
//! waits for the children, propagates cancellation and composes the
//! statistics.
//!
//! ```text
//!   child 0 ──▶ drain task ─┐
//!   child 1 ──▶ drain task ─┼──▶ merged result
//!   child N ──▶ drain task ─┘        ▲
//!                                    │ stat, done
//!   coordinator ─ cancel ─▶ children ┘
//! ```

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::search::{Event, ResultHandle, ResultReceiver, ResultSender, SearchError, Stat};

/// A started child search
pub(super) struct Child {
    pub name: String,
    pub result: ResultReceiver,
}

/// State of one merged query
pub(super) struct MuxTask {
    pub id: String,
    pub tx: ResultSender,
    pub children: Vec<Child>,
    pub start_errors: Vec<SearchError>,
    pub limit: u64,
    pub index_host: String,
}

/// Shared by the drain tasks of one query
struct Forwarder {
    id: String,
    tx: Arc<ResultSender>,
    forwarded: AtomicU64,
    limit: u64,
}

impl MuxTask {
    pub async fn run(self) {
        let MuxTask {
            id,
            tx,
            children,
            start_errors,
            limit,
            index_host,
        } = self;

        for err in start_errors {
            tracing::warn!(task = %id, "{}", err);
            let _ = tx.report_error(err).await;
        }

        let cancel = tx.cancel_token();
        let forwarder = Arc::new(Forwarder {
            id: id.clone(),
            tx: Arc::new(tx),
            forwarded: AtomicU64::new(0),
            limit,
        });

        let handles: Vec<ResultHandle> = children.iter().map(|c| c.result.handle()).collect();
        let mut stats: Vec<Option<Stat>> = vec![None; children.len()];

        let mut pending: FuturesUnordered<_> = children
            .into_iter()
            .enumerate()
            .map(|(i, child)| {
                let forwarder = Arc::clone(&forwarder);
                tokio::spawn(async move { (i, forwarder.drain(child).await) })
            })
            .collect();

        let mut children_cancelled = false;
        loop {
            tokio::select! {
                joined = pending.next() => match joined {
                    Some(Ok((i, stat))) => stats[i] = stat,
                    Some(Err(e)) => tracing::error!(task = %id, "child drain task failed: {}", e),
                    None => break,
                },
                _ = cancel.cancelled(), if !children_cancelled => {
                    children_cancelled = true;
                    tracing::debug!(task = %id, "cancelling {} children", handles.len());
                    for child in &handles {
                        child.cancel();
                    }
                }
            }
        }

        let merged = stats
            .iter()
            .flatten()
            .fold(Stat::default(), |acc, s| acc.merge(s));
        let merged = attribute(merged, &index_host);

        let Forwarder { tx, .. } = match Arc::try_unwrap(forwarder) {
            Ok(f) => f,
            Err(_) => {
                tracing::error!(task = %id, "merged result still shared after all children finished");
                return;
            }
        };
        let tx = match Arc::try_unwrap(tx) {
            Ok(tx) => tx,
            Err(_) => return,
        };

        tracing::debug!(
            task = %id,
            records = tx.records_reported(),
            errors = tx.errors_reported(),
            "merged search finished"
        );
        tx.set_stat(merged);
        tx.report_done();
    }
}

impl Forwarder {
    /// Copy one child's frames into the merged result until the child is
    /// exhausted; returns the child's statistics.
    async fn drain(&self, mut child: Child) -> Option<Stat> {
        tracing::debug!(task = %self.id, backend = %child.name, "child started");
        let mut consumer_gone = false;

        while let Some(event) = child.result.next_event().await {
            if consumer_gone {
                continue;
            }

            let sent = match event {
                Event::Record(rec) => {
                    if self.limit > 0 {
                        let n = self.forwarded.fetch_add(1, Ordering::AcqRel) + 1;
                        if n > self.limit {
                            continue;
                        }
                        let sent = self.tx.report_record(rec).await;
                        if n == self.limit {
                            tracing::debug!(task = %self.id, limit = self.limit, "record limit reached");
                            self.tx.cancel_token().cancel();
                        }
                        sent
                    } else {
                        self.tx.report_record(rec).await
                    }
                }
                Event::Error(err) => self.tx.report_error(err).await,
            };

            if sent.is_err() {
                // nobody reads the merged result, stop the child and discard
                consumer_gone = true;
                child.result.cancel();
            }
        }

        child.result.done().await;
        tracing::debug!(
            task = %self.id,
            backend = %child.name,
            records = child.result.records_reported(),
            errors = child.result.errors_reported(),
            "child finished"
        );
        child.result.stat()
    }
}

/// Attribute merged statistics to the multiplexer's host, keeping a lone
/// child's host in `details`
fn attribute(stat: Stat, host: &str) -> Stat {
    if host.is_empty() {
        return stat;
    }
    if stat.details.is_empty() && !stat.is_empty() {
        let leaf = stat.clone();
        return Stat {
            details: vec![leaf],
            host: Some(host.to_string()),
            ..stat
        };
    }
    Stat {
        host: Some(host.to_string()),
        ..stat
    }
}
