//! Peer Streaming Search
//!
//! Issues the HTTP request, then drives a stream decoder over the
//! response body on a blocking thread, feeding the local result.
//!
//! ```text
//!   tokio task                       blocking thread
//!   GET /search ──▶ body stream ──▶ SyncIoBridge ──▶ decoder ──▶ ResultSender
//!                   (ends on cancel)
//! ```

use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use std::io;
use tokio_util::io::{StreamReader, SyncIoBridge};

use super::options::PeerOptions;
use crate::codec::{AnyDecoder, CodecError, StreamDecoder, Tag};
use crate::search::{Record, ResultSender, SearchError, Stat};

/// One in-flight streaming request
pub(super) struct StreamTask {
    pub client: Client,
    pub url: Url,
    pub opts: PeerOptions,
}

impl StreamTask {
    pub async fn run(self, tx: ResultSender) {
        let mut request = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, self.opts.format.mime());
        if let Some(token) = &self.opts.auth_token {
            request = request.header(AUTHORIZATION, token);
        }

        let cancel = tx.cancel_token();
        let response = tokio::select! {
            response = request.send() => response,
            _ = cancel.cancelled() => {
                tracing::debug!(url = %self.url, "peer request cancelled before response");
                tx.report_done();
                return;
            }
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %self.url, "failed to send HTTP request: {}", e);
                let _ = tx.report_error(SearchError::TransportFailed(e.to_string())).await;
                tx.report_done();
                return;
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            let _ = tx.report_error(status_error(status)).await;
            tx.report_done();
            return;
        }

        // dropping the body stream on cancel aborts the request
        let body = response
            .bytes_stream()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .take_until(async move { cancel.cancelled().await });
        let reader = SyncIoBridge::new(StreamReader::new(Box::pin(body)));

        let format = self.opts.format;
        let index_host = self.opts.index_host.clone();
        let url = self.url;

        let decoding = tokio::task::spawn_blocking(move || {
            let decoder = AnyDecoder::new(format, reader);
            decode_stream(decoder, &tx, &index_host);
            tracing::debug!(url = %url, records = tx.records_reported(), errors = tx.errors_reported(), "peer stream finished");
            tx.report_done();
        });

        if let Err(e) = decoding.await {
            tracing::error!("peer decoder task failed: {}", e);
        }
    }
}

pub(super) fn status_error(status: StatusCode) -> SearchError {
    SearchError::ProtocolStatusBad {
        status: status.as_u16(),
        message: status.canonical_reason().unwrap_or("unknown").to_string(),
    }
}

/// Read frames until EOF, the first error, or cancellation.
/// Runs on a blocking thread.
pub(super) fn decode_stream<D: StreamDecoder>(mut decoder: D, tx: &ResultSender, index_host: &str) {
    while !tx.is_cancelled() {
        let tag = match decoder.next_tag() {
            Ok(tag) => tag,
            Err(_) if tx.is_cancelled() => break,
            Err(CodecError::BadTag(tag)) => {
                fail(tx, SearchError::BadTag(tag));
                break;
            }
            Err(e) => {
                fail(tx, decode_error("next tag", e));
                break;
            }
        };

        let delivered = match tag {
            Tag::Rec => match decoder.next::<Record>() {
                Ok(mut rec) => {
                    if !index_host.is_empty() {
                        rec.index.host = Some(index_host.to_string());
                    }
                    tx.blocking_report_record(rec)
                }
                Err(e) => {
                    fail(tx, decode_error("record", e));
                    break;
                }
            },
            Tag::Err => match decoder.next::<String>() {
                Ok(msg) => tx.blocking_report_error(SearchError::Remote(msg)),
                Err(e) => {
                    fail(tx, decode_error("error", e));
                    break;
                }
            },
            Tag::Stat => match decoder.next::<Stat>() {
                Ok(mut stat) => {
                    if !index_host.is_empty() {
                        stat.host = Some(index_host.to_string());
                    }
                    tx.set_stat(stat);
                    Ok(())
                }
                Err(e) => {
                    fail(tx, decode_error("statistics", e));
                    break;
                }
            },
            Tag::Eof => break,
        };

        if delivered.is_err() {
            // consumer is gone
            break;
        }
    }
}

/// Report a terminal error unless the stream was cut by cancellation
fn fail(tx: &ResultSender, err: SearchError) {
    if tx.is_cancelled() {
        return;
    }
    tracing::debug!("peer stream failed: {}", err);
    let _ = tx.blocking_report_error(err);
}

fn decode_error(what: &'static str, e: CodecError) -> SearchError {
    SearchError::PayloadDecodeFailed {
        what,
        reason: e.to_string(),
    }
}
