//! Streaming Responses
//!
//! A pump task drains a search result, encodes every frame into a small
//! buffer and hands the bytes to the response body.
//!
//! ```text
//!   ResultReceiver ──▶ pump task ──▶ AnyEncoder<Vec<u8>> ──▶ mpsc ──▶ Body
//!          ▲                                                   │
//!          └──────────── cancel when the client is gone ───────┘
//! ```

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue};
use axum::response::Response;
use futures_util::stream;
use tokio::sync::mpsc;

use crate::codec::{AnyEncoder, CodecResult, Encoder, Format, Layout};
use crate::search::{Event, ResultReceiver};

/// Encoded chunks buffered between the pump task and the connection
const CHUNKS_CAPACITY: usize = 16;

type Chunk = Result<Bytes, std::io::Error>;

/// Build a response streaming `result` in the requested format and layout
pub fn respond(result: ResultReceiver, format: Format, layout: Layout, stats: bool) -> Response {
    let (tx, rx) = mpsc::channel::<Chunk>(CHUNKS_CAPACITY);
    tokio::spawn(pump(result, AnyEncoder::new(format, layout, Vec::new()), stats, tx));

    let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }));

    let mut response = Response::new(body);
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(format.mime()));
    response
}

async fn pump(
    mut result: ResultReceiver,
    mut enc: AnyEncoder<Vec<u8>>,
    stats: bool,
    tx: mpsc::Sender<Chunk>,
) {
    loop {
        let event = tokio::select! {
            event = result.next_event() => event,
            _ = tx.closed() => {
                abort(&mut result, &tx, PumpError::Disconnected).await;
                return;
            }
        };
        let Some(event) = event else { break };

        let encoded = match event {
            Event::Record(rec) => enc.encode_record(Some(rec)),
            Event::Error(err) => enc.encode_error(Some(err)),
        };
        if let Err(e) = flush(encoded, &mut enc, &tx).await {
            abort(&mut result, &tx, e).await;
            return;
        }
    }

    result.done().await;
    let stat = result.stat().filter(|_| stats);
    let closed = enc.encode_stat(stat).and_then(|_| enc.close());
    if let Err(e) = flush(closed, &mut enc, &tx).await {
        abort(&mut result, &tx, e).await;
        return;
    }

    tracing::debug!(
        records = result.records_reported(),
        errors = result.errors_reported(),
        "response complete"
    );
}

enum PumpError {
    Encode(crate::codec::CodecError),
    Disconnected,
}

/// Hand whatever the encoder buffered to the body
async fn flush(
    encoded: CodecResult<()>,
    enc: &mut AnyEncoder<Vec<u8>>,
    tx: &mpsc::Sender<Chunk>,
) -> Result<(), PumpError> {
    encoded.map_err(PumpError::Encode)?;

    let buf = std::mem::take(enc.get_mut());
    if buf.is_empty() {
        return Ok(());
    }
    tx.send(Ok(Bytes::from(buf)))
        .await
        .map_err(|_| PumpError::Disconnected)
}

async fn abort(result: &mut ResultReceiver, tx: &mpsc::Sender<Chunk>, err: PumpError) {
    match err {
        PumpError::Disconnected => tracing::debug!("client disconnected, cancelling {}", result),
        PumpError::Encode(e) => {
            tracing::error!("failed to encode response: {}", e);
            let _ = tx.send(Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))).await;
        }
    }

    let (records, errors) = result.cancel_and_drain().await;
    tracing::debug!(records, errors, "ignored after abort");
}
