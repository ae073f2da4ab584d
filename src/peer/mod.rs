//! Remote Peer Backend
//!
//! Makes another instance of this service, reachable over HTTP, look like
//! a local backend. Streaming requests are decoded frame by frame into a
//! local result; directory listings are a single JSON document.
//!
//! # Options
//!
//! - `server-url` (default `http://localhost:8765`)
//! - `auth-token`: forwarded verbatim as `Authorization`
//! - `local-only`: sets the `local` query key
//! - `skip-stat`: clears the `stats` query key
//! - `index-host`: host written into every record and the statistics
//! - `format`: `msgpack` (default) or `json`
//! - `connect-timeout`: seconds, 0 for none

mod files;
mod options;
mod search;
mod url;

pub use options::{PeerOptions, DEFAULT_SERVER_URL};
pub use url::Endpoint;

use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::search::{
    channel, Backend, DirInfo, Options, ResultReceiver, SearchConfig, SearchError, SearchResult,
};
use search::StreamTask;

/// Registry name of the peer backend
pub const NAME: &str = "peer";

/// Backend talking to a remote peer
pub struct PeerBackend {
    opts: PeerOptions,
    client: Client,
}

impl PeerBackend {
    pub fn new(opts: PeerOptions) -> SearchResult<Self> {
        let mut builder = Client::builder();
        if opts.connect_timeout_secs > 0 {
            builder = builder.connect_timeout(Duration::from_secs(opts.connect_timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| SearchError::remote(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { opts, client })
    }

    pub fn peer_options(&self) -> &PeerOptions {
        &self.opts
    }

    fn start(&self, endpoint: Endpoint, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        let url = url::search_url(&self.opts, endpoint, cfg);
        tracing::debug!(url = %url, "starting peer request");

        let (tx, rx) = channel();
        let task = StreamTask {
            client: self.client.clone(),
            url,
            opts: self.opts.clone(),
        };
        tokio::spawn(task.run(tx));

        Ok(rx)
    }
}

/// Registry factory
pub fn factory(opts: &Options) -> SearchResult<Arc<dyn Backend>> {
    let opts = PeerOptions::from_options(opts)?;
    Ok(Arc::new(PeerBackend::new(opts)?))
}

impl fmt::Display for PeerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "peer{{url:{}, local:{}, stat:{}}}",
            self.opts.server_url, self.opts.local_only, !self.opts.skip_stat
        )
    }
}

#[async_trait]
impl Backend for PeerBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn options(&self) -> Options {
        self.opts.to_options()
    }

    fn search(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        let endpoint = if cfg.report_index { Endpoint::Search } else { Endpoint::Count };
        self.start(endpoint, cfg)
    }

    fn pcap_search(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        let endpoint = if cfg.report_index { Endpoint::PcapSearch } else { Endpoint::PcapCount };
        self.start(endpoint, cfg)
    }

    fn show(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        self.start(Endpoint::Show, cfg)
    }

    fn count(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        self.start(Endpoint::Count, &cfg.clone().count_only())
    }

    async fn files(&self, path: &str, hidden: bool) -> SearchResult<DirInfo> {
        self.list(path, hidden).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BinaryStreamEncoder, Encoder, TextStreamEncoder};
    use crate::search::{Index, Record, Stat};
    use axum::body::Body;
    use axum::extract::RawQuery;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::Router;
    use serde_json::json;
    use std::convert::Infallible;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn backend(url: &str, extra: serde_json::Value) -> PeerBackend {
        let mut opts = extra.as_object().cloned().unwrap();
        opts.insert("server-url".into(), json!(url));
        PeerBackend::new(PeerOptions::from_options(&opts).unwrap()).unwrap()
    }

    fn record(i: u64) -> Record {
        Record::new(Index::new("1.txt", i, 5).fuzziness(1), format!("{:05}", i))
    }

    #[derive(Clone, Copy)]
    enum Fault {
        None,
        BadTag,
        BadRecord,
        BadStat,
    }

    fn stream_body(records: u64, errors: u64, fault: Fault) -> Vec<u8> {
        let mut enc = BinaryStreamEncoder::new(Vec::new());
        for i in 0..records {
            enc.encode_record(Some(record(i))).unwrap();
            if i % 10 == 0 && i / 10 < errors {
                enc.encode_error(Some(format!("error-{}", i / 10))).unwrap();
            }
        }
        match fault {
            Fault::None => {}
            Fault::BadTag => enc.get_mut().push(0x7f),
            Fault::BadRecord => enc.get_mut().extend_from_slice(&[0x01, 0xa3, b'b', b'a', b'd']),
            Fault::BadStat => enc.get_mut().extend_from_slice(&[0x03, 0xa3, b'b', b'a', b'd']),
        }
        enc.encode_stat(Some(Stat::leaf(records, records * 5, 100, 50))).unwrap();
        enc.close().unwrap();
        enc.into_inner()
    }

    fn search_router(records: u64, errors: u64, fault: Fault) -> Router {
        Router::new().route(
            "/search",
            get(move |headers: HeaderMap| async move {
                assert_eq!(headers["accept"], "application/msgpack");
                stream_body(records, errors, fault)
            }),
        )
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_search_records_and_stat() {
        let url = spawn_server(search_router(1000, 100, Fault::None)).await;
        let peer = backend(&url, json!({"index-host": "peer-1"}));

        let mut res = peer.search(&SearchConfig::new("hello", ["1.txt"])).unwrap();
        let (records, errors) = res.drain().await;

        assert!(res.is_done());
        assert_eq!(records.len(), 1000);
        assert_eq!(errors.len(), 100);
        assert_eq!(res.records_reported(), 1000);
        assert_eq!(res.errors_reported(), 100);
        assert!(records.iter().all(|r| r.index.host.as_deref() == Some("peer-1")));
        assert_eq!(records[7].data, b"00007");

        let stat = res.stat().unwrap();
        assert_eq!(stat.matches, 1000);
        assert_eq!(stat.host.as_deref(), Some("peer-1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_search_text_format() {
        let router = Router::new().route(
            "/search",
            get(|headers: HeaderMap| async move {
                assert_eq!(headers["accept"], "application/json");
                let mut enc = TextStreamEncoder::new(Vec::new());
                enc.encode_record(Some(record(1))).unwrap();
                enc.encode_error(Some("oops")).unwrap();
                enc.encode_stat(Some(Stat::leaf(1, 5, 1, 1))).unwrap();
                enc.close().unwrap();
                enc.into_inner()
            }),
        );
        let url = spawn_server(router).await;
        let peer = backend(&url, json!({"format": "json"}));

        let mut res = peer.search(&SearchConfig::new("q", ["1.txt"])).unwrap();
        let (records, errors) = res.drain().await;
        assert_eq!(records, vec![record(1)]);
        assert_eq!(errors[0].to_string(), "oops");
        assert_eq!(res.stat().unwrap().matches, 1);
    }

    async fn single_error(fault: Fault) -> String {
        let url = spawn_server(search_router(10, 0, fault)).await;
        let peer = backend(&url, json!({}));

        let mut res = peer.search(&SearchConfig::new("q", ["1.txt"])).unwrap();
        let (records, errors) = res.drain().await;
        assert_eq!(records.len(), 10);
        assert_eq!(errors.len(), 1);
        assert!(res.stat().is_none());
        errors[0].to_string()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bad_tag() {
        assert!(single_error(Fault::BadTag).await.contains("unknown data tag"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bad_record() {
        assert!(single_error(Fault::BadRecord).await.contains("failed to decode record"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bad_stat() {
        assert!(single_error(Fault::BadStat).await.contains("failed to decode statistics"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_bad_status() {
        let url = spawn_server(Router::new()).await;
        let peer = backend(&url, json!({}));

        let mut res = peer.search(&SearchConfig::new("q", ["1.txt"])).unwrap();
        let (records, errors) = res.drain().await;
        assert!(records.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("invalid HTTP response status"));
        assert!(matches!(errors[0], SearchError::ProtocolStatusBad { status: 404, .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_connection_refused() {
        // bind and drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let peer = backend(&url, json!({}));
        let mut res = peer.search(&SearchConfig::new("q", ["1.txt"])).unwrap();
        let (_, errors) = res.drain().await;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("failed to send HTTP request"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_auth_and_count_path() {
        let router = Router::new().route(
            "/count",
            get(|headers: HeaderMap, RawQuery(query): RawQuery| async move {
                if headers.get("authorization").map(|v| v.as_bytes()) != Some(b"Bearer secret") {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                let query = query.unwrap_or_default();
                assert!(query.contains("files=a.txt"), "{}", query);
                assert!(query.contains("format=null"), "{}", query);

                let mut enc = BinaryStreamEncoder::new(Vec::new());
                enc.encode_stat(Some(Stat::leaf(42, 100, 1, 1))).unwrap();
                enc.close().unwrap();
                enc.into_inner().into_response()
            }),
        );
        let url = spawn_server(router).await;

        let peer = backend(&url, json!({"auth-token": "Bearer secret"}));
        let mut res = peer.count(&SearchConfig::new("q", ["a.txt"])).unwrap();
        let (records, errors) = res.drain().await;
        assert!(records.is_empty());
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(res.stat().unwrap().matches, 42);

        let anonymous = backend(&url, json!({}));
        let mut res = anonymous.count(&SearchConfig::new("q", ["a.txt"])).unwrap();
        let (_, errors) = res.drain().await;
        assert!(matches!(errors[0], SearchError::ProtocolStatusBad { status: 401, .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_aborts_stream() {
        let router = Router::new().route(
            "/search",
            get(|| async {
                let mut frame = Vec::new();
                let mut enc = BinaryStreamEncoder::new(&mut frame);
                enc.encode_record(Some(record(0))).unwrap();
                let chunk = bytes_chunk(frame);
                let endless = futures_util::stream::repeat_with(move || Ok::<_, Infallible>(chunk.clone()));
                Response::new(Body::from_stream(endless))
            }),
        );
        let url = spawn_server(router).await;
        let peer = backend(&url, json!({}));

        let mut res = peer.search(&SearchConfig::new("q", ["1.txt"])).unwrap();
        let mut seen = 0;
        while seen < 100 {
            if res.recv_record().await.is_some() {
                seen += 1;
            }
        }

        tokio::time::timeout(Duration::from_secs(10), res.cancel_and_drain())
            .await
            .unwrap();
        assert!(res.is_done());
        assert!(res.is_cancelled());
        assert_eq!(res.errors_reported(), 0);
    }

    fn bytes_chunk(frame: Vec<u8>) -> axum::body::Bytes {
        axum::body::Bytes::from(frame)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_files() {
        let router = Router::new().route(
            "/files",
            get(|RawQuery(query): RawQuery| async move {
                let query = query.unwrap_or_default();
                match query.as_str() {
                    "dir=%2Ffoo&local=false" => r#"{"dir":"/foo","files":["b.txt","a.txt"],"folders":["sub"]}"#,
                    _ => r#"{"dir":"/","files":[],"folders":[]} trailing"#,
                }
            }),
        );
        let url = spawn_server(router).await;
        let peer = backend(&url, json!({}));

        let info = peer.files("/foo", false).await.unwrap();
        assert_eq!(info.dir_path, "/foo");
        assert_eq!(info.files.iter().collect::<Vec<_>>(), vec!["a.txt", "b.txt"]);
        assert_eq!(info.dirs.len(), 1);

        let err = peer.files("/", false).await.unwrap_err();
        assert!(matches!(err, SearchError::PayloadDecodeFailed { .. }));
    }

    #[test]
    fn test_factory_and_display() {
        let opts = json!({"server-url": "http://peer:1234", "local-only": true})
            .as_object()
            .cloned()
            .unwrap();
        let peer = factory(&opts).unwrap();
        assert_eq!(peer.name(), "peer");
        assert_eq!(peer.to_string(), "peer{url:http://peer:1234/, local:true, stat:true}");
        assert_eq!(peer.options()["local-only"], json!(true));
    }
}
