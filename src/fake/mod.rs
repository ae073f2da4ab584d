//! Fake Backend
//!
//! In-process backend producing a configurable number of records and
//! errors. Used by tests, benchmarks and to run the server without a real
//! search engine behind it.
//!
//! # Options
//!
//! - `records`, `errors`: frames reported per search
//! - `latency-ms`: delay before each frame
//! - `start-error`: refuse to start searches with this message
//! - `no-stat`: do not set statistics
//! - `host`: host attributed to records, statistics and listings
//! - `files`, `dirs`, `catalog`: listing content
//! - `files-error`: fail listings with this message
//! - `path-suffix`: appended to the listed path

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::search::{
    channel, Backend, DirInfo, Index, NodeInfo, Options, OptionsExt, Record, ResultReceiver,
    ResultSender, SearchConfig, SearchError, SearchResult, Stat,
};

/// Registry name of the fake backend
pub const NAME: &str = "fake";

/// Deterministic in-process backend
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    pub records: u64,
    pub errors: u64,
    pub latency: Duration,
    pub start_error: Option<String>,
    pub no_stat: bool,
    pub host: String,

    pub files: Vec<String>,
    pub dirs: Vec<String>,
    pub catalog: Option<String>,
    pub files_error: Option<String>,
    pub path_suffix: String,
}

impl FakeBackend {
    /// Backend reporting `records` records and `errors` errors per search
    pub fn new(records: u64, errors: u64) -> Self {
        Self {
            records,
            errors,
            ..Default::default()
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn start_error(mut self, msg: impl Into<String>) -> Self {
        self.start_error = Some(msg.into());
        self
    }

    pub fn listing<F, D>(mut self, files: F, dirs: D) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self.dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    pub fn path_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.path_suffix = suffix.into();
        self
    }

    pub fn files_error(mut self, msg: impl Into<String>) -> Self {
        self.files_error = Some(msg.into());
        self
    }

    /// Parse an option mapping
    pub fn from_options(opts: &Options) -> SearchResult<Self> {
        Ok(Self {
            records: opts.get_u64("records")?.unwrap_or(0),
            errors: opts.get_u64("errors")?.unwrap_or(0),
            latency: Duration::from_millis(opts.get_u64("latency-ms")?.unwrap_or(0)),
            start_error: opts.get_string("start-error")?,
            no_stat: opts.get_bool("no-stat")?.unwrap_or(false),
            host: opts.get_string("host")?.unwrap_or_default(),
            files: string_list(opts, "files")?,
            dirs: string_list(opts, "dirs")?,
            catalog: opts.get_string("catalog")?,
            files_error: opts.get_string("files-error")?,
            path_suffix: opts.get_string("path-suffix")?.unwrap_or_default(),
        })
    }

    async fn produce(self, cfg: SearchConfig, tx: ResultSender) {
        let started = Instant::now();
        let file = cfg.files.first().cloned().unwrap_or_else(|| "fake.txt".to_string());
        let total = self.records + self.errors;

        let (mut records, mut errors, mut bytes) = (0u64, 0u64, 0u64);
        for i in 0..total {
            if tx.is_cancelled() {
                tracing::debug!(host = %self.host, records, errors, "fake search cancelled");
                break;
            }
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            // spread errors evenly between records
            let error_due = errors < self.errors && (errors * total <= i * self.errors || records == self.records);

            let sent = if error_due {
                errors += 1;
                tx.report_error(SearchError::remote(format!("{}error-{}", self.host_prefix(), errors)))
                    .await
            } else {
                let data = format!("{}record-{}", self.host_prefix(), records);
                let mut index = Index::new(file.as_str(), records * 100, data.len() as u64);
                index.update_host(&self.host);
                bytes += data.len() as u64;
                records += 1;
                if cfg.report_index {
                    let payload = if cfg.report_data { data.into_bytes() } else { Vec::new() };
                    tx.report_record(Record::new(index, payload)).await
                } else {
                    Ok(())
                }
            };

            if sent.is_err() {
                break;
            }
        }

        if !self.no_stat {
            let elapsed = started.elapsed().as_micros() as u64;
            let mut stat = Stat::leaf(records, bytes, elapsed, elapsed);
            stat.host = (!self.host.is_empty()).then(|| self.host.clone());
            tx.set_stat(stat);
        }
        tx.report_done();
    }

    fn host_prefix(&self) -> String {
        if self.host.is_empty() {
            String::new()
        } else {
            format!("{}:", self.host)
        }
    }
}

fn string_list(opts: &Options, key: &str) -> SearchResult<Vec<String>> {
    match opts.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SearchError::config(key, format!("expected string, found {}", v)))
            })
            .collect(),
        Some(other) => Err(SearchError::config(key, format!("expected list, found {}", other))),
    }
}

/// Registry factory
pub fn factory(opts: &Options) -> SearchResult<Arc<dyn Backend>> {
    Ok(Arc::new(FakeBackend::from_options(opts)?))
}

impl fmt::Display for FakeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fake{{records:{}, errors:{}", self.records, self.errors)?;
        if !self.host.is_empty() {
            write!(f, ", host:{}", self.host)?;
        }
        write!(f, "}}")
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn options(&self) -> Options {
        let mut opts = Options::new();
        opts.insert("records".into(), Value::from(self.records));
        opts.insert("errors".into(), Value::from(self.errors));
        opts.insert("latency-ms".into(), Value::from(self.latency.as_millis() as u64));
        opts.insert("no-stat".into(), Value::from(self.no_stat));
        opts.insert("host".into(), Value::from(self.host.as_str()));
        opts
    }

    fn search(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        if let Some(msg) = &self.start_error {
            return Err(SearchError::BackendStartFailed(msg.clone()));
        }

        let (tx, rx) = channel();
        tokio::spawn(self.clone().produce(cfg.clone(), tx));
        Ok(rx)
    }

    async fn files(&self, path: &str, _hidden: bool) -> SearchResult<DirInfo> {
        if let Some(msg) = &self.files_error {
            return Err(SearchError::remote(msg.clone()));
        }

        let mut info = DirInfo::new(&format!("{}{}", path, self.path_suffix));
        info.catalog = self.catalog.clone();
        for name in &self.files {
            info.add_file(name.as_str());
            if !self.host.is_empty() {
                info.add_details(&self.host, name, NodeInfo { kind: "file".into(), ..Default::default() });
            }
        }
        for name in &self.dirs {
            info.add_dir(name.as_str());
            if !self.host.is_empty() {
                info.add_details(&self.host, name, NodeInfo { kind: "dir".into(), ..Default::default() });
            }
        }
        Ok(info)
    }
}
