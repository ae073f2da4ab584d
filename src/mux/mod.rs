//! Fan-Out Multiplexer
//!
//! Runs one logical query on several child backends in parallel and merges
//! their results into one stream. The multiplexer is itself a backend, so
//! multiplexers can be nested.
//!
//! # Options
//!
//! - `backends`: list of `{"name": ..., "options": {...}}` children, each
//!   created through the registry
//! - `index-host`: host attributed to the merged statistics

mod files;
mod search;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::search::{
    channel, registry, Backend, DirInfo, Options, OptionsExt, ResultReceiver, SearchConfig,
    SearchError, SearchResult,
};
use search::{Child, MuxTask};

/// Registry name of the multiplexer
pub const NAME: &str = "mux";

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> String {
    format!("mux-{:08x}", NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

/// Streaming operation being fanned out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Search,
    PcapSearch,
    Show,
    Count,
}

impl Op {
    fn start(self, backend: &dyn Backend, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        match self {
            Op::Search => backend.search(cfg),
            Op::PcapSearch => backend.pcap_search(cfg),
            Op::Show => backend.show(cfg),
            Op::Count => backend.count(cfg),
        }
    }
}

/// Backend merging the results of its children
pub struct MuxBackend {
    backends: Vec<Arc<dyn Backend>>,
    overrides: HashMap<usize, SearchConfig>,
    index_host: String,
}

impl MuxBackend {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        Self {
            backends,
            overrides: HashMap::new(),
            index_host: String::new(),
        }
    }

    /// Host attributed to the merged statistics
    pub fn index_host(mut self, host: impl Into<String>) -> Self {
        self.index_host = host.into();
        self
    }

    /// Use `cfg` instead of the caller's configuration for the child at `index`
    pub fn with_override(mut self, index: usize, cfg: SearchConfig) -> Self {
        self.overrides.insert(index, cfg);
        self
    }

    pub fn backends(&self) -> &[Arc<dyn Backend>] {
        &self.backends
    }

    fn child_config<'a>(&'a self, index: usize, cfg: &'a SearchConfig) -> &'a SearchConfig {
        self.overrides.get(&index).unwrap_or(cfg)
    }

    fn fan_out(&self, op: Op, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        if let [only] = self.backends.as_slice() {
            return op.start(only.as_ref(), self.child_config(0, cfg));
        }

        let id = next_task_id();
        tracing::debug!(task = %id, op = ?op, children = self.backends.len(), "starting {}", cfg);

        let mut children = Vec::with_capacity(self.backends.len());
        let mut start_errors = Vec::new();
        for (i, backend) in self.backends.iter().enumerate() {
            match op.start(backend.as_ref(), self.child_config(i, cfg)) {
                Ok(result) => children.push(Child {
                    name: backend.to_string(),
                    result,
                }),
                Err(err @ SearchError::BackendStartFailed(_)) => start_errors.push(err),
                Err(err) => {
                    start_errors.push(SearchError::BackendStartFailed(format!("{}: {}", backend, err)))
                }
            }
        }

        let (tx, rx) = channel();
        let task = MuxTask {
            id,
            tx,
            children,
            start_errors,
            limit: cfg.limit,
            index_host: self.index_host.clone(),
        };
        tokio::spawn(task.run());
        Ok(rx)
    }
}

/// Build a multiplexer and its children from an option mapping
pub fn factory(opts: &Options) -> SearchResult<Arc<dyn Backend>> {
    let entries = match opts.get("backends") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => {
            return Err(SearchError::config("backends", format!("expected list, found {}", other)))
        }
    };

    let mut backends = Vec::with_capacity(entries.len());
    for entry in &entries {
        let Some(child) = entry.as_object() else {
            return Err(SearchError::config("backends", format!("expected object, found {}", entry)));
        };
        let name = child
            .get_string("name")?
            .ok_or_else(|| SearchError::config("backends", "backend name is missing"))?;
        let child_opts = match child.get("options") {
            None | Some(Value::Null) => Options::new(),
            Some(Value::Object(o)) => o.clone(),
            Some(other) => {
                return Err(SearchError::config("options", format!("expected object, found {}", other)))
            }
        };
        backends.push(registry::create(&name, &child_opts)?);
    }

    let mut mux = MuxBackend::new(backends);
    if let Some(host) = opts.get_string("index-host")? {
        mux = mux.index_host(host);
    }
    Ok(Arc::new(mux))
}

impl fmt::Display for MuxBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mux{{backends:[")?;
        for (i, b) in self.backends.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", b)?;
        }
        write!(f, "]}}")
    }
}

#[async_trait]
impl Backend for MuxBackend {
    fn name(&self) -> &str {
        NAME
    }

    fn options(&self) -> Options {
        let children: Vec<Value> = self
            .backends
            .iter()
            .map(|b| json!({"name": b.name(), "options": b.options()}))
            .collect();

        let mut opts = Options::new();
        opts.insert("backends".into(), Value::Array(children));
        if !self.index_host.is_empty() {
            opts.insert("index-host".into(), Value::String(self.index_host.clone()));
        }
        opts
    }

    fn search(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        self.fan_out(Op::Search, cfg)
    }

    fn pcap_search(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        self.fan_out(Op::PcapSearch, cfg)
    }

    fn show(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        self.fan_out(Op::Show, cfg)
    }

    fn count(&self, cfg: &SearchConfig) -> SearchResult<ResultReceiver> {
        self.fan_out(Op::Count, cfg)
    }

    async fn files(&self, path: &str, hidden: bool) -> SearchResult<DirInfo> {
        self.list(path, hidden).await
    }
}
