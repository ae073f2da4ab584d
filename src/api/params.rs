//! Request Parameters
//!
//! Query strings of the streaming endpoints, extracted as ordered
//! key/value pairs so repeated keys (`file`) are kept.

use std::collections::HashMap;
use std::str::FromStr;

use super::error::{ApiError, ApiResult};
use crate::codec::Layout;
use crate::search::SearchConfig;

/// Decoded query string; repeated keys keep their order
#[derive(Debug, Default)]
pub struct QueryParams(HashMap<String, Vec<String>>);

impl From<Vec<(String, String)>> for QueryParams {
    fn from(pairs: Vec<(String, String)>) -> Self {
        let mut params: HashMap<String, Vec<String>> = HashMap::new();
        for (key, value) in pairs {
            params.entry(key).or_default().push(value);
        }
        Self(params)
    }
}

impl QueryParams {
    pub fn first(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn all(&self, key: &str) -> impl Iterator<Item = &str> {
        self.0.get(key).into_iter().flatten().map(String::as_str)
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.first(key).filter(|s| !s.is_empty()).map(str::to_string)
    }

    pub fn flag(&self, key: &str, default: bool) -> ApiResult<bool> {
        match self.first(key) {
            None => Ok(default),
            Some("") | Some("1") | Some("true") => Ok(true),
            Some("0") | Some("false") => Ok(false),
            Some(other) => Err(ApiError::Validation(format!(
                "failed to parse {:?} flag: {:?}",
                key, other
            ))),
        }
    }

    pub fn number<T: FromStr>(&self, key: &str) -> ApiResult<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        match self.first(key).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(s) => s.parse().map(Some).map_err(|e| {
                ApiError::Validation(format!("failed to parse {:?} value {:?}: {}", key, s, e))
            }),
        }
    }
}

/// A streaming request: the search configuration plus response options
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub cfg: SearchConfig,
    /// Tag-framed stream instead of a batch document
    pub stream: bool,
    /// Records-only batch document
    pub spark: bool,
    /// Include statistics in the response
    pub stats: bool,
}

impl SearchRequest {
    pub fn parse(params: &QueryParams) -> ApiResult<Self> {
        let mut cfg = SearchConfig {
            query: params.first("query").unwrap_or_default().to_string(),
            files: params
                .all("file")
                .chain(params.all("files"))
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect(),
            mode: params.string("mode"),
            case_sensitive: params.flag("cs", true)?,
            ..Default::default()
        };

        cfg.report_data = params.first("format") != Some("null");
        cfg.surrounding = params.number("surrounding")?.unwrap_or(0);
        cfg.fuzziness = params.number("fuzziness")?.unwrap_or(0);
        cfg.nodes = params.number("nodes")?.unwrap_or(0);
        cfg.limit = params.number("limit")?.unwrap_or(0);
        cfg.offset = params.number("offset")?.unwrap_or(0);
        cfg.keep_index_as = params.string("index");
        cfg.keep_data_as = params.string("data");
        cfg.delimiter = params.string("delimiter");

        Ok(Self {
            cfg,
            stream: params.flag("stream", false)?,
            spark: params.flag("spark", false)?,
            stats: params.flag("stats", true)?,
        })
    }

    pub fn layout(&self) -> Layout {
        if self.spark {
            Layout::Array
        } else if self.stream {
            Layout::Stream
        } else {
            Layout::Simple
        }
    }
}
