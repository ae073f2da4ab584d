//! Peer Request URLs
//!
//! Query keys are emitted in lexicographic order with repeated keys kept
//! in insertion order, which is what the peer's parser expects.

use reqwest::Url;
use std::collections::BTreeMap;

use super::options::PeerOptions;
use crate::search::SearchConfig;

/// Streaming endpoints of a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Search,
    Count,
    Show,
    PcapSearch,
    PcapCount,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Search => "/search",
            Endpoint::Count => "/count",
            Endpoint::Show => "/search/show",
            Endpoint::PcapSearch => "/pcap/search",
            Endpoint::PcapCount => "/pcap/count",
        }
    }

    /// Name of the input files key; the count endpoint still uses the
    /// legacy plural
    fn files_key(self) -> &'static str {
        match self {
            Endpoint::Count => "files",
            _ => "file",
        }
    }
}

/// Ordered query string builder
#[derive(Default)]
struct Query(BTreeMap<&'static str, Vec<String>>);

impl Query {
    fn set(&mut self, key: &'static str, value: impl ToString) {
        self.0.entry(key).or_default().push(value.to_string());
    }

    fn set_if(&mut self, cond: bool, key: &'static str, value: impl ToString) {
        if cond {
            self.set(key, value);
        }
    }

    fn encode(&self) -> String {
        let mut parts = Vec::new();
        for (key, values) in &self.0 {
            for value in values {
                parts.push(format!("{}={}", key, urlencoding::encode(value)));
            }
        }
        parts.join("&")
    }
}

fn with_path(base: &Url, path: &str, query: &Query) -> Url {
    let mut url = base.clone();
    let joined = format!("{}{}", base.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url.set_query(Some(&query.encode()));
    url
}

/// URL of a streaming request
pub fn search_url(opts: &PeerOptions, endpoint: Endpoint, cfg: &SearchConfig) -> Url {
    let mut q = Query::default();

    q.set("cs", cfg.case_sensitive);
    q.set("ep", true);
    for file in &cfg.files {
        q.set(endpoint.files_key(), file);
    }
    q.set("format", if cfg.report_data { "raw" } else { "null" });
    q.set_if(cfg.fuzziness > 0, "fuzziness", cfg.fuzziness);
    if let Some(index) = &cfg.keep_index_as {
        q.set("index", index);
    }
    if let Some(data) = &cfg.keep_data_as {
        q.set("data", data);
    }
    if let Some(delim) = &cfg.delimiter {
        q.set("delimiter", delim);
    }
    q.set_if(cfg.limit > 0, "limit", cfg.limit);
    q.set("local", opts.local_only);
    if let Some(mode) = &cfg.mode {
        q.set("mode", mode);
    }
    q.set_if(cfg.nodes > 0, "nodes", cfg.nodes);
    q.set_if(cfg.offset > 0, "offset", cfg.offset);
    q.set("query", &cfg.query);
    q.set("stats", !opts.skip_stat);
    q.set("stream", true);
    q.set_if(cfg.surrounding > 0, "surrounding", cfg.surrounding);

    with_path(&opts.server_url, endpoint.path(), &q)
}

/// URL of a directory listing request
pub fn files_url(opts: &PeerOptions, path: &str, hidden: bool) -> Url {
    let mut q = Query::default();
    q.set("dir", path);
    q.set_if(hidden, "hidden", true);
    q.set("local", opts.local_only);

    with_path(&opts.server_url, "/files", &q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Options;
    use serde_json::json;

    fn peer(v: serde_json::Value) -> PeerOptions {
        let opts: Options = v.as_object().cloned().unwrap();
        PeerOptions::from_options(&opts).unwrap()
    }

    #[test]
    fn test_search_url() {
        let opts = peer(json!({"server-url": "http://host:1234"}));
        let mut cfg = SearchConfig::new("(RAW_TEXT CONTAINS \"a b\")", ["1.txt", "2.txt"]);
        cfg.fuzziness = 1;
        cfg.surrounding = 10;

        let url = search_url(&opts, Endpoint::Search, &cfg);
        assert_eq!(url.path(), "/search");
        assert_eq!(
            url.query().unwrap(),
            "cs=true&ep=true&file=1.txt&file=2.txt&format=raw&fuzziness=1&local=false\
             &query=%28RAW_TEXT%20CONTAINS%20%22a%20b%22%29&stats=true&stream=true&surrounding=10"
        );
    }

    #[test]
    fn test_count_url_uses_legacy_files_key() {
        let opts = peer(json!({"local-only": true, "skip-stat": true}));
        let cfg = SearchConfig::new("hello", ["a.txt"]).count_only();

        let url = search_url(&opts, Endpoint::Count, &cfg);
        assert_eq!(url.path(), "/count");
        assert_eq!(
            url.query().unwrap(),
            "cs=true&ep=true&files=a.txt&format=null&local=true&query=hello&stats=false&stream=true"
        );
    }

    #[test]
    fn test_optional_keys() {
        let opts = peer(json!({}));
        let mut cfg = SearchConfig::new("q", Vec::<String>::new()).limit(7);
        cfg.mode = Some("fhs".into());
        cfg.nodes = 2;
        cfg.keep_data_as = Some("out.dat".into());
        cfg.keep_index_as = Some("out.txt".into());

        let query = search_url(&opts, Endpoint::PcapSearch, &cfg).query().unwrap().to_string();
        for key in ["data=out.dat", "index=out.txt", "limit=7", "mode=fhs", "nodes=2"] {
            assert!(query.contains(key), "{} missing in {}", key, query);
        }
    }

    #[test]
    fn test_base_path_is_kept() {
        let opts = peer(json!({"server-url": "http://host/api/"}));
        let url = search_url(&opts, Endpoint::Show, &SearchConfig::default());
        assert_eq!(url.path(), "/api/search/show");
    }

    #[test]
    fn test_files_url() {
        let opts = peer(json!({}));
        let url = files_url(&opts, "/foo bar", false);
        assert_eq!(url.path(), "/files");
        assert_eq!(url.query().unwrap(), "dir=%2Ffoo%20bar&local=false");

        let url = files_url(&opts, "/", true);
        assert_eq!(url.query().unwrap(), "dir=%2F&hidden=true&local=false");
    }
}
