//! Peer Backend Options

use reqwest::Url;
use serde_json::Value;

use crate::codec::Format;
use crate::search::{Options, OptionsExt, SearchError, SearchResult};

/// Default peer address
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8765";

/// Parsed options of a peer backend
#[derive(Debug, Clone)]
pub struct PeerOptions {
    /// Base URL of the peer
    pub server_url: Url,
    /// Forwarded verbatim as `Authorization`
    pub auth_token: Option<String>,
    /// Ask the peer not to fan out any further
    pub local_only: bool,
    /// Ask the peer not to produce statistics
    pub skip_stat: bool,
    /// Host written into every record and the statistics, empty for none
    pub index_host: String,
    /// Wire format requested from the peer
    pub format: Format,
    /// TCP connect timeout in seconds, 0 for none
    pub connect_timeout_secs: u64,
}

impl PeerOptions {
    /// Parse an option mapping; absent keys keep their defaults
    pub fn from_options(opts: &Options) -> SearchResult<Self> {
        let mut parsed = Self {
            server_url: Url::parse(DEFAULT_SERVER_URL).map_err(|e| SearchError::config("server-url", e))?,
            auth_token: None,
            local_only: false,
            skip_stat: false,
            index_host: String::new(),
            format: Format::Msgpack,
            connect_timeout_secs: 0,
        };
        parsed.update(opts)?;
        Ok(parsed)
    }

    /// Apply the keys present in `opts`
    pub fn update(&mut self, opts: &Options) -> SearchResult<()> {
        if let Some(url) = opts.get_string("server-url")? {
            self.server_url = Url::parse(&url).map_err(|e| SearchError::config("server-url", e))?;
        }
        if let Some(token) = opts.get_string("auth-token")? {
            self.auth_token = (!token.is_empty()).then_some(token);
        }
        if let Some(local) = opts.get_bool("local-only")? {
            self.local_only = local;
        }
        if let Some(skip) = opts.get_bool("skip-stat")? {
            self.skip_stat = skip;
        }
        if let Some(host) = opts.get_string("index-host")? {
            self.index_host = host;
        }
        if let Some(format) = opts.get_string("format")? {
            self.format = match format.as_str() {
                "json" => Format::Json,
                "msgpack" => Format::Msgpack,
                other => return Err(SearchError::config("format", format!("{:?} is not json or msgpack", other))),
            };
        }
        if let Some(secs) = opts.get_u64("connect-timeout")? {
            self.connect_timeout_secs = secs;
        }
        Ok(())
    }

    /// Effective options as a mapping
    pub fn to_options(&self) -> Options {
        let mut opts = Options::new();
        opts.insert("server-url".into(), Value::from(self.server_url.as_str()));
        opts.insert("auth-token".into(), Value::from(self.auth_token.clone().unwrap_or_default()));
        opts.insert("local-only".into(), Value::from(self.local_only));
        opts.insert("skip-stat".into(), Value::from(self.skip_stat));
        opts.insert("index-host".into(), Value::from(self.index_host.as_str()));
        opts.insert(
            "format".into(),
            Value::from(match self.format {
                Format::Json => "json",
                Format::Msgpack => "msgpack",
            }),
        );
        opts.insert("connect-timeout".into(), Value::from(self.connect_timeout_secs));
        opts
    }
}
