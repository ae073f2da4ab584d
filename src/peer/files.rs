//! Peer Directory Listing

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;

use super::search::status_error;
use super::url::files_url;
use super::PeerBackend;
use crate::codec::MIME_JSON;
use crate::search::{DirInfo, SearchError, SearchResult};

impl PeerBackend {
    pub(super) async fn list(&self, path: &str, hidden: bool) -> SearchResult<DirInfo> {
        let url = files_url(&self.opts, path, hidden);

        let mut request = self.client.get(url).header(ACCEPT, MIME_JSON);
        if let Some(token) = &self.opts.auth_token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchError::TransportFailed(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(status_error(response.status()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SearchError::TransportFailed(e.to_string()))?;

        let mut de = serde_json::Deserializer::from_slice(&body);
        let info = DirInfo::deserialize(&mut de).map_err(|e| SearchError::PayloadDecodeFailed {
            what: "directory info",
            reason: e.to_string(),
        })?;
        de.end().map_err(|e| SearchError::PayloadDecodeFailed {
            what: "directory info",
            reason: e.to_string(),
        })?;

        Ok(info)
    }
}
