//! Per-account long-poll session
//!
//! Holds the server/key/cursor triple issued by `messages.getLongPollServer`
//! and performs the blocking `a_check` request. Expired sessions are
//! re-issued silently; the caller just sees an empty batch.

use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::api::VkApi;
use crate::classifier::RawUpdate;
use crate::client::Request;
use crate::config::LongPollConfig;
use crate::error::{Result, VkError};
use crate::models::Cursor;

/// Connection state of one long-poll session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub server: String,
    pub key: String,
    pub ts: Cursor,
}

impl SessionState {
    /// `a_check` URL for the current cursor
    fn poll_url(&self, config: &LongPollConfig) -> Result<Url> {
        let base = if self.server.starts_with("http://") || self.server.starts_with("https://") {
            self.server.clone()
        } else {
            format!("https://{}", self.server)
        };

        let mut url = Url::parse(&base)?;
        url.query_pairs_mut()
            .append_pair("act", "a_check")
            .append_pair("key", &self.key)
            .append_pair("ts", self.ts.as_str())
            .append_pair("wait", &config.wait_secs.to_string())
            .append_pair("mode", &config.mode.to_string())
            .append_pair("version", &config.version.to_string());
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    #[serde(default)]
    failed: Option<i64>,
    #[serde(default)]
    ts: Option<Cursor>,
    #[serde(default)]
    updates: Option<Vec<RawUpdate>>,
}

pub struct LongPollSession {
    api: Arc<VkApi>,
    config: LongPollConfig,
    state: Option<SessionState>,
}

impl LongPollSession {
    pub fn new(api: Arc<VkApi>, config: LongPollConfig) -> Self {
        Self {
            api,
            config,
            state: None,
        }
    }

    /// Current session, `None` until the first successful fetch
    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    /// Block until the server has updates or the wait elapses
    ///
    /// On error the cursor is left untouched so the next call resumes at
    /// the same position.
    pub async fn wait(&mut self) -> Result<Vec<RawUpdate>> {
        let state = match self.state.clone() {
            Some(state) => state,
            None => self.refresh().await?,
        };

        let request = Request::get(state.poll_url(&self.config)?, self.config.request_timeout());
        let body = self.api.transport().send(request).await?;
        let response: PollResponse = serde_json::from_value(body)?;

        match response.failed {
            None => {
                let ts = response
                    .ts
                    .ok_or_else(|| VkError::InvalidResponse("long poll response without ts".to_string()))?;
                let updates = response.updates.unwrap_or_default();
                self.advance(ts);
                Ok(updates)
            }
            // History is outdated, carry on from the cursor the server suggests
            Some(1) => {
                let ts = response
                    .ts
                    .ok_or_else(|| VkError::InvalidResponse("failed=1 without ts".to_string()))?;
                debug!(account = %self.label(), "Long poll history outdated, jumping to ts {}", ts);
                self.advance(ts);
                Ok(Vec::new())
            }
            // Key expired or session information lost
            Some(code @ (2 | 3)) => {
                debug!(account = %self.label(), code, "Long poll session expired, re-issuing");
                self.state = None;
                self.refresh().await?;
                Ok(Vec::new())
            }
            Some(code) => Err(VkError::LongPoll(code)),
        }
    }

    async fn refresh(&mut self) -> Result<SessionState> {
        let state = self.api.long_poll_server(self.config.version).await?;
        self.state = Some(state.clone());
        Ok(state)
    }

    fn advance(&mut self, ts: Cursor) {
        if let Some(state) = self.state.as_mut() {
            state.ts = ts;
        }
    }

    fn label(&self) -> String {
        self.api.credential().label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_url() {
        let state = SessionState {
            server: "im.vk.com/nim123".to_string(),
            key: "abc".to_string(),
            ts: Cursor::new("1700"),
        };

        let url = state.poll_url(&LongPollConfig::default()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://im.vk.com/nim123?act=a_check&key=abc&ts=1700&wait=25&mode=0&version=1"
        );
    }

    #[test]
    fn test_poll_url_keeps_explicit_scheme() {
        let state = SessionState {
            server: "http://127.0.0.1:8080/lp".to_string(),
            key: "k".to_string(),
            ts: Cursor::new("1"),
        };

        let url = state.poll_url(&LongPollConfig::default()).unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.path(), "/lp");
    }

    #[test]
    fn test_poll_response_shapes() {
        let ok: PollResponse =
            serde_json::from_str(r#"{"ts": 1701, "updates": [[4, 1, 1, 2, 3, "hi"]]}"#).unwrap();
        assert_eq!(ok.failed, None);
        assert_eq!(ok.ts, Some(Cursor::new("1701")));
        assert_eq!(ok.updates.map(|u| u.len()), Some(1));

        let expired: PollResponse = serde_json::from_str(r#"{"failed": 2}"#).unwrap();
        assert_eq!(expired.failed, Some(2));
        assert!(expired.ts.is_none());
    }
}
