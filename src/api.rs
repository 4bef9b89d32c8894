//! Minimal VK API facade: the two methods the marker needs

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::client::{Request, Transport};
use crate::config::ApiConfig;
use crate::error::{Result, VkError};
use crate::longpoll::SessionState;
use crate::models::{Credential, Cursor};

/// Error object inside a failed method call
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

/// `messages.getLongPollServer` payload
#[derive(Debug, Deserialize)]
struct LongPollServerResponse {
    server: String,
    key: String,
    ts: Cursor,
}

/// Method-call client bound to one account's token
pub struct VkApi {
    transport: Arc<dyn Transport>,
    credential: Credential,
    base_url: Url,
    version: String,
    timeout: Duration,
}

impl VkApi {
    pub fn new(
        transport: Arc<dyn Transport>,
        credential: Credential,
        config: &ApiConfig,
    ) -> Result<Self> {
        // Trailing slash so that join() appends the method name
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| VkError::Config(format!("Invalid api.base_url {:?}: {}", base, e)))?;

        Ok(Self {
            transport,
            credential,
            base_url,
            version: config.version.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Call an API method and unwrap the `response` envelope
    pub async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value> {
        let mut url = self.base_url.join(method)?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("access_token", self.credential.token())
            .append_pair("v", &self.version);

        let mut body = self.transport.send(Request::get(url, self.timeout)).await?;

        if let Some(error) = body.get("error") {
            let error: ApiErrorBody = serde_json::from_value(error.clone())?;
            return Err(VkError::Api {
                code: error.error_code,
                message: error.error_msg,
            });
        }

        body.get_mut("response")
            .map(Value::take)
            .ok_or_else(|| VkError::InvalidResponse(format!("{} returned no response", method)))
    }

    /// Issue a fresh long-poll session (server, key, cursor)
    pub async fn long_poll_server(&self, lp_version: u32) -> Result<SessionState> {
        let response = self
            .call(
                "messages.getLongPollServer",
                &[("need_pts", "0".to_string()), ("lp_version", lp_version.to_string())],
            )
            .await?;

        let server: LongPollServerResponse = serde_json::from_value(response)?;
        debug!(
            account = %self.credential.label(),
            server = %server.server,
            "Issued long poll session"
        );

        Ok(SessionState {
            server: server.server,
            key: server.key,
            ts: server.ts,
        })
    }

    /// Set the "important" flag on one message
    pub async fn mark_as_important(&self, message_id: i64) -> Result<()> {
        self.call(
            "messages.markAsImportant",
            &[("message_ids", message_id.to_string()), ("important", "1".to_string())],
        )
        .await?;
        Ok(())
    }
}
