//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use vk_mark_important::client::{Request, Transport};
use vk_mark_important::config::Config;
use vk_mark_important::error::{Result, VkError};

/// Host used for scripted long-poll servers
pub const LP_HOST: &str = "lp.test";

/// What the scripted transport does for one request
pub enum Reply {
    Value(Value),
    Error(VkError),
    Panic(&'static str),
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}

impl From<Result<Value>> for Reply {
    fn from(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Reply::Value(value),
            Err(err) => Reply::Error(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Session,
    Poll,
    Mark,
    Other,
}

/// One request seen by the scripted transport
#[derive(Debug, Clone)]
pub struct Recorded {
    pub token: String,
    pub kind: RequestKind,
    pub url: url::Url,
    pub timeout: std::time::Duration,
    pub at: Instant,
}

impl Recorded {
    pub fn param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

#[derive(Default)]
struct Script {
    sessions: VecDeque<Reply>,
    polls: VecDeque<Reply>,
    marks: VecDeque<Reply>,
    issued_sessions: u32,
}

/// Transport that answers from per-token queues
///
/// API calls are routed by `access_token`, long-poll calls by the first path
/// segment of the server (`lp.test/<token>`). An exhausted poll queue blocks
/// forever, which parks the account loop. Session and mark queues fall back
/// to a fresh session and a plain success.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Script>>,
    log: Mutex<Vec<Recorded>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_session(&self, token: &str, reply: impl Into<Reply>) {
        self.with_script(token, |s| s.sessions.push_back(reply.into()));
    }

    pub fn push_poll(&self, token: &str, reply: impl Into<Reply>) {
        self.with_script(token, |s| s.polls.push_back(reply.into()));
    }

    pub fn push_mark(&self, token: &str, reply: impl Into<Reply>) {
        self.with_script(token, |s| s.marks.push_back(reply.into()));
    }

    /// Every request, in dispatch order
    pub fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_of(&self, token: &str, kind: RequestKind) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.token == token && r.kind == kind)
            .collect()
    }

    /// Message ids passed to markAsImportant for one token
    pub fn marked(&self, token: &str) -> Vec<i64> {
        self.requests_of(token, RequestKind::Mark)
            .iter()
            .filter_map(|r| r.param("message_ids"))
            .filter_map(|id| id.parse().ok())
            .collect()
    }

    fn with_script<R>(&self, token: &str, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut scripts = self.scripts.lock().unwrap();
        f(scripts.entry(token.to_string()).or_default())
    }

    fn route(request: &Request) -> (String, RequestKind) {
        let url = &request.url;
        if url.host_str() == Some(LP_HOST) {
            let token = url
                .path_segments()
                .and_then(|mut segments| segments.next())
                .unwrap_or_default()
                .to_string();
            return (token, RequestKind::Poll);
        }

        let token = url
            .query_pairs()
            .find(|(k, _)| k == "access_token")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        let kind = if url.path().ends_with("messages.getLongPollServer") {
            RequestKind::Session
        } else if url.path().ends_with("messages.markAsImportant") {
            RequestKind::Mark
        } else {
            RequestKind::Other
        };
        (token, kind)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request) -> Result<Value> {
        let (token, kind) = Self::route(&request);
        self.log.lock().unwrap().push(Recorded {
            token: token.clone(),
            kind,
            url: request.url.clone(),
            timeout: request.timeout,
            at: Instant::now(),
        });

        let reply = self.with_script(&token, |script| match kind {
            RequestKind::Session => Some(script.sessions.pop_front().unwrap_or_else(|| {
                script.issued_sessions += 1;
                let n = script.issued_sessions;
                Reply::Value(session_response(&token, &format!("auto-key-{}", n), 1))
            })),
            RequestKind::Poll => script.polls.pop_front(),
            RequestKind::Mark => Some(
                script
                    .marks
                    .pop_front()
                    .unwrap_or_else(|| Reply::Value(json!({"response": 1}))),
            ),
            RequestKind::Other => Some(Reply::Value(json!({"response": 1}))),
        });

        match reply {
            Some(Reply::Value(value)) => Ok(value),
            Some(Reply::Error(err)) => Err(err),
            Some(Reply::Panic(message)) => panic!("{}", message),
            None => futures::future::pending().await,
        }
    }
}

/// `getLongPollServer` envelope for a scripted server
pub fn session_response(token: &str, key: &str, ts: i64) -> Value {
    json!({"response": {"server": format!("{}/{}", LP_HOST, token), "key": key, "ts": ts}})
}

/// Same, with an extra path segment so servers can be told apart
pub fn session_response_at(token: &str, path: &str, key: &str, ts: i64) -> Value {
    json!({"response": {"server": format!("{}/{}/{}", LP_HOST, token, path), "key": key, "ts": ts}})
}

/// Successful long-poll batch
pub fn poll_batch(ts: i64, updates: Vec<Value>) -> Reply {
    Reply::Value(json!({"ts": ts, "updates": updates}))
}

/// Raw message-new update
pub fn message_new(id: i64, flags: u32, text: &str) -> Value {
    json!([4, id, flags, 100500, 1700000000, text, {}])
}

pub fn timeout() -> Reply {
    Reply::Error(VkError::Timeout(std::time::Duration::from_secs(50)))
}

/// Defaults, with a rate limit wide enough to never interfere
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.rate_limit.requests_per_period = 1000;
    config
}

/// A log event as seen by [`LogCapture`]
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn is_critical(&self) -> bool {
        self.level == Level::ERROR && self.field("severity") == Some("critical")
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: HashMap<String, String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let value = format!("{:?}", value);
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

/// tracing layer that keeps every event for assertions
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Install as the thread's default subscriber until the guard drops
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events at INFO or more severe
    pub fn visible(&self) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == Level::INFO || e.level == Level::WARN || e.level == Level::ERROR)
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}
