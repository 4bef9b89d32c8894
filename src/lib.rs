//! VK "mark important" watcher
//!
//! Keeps one long-poll loop per VK access token and flags every new
//! incoming message that is not yet important.
//!
//! # Overview
//!
//! - **Transport**: hyper client behind a process-wide sliding-window rate limiter
//! - **Long poll**: per-account session with silent re-issue on expiry
//! - **Classification**: raw updates to typed events, actionable filter
//! - **Account loop**: listen, then act; failures logged and retried
//! - **Supervisor**: one task per token on a single-threaded runtime
//!
//! # Example Usage
//!
//! ```no_run
//! use vk_mark_important::{config::Config, supervisor::{self, Supervisor}};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!     let credentials = supervisor::load_credentials(&config.accounts.tokens_file).await?;
//!
//!     // Runs forever
//!     Supervisor::new(config)?.run(credentials).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`account`] - Per-account listen/act loop
//! - [`api`] - VK method calls (long-poll server, mark as important)
//! - [`classifier`] - Raw update parsing and the actionable predicate
//! - [`cli`] - Command-line interface
//! - [`client`] - Transport trait, hyper transport, rate-limited decorator
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`longpoll`] - Long-poll session state and wait
//! - [`models`] - Credential and cursor types
//! - [`preview`] - Log previews of message text
//! - [`rate_limiter`] - Shared request window
//! - [`supervisor`] - Token loading and task spawning

pub mod account;
pub mod api;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod longpoll;
pub mod models;
pub mod preview;
pub mod rate_limiter;
pub mod supervisor;

// Re-export commonly used types for convenience
pub use error::{Result, VkError};

pub use account::Account;
pub use api::VkApi;
pub use classifier::{classify, is_actionable, Event, EventKind, MessageFlags, RawUpdate, Update};
pub use client::{HttpTransport, RateLimitedTransport, Request, Transport};
pub use config::Config;
pub use longpoll::{LongPollSession, SessionState};
pub use models::{Credential, Cursor};
pub use rate_limiter::RateLimiter;
pub use supervisor::Supervisor;
