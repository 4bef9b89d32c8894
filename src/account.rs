//! Per-account event loop
//!
//! Two stages run forever for every token:
//! - **listen**: long-poll, classify each batch, yield actionable events
//! - **act**: flag each event important, one at a time, in arrival order
//!
//! Timeouts and transport failures are logged and retried without backoff;
//! the long-poll wait itself paces the loop. Anything else ends this
//! account's loop only.

use async_stream::stream;
use futures::{pin_mut, Stream, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::api::VkApi;
use crate::classifier::{self, Event};
use crate::client::Transport;
use crate::config::Config;
use crate::error::{Result, VkError};
use crate::longpoll::LongPollSession;
use crate::models::Credential;
use crate::preview::preview;

/// One credential with its session and API handle
pub struct Account {
    label: String,
    api: Arc<VkApi>,
    session: LongPollSession,
    preview_width: usize,
}

impl Account {
    pub fn new(credential: Credential, transport: Arc<dyn Transport>, config: &Config) -> Result<Self> {
        let label = credential.label();
        let api = Arc::new(VkApi::new(transport, credential, &config.api)?);
        let session = LongPollSession::new(Arc::clone(&api), config.longpoll.clone());

        Ok(Self {
            label,
            api,
            session,
            preview_width: config.accounts.preview_width,
        })
    }

    /// Short token prefix used in log lines
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run until a non-recoverable error occurs; never returns `Ok`
    pub async fn run(self) -> Result<()> {
        let Account {
            label,
            api,
            mut session,
            preview_width,
        } = self;

        let events = listen(&mut session, &label);
        pin_mut!(events);

        while let Some(event) = events.next().await {
            let event = event?;
            mark_important(&api, &label, &event, preview_width).await?;
        }

        Ok(())
    }
}

/// Endless stream of actionable events for one session
///
/// Recoverable failures are logged here and never reach the consumer; the
/// stream yields an error (and then ends) only for fatal ones.
fn listen<'a>(
    session: &'a mut LongPollSession,
    label: &'a str,
) -> impl Stream<Item = Result<Event>> + 'a {
    stream! {
        loop {
            match session.wait().await {
                Ok(batch) => {
                    debug!(account = %label, updates = batch.len(), "Received {:?}", batch);
                    for event in classifier::actionable(&batch) {
                        yield Ok(event);
                    }
                }
                Err(err) if err.is_recoverable() => log_failure(label, &err),
                Err(err) => {
                    yield Err(err);
                    break;
                }
            }
        }
    }
}

/// Flag one message; recoverable failures are logged and swallowed
async fn mark_important(api: &VkApi, label: &str, event: &Event, preview_width: usize) -> Result<()> {
    match api.mark_as_important(event.message_id).await {
        Ok(()) => {
            info!(
                account = %label,
                message_id = event.message_id,
                "Processed: {}",
                preview(&event.text, preview_width)
            );
            Ok(())
        }
        Err(err) if err.is_recoverable() => {
            log_failure(label, &err);
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Timeouts are operational alerts (critical); everything else is an error
fn log_failure(label: &str, err: &VkError) {
    if err.is_timeout() {
        error!(
            account = %label,
            severity = "critical",
            "Timeout: check the network connection ({})",
            err
        );
    } else {
        error!(
            account = %label,
            kind = err.category(),
            "Error {}: {}",
            err.category(),
            err
        );
    }
}
