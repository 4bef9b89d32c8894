//! Process supervisor: one account task per credential, forever

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::account::Account;
use crate::client::{HttpTransport, RateLimitedTransport, Transport};
use crate::config::Config;
use crate::error::Result;
use crate::models::Credential;
use crate::rate_limiter::RateLimiter;

/// Read one token per line; creates an empty file if none exists
pub async fn load_credentials(path: &Path) -> Result<Vec<Credential>> {
    // Append mode creates the file without truncating an existing one
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.flush().await?;
    drop(file);

    let content = tokio::fs::read_to_string(path).await?;
    let credentials: Vec<Credential> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Credential::new)
        .collect();

    info!("Loaded {} token(s) from {:?}", credentials.len(), path);
    Ok(credentials)
}

/// Outcome of an account task that stopped
pub type AccountExit = (String, Result<()>);

/// How often the shared limiter's counters are logged
const STATS_INTERVAL: Duration = Duration::from_secs(60);

pub struct Supervisor {
    config: Config,
    transport: Arc<dyn Transport>,
    limiter: Option<RateLimiter>,
}

impl Supervisor {
    /// Production wiring: hyper transport behind one shared rate limiter
    pub fn new(config: Config) -> Result<Self> {
        let limiter = RateLimiter::new(
            config.rate_limit.requests_per_period,
            config.rate_limit.period(),
        );
        let transport = RateLimitedTransport::new(HttpTransport::new()?, limiter.clone());
        Ok(Self::with_transport(config, Arc::new(transport)).with_rate_stats(limiter))
    }

    /// Use a caller-supplied transport (shared by every account)
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            limiter: None,
        }
    }

    /// Periodically log the counters of `limiter` while running
    pub fn with_rate_stats(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Start one task per credential
    pub fn spawn_accounts(&self, credentials: Vec<Credential>) -> Result<JoinSet<AccountExit>> {
        let mut tasks = JoinSet::new();

        for credential in credentials {
            let account = Account::new(credential, Arc::clone(&self.transport), &self.config)?;
            let label = account.label().to_string();
            info!(account = %label, "Account added");

            tasks.spawn(async move {
                let result = account.run().await;
                (label, result)
            });
        }

        Ok(tasks)
    }

    /// Spawn all accounts and keep the process alive forever
    pub async fn run(self, credentials: Vec<Credential>) -> Result<()> {
        if credentials.is_empty() {
            warn!("No tokens configured, idling");
        }

        let mut tasks = self.spawn_accounts(credentials)?;
        let mut report = tokio::time::interval(STATS_INTERVAL);
        // First tick completes immediately
        report.tick().await;

        // Accounts are never added at runtime; stay up until killed
        loop {
            tokio::select! {
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => match joined {
                    Ok((label, Err(err))) => {
                        error!(account = %label, kind = err.category(), "Account stopped: {}", err)
                    }
                    Ok((label, Ok(()))) => warn!(account = %label, "Account loop ended"),
                    Err(join_error) => error!("Account task aborted: {}", join_error),
                },
                _ = report.tick() => self.log_rate_stats().await,
            }
        }
    }

    async fn log_rate_stats(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        let stats = limiter.stats().await;
        debug!(
            in_window = stats.in_window,
            capacity = stats.capacity,
            total_operations = stats.total_operations,
            total_waits = stats.total_waits,
            "Rate limiter stats"
        );
    }
}
