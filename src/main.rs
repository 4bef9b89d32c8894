use anyhow::Result;
use clap::Parser;
use std::process;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;
use vk_mark_important::cli::{Cli, Commands};
use vk_mark_important::config::{Config, LogFormat};
use vk_mark_important::error::VkError;
use vk_mark_important::supervisor::{self, Supervisor};

// One OS thread; accounts interleave at their await points
#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: vk-mark-important --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Install default crypto provider for rustls
    // On non-Windows platforms, use aws-lc-rs; on Windows, use ring
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    if let Commands::InitConfig { output, force } = cli.action() {
        if output.exists() && !force {
            return Err(VkError::Config(format!(
                "Configuration file already exists at {:?}. Use --force to overwrite.",
                output
            ))
            .into());
        }

        Config::create_example(&output).await?;
        println!("Created example configuration file at: {:?}", output);
        return Ok(());
    }

    // The config decides the log format, so read it before tracing is up
    let config_exists = cli.config.exists();
    let mut config = if config_exists {
        Config::load(&cli.config).await?
    } else {
        Config::default()
    };
    init_tracing(cli.verbose, config.logging.format);

    if !config_exists {
        tracing::warn!("Config file not found at {:?}, using defaults", cli.config);
    }
    if let Some(tokens) = cli.tokens {
        config.accounts.tokens_file = tokens;
    }

    tracing::info!("vk-mark-important starting...");

    let credentials = supervisor::load_credentials(&config.accounts.tokens_file).await?;
    Supervisor::new(config)?.run(credentials).await?;

    Ok(())
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("vk_mark_important=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("vk_mark_important=info,warn"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::new("%H:%M:%S".to_string()))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
