use std::sync::atomic::Ordering;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use autoreply::config::Config;
use autoreply::fetcher::ImapFetcher;
use autoreply::poller::PollDriver;
use autoreply::sender::SmtpSender;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = Config::from_env().context("configuration")?;

    // Log to both the console and a persistent file
    let file_appender = tracing_appender::rolling::never(&config.log_dir, "autoreply.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    info!(
        imap = %config.imap_host,
        smtp = %config.smtp_host,
        mailbox = %config.mailbox,
        interval_secs = config.poll_interval.as_secs(),
        "Starting auto-reply service"
    );

    let fetcher = ImapFetcher::new(&config);
    let sender = SmtpSender::new(&config).context("SMTP sender setup")?;
    let driver = PollDriver::new(
        fetcher,
        sender,
        config.address.clone(),
        config.poll_interval,
    );

    let (mut handle, shutdown) = driver.spawn();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, stopping");
            shutdown.store(true, Ordering::Relaxed);
            let _ = (&mut handle).await;
        }
        result = &mut handle => {
            if let Err(e) = result {
                error!(error = %e, "Poll loop terminated unexpectedly");
                anyhow::bail!("poll loop terminated unexpectedly");
            }
        }
    }

    info!("Stopped");
    Ok(())
}
