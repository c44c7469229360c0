//! Poll driver — the single control loop that owns the replied cache.
//!
//! One cycle runs to completion before the next interval wait: clear the
//! cache if the horizon elapsed, fetch unseen mail, decide per message, send
//! replies, record confirmed sends. A failed fetch abandons the cycle; a
//! failed send abandons only that one reply.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::RepliedCache;
use crate::engine;
use crate::fetcher::MailFetcher;
use crate::sender::ReplySender;

/// The poll loop over a fetcher and a sender.
pub struct PollDriver<F, S> {
    fetcher: F,
    sender: S,
    self_address: String,
    poll_interval: Duration,
    cache: RepliedCache,
}

impl<F, S> PollDriver<F, S>
where
    F: MailFetcher + 'static,
    S: ReplySender + 'static,
{
    pub fn new(fetcher: F, sender: S, self_address: String, poll_interval: Duration) -> Self {
        Self {
            fetcher,
            sender,
            self_address,
            poll_interval,
            cache: RepliedCache::new(Utc::now()),
        }
    }

    /// Spawn the poll loop. Returns the task handle and a shutdown flag;
    /// set the flag to stop polling at the next tick.
    pub fn spawn(mut self) -> (JoinHandle<()>, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            info!(
                interval_secs = self.poll_interval.as_secs(),
                "Poll loop started"
            );

            let mut tick = tokio::time::interval(self.poll_interval);

            loop {
                tick.tick().await;

                if shutdown.load(Ordering::Relaxed) {
                    info!("Poll loop shutting down");
                    return;
                }

                self.run_cycle().await;
            }
        });

        (handle, flag)
    }

    /// One complete poll cycle.
    pub async fn run_cycle(&mut self) {
        if self.cache.clear_if_expired(Utc::now()) {
            info!("Cleared recently-replied cache");
        }

        let messages = match self.fetcher.fetch_unseen().await {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Mail fetch failed, skipping this cycle");
                return;
            }
        };

        if messages.is_empty() {
            info!("No new mail");
            return;
        }
        info!(count = messages.len(), "Fetched unread mail");

        for message in &messages {
            if !message.unseen {
                debug!(sender = %message.sender, "Message no longer flagged unseen, skipping");
                continue;
            }

            info!(
                sender = %message.sender,
                subject = message.subject.as_deref().unwrap_or("(no subject)"),
                message_id = message.message_id.as_deref().unwrap_or("-"),
                "Processing message"
            );

            let outcome = engine::decide(message, &self.cache, &self.self_address);
            if !outcome.is_reply() {
                info!(
                    sender = %message.sender,
                    outcome = outcome.label(),
                    "Skipping message"
                );
                continue;
            }

            match self.sender.send_reply(&message.sender).await {
                Ok(()) => {
                    // Only a confirmed send suppresses future replies.
                    self.cache.record(&message.sender);
                    info!(recipient = %message.sender, "Auto-reply sent");
                }
                Err(e) => {
                    error!(recipient = %message.sender, error = %e, "Failed to send auto-reply");
                }
            }
        }
    }

    /// Senders recorded since the last cache clear.
    pub fn replied_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::{FetchError, SendError};
    use crate::message::InboundEmail;

    const SELF: &str = "me@myaccount.com";

    fn email(sender: &str, subject: &str) -> InboundEmail {
        InboundEmail {
            sender: sender.to_lowercase(),
            sender_name: None,
            subject: Some(subject.to_string()),
            message_id: Some(format!("<{sender}@test>")),
            headers: HashMap::new(),
            unseen: true,
        }
    }

    /// Pops one scripted batch per fetch; empty script means no new mail.
    struct ScriptedFetcher {
        batches: Mutex<VecDeque<Result<Vec<InboundEmail>, FetchError>>>,
    }

    impl ScriptedFetcher {
        fn new(batches: Vec<Result<Vec<InboundEmail>, FetchError>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
            }
        }
    }

    #[async_trait]
    impl MailFetcher for ScriptedFetcher {
        async fn fetch_unseen(&self) -> Result<Vec<InboundEmail>, FetchError> {
            self.batches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSender {
        sent: Arc<Mutex<Vec<String>>>,
        fail_next: Arc<AtomicBool>,
    }

    impl RecordingSender {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        async fn send_reply(&self, to: &str) -> Result<(), SendError> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(SendError::Address(
                    "missing-at-sign".parse::<lettre::Address>().unwrap_err(),
                ));
            }
            self.sent.lock().unwrap().push(to.to_string());
            Ok(())
        }
    }

    fn driver(
        batches: Vec<Result<Vec<InboundEmail>, FetchError>>,
        sender: RecordingSender,
    ) -> PollDriver<ScriptedFetcher, RecordingSender> {
        PollDriver::new(
            ScriptedFetcher::new(batches),
            sender,
            SELF.to_string(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn replies_once_per_sender_across_cycles() {
        let sender = RecordingSender::default();
        let mut driver = driver(
            vec![
                Ok(vec![email("boss@corp.com", "Quick question")]),
                Ok(vec![email("boss@corp.com", "Another question")]),
            ],
            sender.clone(),
        );

        driver.run_cycle().await;
        driver.run_cycle().await;

        assert_eq!(sender.sent(), vec!["boss@corp.com"]);
        assert_eq!(driver.replied_count(), 1);
    }

    #[tokio::test]
    async fn duplicate_sender_within_one_batch_gets_one_reply() {
        let sender = RecordingSender::default();
        let mut driver = driver(
            vec![Ok(vec![
                email("boss@corp.com", "Quick question"),
                email("boss@corp.com", "Forgot to mention"),
            ])],
            sender.clone(),
        );

        driver.run_cycle().await;

        assert_eq!(sender.sent(), vec!["boss@corp.com"]);
    }

    #[tokio::test]
    async fn skips_are_not_sent_or_recorded() {
        let sender = RecordingSender::default();
        let mut driver = driver(
            vec![Ok(vec![
                email("noreply@shop.com", "Order update"),
                email("colleague@corp.com", "Out of office"),
                email(SELF, "Note to self-address"),
            ])],
            sender.clone(),
        );

        driver.run_cycle().await;

        assert!(sender.sent().is_empty());
        assert_eq!(driver.replied_count(), 0);
    }

    #[tokio::test]
    async fn failed_send_is_retried_next_cycle() {
        let sender = RecordingSender::default();
        sender.fail_next.store(true, Ordering::SeqCst);

        let mut driver = driver(
            vec![
                Ok(vec![email("boss@corp.com", "Quick question")]),
                Ok(vec![email("boss@corp.com", "Quick question")]),
            ],
            sender.clone(),
        );

        driver.run_cycle().await;
        assert!(sender.sent().is_empty());
        assert_eq!(driver.replied_count(), 0);

        driver.run_cycle().await;
        assert_eq!(sender.sent(), vec!["boss@corp.com"]);
    }

    #[tokio::test]
    async fn fetch_failure_does_not_poison_next_cycle() {
        let sender = RecordingSender::default();
        let mut driver = driver(
            vec![
                Err(FetchError::Protocol("command rejected: A1 NO LOGIN".into())),
                Ok(vec![email("boss@corp.com", "Quick question")]),
            ],
            sender.clone(),
        );

        driver.run_cycle().await;
        assert!(sender.sent().is_empty());

        driver.run_cycle().await;
        assert_eq!(sender.sent(), vec!["boss@corp.com"]);
    }

    #[tokio::test]
    async fn cache_clear_reopens_sender() {
        let sender = RecordingSender::default();
        let mut driver = driver(
            vec![
                Ok(vec![email("boss@corp.com", "Quick question")]),
                Ok(vec![email("boss@corp.com", "Quick question")]),
            ],
            sender.clone(),
        );

        driver.run_cycle().await;
        assert_eq!(sender.sent(), vec!["boss@corp.com"]);

        // Simulate the horizon elapsing between cycles.
        driver
            .cache
            .clear_if_expired(Utc::now() + chrono::Duration::hours(25));
        assert_eq!(driver.replied_count(), 0);

        driver.run_cycle().await;
        assert_eq!(sender.sent(), vec!["boss@corp.com", "boss@corp.com"]);
    }

    #[tokio::test]
    async fn messages_not_flagged_unseen_are_ignored() {
        let sender = RecordingSender::default();
        let mut seen = email("boss@corp.com", "Quick question");
        seen.unseen = false;

        let mut driver = driver(vec![Ok(vec![seen])], sender.clone());
        driver.run_cycle().await;

        assert!(sender.sent().is_empty());
    }
}
