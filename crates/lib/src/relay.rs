//! Relay loop: inbound events -> allow-list filter -> webhook delivery.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::allowlist::AllowList;
use crate::event::InboundEvent;
use crate::filter::should_forward_and_format;
use crate::webhook::{DeliveryOutcome, WebhookSender};

/// Capacity of the channel between the session adapter and the relay loop.
pub const INBOUND_CAPACITY: usize = 64;

/// Filters events against the allow-list and hands matches to the webhook sender.
#[derive(Clone)]
pub struct Relay {
    allow_list: Arc<AllowList>,
    sender: WebhookSender,
}

impl Relay {
    pub fn new(allow_list: Arc<AllowList>, sender: WebhookSender) -> Self {
        Self { allow_list, sender }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Filter and deliver one event, awaiting the outcome. None when the event was discarded.
    pub async fn process(&self, event: InboundEvent) -> Option<DeliveryOutcome> {
        let payload = should_forward_and_format(&event, &self.allow_list)?;
        Some(self.sender.send(&payload).await)
    }

    /// Filter one event and spawn its delivery without waiting for it.
    pub fn dispatch(&self, event: InboundEvent) -> Option<JoinHandle<DeliveryOutcome>> {
        let payload = should_forward_and_format(&event, &self.allow_list)?;
        let sender = self.sender.clone();
        Some(tokio::spawn(async move { sender.send(&payload).await }))
    }

    /// Consume events until the channel closes or `shutdown` completes.
    /// In-flight deliveries are left to finish on their own.
    pub async fn run<F>(&self, mut inbound_rx: mpsc::Receiver<InboundEvent>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("relay: shutdown requested, stopping");
                    break;
                }
                event = inbound_rx.recv() => {
                    let Some(event) = event else {
                        log::info!("relay: inbound channel closed, stopping");
                        break;
                    };
                    let _ = self.dispatch(event);
                }
            }
        }
    }
}

/// Abort the task feeding the relay and collect its result. A cancelled task counts as a clean
/// stop; an error the task had already returned is propagated even if it finished concurrently.
pub async fn stop_producer<E>(handle: JoinHandle<Result<(), E>>) -> anyhow::Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    handle.abort();
    match handle.await {
        Ok(result) => result.map_err(anyhow::Error::from),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(anyhow::anyhow!("producer task panicked: {}", e)),
    }
}

/// Future that completes on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ConversationKind;
    use crate::webhook::DEFAULT_TIMEOUT;
    use chrono::Utc;

    fn event(chat_id: i64) -> InboundEvent {
        InboundEvent {
            chat_id,
            sender_id: Some(1),
            text: Some("hello".to_string()),
            date: Utc::now(),
            kind: ConversationKind::Direct,
            message_id: 1,
            reply_to_msg_id: None,
        }
    }

    fn relay(list: &str) -> Relay {
        // Never contacted: every event below is discarded by the allow-list.
        let sender = WebhookSender::new("http://127.0.0.1:9/hook", DEFAULT_TIMEOUT).unwrap();
        Relay::new(Arc::new(AllowList::parse(list).unwrap()), sender)
    }

    #[tokio::test]
    async fn process_discards_non_allowed_chat_without_sending() {
        assert!(relay("1,2").process(event(555)).await.is_none());
    }

    #[tokio::test]
    async fn dispatch_discards_non_allowed_chat() {
        assert!(relay("1,2").dispatch(event(555)).is_none());
    }

    #[tokio::test]
    async fn run_stops_when_channel_closes() {
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        tx.send(event(555)).await.unwrap();
        drop(tx);
        relay("1").run(rx, std::future::pending()).await;
    }

    #[tokio::test]
    async fn stop_producer_propagates_error_of_finished_task() {
        let (tx, mut rx) = mpsc::channel::<InboundEvent>(INBOUND_CAPACITY);
        let handle = tokio::spawn(async move {
            let _tx = tx;
            Err::<(), std::io::Error>(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "update stream closed",
            ))
        });
        // The channel closing is all the relay loop sees before it returns.
        assert!(rx.recv().await.is_none());

        let err = stop_producer(handle).await.unwrap_err();
        assert!(err.to_string().contains("update stream closed"));
    }

    #[tokio::test]
    async fn stop_producer_treats_cancellation_as_clean_stop() {
        let handle = tokio::spawn(std::future::pending::<Result<(), std::io::Error>>());
        tokio::task::yield_now().await;
        assert!(stop_producer(handle).await.is_ok());
    }

    #[tokio::test]
    async fn stop_producer_reports_clean_exit() {
        let handle = tokio::spawn(async { Ok::<(), std::io::Error>(()) });
        tokio::task::yield_now().await;
        assert!(stop_producer(handle).await.is_ok());
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (_tx, rx) = mpsc::channel::<InboundEvent>(INBOUND_CAPACITY);
        relay("1").run(rx, async {}).await;
    }
}
