pub mod telegram;

use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use futures::future::BoxFuture;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::command::router::CommandRouter;
use crate::error::TransportError;
use crate::model::OwnerId;

const MAX_BACKOFF_SECS: u64 = 60;

/// A text message received from a user.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub update_id: i64,
    pub owner: OwnerId,
    pub text: String,
}

/// Chat transport: inbound command text, outbound messages.
pub trait BotTransport: Send + Sync {
    /// Wait for messages with an update id of at least `offset`.
    ///
    /// Updates that carry no text are still reported through the returned
    /// `next_offset` so they are acknowledged.
    fn poll(&self, offset: i64) -> BoxFuture<'_, Result<Poll, Report<TransportError>>>;

    fn send_message(
        &self,
        owner: OwnerId,
        text: String,
    ) -> BoxFuture<'_, Result<(), Report<TransportError>>>;
}

#[derive(Debug, Default)]
pub struct Poll {
    pub messages: Vec<Inbound>,
    /// Offset to pass on the next call, if any update was received.
    pub next_offset: Option<i64>,
}

/// Receive commands until `cancel` fires, handling each message on its own
/// task so a slow price lookup never holds up other users.
pub async fn poll_loop(
    transport: Arc<dyn BotTransport>,
    router: Arc<CommandRouter>,
    cancel: CancellationToken,
) {
    let tracker = TaskTracker::new();
    let mut offset = 0;
    let mut backoff = Duration::from_secs(1);

    info!("bot poll loop started");

    loop {
        let poll = tokio::select! {
            _ = cancel.cancelled() => break,
            poll = transport.poll(offset) => poll,
        };

        let poll = match poll {
            Ok(poll) => {
                backoff = Duration::from_secs(1);
                poll
            }
            Err(e) => {
                warn!(error = ?e, backoff = ?backoff, "bot poll failed, retrying...");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(Duration::from_secs(MAX_BACKOFF_SECS));
                continue;
            }
        };

        if let Some(next) = poll.next_offset {
            offset = offset.max(next);
        }

        for message in poll.messages {
            let transport = Arc::clone(&transport);
            let router = Arc::clone(&router);
            tracker.spawn(async move {
                handle_message(transport.as_ref(), &router, message).await;
            });
        }
    }

    tracker.close();
    tracker.wait().await;
    info!("bot poll loop stopped");
}

async fn handle_message(transport: &dyn BotTransport, router: &CommandRouter, message: Inbound) {
    debug!(
        update_id = message.update_id,
        owner = %message.owner,
        text = %message.text,
        "message received"
    );

    let Some(reply) = router.handle(message.owner, &message.text).await else {
        return;
    };

    if let Err(e) = transport.send_message(message.owner, reply).await {
        warn!(owner = %message.owner, error = ?e, "failed to send reply");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use error_stack::Report;
    use futures::future::BoxFuture;

    use super::{BotTransport, Inbound, Poll};
    use crate::error::TransportError;
    use crate::model::OwnerId;

    /// Serves queued polls once each, then pends forever; records sends.
    #[derive(Default)]
    pub struct FakeTransport {
        polls: Mutex<VecDeque<Result<Poll, ()>>>,
        offsets: Mutex<Vec<i64>>,
        sent: Mutex<Vec<(OwnerId, String)>>,
    }

    impl FakeTransport {
        pub fn push_messages(&self, messages: Vec<Inbound>) {
            let next_offset = messages.iter().map(|m| m.update_id + 1).max();
            self.polls.lock().unwrap().push_back(Ok(Poll {
                messages,
                next_offset,
            }));
        }

        pub fn push_error(&self) {
            self.polls.lock().unwrap().push_back(Err(()));
        }

        pub fn offsets(&self) -> Vec<i64> {
            self.offsets.lock().unwrap().clone()
        }

        pub fn sent(&self) -> Vec<(OwnerId, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl BotTransport for FakeTransport {
        fn poll(&self, offset: i64) -> BoxFuture<'_, Result<Poll, Report<TransportError>>> {
            Box::pin(async move {
                self.offsets.lock().unwrap().push(offset);
                let next = self.polls.lock().unwrap().pop_front();
                match next {
                    Some(Ok(poll)) => Ok(poll),
                    Some(Err(())) => Err(Report::new(TransportError::Request {
                        method: "getUpdates",
                    })),
                    None => futures::future::pending().await,
                }
            })
        }

        fn send_message(
            &self,
            owner: OwnerId,
            text: String,
        ) -> BoxFuture<'_, Result<(), Report<TransportError>>> {
            Box::pin(async move {
                self.sent.lock().unwrap().push((owner, text));
                Ok(())
            })
        }
    }
}
