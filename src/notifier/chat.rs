use std::sync::Arc;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;

use crate::bot::BotTransport;
use crate::error::NotifyError;
use crate::model::Trigger;
use crate::notifier::Notifier;

/// Delivers triggers as chat messages to the alert owner.
pub struct ChatNotifier {
    transport: Arc<dyn BotTransport>,
}

impl ChatNotifier {
    pub fn new(transport: Arc<dyn BotTransport>) -> Self {
        Self { transport }
    }
}

impl Notifier for ChatNotifier {
    fn notify(&self, trigger: Trigger) -> BoxFuture<'_, Result<(), Report<NotifyError>>> {
        Box::pin(async move {
            let owner = trigger.alert.owner;
            self.transport
                .send_message(owner, trigger.message())
                .await
                .change_context(NotifyError::Delivery)
                .attach_with(|| format!("owner: {owner}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::FakeTransport;
    use crate::model::{Alert, Direction, OwnerId, TargetPrice};

    #[tokio::test]
    async fn trigger_is_sent_to_owner() {
        let transport = Arc::new(FakeTransport::default());
        let notifier = ChatNotifier::new(transport.clone());
        let trigger = Trigger {
            alert: Alert::new(
                OwnerId(42),
                "ethereum",
                TargetPrice::new(1_500.0).unwrap(),
                Direction::Below,
            ),
            observed_price: 1_499.5,
        };

        notifier.notify(trigger).await.unwrap();

        assert_eq!(
            transport.sent(),
            [(
                OwnerId(42),
                "🚨 Alert: ETHEREUM is now below $1500! Current price: $1499.5".to_string()
            )]
        );
    }
}
