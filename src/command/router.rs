use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::command::{self, Command, CommandError, USAGE};
use crate::model::{Alert, Direction, OwnerId, TargetPrice};
use crate::price::{self, PriceSource};
use crate::store::AlertStore;

/// Telegram rejects `sendMessage` text longer than this.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Turns chat commands into store operations and reply text.
pub struct CommandRouter {
    store: Arc<AlertStore>,
    prices: Arc<dyn PriceSource>,
    fetch_timeout: Duration,
    bot_username: String,
}

impl CommandRouter {
    /// `bot_username` is the bot's own handle, used to tell `/cmd@ThisBot`
    /// apart from commands addressed to other bots in the same group.
    pub fn new(
        store: Arc<AlertStore>,
        prices: Arc<dyn PriceSource>,
        fetch_timeout: Duration,
        bot_username: impl Into<String>,
    ) -> Self {
        Self {
            store,
            prices,
            fetch_timeout,
            bot_username: bot_username.into(),
        }
    }

    /// Handle `text` sent by `owner`. Returns the reply, or `None` when the
    /// message is not a command.
    pub async fn handle(&self, owner: OwnerId, text: &str) -> Option<String> {
        let result = match command::parse(text, &self.bot_username) {
            Ok(None) => return None,
            Ok(Some(command)) => self.execute(owner, command).await,
            Err(e) => Err(e),
        };
        Some(result.unwrap_or_else(|e| e.to_string()))
    }

    async fn execute(&self, owner: OwnerId, command: Command) -> Result<String, CommandError> {
        match command {
            Command::Start => Ok(USAGE.to_owned()),
            Command::Alert {
                symbol,
                target_price,
                direction,
            } => self.create_alert(owner, symbol, target_price, direction).await,
            Command::MyAlerts => Ok(self.list_alerts(owner)),
            Command::Cancel => Ok(self.cancel_alerts(owner)),
        }
    }

    async fn create_alert(
        &self,
        owner: OwnerId,
        symbol: String,
        target_price: TargetPrice,
        direction: Direction,
    ) -> Result<String, CommandError> {
        let current = price::fetch_available(self.prices.as_ref(), &symbol, self.fetch_timeout)
            .await
            .ok_or(CommandError::InvalidSymbol)?;

        let alert = Alert::new(owner, &symbol, target_price, direction);
        let id = self.store.add(alert);
        info!(
            %owner,
            %id,
            symbol = %symbol,
            %direction,
            target = target_price.value(),
            "alert created"
        );

        Ok(format!(
            "✅ Alert set for {}\nTarget: {} ${}\nCurrent price: ${}",
            symbol.to_uppercase(),
            direction.label(),
            target_price,
            current,
        ))
    }

    fn list_alerts(&self, owner: OwnerId) -> String {
        let alerts = self.store.list_by_owner(owner);
        if alerts.is_empty() {
            return "You have no active alerts.".into();
        }

        let mut reply = String::from("Your active alerts:\n");
        let mut used = reply.chars().count();
        for (shown, a) in alerts.iter().enumerate() {
            let line = format!(
                "\n{}: {} ${}",
                a.symbol.to_uppercase(),
                a.direction.label(),
                a.target_price
            );
            let remaining = alerts.len() - shown;
            // Leave room for the overflow footer unless this is the last line.
            let reserve = if remaining > 1 {
                overflow_footer(remaining - 1).chars().count()
            } else {
                0
            };
            let len = line.chars().count();
            if used + len + reserve > MAX_MESSAGE_CHARS {
                reply.push_str(&overflow_footer(remaining));
                return reply;
            }
            reply.push_str(&line);
            used += len;
        }
        reply
    }

    fn cancel_alerts(&self, owner: OwnerId) -> String {
        let removed = self.store.remove_by_owner(owner);
        info!(%owner, removed, "alerts cancelled");
        format!("Cancelled {removed} alert(s)")
    }
}

fn overflow_footer(hidden: usize) -> String {
    format!("\n\n…and {hidden} more")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price::testing::FakePrices;

    struct Harness {
        store: Arc<AlertStore>,
        prices: Arc<FakePrices>,
        router: CommandRouter,
    }

    fn harness() -> Harness {
        let store = Arc::new(AlertStore::new());
        let prices = Arc::new(FakePrices::with(&[
            ("bitcoin", 31_000.0),
            ("ethereum", 2_000.0),
        ]));
        let router = CommandRouter::new(
            Arc::clone(&store),
            prices.clone(),
            Duration::from_secs(5),
            "price_bot",
        );
        Harness {
            store,
            prices,
            router,
        }
    }

    #[tokio::test]
    async fn alert_is_created_after_symbol_check() {
        let h = harness();
        let reply = h
            .router
            .handle(OwnerId(1), "/alert Bitcoin 30000 above")
            .await
            .unwrap();

        assert_eq!(
            reply,
            "✅ Alert set for BITCOIN\nTarget: Above $30000\nCurrent price: $31000"
        );
        assert_eq!(h.prices.calls("bitcoin"), 1);
        let alerts = h.store.list_by_owner(OwnerId(1));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].symbol, "bitcoin");
        assert_eq!(alerts[0].direction, Direction::Above);
    }

    #[tokio::test]
    async fn bad_direction_rejected_before_any_fetch() {
        let h = harness();
        let reply = h
            .router
            .handle(OwnerId(1), "/alert doge 1 sideways")
            .await
            .unwrap();

        assert_eq!(reply, CommandError::Format.to_string());
        assert_eq!(h.prices.total_calls(), 0);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn bad_price_rejected_before_any_fetch() {
        let h = harness();
        let reply = h
            .router
            .handle(OwnerId(1), "/alert bitcoin lots above")
            .await
            .unwrap();

        assert_eq!(reply, CommandError::InvalidPrice.to_string());
        assert_eq!(h.prices.total_calls(), 0);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn unknown_symbol_creates_nothing() {
        let h = harness();
        let reply = h
            .router
            .handle(OwnerId(1), "/alert notacoin 5 below")
            .await
            .unwrap();

        assert_eq!(reply, CommandError::InvalidSymbol.to_string());
        assert_eq!(h.prices.calls("notacoin"), 1);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn zero_price_symbol_is_invalid() {
        let h = harness();
        h.prices.set("deadcoin", 0.0);
        let reply = h
            .router
            .handle(OwnerId(1), "/alert deadcoin 5 below")
            .await
            .unwrap();

        assert_eq!(reply, CommandError::InvalidSymbol.to_string());
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn myalerts_lists_only_callers_alerts() {
        let h = harness();
        h.router.handle(OwnerId(1), "/alert bitcoin 30000 above").await;
        h.router.handle(OwnerId(2), "/alert ethereum 1500 below").await;
        h.router.handle(OwnerId(1), "/alert ethereum 2500 above").await;

        let reply = h.router.handle(OwnerId(1), "/myalerts").await.unwrap();
        assert_eq!(
            reply,
            "Your active alerts:\n\nBITCOIN: Above $30000\nETHEREUM: Above $2500"
        );

        let reply = h.router.handle(OwnerId(3), "/myalerts").await.unwrap();
        assert_eq!(reply, "You have no active alerts.");
    }

    #[tokio::test]
    async fn cancel_reports_removed_count() {
        let h = harness();
        h.router.handle(OwnerId(1), "/alert bitcoin 30000 above").await;
        h.router.handle(OwnerId(1), "/alert bitcoin 20000 below").await;
        h.router.handle(OwnerId(2), "/alert bitcoin 20000 below").await;

        let reply = h.router.handle(OwnerId(1), "/cancel").await.unwrap();
        assert_eq!(reply, "Cancelled 2 alert(s)");
        assert!(h.store.list_by_owner(OwnerId(1)).is_empty());
        assert_eq!(h.store.list_by_owner(OwnerId(2)).len(), 1);

        let reply = h.router.handle(OwnerId(1), "/cancel").await.unwrap();
        assert_eq!(reply, "Cancelled 0 alert(s)");
    }

    #[tokio::test]
    async fn start_replies_with_usage_and_plain_text_is_ignored() {
        let h = harness();
        assert_eq!(
            h.router.handle(OwnerId(1), "/start").await.as_deref(),
            Some(USAGE)
        );
        assert_eq!(h.router.handle(OwnerId(1), "gm").await, None);
    }

    #[tokio::test]
    async fn commands_addressed_to_another_bot_are_ignored() {
        let h = harness();
        h.router.handle(OwnerId(1), "/alert bitcoin 30000 above").await;

        assert_eq!(h.router.handle(OwnerId(1), "/cancel@SomeOtherBot").await, None);
        assert_eq!(h.store.len(), 1);

        let reply = h.router.handle(OwnerId(1), "/cancel@Price_Bot").await.unwrap();
        assert_eq!(reply, "Cancelled 1 alert(s)");
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn cancel_with_arguments_removes_nothing() {
        let h = harness();
        h.router.handle(OwnerId(1), "/alert bitcoin 30000 above").await;

        let reply = h
            .router
            .handle(OwnerId(1), "/cancel everything please")
            .await
            .unwrap();
        assert_eq!(
            reply,
            CommandError::UnexpectedArguments { command: "cancel" }.to_string()
        );
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn long_alert_list_fits_in_one_message() {
        let h = harness();
        let total = 400;
        for i in 1..=total {
            h.store.add(Alert::new(
                OwnerId(1),
                "bitcoin",
                TargetPrice::new(f64::from(i)).unwrap(),
                Direction::Above,
            ));
        }

        let reply = h.router.handle(OwnerId(1), "/myalerts").await.unwrap();
        assert!(reply.chars().count() <= MAX_MESSAGE_CHARS);
        assert!(reply.starts_with("Your active alerts:\n\nBITCOIN: Above $"));

        let shown = reply.lines().filter(|l| l.starts_with("BITCOIN:")).count();
        let hidden: usize = reply
            .rsplit_once("…and ")
            .and_then(|(_, tail)| tail.strip_suffix(" more"))
            .unwrap()
            .parse()
            .unwrap();
        assert!(shown > 0);
        assert_eq!(shown + hidden, total as usize);
    }
}
