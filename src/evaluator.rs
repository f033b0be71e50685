use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{AlertId, Trigger};
use crate::notifier::Notifier;
use crate::price::{self, PriceSource};
use crate::store::AlertStore;

/// Counters for one evaluation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Alerts in the snapshot.
    pub alerts: usize,
    /// Distinct symbols fetched.
    pub symbols: usize,
    /// Symbols with no usable price this tick.
    pub unavailable: usize,
    /// Alerts removed because their condition held.
    pub triggered: usize,
    /// Notifications delivered without error.
    pub delivered: usize,
}

/// Periodic trigger detection over the shared [`AlertStore`].
pub struct AlertEvaluator {
    store: Arc<AlertStore>,
    prices: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    fetch_timeout: Duration,
}

impl AlertEvaluator {
    pub fn new(
        store: Arc<AlertStore>,
        prices: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            store,
            prices,
            notifier,
            fetch_timeout,
        }
    }

    /// Tick every `period` until `cancel` fires. The first tick runs
    /// immediately.
    pub async fn run(&self, period: Duration, cancel: CancellationToken) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period = ?period, "alert evaluator started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let report = tokio::select! {
                _ = cancel.cancelled() => break,
                report = self.tick() => report,
            };

            if report.triggered > 0 || report.unavailable > 0 {
                info!(?report, "evaluation tick complete");
            } else {
                debug!(?report, "evaluation tick complete");
            }
        }

        info!("alert evaluator stopped");
    }

    /// Run one evaluation pass: snapshot, fetch each symbol once, remove the
    /// alerts whose condition holds and notify their owners.
    pub async fn tick(&self) -> TickReport {
        let snapshot = self.store.snapshot();
        let mut report = TickReport {
            alerts: snapshot.len(),
            ..TickReport::default()
        };
        if snapshot.is_empty() {
            return report;
        }

        let symbols: BTreeSet<&str> = snapshot.iter().map(|s| s.alert.symbol.as_str()).collect();
        report.symbols = symbols.len();

        // The store lock is not held here; fetches only see the snapshot.
        let fetched = join_all(symbols.iter().map(|&symbol| async move {
            let price =
                price::fetch_available(self.prices.as_ref(), symbol, self.fetch_timeout).await;
            (symbol, price)
        }))
        .await;

        let mut prices: HashMap<&str, f64> = HashMap::with_capacity(fetched.len());
        for (symbol, price) in fetched {
            match price {
                Some(price) => {
                    prices.insert(symbol, price);
                }
                None => report.unavailable += 1,
            }
        }

        let hits: HashMap<AlertId, f64> = snapshot
            .iter()
            .filter_map(|s| {
                let price = *prices.get(s.alert.symbol.as_str())?;
                s.alert.is_triggered_by(price).then_some((s.id, price))
            })
            .collect();
        if hits.is_empty() {
            return report;
        }

        // Alerts cancelled since the snapshot are simply no longer present.
        let removed = self.store.remove_matching(|s| hits.contains_key(&s.id));
        report.triggered = removed.len();

        for stored in removed {
            let Some(&observed_price) = hits.get(&stored.id) else {
                continue;
            };
            info!(
                owner = %stored.alert.owner,
                id = %stored.id,
                symbol = %stored.alert.symbol,
                direction = %stored.alert.direction,
                target = stored.alert.target_price.value(),
                price = observed_price,
                created_at = %stored.created_at,
                "alert triggered"
            );

            let owner = stored.alert.owner;
            let trigger = Trigger {
                alert: stored.alert,
                observed_price,
            };
            match self.notifier.notify(trigger).await {
                Ok(()) => report.delivered += 1,
                Err(e) => warn!(%owner, error = ?e, "failed to deliver alert notification"),
            }
        }

        report
    }
}
