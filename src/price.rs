pub mod coingecko;

use std::time::Duration;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::PriceError;

/// Source of current spot prices keyed by provider symbol id.
///
/// Uses `BoxFuture` instead of `async fn` in trait to keep the trait
/// object-safe (`dyn PriceSource`).
pub trait PriceSource: Send + Sync {
    fn fetch(&self, symbol: &str) -> BoxFuture<'_, Result<f64, Report<PriceError>>>;
}

/// Fetch `symbol` with an upper bound of `timeout`.
///
/// Timeouts, provider errors and non-positive or non-finite prices all come
/// back as `Err`; callers treat any error as "price unavailable".
pub async fn fetch_checked(
    source: &dyn PriceSource,
    symbol: &str,
    timeout: Duration,
) -> Result<f64, Report<PriceError>> {
    let price = match tokio::time::timeout(timeout, source.fetch(symbol)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(Report::new(PriceError::Timeout {
                symbol: symbol.to_owned(),
            })
            .attach(format!("timeout: {timeout:?}")));
        }
    };

    if !price.is_finite() || price <= 0.0 {
        return Err(Report::new(PriceError::InvalidPrice {
            symbol: symbol.to_owned(),
            price,
        }));
    }

    Ok(price)
}

/// Like [`fetch_checked`], but logs the failure and collapses it to `None`.
pub async fn fetch_available(
    source: &dyn PriceSource,
    symbol: &str,
    timeout: Duration,
) -> Option<f64> {
    match fetch_checked(source, symbol, timeout).await {
        Ok(price) => Some(price),
        Err(e) => {
            tracing::warn!(symbol, error = ?e, "price unavailable");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use error_stack::Report;
    use futures::future::BoxFuture;

    use super::PriceSource;
    use crate::error::PriceError;

    /// Scripted price source that counts calls per symbol.
    #[derive(Default)]
    pub struct FakePrices {
        prices: Mutex<HashMap<String, f64>>,
        hanging: Mutex<Vec<String>>,
        calls: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
    }

    impl FakePrices {
        pub fn with(prices: &[(&str, f64)]) -> Self {
            let fake = Self::default();
            for (symbol, price) in prices {
                fake.set(symbol, *price);
            }
            fake
        }

        pub fn set(&self, symbol: &str, price: f64) {
            self.prices
                .lock()
                .unwrap()
                .insert(symbol.to_owned(), price);
        }

        /// Make fetches for `symbol` never complete.
        pub fn hang(&self, symbol: &str) {
            self.hanging.lock().unwrap().push(symbol.to_owned());
        }

        pub fn calls(&self, symbol: &str) -> usize {
            self.calls.lock().unwrap().get(symbol).copied().unwrap_or(0)
        }

        pub fn total_calls(&self) -> usize {
            self.total.load(Ordering::SeqCst)
        }
    }

    impl PriceSource for FakePrices {
        fn fetch(&self, symbol: &str) -> BoxFuture<'_, Result<f64, Report<PriceError>>> {
            let symbol = symbol.to_owned();
            Box::pin(async move {
                self.total.fetch_add(1, Ordering::SeqCst);
                *self.calls.lock().unwrap().entry(symbol.clone()).or_default() += 1;

                if self.hanging.lock().unwrap().contains(&symbol) {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }

                let price = self.prices.lock().unwrap().get(&symbol).copied();
                price.ok_or_else(|| Report::new(PriceError::UnknownSymbol { symbol }))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakePrices;
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn positive_price_is_available() {
        let prices = FakePrices::with(&[("bitcoin", 31_000.0)]);
        assert_eq!(
            fetch_available(&prices, "bitcoin", TIMEOUT).await,
            Some(31_000.0)
        );
    }

    #[tokio::test]
    async fn zero_and_negative_prices_are_unavailable() {
        let prices = FakePrices::with(&[("zero", 0.0), ("neg", -3.0), ("nan", f64::NAN)]);
        assert_eq!(fetch_available(&prices, "zero", TIMEOUT).await, None);
        assert_eq!(fetch_available(&prices, "neg", TIMEOUT).await, None);
        assert_eq!(fetch_available(&prices, "nan", TIMEOUT).await, None);
    }

    #[tokio::test]
    async fn unknown_symbol_is_unavailable() {
        let prices = FakePrices::default();
        let err = fetch_checked(&prices, "nope", TIMEOUT).await.unwrap_err();
        assert!(matches!(
            err.current_context(),
            PriceError::UnknownSymbol { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_fetch_times_out() {
        let prices = FakePrices::with(&[("slow", 1.0)]);
        prices.hang("slow");
        let err = fetch_checked(&prices, "slow", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), PriceError::Timeout { .. }));
    }
}
