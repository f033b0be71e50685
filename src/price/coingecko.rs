use std::collections::HashMap;
use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use tracing::debug;

use crate::config::PriceConfig;
use crate::error::PriceError;
use crate::price::PriceSource;

/// `simple/price` response: `{ "<id>": { "<currency>": <price> } }`.
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

pub struct CoinGeckoPriceSource {
    client: reqwest::Client,
    base_url: String,
    vs_currency: String,
}

impl CoinGeckoPriceSource {
    pub fn new(
        config: &PriceConfig,
        request_timeout: Duration,
    ) -> Result<Self, Report<PriceError>> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .change_context(PriceError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            vs_currency: config.vs_currency.to_lowercase(),
        })
    }
}

impl PriceSource for CoinGeckoPriceSource {
    fn fetch(&self, symbol: &str) -> BoxFuture<'_, Result<f64, Report<PriceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            let url = format!("{}/simple/price", self.base_url);
            let params = [
                ("ids", symbol.as_str()),
                ("vs_currencies", self.vs_currency.as_str()),
            ];

            let response = self
                .client
                .get(&url)
                .query(&params)
                .send()
                .await
                .change_context(PriceError::Request {
                    symbol: symbol.clone(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(Report::new(PriceError::Status {
                    symbol,
                    status: status.as_u16(),
                }));
            }

            let body: SimplePriceResponse =
                response
                    .json()
                    .await
                    .change_context(PriceError::ResponseParse {
                        symbol: symbol.clone(),
                    })?;

            let price = extract_price(&body, &symbol, &self.vs_currency)?;
            debug!(symbol = %symbol, price, "coingecko price fetched");
            Ok(price)
        })
    }
}

fn extract_price(
    body: &SimplePriceResponse,
    symbol: &str,
    vs_currency: &str,
) -> Result<f64, Report<PriceError>> {
    body.get(symbol)
        .and_then(|quotes| quotes.get(vs_currency))
        .copied()
        .ok_or_else(|| {
            Report::new(PriceError::UnknownSymbol {
                symbol: symbol.to_owned(),
            })
        })
}
