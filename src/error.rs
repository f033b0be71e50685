use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
    #[display("missing environment variable {name}")]
    MissingEnv { name: String },
}

#[derive(Debug, Display, Error)]
pub enum PriceError {
    #[display("failed to build price client")]
    Client,
    #[display("price request for {symbol} failed")]
    Request { symbol: String },
    #[display("price provider returned HTTP {status} for {symbol}")]
    Status { symbol: String, status: u16 },
    #[display("failed to parse price response for {symbol}")]
    ResponseParse { symbol: String },
    #[display("unknown symbol {symbol}")]
    UnknownSymbol { symbol: String },
    #[display("unusable price {price} for {symbol}")]
    InvalidPrice { symbol: String, price: f64 },
    #[display("price request for {symbol} timed out")]
    Timeout { symbol: String },
}

#[derive(Debug, Display, Error)]
pub enum TransportError {
    #[display("failed to build Telegram client")]
    Client,
    #[display("{method} request failed")]
    Request { method: &'static str },
    #[display("failed to parse {method} response")]
    ResponseParse { method: &'static str },
    #[display("{method} rejected: {description}")]
    Api {
        method: &'static str,
        description: String,
    },
}

#[derive(Debug, Display, Error)]
pub enum NotifyError {
    #[display("failed to deliver notification")]
    Delivery,
}
