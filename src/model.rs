use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chat identity that owns an alert. Telegram chat ids are signed 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub i64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned identity of an alert. Never shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlertId(Uuid);

impl AlertId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Above,
    Below,
}

impl Direction {
    /// Case-insensitive parse of `above` / `below`.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("above") {
            Some(Self::Above)
        } else if s.eq_ignore_ascii_case("below") {
            Some(Self::Below)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Above => "Above",
            Self::Below => "Below",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strictly positive, finite alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct TargetPrice(f64);

impl TargetPrice {
    pub fn new(value: f64) -> Option<Self> {
        (value.is_finite() && value > 0.0).then_some(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for TargetPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub owner: OwnerId,
    pub symbol: String,
    pub target_price: TargetPrice,
    pub direction: Direction,
}

impl Alert {
    /// Build an alert; the symbol is normalised to lowercase.
    pub fn new(
        owner: OwnerId,
        symbol: &str,
        target_price: TargetPrice,
        direction: Direction,
    ) -> Self {
        Self {
            owner,
            symbol: symbol.to_lowercase(),
            target_price,
            direction,
        }
    }

    /// `Above` fires at or over the target, `Below` at or under it.
    pub fn is_triggered_by(&self, price: f64) -> bool {
        let target = self.target_price.value();
        match self.direction {
            Direction::Above => price >= target,
            Direction::Below => price <= target,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAlert {
    pub id: AlertId,
    pub created_at: DateTime<Utc>,
    pub alert: Alert,
}

/// An alert removed by the evaluator together with the price that fired it.
#[derive(Debug, Clone)]
pub struct Trigger {
    pub alert: Alert,
    pub observed_price: f64,
}

impl Trigger {
    pub fn message(&self) -> String {
        format!(
            "🚨 Alert: {} is now {} ${}! Current price: ${}",
            self.alert.symbol.to_uppercase(),
            self.alert.direction,
            self.alert.target_price,
            self.observed_price,
        )
    }
}
