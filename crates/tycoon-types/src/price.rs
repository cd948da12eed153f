//! Sell-price multipliers relative to the market price.
//!
//! The controlled entity expresses ask prices as `MP` (market price) or
//! `MP*<factor>`. Multipliers are held as [`Decimal`] rounded to two places
//! so that "has the price changed?" is an exact comparison rather than a
//! float tolerance check.
//!
//! Prices read back from the entity may have been set by hand to something
//! else entirely; [`ObservedPrice`] keeps those readable.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

/// The token the entity uses for its own market price.
pub const MARKET_PRICE: &str = "MP";

/// Number of decimal places kept on a multiplier.
const MULTIPLIER_SCALE: u32 = 2;

/// Errors produced when parsing a price expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceParseError {
    /// The expression does not reference the market price.
    #[error("price expression must start with `MP`: {0}")]
    MissingMarketPrice(String),

    /// The factor after `MP*` is not a number.
    #[error("invalid multiplier in price expression `{0}`")]
    InvalidMultiplier(String),
}

/// A sell price expressed as a multiple of the market price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PriceMultiplier(Decimal);

impl PriceMultiplier {
    /// Sell at exactly the market price.
    pub const MARKET: Self = Self(Decimal::ONE);

    /// Build a multiplier from an exact decimal, rounded to two places.
    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp(MULTIPLIER_SCALE).normalize())
    }

    /// Build a multiplier from a float factor, rounded to two places.
    ///
    /// Non-finite factors fall back to [`PriceMultiplier::MARKET`].
    pub fn from_factor(factor: f64) -> Self {
        Decimal::from_f64(factor).map_or(Self::MARKET, Self::new)
    }

    /// The multiplier as an exact decimal.
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// Whether this is the plain market price.
    pub fn is_market(self) -> bool {
        self.0 == Decimal::ONE
    }
}

impl Default for PriceMultiplier {
    fn default() -> Self {
        Self::MARKET
    }
}

impl fmt::Display for PriceMultiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_market() {
            write!(f, "{MARKET_PRICE}")
        } else {
            write!(f, "{MARKET_PRICE}*{:.2}", self.0)
        }
    }
}

impl FromStr for PriceMultiplier {
    type Err = PriceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expr = s.trim();
        if expr.is_empty() || expr == MARKET_PRICE {
            return Ok(Self::MARKET);
        }
        let Some(rest) = expr.strip_prefix(MARKET_PRICE) else {
            return Err(PriceParseError::MissingMarketPrice(expr.to_owned()));
        };
        let factor = rest
            .trim_start()
            .strip_prefix('*')
            .ok_or_else(|| PriceParseError::InvalidMultiplier(expr.to_owned()))?;
        let value = Decimal::from_str(factor.trim())
            .map_err(|_err| PriceParseError::InvalidMultiplier(expr.to_owned()))?;
        Ok(Self::new(value))
    }
}

impl TryFrom<String> for PriceMultiplier {
    type Error = PriceParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PriceMultiplier> for String {
    fn from(value: PriceMultiplier) -> Self {
        value.to_string()
    }
}

/// A sell price as the entity reports it.
///
/// Anything that is not an `MP*x` expression is kept verbatim so one
/// hand-set price never makes a whole snapshot unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservedPrice {
    /// A multiple of the market price.
    Multiplier(PriceMultiplier),
    /// A fixed numeric price.
    Fixed(f64),
    /// Any other expression.
    Other(String),
}

impl ObservedPrice {
    /// The multiplier, if the price is one.
    pub const fn multiplier(&self) -> Option<PriceMultiplier> {
        match self {
            Self::Multiplier(m) => Some(*m),
            Self::Fixed(_) | Self::Other(_) => None,
        }
    }

    /// Whether the price is exactly `multiplier`.
    pub fn is(&self, multiplier: PriceMultiplier) -> bool {
        self.multiplier() == Some(multiplier)
    }
}

impl Default for ObservedPrice {
    fn default() -> Self {
        Self::Multiplier(PriceMultiplier::MARKET)
    }
}

impl From<PriceMultiplier> for ObservedPrice {
    fn from(value: PriceMultiplier) -> Self {
        Self::Multiplier(value)
    }
}

impl fmt::Display for ObservedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Multiplier(m) => write!(f, "{m}"),
            Self::Fixed(value) => write!(f, "{value}"),
            Self::Other(expr) => write!(f, "{expr}"),
        }
    }
}
