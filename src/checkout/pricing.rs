use serde::{Deserialize, Serialize};

pub const MIN_QUANTITY: i32 = 100;
pub const QUANTITY_STEP: i32 = 100;
const BULK_QUANTITY: i32 = 1000;
const BULK_DISCOUNT_PERCENT: i64 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BottleType {
    #[serde(rename = "standard_500ml")]
    Standard500ml,
    #[serde(rename = "premium_1l")]
    Premium1l,
    #[serde(rename = "glass_750ml")]
    Glass750ml,
}

impl BottleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BottleType::Standard500ml => "standard_500ml",
            BottleType::Premium1l => "premium_1l",
            BottleType::Glass750ml => "glass_750ml",
        }
    }

    /// Per-bottle price in paise.
    pub fn unit_price(&self) -> i64 {
        match self {
            BottleType::Standard500ml => 1_200,
            BottleType::Premium1l => 1_800,
            BottleType::Glass750ml => 2_500,
        }
    }
}

impl std::str::FromStr for BottleType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard_500ml" => Ok(BottleType::Standard500ml),
            "premium_1l" => Ok(BottleType::Premium1l),
            "glass_750ml" => Ok(BottleType::Glass750ml),
            other => anyhow::bail!("unknown bottle type {other:?}"),
        }
    }
}

/// Order total in paise. `quantity` is assumed already validated.
pub fn quote(bottle: BottleType, quantity: i32) -> i64 {
    let gross = bottle.unit_price() * i64::from(quantity);
    if quantity >= BULK_QUANTITY {
        gross * (100 - BULK_DISCOUNT_PERCENT) / 100
    } else {
        gross
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes() {
        assert_eq!(quote(BottleType::Standard500ml, 100), 120_000);
        assert_eq!(quote(BottleType::Glass750ml, 900), 2_250_000);
        // bulk discount kicks in at 1000
        assert_eq!(quote(BottleType::Premium1l, 1000), 1_620_000);
    }

    #[test]
    fn bottle_type_text() {
        let b: BottleType = serde_json::from_str("\"premium_1l\"").unwrap();
        assert_eq!(b, BottleType::Premium1l);
        assert_eq!("glass_750ml".parse::<BottleType>().unwrap(), BottleType::Glass750ml);
        assert!("can_330ml".parse::<BottleType>().is_err());
    }
}
