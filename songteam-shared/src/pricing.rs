/// Credit packs sold through Stripe Checkout
///
/// Prices live here in cents; the matching Stripe price ids are deployment
/// configuration and are looked up by the API at checkout time.
///
/// # Plans
///
/// | Plan        | Credits | Price   |
/// |-------------|---------|---------|
/// | `starter`   | 4       | $20.00  |
/// | `pro`       | 20      | $80.00  |
/// | `corporate` | 50      | $175.00 |

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Purchasable credit pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingPlan {
    Starter,
    Pro,
    Corporate,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid plan: {0}")]
pub struct InvalidPlan(pub String);

impl PricingPlan {
    pub const ALL: [PricingPlan; 3] = [
        PricingPlan::Starter,
        PricingPlan::Pro,
        PricingPlan::Corporate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PricingPlan::Starter => "starter",
            PricingPlan::Pro => "pro",
            PricingPlan::Corporate => "corporate",
        }
    }

    /// Display name shown on the checkout page
    pub fn name(&self) -> &'static str {
        match self {
            PricingPlan::Starter => "Starter Pack",
            PricingPlan::Pro => "Pro Pack",
            PricingPlan::Corporate => "Corporate Pack",
        }
    }

    /// Number of song credits granted on purchase
    pub fn credits(&self) -> i32 {
        match self {
            PricingPlan::Starter => 4,
            PricingPlan::Pro => 20,
            PricingPlan::Corporate => 50,
        }
    }

    /// Pack price in US cents
    pub fn price_cents(&self) -> i64 {
        match self {
            PricingPlan::Starter => 2_000,
            PricingPlan::Pro => 8_000,
            PricingPlan::Corporate => 17_500,
        }
    }

    /// Per-song price in US cents
    pub fn price_per_song_cents(&self) -> i64 {
        self.price_cents() / i64::from(self.credits())
    }

    /// Whether the plan is highlighted as the recommended option
    pub fn is_popular(&self) -> bool {
        matches!(self, PricingPlan::Pro)
    }
}

impl FromStr for PricingPlan {
    type Err = InvalidPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(PricingPlan::Starter),
            "pro" => Ok(PricingPlan::Pro),
            "corporate" => Ok(PricingPlan::Corporate),
            other => Err(InvalidPlan(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_catalogue() {
        assert_eq!(PricingPlan::Starter.credits(), 4);
        assert_eq!(PricingPlan::Starter.price_cents(), 2_000);
        assert_eq!(PricingPlan::Pro.credits(), 20);
        assert_eq!(PricingPlan::Pro.price_cents(), 8_000);
        assert_eq!(PricingPlan::Corporate.credits(), 50);
        assert_eq!(PricingPlan::Corporate.price_cents(), 17_500);
    }

    #[test]
    fn test_price_per_song() {
        assert_eq!(PricingPlan::Starter.price_per_song_cents(), 500);
        assert_eq!(PricingPlan::Pro.price_per_song_cents(), 400);
        assert_eq!(PricingPlan::Corporate.price_per_song_cents(), 350);
    }

    #[test]
    fn test_only_pro_is_popular() {
        let popular: Vec<_> = PricingPlan::ALL.iter().filter(|p| p.is_popular()).collect();
        assert_eq!(popular, vec![&PricingPlan::Pro]);
    }

    #[test]
    fn test_parse() {
        assert_eq!("pro".parse::<PricingPlan>(), Ok(PricingPlan::Pro));
        assert_eq!(
            "enterprise".parse::<PricingPlan>(),
            Err(InvalidPlan("enterprise".to_string()))
        );
    }
}
