//! Subscription plan catalog.

use serde::Serialize;

/// A purchasable plan
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Plan {
    pub id: &'static str,
    pub name: &'static str,
    /// Monthly price in US cents
    pub price_cents: u32,
    /// Release credits added per purchase
    pub credits: i64,
    pub features: &'static [&'static str],
    /// Highlighted on the pricing table
    pub featured: bool,
}

static PLANS: [Plan; 3] = [
    Plan {
        id: "starter",
        name: "Starter",
        price_cents: 9_900,
        credits: 1,
        features: &[
            "1 press release per month",
            "AI first draft",
            "Journalist panel critique",
            "Distribution to opted-in journalists",
        ],
        featured: false,
    },
    Plan {
        id: "growth",
        name: "Growth",
        price_cents: 34_900,
        credits: 4,
        features: &[
            "4 press releases per month",
            "Everything in Starter",
            "Contrarian review",
            "Headline voting for your team",
            "Scheduled publishing",
        ],
        featured: true,
    },
    Plan {
        id: "agency",
        name: "Agency",
        price_cents: 99_900,
        credits: 15,
        features: &[
            "15 press releases per month",
            "Everything in Growth",
            "Multiple client brands",
            "Priority editor review",
        ],
        featured: false,
    },
];

/// All plans, cheapest first
pub fn plans() -> &'static [Plan] {
    &PLANS
}

pub fn find_plan(id: &str) -> Option<&'static Plan> {
    PLANS.iter().find(|p| p.id.eq_ignore_ascii_case(id.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_is_ordered_by_price() {
        let prices: Vec<u32> = plans().iter().map(|p| p.price_cents).collect();
        let mut sorted = prices.clone();
        sorted.sort();
        assert_eq!(prices, sorted);
        assert_eq!(plans().iter().filter(|p| p.featured).count(), 1);
    }

    #[test]
    fn test_find_plan() {
        assert_eq!(find_plan("Agency").map(|p| p.credits), Some(15));
        assert!(find_plan("enterprise").is_none());
    }
}
