//! Second-price clearing. Bids arrive already validated, converted and
//! multiplier-adjusted; everything here operates on adjusted prices in
//! the exchange default currency.

use crate::core::models::auction::TypedBid;

/// One atomic price increment in the default currency.
pub const PRICE_INCREMENT: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct Settlement {
    pub winner: TypedBid,
    pub clear_price: f64,
    pub runner_up: Option<f64>,
}

/// Orders candidates by adjusted price descending with partner code as
/// a deterministic tiebreak, so arrival order never influences the
/// outcome.
pub fn sort_bids_by_adjusted_price(bids: &mut [TypedBid]) {
    bids.sort_by(|a, b| {
        b.adjusted_price
            .total_cmp(&a.adjusted_price)
            .then_with(|| a.partner.cmp(&b.partner))
    });
}

fn to_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Settles one impression. Clear price is the runner-up (or the floor
/// when there is none) plus one increment, floored at the effective
/// floor and capped at the winner's own adjusted price.
pub fn settle_imp(mut bids: Vec<TypedBid>, floor: f64) -> Option<Settlement> {
    if bids.is_empty() {
        return None;
    }

    sort_bids_by_adjusted_price(&mut bids);

    let runner_up = bids.get(1).map(|b| b.adjusted_price);
    let winner = bids.swap_remove(0);

    let base = runner_up.unwrap_or(floor).max(floor);
    let clear_price = to_cents((base + PRICE_INCREMENT).min(winner.adjusted_price));

    Some(Settlement {
        winner,
        clear_price,
        runner_up,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn bid(partner: &str, imp: &str, adjusted: f64) -> TypedBid {
        TypedBid {
            partner: partner.to_string(),
            imp_id: imp.to_string(),
            price: adjusted,
            currency: "USD".to_string(),
            converted_price: adjusted,
            adjusted_price: adjusted,
            creative_id: format!("c-{}", partner),
            ..Default::default()
        }
    }

    #[test]
    fn test_single_bid_clears_at_floor_plus_increment() {
        let settlement = settle_imp(vec![bid("x", "1", 2.50)], 0.0).unwrap();

        assert_eq!(settlement.winner.partner, "x");
        assert_eq!(settlement.clear_price, 0.01);
        assert!(settlement.runner_up.is_none());
    }

    #[test]
    fn test_second_price_plus_increment() {
        let settlement =
            settle_imp(vec![bid("x", "1", 4.00), bid("y", "1", 3.25)], 0.0).unwrap();

        assert_eq!(settlement.winner.partner, "x");
        assert_eq!(settlement.clear_price, 3.26);
        assert_eq!(settlement.runner_up, Some(3.25));
    }

    #[test]
    fn test_clear_never_exceeds_winner() {
        // runner-up one increment below the winner already
        let settlement =
            settle_imp(vec![bid("x", "1", 2.00), bid("y", "1", 1.995)], 0.0).unwrap();

        assert!(settlement.clear_price <= settlement.winner.adjusted_price);
        assert_eq!(settlement.clear_price, 2.00);
    }

    #[test]
    fn test_floor_raises_clear_price() {
        let settlement =
            settle_imp(vec![bid("x", "1", 5.00), bid("y", "1", 1.00)], 2.50).unwrap();

        // runner-up below floor, floor governs
        assert_eq!(settlement.clear_price, 2.51);
    }

    #[test]
    fn test_equal_top_bids_tiebreak_by_partner_code() {
        let settlement =
            settle_imp(vec![bid("zeta", "1", 3.00), bid("alpha", "1", 3.00)], 0.0).unwrap();

        assert_eq!(settlement.winner.partner, "alpha");
        // runner-up equals winner, clear capped at winner price
        assert_eq!(settlement.clear_price, 3.00);
    }

    #[test]
    fn test_at_most_one_winner_per_imp_group() {
        let mut by_imp: HashMap<String, Vec<TypedBid>> = HashMap::new();
        for b in [bid("x", "1", 4.00), bid("y", "1", 3.25), bid("x", "2", 1.50)] {
            by_imp.entry(b.imp_id.clone()).or_default().push(b);
        }

        let winners: Vec<Settlement> = by_imp
            .into_values()
            .filter_map(|group| settle_imp(group, 0.0))
            .collect();

        assert_eq!(winners.len(), 2);
        assert!(winners.iter().any(|s| s.winner.imp_id == "1" && s.winner.partner == "x"));
        assert!(winners.iter().any(|s| s.winner.imp_id == "2"));
    }

    #[test]
    fn test_empty_group_settles_to_none() {
        assert!(settle_imp(Vec::new(), 1.0).is_none());
    }
}
