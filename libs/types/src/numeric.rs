//! Share counts and weighted-average helpers
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Share counts on derived records are whole numbers.

use rust_decimal::Decimal;

/// Whole-share count on a trade or leg
pub type Shares = u64;

/// Quantity-weighted average of an existing average and one more lot.
///
/// `(avg × held + price × qty) / (held + qty)`. With nothing held the new
/// lot's price is returned as-is.
pub fn weighted_average(avg: Decimal, held: Shares, price: Decimal, qty: Shares) -> Decimal {
    if held == 0 {
        return price;
    }
    let total = held + qty;
    (avg * Decimal::from(held) + price * Decimal::from(qty)) / Decimal::from(total)
}

/// Portion of `amount` attributable to `part` out of `whole`.
///
/// Returns the full amount when `part >= whole` and zero when `whole == 0`.
pub fn pro_rata(amount: Decimal, part: Shares, whole: Shares) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    if part >= whole {
        return amount;
    }
    amount * Decimal::from(part) / Decimal::from(whole)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_average_equal_lots() {
        let avg = weighted_average(Decimal::from(10), 100, Decimal::from(12), 100);
        assert_eq!(avg, Decimal::from(11));
    }

    #[test]
    fn test_weighted_average_uneven_lots() {
        // (10 × 300 + 14 × 100) / 400 = 11
        let avg = weighted_average(Decimal::from(10), 300, Decimal::from(14), 100);
        assert_eq!(avg, Decimal::from(11));
    }

    #[test]
    fn test_weighted_average_from_empty() {
        let avg = weighted_average(Decimal::ZERO, 0, Decimal::new(1525, 2), 40);
        assert_eq!(avg, Decimal::new(1525, 2));
    }

    #[test]
    fn test_pro_rata() {
        assert_eq!(pro_rata(Decimal::from(3), 100, 150), Decimal::from(2));
        assert_eq!(pro_rata(Decimal::from(3), 150, 150), Decimal::from(3));
        assert_eq!(pro_rata(Decimal::from(3), 0, 0), Decimal::ZERO);
    }
}
