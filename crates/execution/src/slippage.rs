//! Fill-price and fill-size models for the simulator.

use algo_trade_core::SlippageModel;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Per-unit slippage for a market order of `quantity` at `price`.
///
/// The result is unsigned. Callers add it to buys and subtract it from sells.
#[must_use]
pub fn slippage_per_unit(model: SlippageModel, bps: Decimal, price: Decimal, quantity: u32) -> Decimal {
    let fixed = price * bps / dec!(10000);
    match model {
        SlippageModel::None => Decimal::ZERO,
        SlippageModel::Fixed => fixed,
        SlippageModel::VolumeBased => {
            let scale = (Decimal::from(quantity) / dec!(100)).min(dec!(2));
            fixed * scale
        }
    }
}

/// Filled size for a partial fill given a uniform draw `u` in `[0, 1)`.
///
/// `floor(qty * (0.5 + u * 0.5))`, never below one unit.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn partial_quantity(quantity: u32, u: f64) -> u32 {
    let fraction = 0.5 + u.clamp(0.0, 1.0) * 0.5;
    let filled = (f64::from(quantity) * fraction).floor() as u32;
    filled.clamp(1, quantity.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_bps() {
        assert_eq!(
            slippage_per_unit(SlippageModel::Fixed, dec!(5), dec!(4500), 10),
            dec!(2.25)
        );
        assert_eq!(
            slippage_per_unit(SlippageModel::None, dec!(5), dec!(4500), 10),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_volume_based_scales_and_caps() {
        // 50 units: half the fixed amount.
        assert_eq!(
            slippage_per_unit(SlippageModel::VolumeBased, dec!(10), dec!(100), 50),
            dec!(0.05)
        );
        // Capped at twice the fixed amount.
        assert_eq!(
            slippage_per_unit(SlippageModel::VolumeBased, dec!(10), dec!(100), 1000),
            dec!(0.2)
        );
    }

    #[test]
    fn test_partial_bounds() {
        assert_eq!(partial_quantity(100, 0.0), 50);
        assert_eq!(partial_quantity(100, 0.999), 99);
        assert_eq!(partial_quantity(1, 0.0), 1);
        assert_eq!(partial_quantity(3, 0.2), 1);
    }
}
