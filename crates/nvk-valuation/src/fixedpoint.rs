//! Micro-unit arithmetic helpers.
//!
//! All monetary values in this system are unsigned 1e-6 fixed-point
//! (micro-units) stored as `u128`. One whole unit = 1_000_000 micro-units.
//! Quantities and prices are both micro-unit scaled, so a position value is
//! `quantity × price / MICROS_SCALE` (the product is at 1e-12 scale and the
//! division restores 1e-6).
//!
//! Every multiply/divide here is checked; `None` means the computation does
//! not fit in `u128` (or the divisor is zero) and callers must surface that
//! as an explicit error rather than clamp. Overflow in a valuation is a
//! critical condition, not a routine saturation.

/// 1e-6 fixed-point scale.
pub const MICROS_SCALE: u128 = 1_000_000;

/// Basis-point denominator (1 bps = 0.01%).
pub const BPS_DENOM: u128 = 10_000;

/// Seconds in a 365-day accrual year.
pub const SECS_PER_YEAR: u128 = 31_536_000;

/// Combined divisor for simple interest: rate is in bps, time in seconds.
pub const SECS_PER_YEAR_DENOM: u128 = BPS_DENOM * SECS_PER_YEAR;

/// `a × b / den` with overflow/zero-divisor detection.
#[inline]
pub fn mul_div(a: u128, b: u128, den: u128) -> Option<u128> {
    a.checked_mul(b)?.checked_div(den)
}

/// Position value: `quantity × price / MICROS_SCALE`.
#[inline]
pub fn qty_price_value(quantity: u128, price: u128) -> Option<u128> {
    mul_div(quantity, price, MICROS_SCALE)
}

/// Basis-point share of a value: `value × bps / 10_000`.
#[inline]
pub fn bps_of(value: u128, bps: u64) -> Option<u128> {
    mul_div(value, bps as u128, BPS_DENOM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_basic() {
        assert_eq!(mul_div(100, 50, 10), Some(500));
    }

    #[test]
    fn mul_div_zero_divisor_is_none() {
        assert_eq!(mul_div(1, 1, 0), None);
    }

    #[test]
    fn mul_div_overflow_is_none() {
        assert_eq!(mul_div(u128::MAX, 2, 1), None);
    }

    #[test]
    fn qty_price_truncates_below_scale() {
        // 100 micro-shares × 50 micro-price = 5000, below one micro-unit.
        assert_eq!(qty_price_value(100, 50), Some(0));
    }

    #[test]
    fn qty_price_whole_unit() {
        assert_eq!(qty_price_value(1_000_000, 50), Some(50));
    }

    #[test]
    fn bps_of_half() {
        assert_eq!(bps_of(1_000_000, 5_000), Some(500_000));
    }
}
