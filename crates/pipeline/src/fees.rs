//! Platform fee split
//!
//! The platform keeps a fixed percentage of each session's gross amount; the
//! mentor receives the remainder. The platform side is floored so rounding
//! never shorts the mentor.

/// Platform share of the gross amount, in percent.
pub const PLATFORM_FEE_PERCENT: i64 = 15;

/// Split of a gross charge between platform and mentor, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub platform_fee_cents: i64,
    pub mentor_payout_cents: i64,
}

/// Split `amount_cents` into platform fee and mentor payout.
///
/// The two parts always sum to the input amount.
pub fn split(amount_cents: i64) -> FeeSplit {
    let platform_fee_cents = amount_cents * PLATFORM_FEE_PERCENT / 100;
    FeeSplit {
        platform_fee_cents,
        mentor_payout_cents: amount_cents - platform_fee_cents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_round_amount() {
        let s = split(5000);
        assert_eq!(s.platform_fee_cents, 750);
        assert_eq!(s.mentor_payout_cents, 4250);
    }

    #[test]
    fn split_floors_platform_side() {
        // 15% of 999 = 149.85; platform gets 149, mentor gets the remainder
        let s = split(999);
        assert_eq!(s.platform_fee_cents, 149);
        assert_eq!(s.mentor_payout_cents, 850);
    }

    #[test]
    fn split_parts_always_sum_to_total() {
        for amount in [0, 1, 99, 100, 101, 4999, 5000, 123_456_789] {
            let s = split(amount);
            assert_eq!(s.platform_fee_cents + s.mentor_payout_cents, amount);
        }
    }

    #[test]
    fn split_zero() {
        let s = split(0);
        assert_eq!(s.platform_fee_cents, 0);
        assert_eq!(s.mentor_payout_cents, 0);
    }
}
