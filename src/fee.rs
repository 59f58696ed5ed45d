//! Fee and schedule calculator: pure functions, no clock, no storage.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::error::{AppError, AppResult};

const SECONDS_PER_DAY: i64 = 86_400;

/// Expected return is `start_time` plus whole calendar days.
pub fn expected_return(
    start_time: DateTime<Utc>,
    duration_days: i32,
) -> AppResult<DateTime<Utc>> {
    validate_duration(duration_days)?;
    Ok(start_time + Duration::days(i64::from(duration_days)))
}

/// Quote at booking time: `duration_days * price_per_day`, 2 decimal places.
pub fn provisional_fee(duration_days: i32, price_per_day: Decimal) -> AppResult<Decimal> {
    validate_duration(duration_days)?;
    validate_price(price_per_day)?;
    Ok((price_per_day * Decimal::from(duration_days)).round_dp(2))
}

/// Fee locked in at the moment of return. Charged days are the elapsed time
/// rounded up to whole days, never less than one; an early return does not
/// undercut the quoted amount.
pub fn final_fee(
    start_time: DateTime<Utc>,
    actual_return_time: DateTime<Utc>,
    price_per_day: Decimal,
    provisional: Decimal,
) -> AppResult<Decimal> {
    validate_price(price_per_day)?;
    if actual_return_time < start_time {
        return Err(AppError::InvalidArgument(
            "Return time precedes start time".into(),
        ));
    }

    let elapsed_secs = (actual_return_time - start_time).num_seconds();
    let actual_days = (elapsed_secs as u64).div_ceil(SECONDS_PER_DAY as u64).max(1) as i64;

    let actual_fee = (price_per_day * Decimal::from(actual_days)).round_dp(2);
    Ok(actual_fee.max(provisional))
}

fn validate_duration(duration_days: i32) -> AppResult<()> {
    if duration_days < 1 {
        return Err(AppError::InvalidArgument(
            "Duration days must be positive".into(),
        ));
    }
    Ok(())
}

fn validate_price(price_per_day: Decimal) -> AppResult<()> {
    if price_per_day <= Decimal::ZERO {
        return Err(AppError::InvalidArgument("Price must be positive".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn three_days_at_100_quotes_300() {
        let start = ts(2024, 1, 1, 0);
        assert_eq!(expected_return(start, 3).unwrap(), ts(2024, 1, 4, 0));
        assert_eq!(
            provisional_fee(3, Decimal::from(100)).unwrap(),
            Decimal::new(30000, 2)
        );
    }

    #[test]
    fn quote_is_deterministic() {
        let start = ts(2024, 1, 1, 0);
        for _ in 0..3 {
            assert_eq!(expected_return(start, 5).unwrap(), ts(2024, 1, 6, 0));
            assert_eq!(
                provisional_fee(5, Decimal::new(9950, 2)).unwrap(),
                Decimal::new(49750, 2)
            );
        }
    }

    #[test]
    fn one_day_late_charges_four_days() {
        // Scenario: 3-day rental at 100/day returned on day 4.
        let start = ts(2024, 1, 1, 0);
        let returned = ts(2024, 1, 5, 0);
        let provisional = provisional_fee(3, Decimal::from(100)).unwrap();
        let fee = final_fee(start, returned, Decimal::from(100), provisional).unwrap();
        assert_eq!(fee, Decimal::new(40000, 2));
    }

    #[test]
    fn partial_day_overrun_rounds_up() {
        let start = ts(2024, 1, 1, 0);
        let returned = ts(2024, 1, 4, 6);
        let provisional = provisional_fee(3, Decimal::from(100)).unwrap();
        let fee = final_fee(start, returned, Decimal::from(100), provisional).unwrap();
        assert_eq!(fee, Decimal::new(40000, 2));
    }

    #[test]
    fn early_return_keeps_the_quote() {
        let start = ts(2024, 1, 1, 0);
        let returned = ts(2024, 1, 2, 0);
        let provisional = provisional_fee(3, Decimal::from(100)).unwrap();
        let fee = final_fee(start, returned, Decimal::from(100), provisional).unwrap();
        assert_eq!(fee, provisional);
    }

    #[test]
    fn final_fee_never_undercuts_provisional() {
        let start = ts(2024, 1, 1, 0);
        let price = Decimal::new(7337, 2);
        let provisional = provisional_fee(7, price).unwrap();
        for hours in [1, 24, 100, 24 * 7, 24 * 9] {
            let returned = start + Duration::hours(hours);
            let fee = final_fee(start, returned, price, provisional).unwrap();
            assert!(fee >= provisional, "fee {fee} under quote {provisional}");
        }
    }

    #[test]
    fn immediate_return_still_charges_one_day() {
        let start = ts(2024, 1, 1, 0);
        let fee = final_fee(start, start, Decimal::from(100), Decimal::ZERO).unwrap();
        assert_eq!(fee, Decimal::new(10000, 2));
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        let start = ts(2024, 1, 1, 0);
        assert!(expected_return(start, 0).is_err());
        assert!(provisional_fee(-1, Decimal::from(100)).is_err());
        assert!(provisional_fee(3, Decimal::ZERO).is_err());
        assert!(final_fee(start, start - Duration::hours(1), Decimal::from(100), Decimal::ZERO).is_err());
    }
}
