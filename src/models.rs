use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub id_card: String,
    pub money: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Vehicle {
    pub id: Uuid,
    pub plate_number: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub brand: String,
    pub model: String,
    pub color: String,
    pub price_per_day: Decimal,
    /// Derived: no rental for this vehicle is ongoing or overdue.
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lifecycle states of a rental. `Finished` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RentalStatus {
    Ongoing,
    Overdue,
    Finished,
    Cancelled,
}

impl RentalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RentalStatus::Ongoing => "ongoing",
            RentalStatus::Overdue => "overdue",
            RentalStatus::Finished => "finished",
            RentalStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "ongoing" => Ok(RentalStatus::Ongoing),
            "overdue" => Ok(RentalStatus::Overdue),
            "finished" => Ok(RentalStatus::Finished),
            "cancelled" => Ok(RentalStatus::Cancelled),
            other => Err(AppError::InvalidArgument(format!(
                "Unknown rental status: {other}"
            ))),
        }
    }

    /// The rental still occupies its vehicle.
    pub fn is_active(&self) -> bool {
        matches!(self, RentalStatus::Ongoing | RentalStatus::Overdue)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RentalStatus::Finished | RentalStatus::Cancelled)
    }

    /// Legal transitions. Everything not listed here is rejected.
    pub fn can_become(&self, target: RentalStatus) -> bool {
        matches!(
            (self, target),
            (RentalStatus::Ongoing, RentalStatus::Overdue)
                | (RentalStatus::Ongoing, RentalStatus::Finished)
                | (RentalStatus::Ongoing, RentalStatus::Cancelled)
                | (RentalStatus::Overdue, RentalStatus::Finished)
        )
    }
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Rental {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub customer_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_days: i32,
    pub expected_return_time: DateTime<Utc>,
    pub actual_return_time: Option<DateTime<Utc>>,
    pub total_fee: Decimal,
    pub status: RentalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rental {
    /// Status as seen by every consumer at `now`: an ongoing rental past its
    /// expected return reads as overdue even before the sweep persists it.
    pub fn effective_status(&self, now: DateTime<Utc>) -> RentalStatus {
        if self.status == RentalStatus::Ongoing && now > self.expected_return_time {
            RentalStatus::Overdue
        } else {
            self.status
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn active_and_terminal_partition_states() {
        assert!(RentalStatus::Ongoing.is_active());
        assert!(RentalStatus::Overdue.is_active());
        assert!(!RentalStatus::Finished.is_active());
        assert!(!RentalStatus::Cancelled.is_active());

        assert!(RentalStatus::Finished.is_terminal());
        assert!(RentalStatus::Cancelled.is_terminal());
        assert!(!RentalStatus::Ongoing.is_terminal());
        assert!(!RentalStatus::Overdue.is_terminal());
    }

    #[test]
    fn terminal_states_allow_no_transitions() {
        for target in [
            RentalStatus::Ongoing,
            RentalStatus::Overdue,
            RentalStatus::Finished,
            RentalStatus::Cancelled,
        ] {
            assert!(!RentalStatus::Finished.can_become(target));
            assert!(!RentalStatus::Cancelled.can_become(target));
        }
    }

    #[test]
    fn overdue_cannot_be_cancelled() {
        assert!(!RentalStatus::Overdue.can_become(RentalStatus::Cancelled));
        assert!(RentalStatus::Overdue.can_become(RentalStatus::Finished));
    }

    #[test]
    fn ongoing_transitions() {
        assert!(RentalStatus::Ongoing.can_become(RentalStatus::Overdue));
        assert!(RentalStatus::Ongoing.can_become(RentalStatus::Finished));
        assert!(RentalStatus::Ongoing.can_become(RentalStatus::Cancelled));
        assert!(!RentalStatus::Ongoing.can_become(RentalStatus::Ongoing));
    }

    #[test]
    fn parse_round_trips() {
        for status in [
            RentalStatus::Ongoing,
            RentalStatus::Overdue,
            RentalStatus::Finished,
            RentalStatus::Cancelled,
        ] {
            assert_eq!(RentalStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(RentalStatus::parse("expired").is_err());
    }

    fn rental_with(status: RentalStatus) -> Rental {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Rental {
            id: Uuid::new_v4(),
            vehicle_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            start_time: start,
            duration_days: 3,
            expected_return_time: start + chrono::Duration::days(3),
            actual_return_time: None,
            total_fee: Decimal::new(30000, 2),
            status,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn effective_status_derives_overdue_past_expected_return() {
        let rental = rental_with(RentalStatus::Ongoing);
        let before = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap();
        assert_eq!(rental.effective_status(before), RentalStatus::Ongoing);
        assert_eq!(rental.effective_status(after), RentalStatus::Overdue);
    }

    #[test]
    fn effective_status_leaves_terminal_states_alone() {
        let after = Utc.with_ymd_and_hms(2024, 1, 6, 0, 0, 0).unwrap();
        let finished = rental_with(RentalStatus::Finished);
        let cancelled = rental_with(RentalStatus::Cancelled);
        assert_eq!(finished.effective_status(after), RentalStatus::Finished);
        assert_eq!(cancelled.effective_status(after), RentalStatus::Cancelled);
    }
}
