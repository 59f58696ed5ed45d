use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dto::vehicles::VehicleSummary, models::Rental};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRentalRequest {
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub duration_days: i32,
}

/// Body of PATCH /api/rentals/{id}. An empty body returns the vehicle;
/// a body carrying `duration_days` amends the quote instead.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateRentalRequest {
    pub duration_days: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RentalList {
    pub items: Vec<Rental>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RentalWithVehicle {
    #[serde(flatten)]
    pub rental: Rental,
    pub vehicle: VehicleSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RentalHistory {
    pub items: Vec<RentalWithVehicle>,
}
