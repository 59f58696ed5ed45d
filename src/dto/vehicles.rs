use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Vehicle;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVehicleRequest {
    pub plate_number: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub brand: String,
    pub model: String,
    pub color: String,
    pub price_per_day: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateVehicleRequest {
    pub plate_number: Option<String>,
    #[serde(rename = "type")]
    pub vehicle_type: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub price_per_day: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VehicleList {
    pub items: Vec<Vehicle>,
}

/// Vehicle fields flattened into rental history rows.
#[derive(Debug, Serialize, ToSchema)]
pub struct VehicleSummary {
    pub plate_number: String,
    #[serde(rename = "type")]
    pub vehicle_type: String,
    pub brand: String,
    pub model: String,
    pub color: String,
    pub price_per_day: Decimal,
}
