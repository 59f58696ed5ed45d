use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod customers;
pub mod doc;
pub mod health;
pub mod params;
pub mod rentals;
pub mod vehicles;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/vehicles", vehicles::router())
        .nest("/customers", customers::router())
        .nest("/rentals", rentals::router())
        .nest("/auth", auth::router())
}
