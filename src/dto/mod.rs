pub mod auth;
pub mod customers;
pub mod rentals;
pub mod vehicles;
