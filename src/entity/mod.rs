pub mod audit_logs;
pub mod customers;
pub mod rentals;
pub mod users;
pub mod vehicles;

pub use audit_logs::Entity as AuditLogs;
pub use customers::Entity as Customers;
pub use rentals::Entity as Rentals;
pub use users::Entity as Users;
pub use vehicles::Entity as Vehicles;
