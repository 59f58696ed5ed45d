use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth as auth_dto,
        customers::{BalanceResponse, CustomerList, RechargeRequest, UpdateCustomerRequest},
        rentals::{
            CreateRentalRequest, RentalHistory, RentalList, RentalWithVehicle,
            UpdateRentalRequest,
        },
        vehicles::{CreateVehicleRequest, UpdateVehicleRequest, VehicleList, VehicleSummary},
    },
    models::{Customer, Rental, RentalStatus, User, Vehicle},
    response::{ApiResponse, Meta},
    routes::{auth, customers, health, params, rentals, vehicles},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        vehicles::list_vehicles,
        vehicles::get_vehicle,
        vehicles::create_vehicle,
        vehicles::update_vehicle,
        vehicles::delete_vehicle,
        customers::list_customers,
        customers::get_customer,
        customers::update_customer,
        customers::delete_customer,
        customers::get_balance,
        customers::recharge,
        rentals::create_rental,
        rentals::list_rentals,
        rentals::list_ongoing,
        rentals::list_overdue,
        rentals::list_finished,
        rentals::list_cancelled,
        rentals::customer_history,
        rentals::get_rental,
        rentals::update_rental,
        rentals::cancel_rental,
    ),
    components(
        schemas(
            User,
            Customer,
            Vehicle,
            Rental,
            RentalStatus,
            auth_dto::RegisterRequest,
            auth_dto::LoginRequest,
            auth_dto::LoginResponse,
            auth_dto::RegisterResponse,
            CreateVehicleRequest,
            UpdateVehicleRequest,
            VehicleList,
            VehicleSummary,
            UpdateCustomerRequest,
            RechargeRequest,
            BalanceResponse,
            CustomerList,
            CreateRentalRequest,
            UpdateRentalRequest,
            RentalList,
            RentalWithVehicle,
            RentalHistory,
            params::Pagination,
            params::VehicleQuery,
            params::RentalListQuery,
            Meta,
            ApiResponse<Vehicle>,
            ApiResponse<VehicleList>,
            ApiResponse<Customer>,
            ApiResponse<CustomerList>,
            ApiResponse<Rental>,
            ApiResponse<RentalList>,
            ApiResponse<RentalHistory>,
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Vehicles", description = "Vehicle endpoints"),
        (name = "Customers", description = "Customer endpoints"),
        (name = "Rentals", description = "Rental lifecycle endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
