use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::vehicles::{CreateVehicleRequest, UpdateVehicleRequest, VehicleList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Vehicle,
    response::ApiResponse,
    routes::params::VehicleQuery,
    services::vehicle_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_vehicle))
        .route("/", get(list_vehicles))
        .route("/{id}", get(get_vehicle))
        .route("/{id}", put(update_vehicle))
        .route("/{id}", delete(delete_vehicle))
}

#[utoipa::path(
    get,
    path = "/api/vehicles",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("q" = Option<String>, Query, description = "Search plate, brand, model"),
        ("available" = Option<bool>, Query, description = "Filter by derived availability"),
    ),
    responses(
        (status = 200, description = "List vehicles", body = ApiResponse<VehicleList>),
    ),
    security(("bearer_auth" = [])),
    tag = "Vehicles"
)]
pub async fn list_vehicles(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<VehicleQuery>,
) -> AppResult<Json<ApiResponse<VehicleList>>> {
    let resp = vehicle_service::list_vehicles(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/vehicles/{id}",
    params(
        ("id" = Uuid, Path, description = "Vehicle ID"),
    ),
    responses(
        (status = 200, description = "Get vehicle", body = ApiResponse<Vehicle>),
        (status = 404, description = "Vehicle not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vehicles"
)]
pub async fn get_vehicle(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vehicle>>> {
    let resp = vehicle_service::get_vehicle(&state, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/vehicles",
    request_body = CreateVehicleRequest,
    responses(
        (status = 201, description = "Vehicle created", body = ApiResponse<Vehicle>),
        (status = 400, description = "Invalid argument"),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vehicles"
)]
pub async fn create_vehicle(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateVehicleRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Vehicle>>)> {
    let resp = vehicle_service::create_vehicle(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    put,
    path = "/api/vehicles/{id}",
    params(
        ("id" = Uuid, Path, description = "Vehicle ID"),
    ),
    request_body = UpdateVehicleRequest,
    responses(
        (status = 200, description = "Updated vehicle", body = ApiResponse<Vehicle>),
        (status = 400, description = "Invalid argument"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Vehicle not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vehicles"
)]
pub async fn update_vehicle(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateVehicleRequest>,
) -> AppResult<Json<ApiResponse<Vehicle>>> {
    let resp = vehicle_service::update_vehicle(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/vehicles/{id}",
    params(
        ("id" = Uuid, Path, description = "Vehicle ID"),
    ),
    responses(
        (status = 200, description = "Vehicle deleted"),
        (status = 400, description = "Vehicle has active rentals"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Vehicle not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Vehicles"
)]
pub async fn delete_vehicle(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let resp = vehicle_service::delete_vehicle(&state, &user, id).await?;
    Ok(Json(resp))
}
