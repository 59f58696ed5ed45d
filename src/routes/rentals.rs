use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
};
use uuid::Uuid;

use crate::{
    dto::rentals::{CreateRentalRequest, RentalHistory, RentalList, UpdateRentalRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Rental, RentalStatus},
    response::ApiResponse,
    routes::params::RentalListQuery,
    services::rental_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_rental))
        .route("/", get(list_rentals))
        .route("/ongoing", get(list_ongoing))
        .route("/overdue", get(list_overdue))
        .route("/finished", get(list_finished))
        .route("/cancelled", get(list_cancelled))
        .route("/customer/{customer_id}", get(customer_history))
        .route("/{id}", get(get_rental))
        .route("/{id}", patch(update_rental))
        .route("/{id}", delete(cancel_rental))
}

#[utoipa::path(
    post,
    path = "/api/rentals",
    request_body = CreateRentalRequest,
    responses(
        (status = 201, description = "Rental created", body = ApiResponse<Rental>),
        (status = 400, description = "Invalid argument"),
        (status = 404, description = "Vehicle or customer not found"),
        (status = 409, description = "Vehicle is currently rented out"),
    ),
    security(("bearer_auth" = [])),
    tag = "Rentals"
)]
pub async fn create_rental(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateRentalRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Rental>>)> {
    let resp = rental_service::create_rental(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/api/rentals",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter: ongoing, overdue, finished, cancelled"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc"),
    ),
    responses(
        (status = 200, description = "All rentals (admin only)", body = ApiResponse<RentalList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Rentals"
)]
pub async fn list_rentals(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RentalListQuery>,
) -> AppResult<Json<ApiResponse<RentalList>>> {
    let resp = rental_service::list_rentals(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/rentals/ongoing",
    responses(
        (status = 200, description = "Ongoing rentals (admin only)", body = ApiResponse<RentalList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Rentals"
)]
pub async fn list_ongoing(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RentalList>>> {
    let resp = rental_service::list_view(&state, &user, RentalStatus::Ongoing).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/rentals/overdue",
    responses(
        (status = 200, description = "Overdue rentals (admin only)", body = ApiResponse<RentalList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Rentals"
)]
pub async fn list_overdue(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RentalList>>> {
    let resp = rental_service::list_view(&state, &user, RentalStatus::Overdue).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/rentals/finished",
    responses(
        (status = 200, description = "Finished rentals (admin only)", body = ApiResponse<RentalList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Rentals"
)]
pub async fn list_finished(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RentalList>>> {
    let resp = rental_service::list_view(&state, &user, RentalStatus::Finished).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/rentals/cancelled",
    responses(
        (status = 200, description = "Cancelled rentals (admin only)", body = ApiResponse<RentalList>),
        (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Rentals"
)]
pub async fn list_cancelled(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<RentalList>>> {
    let resp = rental_service::list_view(&state, &user, RentalStatus::Cancelled).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/rentals/customer/{customer_id}",
    params(
        ("customer_id" = Uuid, Path, description = "Customer ID"),
    ),
    responses(
        (status = 200, description = "Rental history for one customer", body = ApiResponse<RentalHistory>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Customer not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Rentals"
)]
pub async fn customer_history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<RentalHistory>>> {
    let resp = rental_service::customer_history(&state, &user, customer_id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/rentals/{id}",
    params(
        ("id" = Uuid, Path, description = "Rental ID"),
    ),
    responses(
        (status = 200, description = "Get rental", body = ApiResponse<Rental>),
        (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Rentals"
)]
pub async fn get_rental(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Rental>>> {
    let resp = rental_service::get_rental(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    patch,
    path = "/api/rentals/{id}",
    params(
        ("id" = Uuid, Path, description = "Rental ID"),
    ),
    request_body = UpdateRentalRequest,
    responses(
        (status = 200, description = "Rental returned or amended", body = ApiResponse<Rental>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Invalid transition"),
        (status = 402, description = "Insufficient balance"),
    ),
    security(("bearer_auth" = [])),
    tag = "Rentals"
)]
pub async fn update_rental(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<UpdateRentalRequest>>,
) -> AppResult<Json<ApiResponse<Rental>>> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let resp = match payload.duration_days {
        Some(days) => rental_service::amend_duration(&state, &user, id, days).await?,
        None => rental_service::return_rental(&state, &user, id).await?,
    };
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/rentals/{id}",
    params(
        ("id" = Uuid, Path, description = "Rental ID"),
    ),
    responses(
        (status = 200, description = "Rental cancelled", body = ApiResponse<Rental>),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Invalid transition"),
    ),
    security(("bearer_auth" = [])),
    tag = "Rentals"
)]
pub async fn cancel_rental(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Rental>>> {
    let resp = rental_service::cancel_rental(&state, &user, id).await?;
    Ok(Json(resp))
}
