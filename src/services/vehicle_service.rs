use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::vehicles::{CreateVehicleRequest, UpdateVehicleRequest, VehicleList},
    entity::{
        rentals::{Column as RentalCol, Entity as Rentals},
        vehicles::{
            ActiveModel as VehicleActive, Column as VehicleCol, Entity as Vehicles,
            Model as VehicleModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{RentalStatus, Vehicle},
    response::{ApiResponse, Meta},
    routes::params::VehicleQuery,
    state::AppState,
};

pub async fn list_vehicles(
    state: &AppState,
    query: VehicleQuery,
) -> AppResult<ApiResponse<VehicleList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all().add(VehicleCol::IsDeleted.eq(false));
    if let Some(q) = query.q.as_deref().filter(|q| !q.is_empty()) {
        condition = condition.add(
            Condition::any()
                .add(VehicleCol::PlateNumber.contains(q))
                .add(VehicleCol::Brand.contains(q))
                .add(VehicleCol::Model.contains(q)),
        );
    }
    if let Some(available) = query.available {
        // An empty id list renders as a constant predicate.
        let occupied = all_occupied_ids(&state.orm).await?;
        condition = condition.add(if available {
            VehicleCol::Id.is_not_in(occupied)
        } else {
            VehicleCol::Id.is_in(occupied)
        });
    }

    let finder = Vehicles::find()
        .filter(condition)
        .order_by_asc(VehicleCol::CreatedAt);

    let total = finder.clone().count(&state.orm).await? as i64;

    let models = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let occupied = occupied_ids(&state.orm, models.iter().map(|m| m.id)).await?;
    let items = models
        .into_iter()
        .map(|m| {
            let available = !occupied.contains(&m.id);
            vehicle_from_entity(m, available)
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Vehicles",
        VehicleList { items },
        Some(meta),
    ))
}

pub async fn get_vehicle(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Vehicle>> {
    let model = Vehicles::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|v| !v.is_deleted)
        .ok_or(AppError::NotFound)?;

    let occupied = occupied_ids(&state.orm, [model.id]).await?;
    let available = !occupied.contains(&model.id);

    Ok(ApiResponse::success(
        "Vehicle",
        vehicle_from_entity(model, available),
        None,
    ))
}

pub async fn create_vehicle(
    state: &AppState,
    user: &AuthUser,
    payload: CreateVehicleRequest,
) -> AppResult<ApiResponse<Vehicle>> {
    ensure_admin(user)?;
    validate_price(payload.price_per_day)?;
    if payload.vehicle_type.trim().is_empty() {
        return Err(AppError::InvalidArgument(
            "Vehicle type cannot be empty".into(),
        ));
    }
    ensure_plate_free(&state.orm, &payload.plate_number, None).await?;

    let vehicle = VehicleActive {
        id: Set(Uuid::new_v4()),
        plate_number: Set(payload.plate_number),
        vehicle_type: Set(payload.vehicle_type),
        brand: Set(payload.brand),
        model: Set(payload.model),
        color: Set(payload.color),
        price_per_day: Set(payload.price_per_day),
        is_deleted: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "vehicle_created",
        Some("vehicles"),
        Some(serde_json::json!({ "vehicle_id": vehicle.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Vehicle created",
        vehicle_from_entity(vehicle, true),
        Some(Meta::empty()),
    ))
}

pub async fn update_vehicle(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateVehicleRequest,
) -> AppResult<ApiResponse<Vehicle>> {
    ensure_admin(user)?;

    let existing = Vehicles::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|v| !v.is_deleted)
        .ok_or(AppError::NotFound)?;

    if let Some(price) = payload.price_per_day {
        validate_price(price)?;
    }
    if let Some(vt) = payload.vehicle_type.as_ref() {
        if vt.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "Vehicle type cannot be empty".into(),
            ));
        }
    }
    if let Some(plate) = payload
        .plate_number
        .as_ref()
        .filter(|p| **p != existing.plate_number)
    {
        ensure_plate_free(&state.orm, plate, Some(existing.id)).await?;
    }

    let mut active: VehicleActive = existing.into();
    if let Some(plate) = payload.plate_number {
        active.plate_number = Set(plate);
    }
    if let Some(vt) = payload.vehicle_type {
        active.vehicle_type = Set(vt);
    }
    if let Some(brand) = payload.brand {
        active.brand = Set(brand);
    }
    if let Some(model) = payload.model {
        active.model = Set(model);
    }
    if let Some(color) = payload.color {
        active.color = Set(color);
    }
    if let Some(price) = payload.price_per_day {
        active.price_per_day = Set(price);
    }
    active.updated_at = Set(Utc::now().into());
    let vehicle = active.update(&state.orm).await?;

    let occupied = occupied_ids(&state.orm, [vehicle.id]).await?;
    let available = !occupied.contains(&vehicle.id);

    Ok(ApiResponse::success(
        "Updated",
        vehicle_from_entity(vehicle, available),
        Some(Meta::empty()),
    ))
}

/// Soft delete. Refused while an active rental references the vehicle;
/// finished history keeps pointing at the hidden row.
pub async fn delete_vehicle(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let existing = Vehicles::find_by_id(id)
        .one(&state.orm)
        .await?
        .filter(|v| !v.is_deleted)
        .ok_or(AppError::NotFound)?;

    let active = Rentals::find()
        .filter(RentalCol::VehicleId.eq(existing.id))
        .filter(RentalCol::Status.is_in([
            RentalStatus::Ongoing.as_str(),
            RentalStatus::Overdue.as_str(),
        ]))
        .count(&state.orm)
        .await?;
    if active > 0 {
        return Err(AppError::InvalidArgument(
            "Cannot delete vehicle with active rentals".into(),
        ));
    }

    let mut active_model: VehicleActive = existing.into();
    active_model.is_deleted = Set(true);
    active_model.updated_at = Set(Utc::now().into());
    let vehicle = active_model.update(&state.orm).await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "vehicle_deleted",
        Some("vehicles"),
        Some(serde_json::json!({ "vehicle_id": vehicle.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

fn validate_price(price: Decimal) -> AppResult<()> {
    if price <= Decimal::ZERO {
        return Err(AppError::InvalidArgument("Price must be positive".into()));
    }
    Ok(())
}

async fn ensure_plate_free<C: ConnectionTrait>(
    conn: &C,
    plate: &str,
    exclude: Option<Uuid>,
) -> AppResult<()> {
    let mut condition = Condition::all().add(VehicleCol::PlateNumber.eq(plate));
    if let Some(id) = exclude {
        condition = condition.add(VehicleCol::Id.ne(id));
    }
    let taken = Vehicles::find().filter(condition).count(conn).await?;
    if taken > 0 {
        return Err(AppError::InvalidArgument(
            "Plate number already exists".into(),
        ));
    }
    Ok(())
}

/// Every vehicle id currently bound to an active rental.
async fn all_occupied_ids<C: ConnectionTrait>(conn: &C) -> AppResult<Vec<Uuid>> {
    let ids = Rentals::find()
        .select_only()
        .column(RentalCol::VehicleId)
        .filter(RentalCol::Status.is_in([
            RentalStatus::Ongoing.as_str(),
            RentalStatus::Overdue.as_str(),
        ]))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?;
    Ok(ids)
}

async fn occupied_ids<C, I>(conn: &C, ids: I) -> AppResult<HashSet<Uuid>>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = Uuid>,
{
    let ids: Vec<Uuid> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let occupied = Rentals::find()
        .select_only()
        .column(RentalCol::VehicleId)
        .filter(RentalCol::VehicleId.is_in(ids))
        .filter(RentalCol::Status.is_in([
            RentalStatus::Ongoing.as_str(),
            RentalStatus::Overdue.as_str(),
        ]))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?;
    Ok(occupied.into_iter().collect())
}

fn vehicle_from_entity(model: VehicleModel, available: bool) -> Vehicle {
    Vehicle {
        id: model.id,
        plate_number: model.plate_number,
        vehicle_type: model.vehicle_type,
        brand: model.brand,
        model: model.model,
        color: model.color,
        price_per_day: model.price_per_day,
        available,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
