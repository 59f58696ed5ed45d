use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::{
        rentals::{CreateRentalRequest, RentalHistory, RentalList, RentalWithVehicle},
        vehicles::VehicleSummary,
    },
    entity::{
        customers::{ActiveModel as CustomerActive, Entity as Customers, Model as CustomerModel},
        rentals::{
            ActiveModel as RentalActive, Column as RentalCol, Entity as Rentals,
            Model as RentalModel,
        },
        vehicles::{Entity as Vehicles, Model as VehicleModel},
    },
    error::{AppError, AppResult},
    fee,
    middleware::auth::{AuthUser, ensure_admin, ensure_self_or_admin},
    models::{Rental, RentalStatus},
    response::{ApiResponse, Meta},
    routes::params::{RentalListQuery, SortOrder},
    state::AppState,
};

/// Create a rental and reserve its vehicle in one transaction.
///
/// The vehicle row is locked before the active-rental check, so two
/// concurrent bookings for the same vehicle serialize here; the partial
/// unique index on active rentals backs this up at the database level.
pub async fn create_rental(
    state: &AppState,
    user: &AuthUser,
    payload: CreateRentalRequest,
) -> AppResult<ApiResponse<Rental>> {
    if payload.duration_days < 1 {
        return Err(AppError::InvalidArgument(
            "Duration days must be positive".into(),
        ));
    }

    let customer = find_customer(&state.orm, payload.customer_id).await?;
    ensure_self_or_admin(user, customer.user_id)?;

    let txn = state.orm.begin().await?;

    let vehicle = Vehicles::find_by_id(payload.vehicle_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .filter(|v| !v.is_deleted)
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();

    // A customer already past due on another rental may not book again.
    let overdue = Rentals::find()
        .filter(RentalCol::CustomerId.eq(customer.id))
        .filter(view_condition(RentalStatus::Overdue, now))
        .count(&txn)
        .await?;
    if overdue > 0 {
        return Err(AppError::InvalidArgument(
            "Customer has an overdue rental".into(),
        ));
    }

    let active = Rentals::find()
        .filter(RentalCol::VehicleId.eq(vehicle.id))
        .filter(active_condition())
        .count(&txn)
        .await?;
    if active > 0 {
        return Err(AppError::VehicleUnavailable);
    }

    let expected_return = fee::expected_return(now, payload.duration_days)?;
    let total_fee = fee::provisional_fee(payload.duration_days, vehicle.price_per_day)?;

    let rental = RentalActive {
        id: Set(Uuid::new_v4()),
        vehicle_id: Set(vehicle.id),
        customer_id: Set(customer.id),
        start_time: Set(now.into()),
        duration_days: Set(payload.duration_days),
        expected_return_time: Set(expected_return.into()),
        actual_return_time: Set(None),
        total_fee: Set(total_fee),
        status: Set(RentalStatus::Ongoing.as_str().into()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "rental_created",
        Some("rentals"),
        Some(serde_json::json!({
            "rental_id": rental.id,
            "vehicle_id": rental.vehicle_id,
            "total_fee": rental.total_fee,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Rental created",
        rental_from_entity(rental)?,
        Some(Meta::empty()),
    ))
}

/// Return a rental: finalize the fee, debit the wallet, free the vehicle.
///
/// Legal from ONGOING or OVERDUE. The rental row lock serializes racing
/// `return`/`cancel` calls; the loser sees a terminal state.
pub async fn return_rental(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Rental>> {
    let txn = state.orm.begin().await?;

    let rental = Rentals::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let customer = Customers::find_by_id(rental.customer_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_self_or_admin(user, customer.user_id)?;

    let status = parse_stored_status(&rental.status)?;
    if !status.can_become(RentalStatus::Finished) {
        return Err(AppError::InvalidTransition(format!(
            "Cannot return a {status} rental"
        )));
    }

    let vehicle = Vehicles::find_by_id(rental.vehicle_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let final_fee = fee::final_fee(
        rental.start_time.with_timezone(&Utc),
        now,
        vehicle.price_per_day,
        rental.total_fee,
    )?;

    if customer.money < final_fee {
        return Err(AppError::InsufficientBalance);
    }

    let new_balance = customer.money - final_fee;
    let mut customer_active: CustomerActive = customer.into();
    customer_active.money = Set(new_balance);
    customer_active.updated_at = Set(now.into());
    customer_active.update(&txn).await?;

    let mut active: RentalActive = rental.into();
    active.status = Set(RentalStatus::Finished.as_str().into());
    active.actual_return_time = Set(Some(now.into()));
    active.total_fee = Set(final_fee);
    active.updated_at = Set(now.into());
    let rental = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "rental_returned",
        Some("rentals"),
        Some(serde_json::json!({ "rental_id": rental.id, "total_fee": rental.total_fee })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Rental returned",
        rental_from_entity(rental)?,
        Some(Meta::empty()),
    ))
}

/// Cancel a rental. Only legal while ONGOING and not yet past its expected
/// return; an overdue rental (stored or derived) cannot dodge its fee.
pub async fn cancel_rental(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Rental>> {
    let txn = state.orm.begin().await?;

    let rental = Rentals::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let customer = find_customer(&txn, rental.customer_id).await?;
    ensure_self_or_admin(user, customer.user_id)?;

    let status = parse_stored_status(&rental.status)?;
    if !status.can_become(RentalStatus::Cancelled) {
        return Err(AppError::InvalidTransition(format!(
            "Cannot cancel a {status} rental"
        )));
    }

    let now = Utc::now();
    if now > rental.expected_return_time.with_timezone(&Utc) {
        return Err(AppError::InvalidTransition(
            "Cannot cancel an overdue rental".into(),
        ));
    }

    let mut active: RentalActive = rental.into();
    active.status = Set(RentalStatus::Cancelled.as_str().into());
    if state.config.cancel_fee_waived {
        active.total_fee = Set(rust_decimal::Decimal::ZERO);
    }
    active.updated_at = Set(now.into());
    let rental = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "rental_cancelled",
        Some("rentals"),
        Some(serde_json::json!({ "rental_id": rental.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Rental cancelled",
        rental_from_entity(rental)?,
        Some(Meta::empty()),
    ))
}

/// Amend the quoted duration of an ongoing rental: recomputes the expected
/// return and the provisional fee. Rejected once overdue or terminal.
pub async fn amend_duration(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    duration_days: i32,
) -> AppResult<ApiResponse<Rental>> {
    let txn = state.orm.begin().await?;

    let rental = Rentals::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let customer = find_customer(&txn, rental.customer_id).await?;
    ensure_self_or_admin(user, customer.user_id)?;

    let status = parse_stored_status(&rental.status)?;
    let now = Utc::now();
    if status != RentalStatus::Ongoing || now > rental.expected_return_time.with_timezone(&Utc) {
        return Err(AppError::InvalidTransition(
            "Only an ongoing rental can be amended".into(),
        ));
    }

    let vehicle = Vehicles::find_by_id(rental.vehicle_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let start_time = rental.start_time.with_timezone(&Utc);
    let expected_return = fee::expected_return(start_time, duration_days)?;
    let total_fee = fee::provisional_fee(duration_days, vehicle.price_per_day)?;

    let mut active: RentalActive = rental.into();
    active.duration_days = Set(duration_days);
    active.expected_return_time = Set(expected_return.into());
    active.total_fee = Set(total_fee);
    active.updated_at = Set(now.into());
    let rental = active.update(&txn).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "rental_amended",
        Some("rentals"),
        Some(serde_json::json!({ "rental_id": rental.id, "duration_days": duration_days })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Rental updated",
        rental_from_entity(rental)?,
        Some(Meta::empty()),
    ))
}

/// Persist the OVERDUE reclassification for every ongoing rental past its
/// expected return. Idempotent; the predicate is monotonic, so running it
/// twice (or concurrently with requests) converges on the same rows.
pub async fn sweep_overdue(state: &AppState) -> AppResult<u64> {
    let now = Utc::now();
    let result = Rentals::update_many()
        .col_expr(
            RentalCol::Status,
            Expr::value(RentalStatus::Overdue.as_str()),
        )
        .col_expr(RentalCol::UpdatedAt, Expr::value(now))
        .filter(RentalCol::Status.eq(RentalStatus::Ongoing.as_str()))
        .filter(RentalCol::ExpectedReturnTime.lt(now))
        .exec(&state.orm)
        .await?;

    Ok(result.rows_affected)
}

pub async fn get_rental(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Rental>> {
    let rental = Rentals::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let customer = find_customer(&state.orm, rental.customer_id).await?;
    ensure_self_or_admin(user, customer.user_id)?;

    let mut rental = rental_from_entity(rental)?;
    rental.status = rental.effective_status(Utc::now());

    Ok(ApiResponse::success("Ok", rental, Some(Meta::empty())))
}

/// One of the four status views. Stable order: rental id, then start time.
pub async fn list_view(
    state: &AppState,
    user: &AuthUser,
    view: RentalStatus,
) -> AppResult<ApiResponse<RentalList>> {
    ensure_admin(user)?;

    let now = Utc::now();
    let items = Rentals::find()
        .filter(view_condition(view, now))
        .order_by_asc(RentalCol::Id)
        .order_by_asc(RentalCol::StartTime)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|model| {
            let mut rental = rental_from_entity(model)?;
            rental.status = rental.effective_status(now);
            Ok(rental)
        })
        .collect::<AppResult<Vec<_>>>()?;

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Ok",
        RentalList { items },
        Some(Meta::new(1, total.max(1), total)),
    ))
}

/// Admin listing across all rentals, optionally narrowed to one view.
pub async fn list_rentals(
    state: &AppState,
    user: &AuthUser,
    query: RentalListQuery,
) -> AppResult<ApiResponse<RentalList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();
    let now = Utc::now();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(view_condition(RentalStatus::parse(status)?, now));
    }

    let mut finder = Rentals::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Asc) {
        SortOrder::Asc => finder.order_by_asc(RentalCol::Id).order_by_asc(RentalCol::StartTime),
        SortOrder::Desc => finder.order_by_desc(RentalCol::Id).order_by_desc(RentalCol::StartTime),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|model| {
            let mut rental = rental_from_entity(model)?;
            rental.status = rental.effective_status(now);
            Ok(rental)
        })
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Ok", RentalList { items }, Some(meta)))
}

/// Full rental history for one customer, vehicle details included.
pub async fn customer_history(
    state: &AppState,
    user: &AuthUser,
    customer_id: Uuid,
) -> AppResult<ApiResponse<RentalHistory>> {
    let customer = find_customer(&state.orm, customer_id).await?;
    ensure_self_or_admin(user, customer.user_id)?;

    let now = Utc::now();
    let rows = Rentals::find()
        .filter(RentalCol::CustomerId.eq(customer.id))
        .find_also_related(Vehicles)
        .order_by_asc(RentalCol::Id)
        .order_by_asc(RentalCol::StartTime)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for (model, vehicle) in rows {
        let vehicle = vehicle.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("rental without vehicle row"))
        })?;
        let mut rental = rental_from_entity(model)?;
        rental.status = rental.effective_status(now);
        items.push(RentalWithVehicle {
            rental,
            vehicle: vehicle_summary(vehicle),
        });
    }

    let total = items.len() as i64;
    Ok(ApiResponse::success(
        "Ok",
        RentalHistory { items },
        Some(Meta::new(1, total.max(1), total)),
    ))
}

/// Statuses that occupy a vehicle.
fn active_condition() -> Condition {
    Condition::all().add(
        RentalCol::Status.is_in([
            RentalStatus::Ongoing.as_str(),
            RentalStatus::Overdue.as_str(),
        ]),
    )
}

/// Read-time predicate for each view. Ongoing rentals past their expected
/// return count as overdue even before the sweep persists the change.
fn view_condition(view: RentalStatus, now: DateTime<Utc>) -> Condition {
    match view {
        RentalStatus::Ongoing => Condition::all()
            .add(RentalCol::Status.eq(RentalStatus::Ongoing.as_str()))
            .add(RentalCol::ExpectedReturnTime.gte(now)),
        RentalStatus::Overdue => Condition::any()
            .add(RentalCol::Status.eq(RentalStatus::Overdue.as_str()))
            .add(
                Condition::all()
                    .add(RentalCol::Status.eq(RentalStatus::Ongoing.as_str()))
                    .add(RentalCol::ExpectedReturnTime.lt(now)),
            ),
        RentalStatus::Finished => {
            Condition::all().add(RentalCol::Status.eq(RentalStatus::Finished.as_str()))
        }
        RentalStatus::Cancelled => {
            Condition::all().add(RentalCol::Status.eq(RentalStatus::Cancelled.as_str()))
        }
    }
}

async fn find_customer<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<CustomerModel> {
    Customers::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

fn parse_stored_status(raw: &str) -> AppResult<RentalStatus> {
    RentalStatus::parse(raw)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("corrupt rental status: {raw}")))
}

fn rental_from_entity(model: RentalModel) -> AppResult<Rental> {
    let status = parse_stored_status(&model.status)?;
    Ok(Rental {
        id: model.id,
        vehicle_id: model.vehicle_id,
        customer_id: model.customer_id,
        start_time: model.start_time.with_timezone(&Utc),
        duration_days: model.duration_days,
        expected_return_time: model.expected_return_time.with_timezone(&Utc),
        actual_return_time: model.actual_return_time.map(|dt| dt.with_timezone(&Utc)),
        total_fee: model.total_fee,
        status,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn vehicle_summary(model: VehicleModel) -> VehicleSummary {
    VehicleSummary {
        plate_number: model.plate_number,
        vehicle_type: model.vehicle_type,
        brand: model.brand,
        model: model.model,
        color: model.color,
        price_per_day: model.price_per_day,
    }
}
