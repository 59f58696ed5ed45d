use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::customers::{BalanceResponse, CustomerList, RechargeRequest, UpdateCustomerRequest},
    entity::{
        customers::{
            ActiveModel as CustomerActive, Column as CustomerCol, Entity as Customers,
            Model as CustomerModel,
        },
        rentals::{Column as RentalCol, Entity as Rentals},
        users::{Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_self_or_admin},
    models::Customer,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_customers(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CustomerList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Customers::find().order_by_asc(CustomerCol::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .find_also_related(Users)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = rows
        .into_iter()
        .map(|(customer, account)| {
            let account = account
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("customer without account")))?;
            Ok(customer_from_entity(customer, &account))
        })
        .collect::<AppResult<Vec<_>>>()?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Customers",
        CustomerList { items },
        Some(meta),
    ))
}

pub async fn get_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Customer>> {
    let (customer, account) = find_with_account(state, id).await?;
    ensure_self_or_admin(user, customer.user_id)?;

    Ok(ApiResponse::success(
        "Customer",
        customer_from_entity(customer, &account),
        None,
    ))
}

pub async fn update_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCustomerRequest,
) -> AppResult<ApiResponse<Customer>> {
    let (customer, account) = find_with_account(state, id).await?;
    ensure_self_or_admin(user, customer.user_id)?;

    if let Some(name) = payload.name.as_ref() {
        if name.trim().is_empty() {
            return Err(AppError::InvalidArgument("Name cannot be empty".into()));
        }
    }

    let mut active: CustomerActive = customer.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(phone) = payload.phone {
        active.phone = Set(phone);
    }
    if let Some(address) = payload.address {
        active.address = Set(address);
    }
    active.updated_at = Set(Utc::now().into());
    let customer = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Updated",
        customer_from_entity(customer, &account),
        Some(Meta::empty()),
    ))
}

/// Remove a customer and their account. Refused while any rental still
/// references the customer; rental rows are kept permanently for audit.
pub async fn delete_customer(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;
    let (customer, account) = find_with_account(state, id).await?;

    let rentals = Rentals::find()
        .filter(RentalCol::CustomerId.eq(customer.id))
        .count(&state.orm)
        .await?;
    if rentals > 0 {
        return Err(AppError::InvalidArgument(
            "Cannot delete customer with rental history".into(),
        ));
    }

    let txn = state.orm.begin().await?;
    let customer_id = customer.id;
    Customers::delete_by_id(customer_id).exec(&txn).await?;
    Users::delete_by_id(account.id).exec(&txn).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "customer_deleted",
        Some("customers"),
        Some(serde_json::json!({ "customer_id": customer_id })),
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

pub async fn get_balance(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<BalanceResponse>> {
    let (customer, _) = find_with_account(state, id).await?;
    ensure_self_or_admin(user, customer.user_id)?;

    Ok(ApiResponse::success(
        "Balance",
        BalanceResponse {
            money: customer.money,
        },
        None,
    ))
}

pub async fn recharge(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RechargeRequest,
) -> AppResult<ApiResponse<BalanceResponse>> {
    if payload.amount <= Decimal::ZERO {
        return Err(AppError::InvalidArgument(
            "Recharge amount must be positive".into(),
        ));
    }

    let txn = state.orm.begin().await?;
    let customer = Customers::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_self_or_admin(user, customer.user_id)?;

    let new_balance = customer.money + payload.amount;
    let mut active: CustomerActive = customer.into();
    active.money = Set(new_balance);
    active.updated_at = Set(Utc::now().into());
    let customer = active.update(&txn).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        state,
        Some(user.user_id),
        "customer_recharged",
        Some("customers"),
        Some(serde_json::json!({ "customer_id": customer.id, "amount": payload.amount })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Recharged",
        BalanceResponse {
            money: customer.money,
        },
        Some(Meta::empty()),
    ))
}

async fn find_with_account(
    state: &AppState,
    id: Uuid,
) -> AppResult<(CustomerModel, UserModel)> {
    let (customer, account) = Customers::find_by_id(id)
        .find_also_related(Users)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let account =
        account.ok_or_else(|| AppError::Internal(anyhow::anyhow!("customer without account")))?;
    Ok((customer, account))
}

pub(crate) fn customer_from_entity(model: CustomerModel, account: &UserModel) -> Customer {
    Customer {
        id: model.id,
        user_id: model.user_id,
        username: account.username.clone(),
        name: model.name,
        phone: model.phone,
        address: model.address,
        id_card: model.id_card,
        money: model.money,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
