use axum_rental_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        customers::RechargeRequest,
        rentals::CreateRentalRequest,
    },
    entity::{
        customers::ActiveModel as CustomerActive, users::ActiveModel as UserActive,
        vehicles::ActiveModel as VehicleActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::RentalStatus,
    services::{customer_service, rental_service},
    state::AppState,
};
use chrono::Duration;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use uuid::Uuid;

// Integration flow: a customer books a vehicle, a second booking loses,
// return finalizes the fee and debits the wallet, cancel is terminal, and
// racing terminations resolve to exactly one winner.
#[tokio::test]
async fn rental_lifecycle_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let admin_user_id = create_user(&state, "admin", "flow_admin").await?;
    let customer_user_id = create_user(&state, "customer", "flow_customer").await?;
    let customer_id = create_customer(
        &state,
        customer_user_id,
        "110101199001010011",
        Decimal::from(5000),
    )
    .await?;
    let vehicle_id = create_vehicle(&state, "TEST-001", Decimal::from(100)).await?;

    let auth_admin = AuthUser {
        user_id: admin_user_id,
        role: "admin".into(),
    };
    let auth_customer = AuthUser {
        user_id: customer_user_id,
        role: "customer".into(),
    };

    // Book for three days: provisional fee is quoted up front.
    let created = rental_service::create_rental(
        &state,
        &auth_customer,
        CreateRentalRequest {
            customer_id,
            vehicle_id,
            duration_days: 3,
        },
    )
    .await?;
    let rental = created.data.unwrap();
    assert_eq!(rental.status, RentalStatus::Ongoing);
    assert_eq!(rental.total_fee, Decimal::from(300));
    assert_eq!(
        rental.expected_return_time,
        rental.start_time + Duration::days(3)
    );
    assert!(rental.actual_return_time.is_none());

    // The vehicle is now exclusively held.
    let conflict = rental_service::create_rental(
        &state,
        &auth_admin,
        CreateRentalRequest {
            customer_id,
            vehicle_id,
            duration_days: 1,
        },
    )
    .await;
    assert!(matches!(
        conflict.unwrap_err(),
        AppError::VehicleUnavailable
    ));

    // Early return keeps the quote and debits the wallet.
    let returned = rental_service::return_rental(&state, &auth_customer, rental.id).await?;
    let returned = returned.data.unwrap();
    assert_eq!(returned.status, RentalStatus::Finished);
    assert_eq!(returned.total_fee, Decimal::from(300));
    assert!(returned.actual_return_time.is_some());

    let balance = customer_service::get_balance(&state, &auth_customer, customer_id).await?;
    assert_eq!(balance.data.unwrap().money, Decimal::from(4700));

    // Terminal means terminal.
    let again = rental_service::return_rental(&state, &auth_customer, returned.id).await;
    assert!(matches!(
        again.unwrap_err(),
        AppError::InvalidTransition(_)
    ));

    // Vehicle is reservable again; amend the quote, then cancel.
    let second = rental_service::create_rental(
        &state,
        &auth_customer,
        CreateRentalRequest {
            customer_id,
            vehicle_id,
            duration_days: 2,
        },
    )
    .await?
    .data
    .unwrap();

    let amended =
        rental_service::amend_duration(&state, &auth_customer, second.id, 7).await?;
    let amended = amended.data.unwrap();
    assert_eq!(amended.duration_days, 7);
    assert_eq!(amended.total_fee, Decimal::from(700));
    assert_eq!(
        amended.expected_return_time,
        amended.start_time + Duration::days(7)
    );

    let cancelled = rental_service::cancel_rental(&state, &auth_customer, second.id).await?;
    let cancelled = cancelled.data.unwrap();
    assert_eq!(cancelled.status, RentalStatus::Cancelled);
    assert_eq!(cancelled.total_fee, Decimal::ZERO);

    let cancel_again = rental_service::cancel_rental(&state, &auth_customer, second.id).await;
    assert!(matches!(
        cancel_again.unwrap_err(),
        AppError::InvalidTransition(_)
    ));

    // Two racing returns: exactly one wins.
    let third = rental_service::create_rental(
        &state,
        &auth_customer,
        CreateRentalRequest {
            customer_id,
            vehicle_id,
            duration_days: 1,
        },
    )
    .await?
    .data
    .unwrap();

    let (a, b) = tokio::join!(
        rental_service::return_rental(&state, &auth_customer, third.id),
        rental_service::return_rental(&state, &auth_admin, third.id),
    );
    let winners = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one concurrent return must succeed");
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(
        loser.unwrap_err(),
        AppError::InvalidTransition(_)
    ));

    // A broke customer cannot finalize; the rental stays where it was.
    let poor_user_id = create_user(&state, "customer", "flow_poor").await?;
    let poor_id = create_customer(&state, poor_user_id, "110101199001010022", Decimal::ZERO)
        .await?;
    let auth_poor = AuthUser {
        user_id: poor_user_id,
        role: "customer".into(),
    };
    let vehicle2 = create_vehicle(&state, "TEST-002", Decimal::from(50)).await?;
    let unpaid = rental_service::create_rental(
        &state,
        &auth_poor,
        CreateRentalRequest {
            customer_id: poor_id,
            vehicle_id: vehicle2,
            duration_days: 1,
        },
    )
    .await?
    .data
    .unwrap();

    let broke = rental_service::return_rental(&state, &auth_poor, unpaid.id).await;
    assert!(matches!(broke.unwrap_err(), AppError::InsufficientBalance));

    let still_ongoing = rental_service::get_rental(&state, &auth_poor, unpaid.id).await?;
    let still_ongoing = still_ongoing.data.unwrap();
    assert_eq!(still_ongoing.status, RentalStatus::Ongoing);
    assert!(still_ongoing.actual_return_time.is_none());

    // Top up, then the return goes through.
    customer_service::recharge(
        &state,
        &auth_poor,
        poor_id,
        RechargeRequest {
            amount: Decimal::from(100),
        },
    )
    .await?;
    let paid = rental_service::return_rental(&state, &auth_poor, unpaid.id).await?;
    assert_eq!(paid.data.unwrap().status, RentalStatus::Finished);

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE rentals, audit_logs, customers, vehicles, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    let config = AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        sweep_interval_secs: 60,
        cancel_fee_waived: true,
    };

    Ok(AppState { pool, orm, config })
}

async fn create_user(state: &AppState, role: &str, username: &str) -> anyhow::Result<Uuid> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        username: Set(username.to_string()),
        password_hash: Set("dummy".into()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(user.id)
}

async fn create_customer(
    state: &AppState,
    user_id: Uuid,
    id_card: &str,
    money: Decimal,
) -> anyhow::Result<Uuid> {
    let customer = CustomerActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        name: Set("Test Customer".into()),
        phone: Set("13800000000".into()),
        address: Set("1 Test Street".into()),
        id_card: Set(id_card.into()),
        money: Set(money),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(customer.id)
}

async fn create_vehicle(
    state: &AppState,
    plate: &str,
    price_per_day: Decimal,
) -> anyhow::Result<Uuid> {
    let vehicle = VehicleActive {
        id: Set(Uuid::new_v4()),
        plate_number: Set(plate.into()),
        vehicle_type: Set("SUV".into()),
        brand: Set("Toyota".into()),
        model: Set("RAV4".into()),
        color: Set("white".into()),
        price_per_day: Set(price_per_day),
        is_deleted: Set(false),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(vehicle.id)
}
