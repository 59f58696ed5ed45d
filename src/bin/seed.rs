use argon2::{
    Argon2, PasswordHasher,
    password_hash::{rand_core::OsRng, SaltString},
};
use axum_rental_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    let orm = create_orm_conn(&config.database_url).await?;
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&pool, "admin", "admin123", "admin").await?;
    let customer_user_id = ensure_user(&pool, "zhangsan", "customer123", "customer").await?;
    let customer_id = ensure_customer(&pool, customer_user_id).await?;
    seed_vehicles(&pool).await?;

    println!("Seed completed. Admin ID: {admin_id}, Customer ID: {customer_id}");
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    username: &str,
    password: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!(e.to_string()))?
        .to_string();

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO users (id, username, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (username) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await?;

    // If user already exists, fetch id
    let user_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE username = $1")
                .bind(username)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured user {username} (role={role})");
    Ok(user_id)
}

async fn ensure_customer(pool: &sqlx::PgPool, user_id: Uuid) -> anyhow::Result<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO customers (id, user_id, name, phone, address, id_card, money)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (user_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind("Zhang San")
    .bind("13800000000")
    .bind("1 Renmin Road")
    .bind("110101199001011234")
    .bind(Decimal::from(5000))
    .fetch_optional(pool)
    .await?;

    let customer_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM customers WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured customer for user {user_id}");
    Ok(customer_id)
}

async fn seed_vehicles(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let vehicles = vec![
        ("沪A12345", "SUV", "Toyota", "RAV4", "white", 300),
        ("沪B23456", "Sedan", "Honda", "Accord", "black", 250),
        ("沪C34567", "Hatchback", "Volkswagen", "Golf", "blue", 180),
        ("沪D45678", "Van", "Buick", "GL8", "silver", 420),
    ];

    for (plate, vtype, brand, model, color, price) in vehicles {
        sqlx::query(
            r#"
            INSERT INTO vehicles (id, plate_number, type, brand, model, color, price_per_day)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (plate_number) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(plate)
        .bind(vtype)
        .bind(brand)
        .bind(model)
        .bind(color)
        .bind(Decimal::from(price))
        .execute(pool)
        .await?;
    }

    println!("Seeded vehicles");
    Ok(())
}
