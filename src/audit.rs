use serde_json::Value;
use uuid::Uuid;

use crate::{error::AppResult, state::AppState};

/// Insert an audit row. Callers treat failures as non-fatal and log them.
pub async fn log_audit(
    state: &AppState,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(&state.pool)
    .await?;

    tracing::debug!(action, ?resource, "audit recorded");
    Ok(())
}
