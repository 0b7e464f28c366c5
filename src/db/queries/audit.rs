//! Admin audit trail

use anyhow::Result;
use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;

pub const CREATE_ROUTE: &str = "create_multi_drop_route";
pub const UPDATE_ROUTE: &str = "update_multi_drop_route";
pub const CANCEL_ROUTE: &str = "cancel_multi_drop_route";
pub const DELETE_ROUTE: &str = "delete_multi_drop_route";
pub const REASSIGN_DRIVER: &str = "reassign_route_driver";
pub const UPDATE_DROP_STATUS: &str = "update_drop_status";

pub async fn record(
    conn: &mut PgConnection,
    admin_id: Uuid,
    action: &str,
    route_id: Uuid,
    details: Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO route_audit_log (id, admin_id, action, route_id, details)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(admin_id)
    .bind(action)
    .bind(route_id)
    .bind(details)
    .execute(conn)
    .await?;

    Ok(())
}
