//! Drop handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{publish_error, publish_result};
use crate::auth::{self, AuthInfo};
use crate::db::queries;
use crate::db::queries::audit;
use crate::error::RouteError;
use crate::services::validation;
use crate::types::{Request, RouteDrop, UpdateDropStatusRequest};

/// Handle multidrop.drop.status messages
pub async fn handle_status(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    jwt_secret: Arc<String>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received multidrop.drop.status message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateDropStatusRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                publish_error(&client, reply, Uuid::nil(), "INVALID_REQUEST", e.to_string()).await?;
                continue;
            }
        };

        let admin = match auth::extract_admin(&request, &jwt_secret) {
            Ok(info) => info,
            Err(e) => {
                warn!("Rejected multidrop.drop.status: {}", e);
                publish_error(&client, reply, request.id, "UNAUTHORIZED", "Admin access required").await?;
                continue;
            }
        };

        let result = update_drop_status(&pool, &admin, request.payload).await;
        publish_result(&client, reply, request.id, result).await?;
    }

    Ok(())
}

/// Move a pending drop to completed or failed. Not overridable.
pub async fn update_drop_status(
    pool: &PgPool,
    admin: &AuthInfo,
    request: UpdateDropStatusRequest,
) -> Result<RouteDrop, RouteError> {
    let mut tx = pool.begin().await?;

    let current = queries::drop::lock_drop(&mut tx, request.drop_id)
        .await?
        .ok_or(RouteError::DropNotFound(request.drop_id))?;

    let issues = validation::check_drop_transition(current.status, request.status)
        .into_iter()
        .collect();
    validation::enforce(issues, false)?;

    let updated = queries::drop::set_drop_status(&mut tx, current.id, request.status).await?;
    audit::record(
        &mut tx,
        admin.user_id,
        audit::UPDATE_DROP_STATUS,
        updated.route_id,
        json!({
            "dropId": updated.id,
            "previousStatus": current.status,
            "status": updated.status,
        }),
    )
    .await?;
    tx.commit().await?;

    info!(
        "Drop {} of route {} marked {} by {}",
        updated.id,
        updated.route_id,
        updated.status.as_str(),
        admin.email
    );
    Ok(updated)
}
