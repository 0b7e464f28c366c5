//! NATS message handlers

pub mod drop;
pub mod ping;
pub mod route;

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::RouteError;
use crate::types::{ErrorResponse, SuccessResponse};

pub const SUBJECT_PING: &str = "multidrop.ping";
pub const SUBJECT_ROUTE_LIST: &str = "multidrop.route.list";
pub const SUBJECT_ROUTE_GET: &str = "multidrop.route.get";
pub const SUBJECT_ROUTE_CREATE: &str = "multidrop.route.create";
pub const SUBJECT_ROUTE_UPDATE: &str = "multidrop.route.update";
pub const SUBJECT_ROUTE_DELETE: &str = "multidrop.route.delete";
pub const SUBJECT_ROUTE_REASSIGN: &str = "multidrop.route.reassign";
pub const SUBJECT_SEQUENCE_PREVIEW: &str = "multidrop.route.sequence.preview";
pub const SUBJECT_DROP_STATUS: &str = "multidrop.drop.status";

pub(crate) async fn publish_error(
    client: &Client,
    reply: Subject,
    request_id: Uuid,
    code: &str,
    message: impl Into<String>,
) -> Result<()> {
    let error = ErrorResponse::new(request_id, code, message);
    let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
    Ok(())
}

/// Reply with the payload, or with the error's wire code
pub(crate) async fn publish_result<T: Serialize>(
    client: &Client,
    reply: Subject,
    request_id: Uuid,
    result: Result<T, RouteError>,
) -> Result<()> {
    let bytes = match result {
        Ok(payload) => serde_json::to_vec(&SuccessResponse::new(request_id, payload))?,
        Err(e) => {
            match &e {
                RouteError::Database(inner) => error!("Request {} failed: {:#}", request_id, inner),
                other => warn!("Request {} rejected: {}", request_id, other),
            }
            serde_json::to_vec(&e.to_response(request_id))?
        }
    };
    let _ = client.publish(reply, bytes.into()).await;
    Ok(())
}

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let jwt_secret = Arc::new(config.jwt_secret.clone());

    let ping_sub = client.subscribe(SUBJECT_PING).await?;
    let route_list_sub = client.subscribe(SUBJECT_ROUTE_LIST).await?;
    let route_get_sub = client.subscribe(SUBJECT_ROUTE_GET).await?;
    let route_create_sub = client.subscribe(SUBJECT_ROUTE_CREATE).await?;
    let route_update_sub = client.subscribe(SUBJECT_ROUTE_UPDATE).await?;
    let route_delete_sub = client.subscribe(SUBJECT_ROUTE_DELETE).await?;
    let route_reassign_sub = client.subscribe(SUBJECT_ROUTE_REASSIGN).await?;
    let sequence_preview_sub = client.subscribe(SUBJECT_SEQUENCE_PREVIEW).await?;
    let drop_status_sub = client.subscribe(SUBJECT_DROP_STATUS).await?;

    info!("Subscribed to NATS subjects");

    let client_ping = client.clone();
    let client_route_list = client.clone();
    let client_route_get = client.clone();
    let client_route_create = client.clone();
    let client_route_update = client.clone();
    let client_route_delete = client.clone();
    let client_route_reassign = client.clone();
    let client_sequence_preview = client.clone();
    let client_drop_status = client.clone();

    let pool_route_list = pool.clone();
    let pool_route_get = pool.clone();
    let pool_route_create = pool.clone();
    let pool_route_update = pool.clone();
    let pool_route_delete = pool.clone();
    let pool_route_reassign = pool.clone();
    let pool_drop_status = pool.clone();

    let jwt_route_list = Arc::clone(&jwt_secret);
    let jwt_route_get = Arc::clone(&jwt_secret);
    let jwt_route_create = Arc::clone(&jwt_secret);
    let jwt_route_update = Arc::clone(&jwt_secret);
    let jwt_route_delete = Arc::clone(&jwt_secret);
    let jwt_route_reassign = Arc::clone(&jwt_secret);
    let jwt_sequence_preview = Arc::clone(&jwt_secret);
    let jwt_drop_status = Arc::clone(&jwt_secret);

    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub).await
    });

    let route_list_handle = tokio::spawn(async move {
        route::handle_list(client_route_list, route_list_sub, pool_route_list, jwt_route_list).await
    });

    let route_get_handle = tokio::spawn(async move {
        route::handle_get(client_route_get, route_get_sub, pool_route_get, jwt_route_get).await
    });

    let route_create_handle = tokio::spawn(async move {
        route::handle_create(client_route_create, route_create_sub, pool_route_create, jwt_route_create).await
    });

    let route_update_handle = tokio::spawn(async move {
        route::handle_update(client_route_update, route_update_sub, pool_route_update, jwt_route_update).await
    });

    let route_delete_handle = tokio::spawn(async move {
        route::handle_delete(client_route_delete, route_delete_sub, pool_route_delete, jwt_route_delete).await
    });

    let route_reassign_handle = tokio::spawn(async move {
        route::handle_reassign(client_route_reassign, route_reassign_sub, pool_route_reassign, jwt_route_reassign).await
    });

    let sequence_preview_handle = tokio::spawn(async move {
        route::handle_sequence_preview(client_sequence_preview, sequence_preview_sub, jwt_sequence_preview).await
    });

    let drop_status_handle = tokio::spawn(async move {
        drop::handle_status(client_drop_status, drop_status_sub, pool_drop_status, jwt_drop_status).await
    });

    info!("All handlers started");

    // Any handler returning means its subscription closed
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = route_list_handle => {
            error!("Route list handler finished: {:?}", result);
        }
        result = route_get_handle => {
            error!("Route get handler finished: {:?}", result);
        }
        result = route_create_handle => {
            error!("Route create handler finished: {:?}", result);
        }
        result = route_update_handle => {
            error!("Route update handler finished: {:?}", result);
        }
        result = route_delete_handle => {
            error!("Route delete handler finished: {:?}", result);
        }
        result = route_reassign_handle => {
            error!("Route reassign handler finished: {:?}", result);
        }
        result = sequence_preview_handle => {
            error!("Sequence preview handler finished: {:?}", result);
        }
        result = drop_status_handle => {
            error!("Drop status handler finished: {:?}", result);
        }
    }

    Ok(())
}
