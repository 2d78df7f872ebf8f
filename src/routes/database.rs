//! `/Database` endpoints: existence check and provisioning.
//!
//! Follows the same EMBP shape as the other route files: handlers stay private
//! and the gateway (`mod.rs`) merges the subrouter returned by [`router`].

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tracing::info;

use super::Payload;
use crate::provision::{self, Outcome};
use crate::{ApiError, Config, ConnectionTarget, Connector, ProvisionRequest};

// ---

pub fn router<C: Connector>() -> Router<(C, Config)> {
    // ---
    Router::new().route(
        "/Database",
        get(get_database::<C>).post(create_database::<C>),
    )
}

/// Handle `GET /Database`: 200 `true` when the database exists, 404 `false` otherwise.
async fn get_database<C: Connector>(
    State((connector, config)): State<(C, Config)>,
    Payload(target): Payload<ConnectionTarget>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    info!("GET /Database - '{}' on {}", target.database_name, target.host);
    target.validate()?;

    let exists = provision::database_exists(&connector, &target, &config).await?;
    let status = if exists {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((status, Json(exists)))
}

/// Handle `POST /Database`: 201 with the database name, also when nothing had to change.
async fn create_database<C: Connector>(
    State((connector, config)): State<(C, Config)>,
    Json(request): Json<ProvisionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    info!(
        "POST /Database - '{}' on {} (modifyExisting={})",
        request.target.database_name, request.target.host, request.modify_existing
    );

    let outcome = provision::provision(&connector, &request, &config).await?;
    if outcome == Outcome::Skipped {
        info!("POST /Database - '{}' left as is", request.target.database_name);
    }

    Ok((
        StatusCode::CREATED,
        Json(request.target.database_name.clone()),
    ))
}
