//! `/Query` endpoints: ad-hoc SQL, read (rows back) and write (acknowledged).

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tracing::{debug, info};

use crate::query;
use crate::{ApiError, Config, Connector, QueryRequest};

// ---

pub fn router<C: Connector>() -> Router<(C, Config)> {
    // ---
    Router::new().route("/Query", get(read_query::<C>).post(write_query::<C>))
}

async fn read_query<C: Connector>(
    State((connector, config)): State<(C, Config)>,
    Json(request): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    info!("GET /Query - '{}' on {}", request.target.database_name, request.target.host);

    let rows = query::read(&connector, &request, &config).await?;
    debug!("GET /Query - Returning {} rows", rows.len());
    Ok((StatusCode::OK, Json(rows)))
}

async fn write_query<C: Connector>(
    State((connector, config)): State<(C, Config)>,
    Json(request): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // ---
    info!("POST /Query - '{}' on {}", request.target.database_name, request.target.host);

    query::write(&connector, &request, &config).await?;
    Ok(StatusCode::ACCEPTED)
}
