use axum::{
    body::Bytes,
    extract::{FromRequest, Query, Request},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::de::DeserializeOwned;

use crate::{Config, Connector};

mod database;
mod query;

// ---

pub fn router<C: Connector>(connector: C, config: Config) -> Router {
    // ---
    Router::new()
        .merge(database::router())
        .merge(query::router())
        .with_state((connector, config))
}

/// JSON body, or the query string when the body is empty.
///
/// `GET` callers do not always send a body, so connection parameters may
/// arrive as `?host=...&databaseName=...` instead.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        // ---
        let uri = req.uri().clone();
        let body = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;

        if body.iter().all(u8::is_ascii_whitespace) {
            let Query(value) = Query::<T>::try_from_uri(&uri).map_err(IntoResponse::into_response)?;
            Ok(Payload(value))
        } else {
            let Json(value) = Json::<T>::from_bytes(&body).map_err(IntoResponse::into_response)?;
            Ok(Payload(value))
        }
    }
}
