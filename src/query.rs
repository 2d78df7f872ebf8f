//! Ad-hoc SQL against a target database under the caller's credentials.

use tracing::warn;

use crate::db::{ConnectParams, Connector, RowMap, Session};
use crate::provision::database_exists;
use crate::{ApiError, Config, QueryRequest};

// ---

/// Execute `request` and return every row with its values as text.
///
/// Connection problems surface as [`ApiError::Database`]; anything that goes
/// wrong while executing or reading the result becomes [`ApiError::BadRequest`].
pub async fn read<C: Connector>(
    connector: &C,
    request: &QueryRequest,
    config: &Config,
) -> Result<Vec<RowMap>, ApiError> {
    // ---
    let params = prepare(connector, request, config).await?;
    let sql = request.sql();

    let mut session = connector.open(&params).await?;
    let result = session.fetch_rows(&sql).await;
    session.close().await;

    result.map_err(|e| {
        warn!("Read query on '{}' failed: {}", params.database, e);
        ApiError::BadRequest(e.to_string())
    })
}

/// Execute `request` for effect. Execution errors propagate unchanged.
pub async fn write<C: Connector>(
    connector: &C,
    request: &QueryRequest,
    config: &Config,
) -> Result<(), ApiError> {
    // ---
    let params = prepare(connector, request, config).await?;
    let sql = request.sql();

    let mut session = connector.open(&params).await?;
    let result = session.execute(&sql).await;
    session.close().await;
    result
}

/// Validate the request and make sure the target database is there.
async fn prepare<C: Connector>(
    connector: &C,
    request: &QueryRequest,
    config: &Config,
) -> Result<ConnectParams, ApiError> {
    // ---
    let target = &request.target;
    target.validate()?;
    let params = ConnectParams::from_target(target)?;

    if !database_exists(connector, target, config).await? {
        return Err(ApiError::NotFound(target.database_name.clone()));
    }
    Ok(params)
}
