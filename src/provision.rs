//! Database existence check and the provisioning sequence.
//!
//! Provisioning is a two-step protocol with distinct credentials:
//!
//! 1. **Admin phase** — the caller's credentials against the maintenance
//!    database. Creates (or updates) the owning role and the login user and,
//!    when missing, the database itself.
//! 2. **Owner phase** — the new login user's credentials against the target
//!    database. Creates schemas, transfers ownership, grants privileges,
//!    optionally revokes public access and runs any additional SQL.
//!
//! Statements run one at a time without a surrounding transaction. A failure
//! closes the session and aborts the rest of the sequence; everything that
//! already ran stays applied. Re-running with `modifyExisting` converges on
//! the same end state.

use tracing::{debug, info};

use crate::db::{ConnectParams, Connector, Session};
use crate::sql;
use crate::{ApiError, Config, ConnectionTarget, ProvisionRequest};

// ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The database was new and has been created.
    Created,
    /// The database existed and `modifyExisting` re-applied the sequence.
    Modified,
    /// The database existed and was left untouched.
    Skipped,
}

/// Whether a database with exactly this name exists on the server.
pub async fn database_exists<C: Connector>(
    connector: &C,
    target: &ConnectionTarget,
    config: &Config,
) -> Result<bool, ApiError> {
    // ---
    let params = ConnectParams::from_target(target)?.with_database(&config.maintenance_database);
    let mut session = connector.open(&params).await?;
    let found = session
        .exists(sql::DATABASE_EXISTS, &target.database_name)
        .await;
    session.close().await;
    found
}

/// Names and settings resolved from a request before any connection opens.
#[derive(Debug, Clone)]
struct Plan {
    database: String,
    role: String,
    login_user: String,
    admin_user: String,
    password: String,
    azure_admin_role: Option<String>,
    schemas: Vec<String>,
    revoke_public_access: bool,
    modify_existing: bool,
    additional_sql: Vec<String>,
    admin: ConnectParams,
    owner: ConnectParams,
}

impl Plan {
    fn new(request: &ProvisionRequest, config: &Config) -> Result<Self, ApiError> {
        // ---
        let target = &request.target;
        target.validate()?;

        let role = target.role_name();
        let login_user = target.login_user_name().to_string();
        let admin_user = target.admin_role_name().to_string();
        let azure_admin_role = target
            .is_azure()
            .then(|| config.azure_admin_role.clone());

        sql::check_identifier("Database", &target.database_name)?;
        sql::check_identifier("Role", &role)?;
        sql::check_identifier("User", &login_user)?;
        sql::check_identifier("User", &admin_user)?;
        if let Some(admin_role) = &azure_admin_role {
            sql::check_identifier("Role", admin_role)?;
        }
        for schema in &request.schemas {
            sql::check_identifier("Schema", schema)?;
        }

        let password = request.login_password().to_string();
        if password.contains('\0') {
            return Err(ApiError::Validation(
                "Password contains a NUL character.".to_string(),
            ));
        }

        let base = ConnectParams::from_target(target)?;
        let admin = base.clone().with_database(&config.maintenance_database);
        let owner = base.with_credentials(&target.login_connect_name(), &password);

        Ok(Plan {
            database: target.database_name.clone(),
            role,
            login_user,
            admin_user,
            password,
            azure_admin_role,
            schemas: request.schemas.clone(),
            revoke_public_access: request.revoke_public_access,
            modify_existing: request.modify_existing,
            additional_sql: request.additional_sql(),
            admin,
            owner,
        })
    }

    /// Statements run as the login user once the database exists.
    fn owner_statements(&self) -> Vec<String> {
        // ---
        let mut statements = Vec::new();

        for schema in &self.schemas {
            statements.push(sql::create_schema(schema));
            statements.push(sql::grant_schema(schema, &self.role));
        }

        statements.push(sql::alter_database_owner(&self.database, &self.role));
        statements.push(sql::grant_database(&self.database, &self.role));
        statements.push(sql::grant_public_tables(&self.role));
        statements.push(sql::grant_public_sequences(&self.role));
        statements.push(sql::grant_schema("public", &self.role));
        statements.push(sql::reassign_owned(&self.login_user, &self.role));

        if self.revoke_public_access {
            statements.push(sql::revoke_public(&self.database));
        }

        statements.extend(self.additional_sql.iter().cloned());
        statements
    }
}

/// Run the provisioning sequence for `request`.
pub async fn provision<C: Connector>(
    connector: &C,
    request: &ProvisionRequest,
    config: &Config,
) -> Result<Outcome, ApiError> {
    // ---
    let plan = Plan::new(request, config)?;

    let mut admin = connector.open(&plan.admin).await?;
    let result = admin_phase(&mut admin, &plan).await;
    admin.close().await;

    let outcome = result?;
    if outcome == Outcome::Skipped {
        info!(
            "Database '{}' already exists and modifyExisting is false, nothing to do",
            plan.database
        );
        return Ok(outcome);
    }

    let mut owner = connector.open(&plan.owner).await?;
    let result = owner_phase(&mut owner, &plan).await;
    owner.close().await;
    result?;

    info!("Provisioning of '{}' complete ({:?})", plan.database, outcome);
    Ok(outcome)
}

async fn admin_phase<S: Session>(session: &mut S, plan: &Plan) -> Result<Outcome, ApiError> {
    // ---
    let db_exists = session.exists(sql::DATABASE_EXISTS, &plan.database).await?;
    if db_exists && !plan.modify_existing {
        return Ok(Outcome::Skipped);
    }

    if session.exists(sql::ROLE_EXISTS, &plan.role).await? {
        debug!("Role '{}' already exists", plan.role);
    } else {
        debug!("Creating role '{}'", plan.role);
        session
            .execute(&sql::create_role(&plan.role, plan.azure_admin_role.as_deref()))
            .await?;
    }

    // The admin must be a member to create a database owned by the role.
    session
        .execute(&sql::grant_membership(&plan.role, &plan.admin_user))
        .await?;

    let user_exists = session.exists(sql::ROLE_EXISTS, &plan.login_user).await?;
    debug!(
        "{} login user '{}'",
        if user_exists { "Updating" } else { "Creating" },
        plan.login_user
    );
    session
        .execute(&sql::upsert_login_user(
            &plan.login_user,
            user_exists,
            &plan.password,
            plan.azure_admin_role.is_none(),
        ))
        .await?;

    session
        .execute(&sql::grant_membership(&plan.role, &plan.login_user))
        .await?;
    if let Some(admin_role) = &plan.azure_admin_role {
        session
            .execute(&sql::grant_membership(admin_role, &plan.login_user))
            .await?;
    }

    if db_exists {
        Ok(Outcome::Modified)
    } else {
        debug!("Creating database '{}'", plan.database);
        session
            .execute(&sql::create_database(&plan.database, &plan.role))
            .await?;
        Ok(Outcome::Created)
    }
}

async fn owner_phase<S: Session>(session: &mut S, plan: &Plan) -> Result<(), ApiError> {
    // ---
    let statements = plan.owner_statements();
    debug!(
        "Applying {} statements to '{}' as '{}'",
        statements.len(),
        plan.database,
        plan.owner.user
    );
    for statement in &statements {
        session.execute(statement).await?;
    }
    Ok(())
}
