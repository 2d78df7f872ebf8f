//! SQL text for the provisioning sequence.
//!
//! PostgreSQL cannot bind identifiers (role, user, database, schema names) or
//! the password inside role DDL as parameters, so those are checked with
//! [`check_identifier`] and quoted here. Catalog lookups that only compare
//! values use `$1` placeholders instead.

use crate::ApiError;

// ---

/// Longest identifier PostgreSQL keeps without truncating (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_BYTES: usize = 63;

pub const DATABASE_EXISTS: &str =
    "SELECT EXISTS(SELECT 1 FROM pg_catalog.pg_database WHERE datname = $1)";

pub const ROLE_EXISTS: &str = "SELECT EXISTS(SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = $1)";

/// Reject names that cannot be represented faithfully as a quoted identifier.
pub fn check_identifier(kind: &str, name: &str) -> Result<(), ApiError> {
    // ---
    if name.trim().is_empty() {
        return Err(ApiError::Validation(format!("{} name must not be empty.", kind)));
    }
    if name.len() > MAX_IDENTIFIER_BYTES {
        return Err(ApiError::Validation(format!(
            "{} name '{}' exceeds {} bytes.",
            kind, name, MAX_IDENTIFIER_BYTES
        )));
    }
    if name.contains('\0') {
        return Err(ApiError::Validation(format!(
            "{} name contains a NUL character.",
            kind
        )));
    }
    Ok(())
}

/// Double-quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal. A value containing a backslash becomes an
/// `E'...'` literal with backslashes doubled, so it reads the same whatever
/// `standard_conforming_strings` is set to.
pub fn quote_literal(value: &str) -> String {
    // ---
    let quoted = value.replace('\'', "''");
    if quoted.contains('\\') {
        format!("E'{}'", quoted.replace('\\', "\\\\"))
    } else {
        format!("'{}'", quoted)
    }
}

pub fn create_role(role: &str, azure_admin_role: Option<&str>) -> String {
    // ---
    let membership = match azure_admin_role {
        Some(admin) => format!("IN ROLE {}", quote_ident(admin)),
        None => "SUPERUSER".to_string(),
    };
    format!(
        "CREATE ROLE {} WITH NOLOGIN INHERIT CREATEDB CREATEROLE {};",
        quote_ident(role),
        membership
    )
}

/// `CREATE USER` for a new login, `ALTER USER` when it already exists.
pub fn upsert_login_user(user: &str, exists: bool, password: &str, superuser: bool) -> String {
    // ---
    let verb = if exists { "ALTER" } else { "CREATE" };
    let superuser = if superuser { " SUPERUSER" } else { "" };
    format!(
        "{} USER {} WITH LOGIN INHERIT CREATEDB CREATEROLE{} NOREPLICATION CONNECTION LIMIT -1 PASSWORD {};",
        verb,
        quote_ident(user),
        superuser,
        quote_literal(password)
    )
}

pub fn grant_membership(role: &str, member: &str) -> String {
    format!("GRANT {} TO {};", quote_ident(role), quote_ident(member))
}

pub fn create_database(database: &str, owner: &str) -> String {
    // ---
    format!(
        "CREATE DATABASE {} TEMPLATE template0 OWNER {};",
        quote_ident(database),
        quote_ident(owner)
    )
}

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {};", quote_ident(schema))
}

pub fn grant_schema(schema: &str, role: &str) -> String {
    // ---
    format!(
        "GRANT ALL PRIVILEGES ON SCHEMA {} TO {};",
        quote_ident(schema),
        quote_ident(role)
    )
}

pub fn alter_database_owner(database: &str, role: &str) -> String {
    // ---
    format!(
        "ALTER DATABASE {} OWNER TO {};",
        quote_ident(database),
        quote_ident(role)
    )
}

pub fn grant_database(database: &str, role: &str) -> String {
    // ---
    format!(
        "GRANT ALL PRIVILEGES ON DATABASE {} TO {};",
        quote_ident(database),
        quote_ident(role)
    )
}

pub fn grant_public_tables(role: &str) -> String {
    format!("GRANT ALL PRIVILEGES ON ALL TABLES IN SCHEMA public TO {};", quote_ident(role))
}

pub fn grant_public_sequences(role: &str) -> String {
    format!("GRANT ALL PRIVILEGES ON ALL SEQUENCES IN SCHEMA public TO {};", quote_ident(role))
}

pub fn reassign_owned(user: &str, role: &str) -> String {
    format!("REASSIGN OWNED BY {} TO {};", quote_ident(user), quote_ident(role))
}

pub fn revoke_public(database: &str) -> String {
    format!("REVOKE ALL ON DATABASE {} FROM PUBLIC CASCADE;", quote_ident(database))
}
