//! Configuration loader for the `psql-management` service.
//!
//! The service itself holds no database credentials: every request carries
//! its own. What is configured here is how the service listens and which
//! server-side names it relies on when provisioning. Values come from
//! environment variables (with optional `.env` support provided by the
//! caller).
//!
use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional environment variable with a default value.
macro_rules! parse_env {
    ($lookup:ident, $var_name:expr, $ty:ty, $default:expr) => {
        $lookup($var_name)
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional string environment variable, falling back when unset or blank.
macro_rules! env_or {
    ($lookup:ident, $var_name:expr, $default:expr) => {
        $lookup($var_name)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| $default.to_string())
    };
}

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAINTENANCE_DATABASE: &str = "postgres";
pub const DEFAULT_AZURE_ADMIN_ROLE: &str = "azure_pg_admin";

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Port the HTTP server listens on.
    pub port: u16,

    /// Database used for administrative connections (existence checks, role DDL).
    pub maintenance_database: String,

    /// Platform-reserved admin role granted on Azure instead of SUPERUSER.
    pub azure_admin_role: String,
}

impl Default for Config {
    fn default() -> Self {
        // ---
        Config {
            port: DEFAULT_PORT,
            maintenance_database: DEFAULT_MAINTENANCE_DATABASE.to_string(),
            azure_admin_role: DEFAULT_AZURE_ADMIN_ROLE.to_string(),
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `APP_PORT` – HTTP listen port (default: 8080)
/// - `MAINTENANCE_DATABASE` – administrative database (default: `postgres`)
/// - `AZURE_ADMIN_ROLE` – Azure admin role (default: `azure_pg_admin`)
///
/// Returns an error if a variable is set but invalid.
pub fn load_from_env() -> Result<Config> {
    load_with(|key| env::var(key).ok())
}

/// Load configuration through an arbitrary key lookup.
pub fn load_with<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    // ---
    let port = parse_env!(lookup, "APP_PORT", u16, DEFAULT_PORT);
    let maintenance_database = env_or!(lookup, "MAINTENANCE_DATABASE", DEFAULT_MAINTENANCE_DATABASE);
    let azure_admin_role = env_or!(lookup, "AZURE_ADMIN_ROLE", DEFAULT_AZURE_ADMIN_ROLE);

    Ok(Config {
        port,
        maintenance_database,
        azure_admin_role,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  APP_PORT             : {}", self.port);
        tracing::info!("  MAINTENANCE_DATABASE : {}", self.maintenance_database);
        tracing::info!("  AZURE_ADMIN_ROLE     : {}", self.azure_admin_role);
    }
}
