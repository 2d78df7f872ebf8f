//! Request payloads for the provisioning API.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Deserializer};

use crate::ApiError;

// ---

fn default_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "Prefer".to_string()
}

fn default_true() -> bool {
    true
}

/// Treat an explicit JSON `null` the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Server, database and credentials a request operates on.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTarget {
    // ---
    /// Free text; anything starting with "Azure" switches to the Azure privilege model.
    #[serde(default)]
    pub platform: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_ssl_mode", deserialize_with = "null_as_default")]
    pub ssl_mode: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub user: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub password: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub database_name: String,
}

/// Body of `POST /Database`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    // ---
    #[serde(flatten)]
    pub target: ConnectionTarget,

    /// Password for the login user; the admin password is reused when absent.
    #[serde(default)]
    pub new_user_password: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub schemas: Vec<String>,

    #[serde(default = "default_true")]
    pub revoke_public_access: bool,

    /// When false, an existing database is left untouched.
    #[serde(default)]
    pub modify_existing: bool,

    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_sql_commands: Vec<String>,

    #[serde(default)]
    pub url_decode_additional_sql_commands: bool,
}

/// Body of `GET /Query` and `POST /Query`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    // ---
    #[serde(flatten)]
    pub target: ConnectionTarget,

    #[serde(default, deserialize_with = "null_as_default")]
    pub query_string: String,

    #[serde(default)]
    pub url_decode_query_string: bool,
}

impl ConnectionTarget {
    /// Check the fields every operation needs before a connection is opened.
    ///
    /// The error message lists each missing field as `"{Field} is required."`
    /// in a fixed order: Host, User, Password, DatabaseName.
    pub fn validate(&self) -> Result<(), ApiError> {
        // ---
        let required = [
            ("Host", &self.host),
            ("User", &self.user),
            ("Password", &self.password),
            ("DatabaseName", &self.database_name),
        ];

        let mut message = String::new();
        for (field, value) in required {
            if value.trim().is_empty() {
                message.push_str(field);
                message.push_str(" is required. ");
            }
        }

        let message = message.trim();
        if message.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(message.to_string()))
        }
    }

    pub fn is_azure(&self) -> bool {
        // ---
        self.platform
            .as_deref()
            .map(str::trim)
            .and_then(|p| p.get(..5))
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("azure"))
    }

    /// Azure single server, where logins take the form `user@servername`.
    pub fn is_azure_single_server(&self) -> bool {
        // ---
        self.platform
            .as_deref()
            .is_some_and(|p| p.trim().eq_ignore_ascii_case("azure"))
    }

    /// Owning role for the database: `_Role` when the name has any upper-case
    /// character, `_role` otherwise.
    pub fn role_name(&self) -> String {
        // ---
        let suffix = if self.database_name.chars().any(char::is_uppercase) {
            "_Role"
        } else {
            "_role"
        };
        format!("{}{}", self.database_name, suffix)
    }

    pub fn login_user_name(&self) -> &str {
        &self.database_name
    }

    /// Name the login user authenticates with.
    pub fn login_connect_name(&self) -> String {
        // ---
        if self.is_azure_single_server() {
            format!("{}@{}", self.database_name, self.server_name())
        } else {
            self.database_name.clone()
        }
    }

    /// Admin user as known to the catalog (`admin@server` becomes `admin`).
    pub fn admin_role_name(&self) -> &str {
        // ---
        match self.user.find('@') {
            Some(at) => &self.user[..at],
            None => &self.user,
        }
    }

    /// Host up to the first ".postgres", the whole host when absent.
    fn server_name(&self) -> &str {
        // ---
        match self.host.find(".postgres") {
            Some(end) => &self.host[..end],
            None => &self.host,
        }
    }
}

impl ProvisionRequest {
    pub fn login_password(&self) -> &str {
        // ---
        self.new_user_password
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(&self.target.password)
    }

    pub fn additional_sql(&self) -> Vec<String> {
        // ---
        self.additional_sql_commands
            .iter()
            .map(|sql| {
                if self.url_decode_additional_sql_commands {
                    url_decode(sql)
                } else {
                    sql.clone()
                }
            })
            .collect()
    }
}

impl QueryRequest {
    pub fn sql(&self) -> String {
        // ---
        if self.url_decode_query_string {
            url_decode(&self.query_string)
        } else {
            self.query_string.clone()
        }
    }
}

/// Form-style URL decoding: `+` is a space, `%XX` a byte, invalid UTF-8 is replaced.
pub fn url_decode(value: &str) -> String {
    // ---
    let spaced = value.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
