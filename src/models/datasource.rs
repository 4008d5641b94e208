//! Data source connection parameters.
//!
//! A `DataSourceConfig` is owned by the caller. Adapters read it to open a
//! scoped pool and never mutate it.

use crate::config::PoolOptions;
use crate::error::{MetaError, MetaResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Engines with a metadata adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    PostgreSql,
    /// Includes MariaDB
    MySql,
    Sqlite,
}

impl EngineType {
    /// Parse an engine type name. Returns `None` for engines without an adapter.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Self::PostgreSql),
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Canonical lowercase name, also used as URL scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostgreSql => "postgresql",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Get the display name for this engine.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSql => "PostgreSQL",
            Self::MySql => "MySQL",
            Self::Sqlite => "SQLite",
        }
    }

    /// Get the default port for this engine.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::PostgreSql => Some(5432),
            Self::MySql => Some(3306),
            Self::Sqlite => None,
        }
    }
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Connection parameters for one data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub id: String,
    /// Free-form engine name; resolved by the adapter factory.
    pub engine_type: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Database name, or the file path for SQLite.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Contains sensitive data - never log
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Extra driver properties passed through as URL query parameters.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl DataSourceConfig {
    /// Create a configuration with only id and engine set.
    pub fn new(id: impl Into<String>, engine_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            engine_type: engine_type.into(),
            host: None,
            port: None,
            database: None,
            username: None,
            password: None,
            properties: BTreeMap::new(),
            pool_options: PoolOptions::default(),
        }
    }

    /// Set the host and port.
    pub fn with_host(mut self, host: impl Into<String>, port: Option<u16>) -> Self {
        self.host = Some(host.into());
        self.port = port;
        self
    }

    /// Set the database name (file path for SQLite).
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    /// Add an extra driver property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Resolve the engine, failing for engines without an adapter.
    pub fn engine(&self) -> MetaResult<EngineType> {
        EngineType::parse(&self.engine_type)
            .ok_or_else(|| MetaError::unsupported_type(self.engine_type.clone()))
    }

    /// Build the driver connection URL.
    pub fn connection_url(&self) -> MetaResult<String> {
        let engine = self.engine()?;

        if engine == EngineType::Sqlite {
            let path = self
                .database
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    MetaError::validation("SQLite data sources require a database file path")
                })?;
            let mut url = format!("sqlite:{}", path);
            if !self.properties.is_empty() {
                let query: Vec<String> = self
                    .properties
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                url.push('?');
                url.push_str(&query.join("&"));
            }
            return Ok(url);
        }

        let host = self.host.as_deref().unwrap_or("localhost");
        let mut url = Url::parse(&format!("{}://{}", engine.as_str(), host)).map_err(|e| {
            MetaError::validation(format!("Invalid host '{}': {}", host, e))
        })?;

        let port = self.port.or(engine.default_port());
        url.set_port(port)
            .map_err(|_| MetaError::validation("Cannot set port on connection URL"))?;

        if let Some(user) = self.username.as_deref().filter(|u| !u.is_empty()) {
            url.set_username(user)
                .map_err(|_| MetaError::validation("Cannot set username on connection URL"))?;
            url.set_password(self.password.as_deref())
                .map_err(|_| MetaError::validation("Cannot set password on connection URL"))?;
        }

        if let Some(db) = self.database.as_deref().filter(|d| !d.is_empty()) {
            url.set_path(&format!("/{}", db.trim_start_matches('/')));
        }

        if !self.properties.is_empty() {
            url.query_pairs_mut().extend_pairs(self.properties.iter());
        }

        Ok(url.to_string())
    }

    /// Get a display-safe version of the connection URL (credentials masked).
    pub fn masked_url(&self) -> String {
        match self.connection_url() {
            Ok(raw) => match Url::parse(&raw) {
                Ok(mut url) if url.password().is_some() => {
                    if url.set_password(Some("****")).is_err() {
                        return format!("{}://<masked>", self.engine_type);
                    }
                    url.to_string()
                }
                _ => raw,
            },
            Err(_) => format!("{}://<invalid>", self.engine_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_type_parse() {
        assert_eq!(EngineType::parse("PostgreSQL"), Some(EngineType::PostgreSql));
        assert_eq!(EngineType::parse("postgres"), Some(EngineType::PostgreSql));
        assert_eq!(EngineType::parse("mariadb"), Some(EngineType::MySql));
        assert_eq!(EngineType::parse(" sqlite "), Some(EngineType::Sqlite));
        assert_eq!(EngineType::parse("db2"), None);
        assert_eq!(EngineType::parse("oracle"), None);
    }

    #[test]
    fn test_unsupported_engine_is_typed_error() {
        let config = DataSourceConfig::new("legacy", "db2");
        assert!(matches!(
            config.engine(),
            Err(MetaError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_postgres_url_encodes_credentials() {
        let config = DataSourceConfig::new("pg", "postgresql")
            .with_host("db.internal", None)
            .with_database("sales")
            .with_credentials("report", Some("p@ss:word".to_string()));

        let url = config.connection_url().unwrap();
        assert!(url.starts_with("postgresql://report:"));
        assert!(url.contains("@db.internal:5432/sales"));
        assert!(!url.contains("p@ss:word"));
    }

    #[test]
    fn test_properties_become_query_pairs() {
        let config = DataSourceConfig::new("my", "mysql")
            .with_host("localhost", Some(3307))
            .with_database("shop")
            .with_property("ssl-mode", "required");

        let url = config.connection_url().unwrap();
        assert_eq!(url, "mysql://localhost:3307/shop?ssl-mode=required");
    }

    #[test]
    fn test_sqlite_requires_path() {
        let config = DataSourceConfig::new("lite", "sqlite");
        assert!(matches!(
            config.connection_url(),
            Err(MetaError::Validation { .. })
        ));

        let config = config.with_database("/tmp/app.db");
        assert_eq!(config.connection_url().unwrap(), "sqlite:/tmp/app.db");
    }

    #[test]
    fn test_masked_url_hides_password() {
        let config = DataSourceConfig::new("pg", "postgres")
            .with_host("localhost", None)
            .with_database("db")
            .with_credentials("user", Some("secret".to_string()));

        let masked = config.masked_url();
        assert!(!masked.contains("secret"));
        assert!(masked.contains("****"));
    }

    #[test]
    fn test_password_never_serialized() {
        let config = DataSourceConfig::new("pg", "postgres")
            .with_credentials("user", Some("secret".to_string()));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
