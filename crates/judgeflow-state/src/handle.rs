//! SurrealDB Handle - Connection setup
//!
//! Supports in-memory (tests), local file-backed and cloud (WebSocket)
//! connections. Every constructor runs the schema migrations before
//! handing out the connection.

use serde::{Deserialize, Serialize};
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StateError;
use crate::migrations;
use crate::Result;

/// Local persistence used when nothing else is configured.
pub const DEFAULT_LOCAL_PATH: &str = ".judgeflow/db";

/// Configuration for SurrealDB Cloud connection
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    pub username: String,
    pub password: String,
    /// Namespace (default: "judgeflow")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: "judgeflow".to_string(),
            database: "main".to_string(),
            is_root: false,
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: `settings.namespace`)
    /// - SURREALDB_DATABASE (optional, default: `settings.database`)
    /// - SURREALDB_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env(settings: &ConnectionSettings) -> std::result::Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok(), settings)
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        settings: &ConnectionSettings,
    ) -> std::result::Result<Self, String> {
        let endpoint = lookup("SURREALDB_ENDPOINT").ok_or("SURREALDB_ENDPOINT not set")?;
        let username = lookup("SURREALDB_USERNAME").ok_or("SURREALDB_USERNAME not set")?;
        let password = lookup("SURREALDB_PASSWORD").ok_or("SURREALDB_PASSWORD not set")?;

        let mut config = Self::new(endpoint, username, password)
            .with_namespace(
                lookup("SURREALDB_NAMESPACE").unwrap_or_else(|| settings.namespace.clone()),
            )
            .with_database(
                lookup("SURREALDB_DATABASE").unwrap_or_else(|| settings.database.clone()),
            );
        config.is_root = lookup("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);
        Ok(config)
    }
}

/// Connection target from the `[database]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Any `surrealdb::engine::any` URL (`mem://`, `surrealkv://path`, `ws://host`).
    pub url: Option<String>,
    pub namespace: String,
    pub database: String,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            url: None,
            namespace: "judgeflow".to_string(),
            database: "main".to_string(),
        }
    }
}

/// SurrealDB connection handle for Judgeflow
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn in_memory() -> Result<Self> {
        info!("Connecting to SurrealDB (in-memory)");
        Self::connect("mem://", "judgeflow", "main").await
    }

    /// Connect to any engine URL without authentication.
    #[instrument(skip(namespace, database))]
    pub async fn connect(url: &str, namespace: &str, database: &str) -> Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {url}: {e}")))?;

        db.use_ns(namespace)
            .use_db(database)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;
        info!("SurrealDB connected ({})", url);
        Ok(Self { db })
    }

    /// Connect to SurrealDB Cloud
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn setup_cloud(config: CloudConfig) -> Result<Self> {
        info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                StateError::Connection(format!("Database authentication failed: {}", e))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        migrations::init_schema(&db).await?;
        info!("SurrealDB Cloud connected and schema initialized");
        Ok(Self { db })
    }

    /// Connect using environment variables, then `settings`.
    ///
    /// If SURREALDB_ENDPOINT is set, connects to cloud.
    /// If SURREALDB_URL is set, connects to that URL.
    /// If `settings.url` is set, connects to that URL.
    /// Otherwise, falls back to local persistence in `.judgeflow/db`.
    #[instrument(skip_all)]
    pub async fn setup_from_env(settings: &ConnectionSettings) -> Result<Self> {
        if let Ok(config) = CloudConfig::from_env(settings) {
            info!("Cloud config found, connecting to SurrealDB Cloud");
            return Self::setup_cloud(config).await;
        }

        let url = match std::env::var("SURREALDB_URL").ok().or_else(|| settings.url.clone()) {
            Some(url) => url,
            None => {
                std::fs::create_dir_all(DEFAULT_LOCAL_PATH).map_err(|e| {
                    StateError::Connection(format!(
                        "Failed to create database directory {}: {}",
                        DEFAULT_LOCAL_PATH, e
                    ))
                })?;
                info!("No database configured, using local persistence");
                format!("surrealkv://{}", DEFAULT_LOCAL_PATH)
            }
        };

        Self::connect(&url, &settings.namespace, &settings.database).await
    }

    /// The underlying connection.
    pub fn db(&self) -> &Surreal<Any> {
        &self.db
    }
}
