//! Service configuration and the per-request context snapshot
//!
//! The top-level service configuration is a JSON file naming the listen
//! address and the record store backend. A loaded configuration is projected
//! into an immutable `ServerContext`; the running server reaches the current
//! snapshot through a `ServerHandle`, and an external reload mechanism swaps
//! snapshots with `apply_config` without touching requests in flight.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_derive::Deserialize;

use crate::dns::response::NegativeAnswerPolicy;
use crate::dns::store::{BindStore, CachedBindStore, RecordStore};

#[derive(Debug)]
pub enum ContextError {
    Io(io::Error),
    Json(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Io(e) => write!(f, "Unable to read configuration file: {}", e),
            ContextError::Json(e) => write!(f, "Invalid configuration JSON: {}", e),
            ContextError::Invalid(reason) => write!(f, "Invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for ContextError {}

impl From<io::Error> for ContextError {
    fn from(err: io::Error) -> Self {
        ContextError::Io(err)
    }
}

impl From<serde_json::Error> for ContextError {
    fn from(err: serde_json::Error) -> Self {
        ContextError::Json(err)
    }
}

type Result<T> = std::result::Result<T, ContextError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOptions {
    pub host: String,
    pub port: u16,
    pub data_store_method: String,
    /// Answer for empty lookups: "noerror" (default) or "nxdomain"
    #[serde(default)]
    pub negative_answer: Option<String>,
    /// Cache parsed zones until a file changes on disk
    #[serde(default)]
    pub cache_zones: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindSettings {
    pub conf_path: PathBuf,
}

/// The top-level JSON service configuration
#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub options: ServiceOptions,
    pub bind: Option<BindSettings>,
}

impl ServiceConfig {
    pub fn load(path: &Path) -> Result<ServiceConfig> {
        let text = fs::read_to_string(path)?;
        let config: ServiceConfig = serde_json::from_str(&text)?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_str(text: &str) -> Result<ServiceConfig> {
        let config: ServiceConfig = serde_json::from_str(text)?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.options.host.is_empty() {
            return Err(ContextError::Invalid("host must not be empty".to_string()));
        }
        if self.options.port == 0 {
            return Err(ContextError::Invalid("port must not be zero".to_string()));
        }

        match self.options.data_store_method.to_ascii_lowercase().as_str() {
            "bind" => match &self.bind {
                Some(bind) => {
                    fs::metadata(&bind.conf_path).map_err(|e| {
                        ContextError::Invalid(format!(
                            "unable to access {}: {}",
                            bind.conf_path.display(),
                            e
                        ))
                    })?;
                }
                None => {
                    return Err(ContextError::Invalid(
                        "bind settings are required for the bind data store".to_string(),
                    ))
                }
            },
            other => {
                return Err(ContextError::Invalid(format!("invalid dataStore: {}", other)));
            }
        }

        if let Some(name) = &self.options.negative_answer {
            if NegativeAnswerPolicy::from_name(name).is_none() {
                return Err(ContextError::Invalid(format!(
                    "invalid negativeAnswer: {}",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Immutable snapshot of everything one request pipeline needs
pub struct ServerContext {
    pub store: Box<dyn RecordStore>,
    pub policy: NegativeAnswerPolicy,
    pub host: String,
    pub port: u16,
}

impl ServerContext {
    pub fn from_config(config: &ServiceConfig) -> Result<ServerContext> {
        // validate() guarantees bind settings exist for the bind method
        let bind = config.bind.as_ref().ok_or_else(|| {
            ContextError::Invalid("bind settings are required".to_string())
        })?;

        let store: Box<dyn RecordStore> = if config.options.cache_zones {
            Box::new(CachedBindStore::new(&bind.conf_path))
        } else {
            Box::new(BindStore::new(&bind.conf_path))
        };

        let policy = config
            .options
            .negative_answer
            .as_deref()
            .and_then(NegativeAnswerPolicy::from_name)
            .unwrap_or_default();

        Ok(ServerContext {
            store,
            policy,
            host: config.options.host.clone(),
            port: config.options.port,
        })
    }
}

/// Holds the active context snapshot and swaps it atomically on reload
///
/// Requests clone the `Arc` once and keep that snapshot for their whole
/// pipeline; a concurrent `apply_config` never changes data under them.
pub struct ServerHandle {
    current: RwLock<Arc<ServerContext>>,
}

impl ServerHandle {
    pub fn new(context: Arc<ServerContext>) -> ServerHandle {
        ServerHandle {
            current: RwLock::new(context),
        }
    }

    pub fn current(&self) -> Arc<ServerContext> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn apply_config(&self, context: Arc<ServerContext>) {
        match self.current.write() {
            Ok(mut guard) => *guard = context,
            Err(poisoned) => *poisoned.into_inner() = context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::protocol::QueryType;
    use crate::dns::store::MemoryStore;

    #[test]
    fn test_config_json_keys() {
        let text = r#"{
            "options": { "host": "127.0.0.1", "port": 5353, "dataStoreMethod": "bind" },
            "bind": { "confPath": "Cargo.toml" }
        }"#;

        let config = ServiceConfig::from_str(text).expect("Failed to parse config");
        assert_eq!(config.options.host, "127.0.0.1");
        assert_eq!(config.options.port, 5353);
        assert_eq!(config.options.data_store_method, "bind");
        assert!(!config.options.cache_zones);
    }

    #[test]
    fn test_config_rejects_unknown_store() {
        let text = r#"{
            "options": { "host": "127.0.0.1", "port": 53, "dataStoreMethod": "mysql" }
        }"#;

        let res = ServiceConfig::from_str(text);
        assert!(matches!(res, Err(ContextError::Invalid(_))));
    }

    #[test]
    fn test_config_rejects_empty_host() {
        let text = r#"{
            "options": { "host": "", "port": 53, "dataStoreMethod": "bind" },
            "bind": { "confPath": "Cargo.toml" }
        }"#;

        let res = ServiceConfig::from_str(text);
        assert!(matches!(res, Err(ContextError::Invalid(_))));
    }

    #[test]
    fn test_config_rejects_bad_policy() {
        let text = r#"{
            "options": {
                "host": "127.0.0.1", "port": 53,
                "dataStoreMethod": "bind", "negativeAnswer": "maybe"
            },
            "bind": { "confPath": "Cargo.toml" }
        }"#;

        let res = ServiceConfig::from_str(text);
        assert!(matches!(res, Err(ContextError::Invalid(_))));
    }

    #[test]
    fn test_handle_swaps_snapshots() {
        let first = Arc::new(ServerContext {
            store: Box::new(MemoryStore::new()),
            policy: NegativeAnswerPolicy::NoError,
            host: "127.0.0.1".to_string(),
            port: 53,
        });
        let handle = ServerHandle::new(first);
        assert_eq!(handle.current().port, 53);

        let second = Arc::new(ServerContext {
            store: Box::new(MemoryStore::new()),
            policy: NegativeAnswerPolicy::NxDomain,
            host: "127.0.0.1".to_string(),
            port: 5353,
        });
        handle.apply_config(second);

        let current = handle.current();
        assert_eq!(current.port, 5353);
        assert!(current
            .store
            .lookup("www.example.com", QueryType::A)
            .unwrap()
            .is_empty());
    }
}
