//! Record store backends behind a single lookup capability
//!
//! The serving pipeline only ever sees the `RecordStore` trait; which backend
//! answers is a runtime value. `BindStore` re-reads and re-parses the zone
//! files on every single lookup, the baseline behavior. `CachedBindStore`
//! wraps the same parsing and invalidates on file-modification-time changes.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::SystemTime;

use crate::dns::protocol::QueryType;
use crate::dns::resolver::{self, Answer, ResolveError};
use crate::dns::zone::{BindConfig, Zone};
use crate::dns::zone_parser::{self, ParseError};

#[derive(Debug)]
pub enum StoreError {
    Parse(ParseError),
    Resolve(ResolveError),
    PoisonedLock,
    Unsupported(&'static str),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Parse(e) => write!(f, "Zone data error: {}", e),
            StoreError::Resolve(e) => write!(f, "Resolve error: {}", e),
            StoreError::PoisonedLock => write!(f, "Lock was poisoned"),
            StoreError::Unsupported(op) => write!(f, "Operation not supported: {}", op),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<ParseError> for StoreError {
    fn from(err: ParseError) -> Self {
        StoreError::Parse(err)
    }
}

impl From<ResolveError> for StoreError {
    fn from(err: ResolveError) -> Self {
        StoreError::Resolve(err)
    }
}

type Result<T> = std::result::Result<T, StoreError>;

/// Capability interface every record backend implements
///
/// `lookup` is the one required operation. `bulk_import` is optional; stores
/// that are projections of external files refuse it.
pub trait RecordStore: Send + Sync {
    fn lookup(&self, qname: &str, qtype: QueryType) -> Result<Vec<Answer>>;

    fn bulk_import(&self, _zones: Vec<Zone>) -> Result<()> {
        Err(StoreError::Unsupported("bulk import"))
    }
}

/// File-backed store that parses the configuration and zone files anew for
/// every lookup
pub struct BindStore {
    conf_path: PathBuf,
}

impl BindStore {
    pub fn new<P: AsRef<Path>>(conf_path: P) -> BindStore {
        BindStore {
            conf_path: conf_path.as_ref().to_path_buf(),
        }
    }
}

impl RecordStore for BindStore {
    fn lookup(&self, qname: &str, qtype: QueryType) -> Result<Vec<Answer>> {
        let config = zone_parser::parse_config_file(&self.conf_path)?;
        let answers = resolver::lookup(&config.zones, qname, qtype)?;

        Ok(answers)
    }
}

struct CachedSnapshot {
    config: BindConfig,
    stamps: Vec<(PathBuf, Option<SystemTime>)>,
}

/// File-backed store that keeps the parsed zone set until the configuration
/// or any zone master file changes on disk
pub struct CachedBindStore {
    conf_path: PathBuf,
    snapshot: Mutex<Option<CachedSnapshot>>,
}

impl CachedBindStore {
    pub fn new<P: AsRef<Path>>(conf_path: P) -> CachedBindStore {
        CachedBindStore {
            conf_path: conf_path.as_ref().to_path_buf(),
            snapshot: Mutex::new(None),
        }
    }

    fn modified(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn stamps(&self, config: &BindConfig) -> Vec<(PathBuf, Option<SystemTime>)> {
        let mut stamps = vec![(self.conf_path.clone(), Self::modified(&self.conf_path))];
        for zone in &config.zones {
            stamps.push((zone.path.clone(), Self::modified(&zone.path)));
        }
        stamps
    }

    fn is_fresh(stamps: &[(PathBuf, Option<SystemTime>)]) -> bool {
        stamps
            .iter()
            .all(|(path, stamp)| Self::modified(path) == *stamp)
    }
}

impl RecordStore for CachedBindStore {
    fn lookup(&self, qname: &str, qtype: QueryType) -> Result<Vec<Answer>> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|_| StoreError::PoisonedLock)?;

        let stale = match guard.as_ref() {
            Some(snapshot) => !Self::is_fresh(&snapshot.stamps),
            None => true,
        };

        if stale {
            let config = zone_parser::parse_config_file(&self.conf_path)?;
            let stamps = self.stamps(&config);
            *guard = Some(CachedSnapshot { config, stamps });
            log::info!("Reloaded zone set from {}", self.conf_path.display());
        }

        // the option is always populated here; avoid holding a stale unwrap
        let snapshot = guard.as_ref().ok_or(StoreError::PoisonedLock)?;
        let answers = resolver::lookup(&snapshot.config.zones, qname, qtype)?;

        Ok(answers)
    }
}

/// In-memory store, fed through `bulk_import`
///
/// Used by tests and by callers that assemble zones programmatically.
#[derive(Default)]
pub struct MemoryStore {
    zones: RwLock<Vec<Zone>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore {
            zones: RwLock::new(Vec::new()),
        }
    }

    pub fn with_zones(zones: Vec<Zone>) -> MemoryStore {
        MemoryStore {
            zones: RwLock::new(zones),
        }
    }
}

impl RecordStore for MemoryStore {
    fn lookup(&self, qname: &str, qtype: QueryType) -> Result<Vec<Answer>> {
        let zones = self.zones.read().map_err(|_| StoreError::PoisonedLock)?;
        let answers = resolver::lookup(&zones, qname, qtype)?;

        Ok(answers)
    }

    fn bulk_import(&self, zones: Vec<Zone>) -> Result<()> {
        let mut guard = self.zones.write().map_err(|_| StoreError::PoisonedLock)?;
        guard.extend(zones);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::resolver::RecordData;
    use crate::dns::zone::ZoneRecord;
    use std::net::Ipv4Addr;

    fn sample_zone() -> Zone {
        let mut zone = Zone::new(
            "example.com".to_string(),
            "master".to_string(),
            PathBuf::from("example.com.zone"),
        );
        zone.add_record(ZoneRecord {
            owner: "www".to_string(),
            class: "IN".to_string(),
            rtype: "A".to_string(),
            rdata: "10.0.0.1".to_string(),
        });
        zone
    }

    #[test]
    fn test_memory_store_lookup() {
        let store = MemoryStore::with_zones(vec![sample_zone()]);

        let answers = store.lookup("www", QueryType::A).unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(
            answers[0].data,
            RecordData::A {
                address: Ipv4Addr::new(10, 0, 0, 1)
            }
        );
    }

    #[test]
    fn test_memory_store_bulk_import() {
        let store = MemoryStore::new();
        assert!(store.lookup("www", QueryType::A).unwrap().is_empty());

        store.bulk_import(vec![sample_zone()]).unwrap();
        assert_eq!(store.lookup("www", QueryType::A).unwrap().len(), 1);
    }

    #[test]
    fn test_bulk_import_is_optional() {
        let store = BindStore::new("named.conf");
        let res = store.bulk_import(Vec::new());
        assert!(matches!(res, Err(StoreError::Unsupported(_))));
    }

    #[test]
    fn test_bind_store_missing_conf() {
        let store = BindStore::new("/no/such/named.conf");
        let res = store.lookup("www.example.com", QueryType::A);
        assert!(matches!(res, Err(StoreError::Parse(_))));
    }
}
