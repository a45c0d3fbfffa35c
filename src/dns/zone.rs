//! In-memory model of a BIND-style configuration and its zones

use std::path::PathBuf;

pub const DEFAULT_TTL: u32 = 3600;

/// One line of a zone master file, kept raw until a lookup projects it
///
/// The rdata stays an unparsed string; which structure it carries is decided
/// per record type at resolution time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneRecord {
    /// Owner token: an exact name, `@`, `*` or `*.`
    pub owner: String,
    pub class: String,
    pub rtype: String,
    pub rdata: String,
}

/// A zone declared in the configuration, with its parsed master-file records
/// in file order
#[derive(Clone, Debug, Default)]
pub struct Zone {
    /// Apex domain the zone is rooted at
    pub domain: String,
    /// Declared zone kind (`master`, ...), kept for reporting only
    pub kind: String,
    /// Master file path as resolved at parse time
    pub path: PathBuf,
    /// Default ttl from the `$TTL` directive
    pub default_ttl: u32,
    pub records: Vec<ZoneRecord>,
}

impl Zone {
    pub fn new(domain: String, kind: String, path: PathBuf) -> Zone {
        Zone {
            domain,
            kind,
            path,
            default_ttl: DEFAULT_TTL,
            records: Vec::new(),
        }
    }

    pub fn add_record(&mut self, record: ZoneRecord) {
        self.records.push(record);
    }

    /// The ttl stamped on every answer from this zone: the SOA minimum when
    /// the zone carries a SOA record, the `$TTL` default otherwise.
    pub fn minimum_ttl(&self) -> u32 {
        for record in &self.records {
            if !record.rtype.eq_ignore_ascii_case("soa") {
                continue;
            }

            // seventh field of the (paren-flattened) SOA rdata
            let cleaned: String = record
                .rdata
                .chars()
                .filter(|c| *c != '(' && *c != ')')
                .collect();
            if let Some(minimum) = cleaned.split_whitespace().nth(6) {
                if let Ok(ttl) = minimum.parse::<u32>() {
                    return ttl;
                }
            }
        }

        self.default_ttl
    }
}

/// The `listen-on` options statement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenOn {
    pub port: u16,
    pub matches: String,
}

impl Default for ListenOn {
    fn default() -> Self {
        ListenOn {
            port: 53,
            matches: "any".to_string(),
        }
    }
}

/// Options recognized inside the `options` clause; anything else in the
/// clause is tolerated and ignored
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerOptions {
    pub listen_on: ListenOn,
    pub allow_query: String,
    pub allow_transfer: String,
    pub recursion: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            listen_on: ListenOn::default(),
            allow_query: "any".to_string(),
            allow_transfer: "none".to_string(),
            recursion: false,
        }
    }
}

/// Parsed configuration: server options plus the declared zones, in
/// declaration order
#[derive(Clone, Debug, Default)]
pub struct BindConfig {
    pub options: ServerOptions,
    pub zones: Vec<Zone>,
}

impl BindConfig {
    pub fn get_zone(&self, domain: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.domain == domain)
    }

    /// Add a zone, replacing any earlier declaration for the same domain.
    pub fn add_zone(&mut self, zone: Zone) {
        if let Some(existing) = self.zones.iter_mut().find(|z| z.domain == zone.domain) {
            *existing = zone;
        } else {
            self.zones.push(zone);
        }
    }
}
