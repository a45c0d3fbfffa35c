//! BIND-style configuration and zone master-file parser
//!
//! Two grammars live here. The configuration is a sequence of brace-delimited
//! clauses (`options`, `zone`); the parser walks whitespace-separated tokens
//! and tracks brace depth to find each clause body. Zone master files are
//! parsed line by line: `$TTL` directive, `;` comments, blank-owner
//! carry-forward, and `(`-continued records whose following lines are trimmed
//! and space-joined until a closing `)`.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::dns::zone::{BindConfig, Zone, ZoneRecord};

#[derive(Debug)]
pub enum ParseError {
    /// Unknown top-level clause or a malformed statement; the whole parse
    /// fails and no partial configuration is returned.
    ConfigSyntax { message: String },
    /// The configuration or a referenced zone master file could not be read.
    MissingFile { path: PathBuf, error: io::Error },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::ConfigSyntax { message } => write!(f, "Invalid configuration: {}", message),
            ParseError::MissingFile { path, error } => {
                write!(f, "Unable to read {}: {}", path.display(), error)
            }
        }
    }
}

impl std::error::Error for ParseError {}

type Result<T> = std::result::Result<T, ParseError>;

lazy_static! {
    static ref LISTEN_ON_RE: Regex =
        Regex::new(r"listen-on\s+port\s+(\d+)\s+\{\s*(.*?);\s*\};").unwrap();
    static ref ALLOW_QUERY_RE: Regex = Regex::new(r"allow-query\s+\{\s*(.*?);\s*\};").unwrap();
    static ref ALLOW_TRANSFER_RE: Regex =
        Regex::new(r"allow-transfer\s+\{\s*(.*?);\s*\};").unwrap();
    static ref RECURSION_RE: Regex = Regex::new(r"recursion\s+(.*?);").unwrap();
    static ref ZONE_RE: Regex =
        Regex::new(r#""(.*?)"\s+in\s+\{\s*type\s+(.*?);\s+file\s+"(.*?)";\s*\};"#).unwrap();
    static ref TTL_RE: Regex = Regex::new(r"(?i)^\$TTL\s+(.*)$").unwrap();
    static ref RECORD_RE: Regex = Regex::new(r"^(\S*)\s+(\S+)\s+(\S+)\s+(.*?)$").unwrap();
    static ref CLOSE_PAREN_RE: Regex = Regex::new(r"^(.*?)\s*\)$").unwrap();
}

/// Parse a configuration file and the master file of every zone it declares.
///
/// Relative master-file paths are resolved against the configuration file's
/// directory. Any unreadable file fails the whole parse; no partially-loaded
/// zone set escapes.
pub fn parse_config_file(path: &Path) -> Result<BindConfig> {
    let text = fs::read_to_string(path).map_err(|error| ParseError::MissingFile {
        path: path.to_path_buf(),
        error,
    })?;

    let mut config = parse_config(&text)?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    for zone in &mut config.zones {
        if !zone.path.is_absolute() {
            zone.path = base.join(&zone.path);
        }

        let zone_text = fs::read_to_string(&zone.path).map_err(|error| ParseError::MissingFile {
            path: zone.path.clone(),
            error,
        })?;
        parse_master_file(zone, &zone_text)?;
    }

    Ok(config)
}

/// Parse configuration text into options and (recordless) zone entries.
pub fn parse_config(text: &str) -> Result<BindConfig> {
    // strip ;; end-of-line comments before tokenizing
    let mut cleaned = String::new();
    for line in text.lines() {
        match line.find(";;") {
            Some(idx) => cleaned.push_str(&line[..idx]),
            None => cleaned.push_str(line),
        }
        cleaned.push('\n');
    }

    let mut config = BindConfig::default();

    let mut depth = 0i32;
    let mut clause: Option<Clause> = None;
    let mut entered = false;
    let mut body = String::new();

    for token in cleaned.split_whitespace() {
        if token.contains('{') {
            depth += 1;
        }
        if token.contains('}') {
            depth -= 1;
        }

        match clause {
            None => {
                clause = match token {
                    "options" => Some(Clause::Options),
                    "zone" => Some(Clause::Zone),
                    _ => {
                        return Err(ParseError::ConfigSyntax {
                            message: format!("invalid clause: {}", token),
                        })
                    }
                };
                entered = false;
            }
            Some(current) => {
                if !body.is_empty() {
                    body.push(' ');
                }
                body.push_str(token);

                if token.contains('{') {
                    entered = true;
                }
                if entered && depth == 0 {
                    match current {
                        Clause::Options => parse_options(&body, &mut config)?,
                        Clause::Zone => parse_zone_statement(&body, &mut config)?,
                    }
                    body.clear();
                    clause = None;
                }
            }
        }
    }

    if clause.is_some() {
        return Err(ParseError::ConfigSyntax {
            message: "unterminated clause".to_string(),
        });
    }

    Ok(config)
}

#[derive(Copy, Clone)]
enum Clause {
    Options,
    Zone,
}

/// Pick the recognized statements out of an options clause body. Statements
/// that match none of the patterns are ignored.
fn parse_options(body: &str, config: &mut BindConfig) -> Result<()> {
    if let Some(caps) = LISTEN_ON_RE.captures(body) {
        let port = caps[1].parse::<u16>().map_err(|_| ParseError::ConfigSyntax {
            message: format!("invalid listen-on port: {}", &caps[1]),
        })?;
        config.options.listen_on.port = port;
        config.options.listen_on.matches = caps[2].to_string();
    }

    if let Some(caps) = ALLOW_QUERY_RE.captures(body) {
        config.options.allow_query = caps[1].to_string();
    }

    if let Some(caps) = ALLOW_TRANSFER_RE.captures(body) {
        config.options.allow_transfer = caps[1].to_string();
    }

    if let Some(caps) = RECURSION_RE.captures(body) {
        config.options.recursion = !caps[1].eq_ignore_ascii_case("no");
    }

    Ok(())
}

fn parse_zone_statement(body: &str, config: &mut BindConfig) -> Result<()> {
    let caps = ZONE_RE.captures(body).ok_or_else(|| ParseError::ConfigSyntax {
        message: format!("malformed zone statement: {}", body.trim()),
    })?;

    config.add_zone(Zone::new(
        caps[1].to_string(),
        caps[2].to_string(),
        PathBuf::from(&caps[3]),
    ));

    Ok(())
}

/// Parse master-file text into `zone`, preserving record order.
pub fn parse_master_file(zone: &mut Zone, text: &str) -> Result<()> {
    let mut previous_owner: Option<String> = None;
    let mut pending: Option<ZoneRecord> = None;

    for raw_line in text.lines() {
        if pending.is_none() {
            if let Some(caps) = TTL_RE.captures(raw_line) {
                let value = caps[1].split_whitespace().next().unwrap_or("");
                zone.default_ttl = value.parse::<u32>().map_err(|_| ParseError::ConfigSyntax {
                    message: format!("invalid $TTL in zone {}: {}", zone.domain, &caps[1]),
                })?;
                continue;
            }
        }

        // strip end-of-line comment
        let line = match raw_line.find(';') {
            Some(idx) => &raw_line[..idx],
            None => raw_line,
        };

        match pending.take() {
            None => {
                if line.trim().is_empty() {
                    continue;
                }

                let caps = match RECORD_RE.captures(line) {
                    Some(caps) => caps,
                    None => continue,
                };

                let mut owner = caps[1].to_string();
                if owner.trim().is_empty() {
                    owner = previous_owner.clone().unwrap_or_default();
                }
                previous_owner = Some(owner.clone());

                let record = ZoneRecord {
                    owner,
                    class: caps[2].to_string(),
                    rtype: caps[3].to_string(),
                    rdata: caps[4].to_string(),
                };

                // an open parenthesis at the end of the rdata continues the
                // record on the following lines
                if record.rdata.ends_with('(') {
                    pending = Some(record);
                } else {
                    zone.add_record(record);
                }
            }
            Some(mut record) => {
                let value = line.trim();
                if value.is_empty() {
                    pending = Some(record);
                    continue;
                }

                if let Some(caps) = CLOSE_PAREN_RE.captures(value) {
                    record.rdata.push_str(&caps[1]);
                    record.rdata.push(')');
                    zone.add_record(record);
                } else {
                    record.rdata.push_str(value);
                    record.rdata.push(' ');
                    pending = Some(record);
                }
            }
        }
    }

    if let Some(record) = pending {
        return Err(ParseError::ConfigSyntax {
            message: format!(
                "unclosed parenthesis in zone {} record {}",
                zone.domain, record.owner
            ),
        });
    }

    Ok(())
}
