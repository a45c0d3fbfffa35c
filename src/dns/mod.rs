//! DNS nameserver core
//!
//! This module implements an authoritative DNS server: it decodes raw UDP
//! query packets, resolves the requested name and type against a zone-data
//! store, and encodes a wire-format response.
//!
//! # Module Structure
//!
//! * `buffer` - Low-level packet buffer operations
//! * `protocol` - DNS message definitions and the wire codec
//! * `matcher` - BIND-flavored owner token matching
//! * `zone` - In-memory zone and configuration model
//! * `zone_parser` - BIND-style configuration and master-file parser
//! * `resolver` - Record lookup and per-type rdata projection
//! * `response` - Response packet construction
//! * `store` - Record store backends (file-backed, cached, in-memory)
//! * `context` - Service configuration and context snapshots
//! * `server` - UDP server implementation

/// Low-level buffer operations for DNS packet handling
pub mod buffer;

/// Service configuration and shared context snapshots
pub mod context;

/// BIND-flavored owner token matching
pub mod matcher;

/// DNS protocol definitions and packet structures
pub mod protocol;

/// Record resolution and rdata projection
pub mod resolver;

/// Response packet construction
pub mod response;

/// UDP DNS server implementation
pub mod server;

/// Record store backends
pub mod store;

/// In-memory zone and configuration model
pub mod zone;

/// BIND-style configuration and zone master-file parser
pub mod zone_parser;
