//! Meridian DNS Server
//!
//! An authoritative DNS server that answers UDP queries from BIND-style zone
//! files.
//!
//! # Features
//!
//! * RFC 1035 wire codec for queries and responses (UDP, single question)
//! * BIND-flavored zone ownership matching (`@`, `*`, `*.`, literal owners)
//! * BIND-style configuration and zone master-file parsing
//! * Support for A, NS, CNAME, SOA, MX and TXT record types
//! * Pluggable record stores behind one lookup contract
//!
//! # Architecture
//!
//! Everything lives under the `dns` module; see its documentation for the
//! per-module breakdown. The request pipeline is
//! decode → lookup → build → encode, one pipeline per received datagram.

/// DNS server implementation and protocol handling
pub mod dns;
