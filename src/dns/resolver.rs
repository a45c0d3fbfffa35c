//! Applies owner matching across a zone set and projects raw rdata
//!
//! Every zone and every record is visited in file order, and every match is
//! returned. Nothing is deduplicated and there is no early exit; several A
//! records for one name all come back, which is what makes round-robin
//! answers work.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::dns::matcher;
use crate::dns::protocol::QueryType;
use crate::dns::zone::Zone;

#[derive(Debug)]
pub enum ResolveError {
    /// A matched record's rdata does not parse as its type demands.
    InvalidRdata { rtype: QueryType, rdata: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::InvalidRdata { rtype, rdata } => {
                write!(f, "Invalid {:?} rdata: {}", rtype, rdata)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

type Result<T> = std::result::Result<T, ResolveError>;

/// Typed projection of a zone record's raw rdata
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordData {
    A {
        address: Ipv4Addr,
    },
    Ns {
        server: String,
    },
    Cname {
        cname: String,
    },
    Txt {
        text: String,
    },
    Mx {
        preference: u16,
        exchange: String,
    },
    Soa {
        nameserver: String,
        hostemail: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minttl: u32,
    },
}

/// One resolved record together with the ttl its zone assigns to answers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answer {
    pub ttl: u32,
    pub data: RecordData,
}

/// Collect every record in `zones` whose type and owner match the query.
pub fn lookup(zones: &[Zone], qname: &str, qtype: QueryType) -> Result<Vec<Answer>> {
    let mut answers = Vec::new();

    for zone in zones {
        let ttl = zone.minimum_ttl();

        for record in &zone.records {
            if QueryType::from_name(&record.rtype) != Some(qtype) {
                continue;
            }
            if !matcher::compare(qname, &zone.domain, &record.owner) {
                continue;
            }

            answers.push(Answer {
                ttl,
                data: project(qtype, &record.rdata)?,
            });
        }
    }

    Ok(answers)
}

/// Parse raw rdata into its typed form.
fn project(qtype: QueryType, rdata: &str) -> Result<RecordData> {
    let invalid = || ResolveError::InvalidRdata {
        rtype: qtype,
        rdata: rdata.to_string(),
    };

    match qtype {
        QueryType::A => {
            let address = Ipv4Addr::from_str(rdata.trim()).map_err(|_| invalid())?;
            Ok(RecordData::A { address })
        }
        QueryType::Ns => Ok(RecordData::Ns {
            server: rdata.trim().to_string(),
        }),
        QueryType::Cname => Ok(RecordData::Cname {
            cname: rdata.trim().to_string(),
        }),
        QueryType::Txt => Ok(RecordData::Txt {
            text: rdata.to_string(),
        }),
        QueryType::Mx => {
            // first token is the preference, second the exchange domain
            let mut fields = rdata.split_whitespace();
            let preference = fields
                .next()
                .and_then(|p| p.parse::<u16>().ok())
                .ok_or_else(invalid)?;
            let exchange = fields.next().ok_or_else(invalid)?.to_string();

            Ok(RecordData::Mx {
                preference,
                exchange,
            })
        }
        QueryType::Soa => {
            // parenthesis characters left over from a flattened multi-line
            // record are not fields
            let cleaned: String = rdata.chars().filter(|c| *c != '(' && *c != ')').collect();
            let fields: Vec<&str> = cleaned.split_whitespace().collect();
            if fields.len() < 7 {
                return Err(invalid());
            }

            let number =
                |idx: usize| -> Result<u32> { fields[idx].parse::<u32>().map_err(|_| invalid()) };

            Ok(RecordData::Soa {
                nameserver: fields[0].to_string(),
                hostemail: fields[1].to_string(),
                serial: number(2)?,
                refresh: number(3)?,
                retry: number(4)?,
                expire: number(5)?,
                minttl: number(6)?,
            })
        }
        QueryType::Unknown(_) => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::zone::ZoneRecord;
    use std::path::PathBuf;

    fn zone_with(domain: &str, records: Vec<(&str, &str, &str)>) -> Zone {
        let mut zone = Zone::new(
            domain.to_string(),
            "master".to_string(),
            PathBuf::from(format!("{}.zone", domain)),
        );
        for (owner, rtype, rdata) in records {
            zone.add_record(ZoneRecord {
                owner: owner.to_string(),
                class: "IN".to_string(),
                rtype: rtype.to_string(),
                rdata: rdata.to_string(),
            });
        }
        zone
    }

    #[test]
    fn test_lookup_returns_all_matches_in_order() {
        let zones = vec![zone_with(
            "example.com",
            vec![
                ("www", "A", "10.0.0.1"),
                ("www", "A", "10.0.0.2"),
                ("mail", "A", "10.0.0.3"),
            ],
        )];

        let answers = lookup(&zones, "www", QueryType::A).unwrap();
        assert_eq!(answers.len(), 2);
        assert_eq!(
            answers[0].data,
            RecordData::A {
                address: Ipv4Addr::new(10, 0, 0, 1)
            }
        );
        assert_eq!(
            answers[1].data,
            RecordData::A {
                address: Ipv4Addr::new(10, 0, 0, 2)
            }
        );
    }

    #[test]
    fn test_lookup_spans_zones() {
        let zones = vec![
            zone_with("example.com", vec![("*", "A", "10.0.0.1")]),
            zone_with("example.net", vec![("*.", "A", "10.0.0.2")]),
        ];

        let answers = lookup(&zones, "www.example.com", QueryType::A).unwrap();
        assert_eq!(answers.len(), 1);

        let answers = lookup(&zones, "example.net", QueryType::A).unwrap();
        assert_eq!(answers.len(), 1);
    }

    #[test]
    fn test_lookup_type_match_is_case_insensitive() {
        let zones = vec![zone_with("example.com", vec![("@", "a", "10.0.0.1")])];

        let answers = lookup(&zones, "example.com", QueryType::A).unwrap();
        assert_eq!(answers.len(), 1);
    }

    #[test]
    fn test_lookup_carries_zone_minimum_ttl() {
        let zones = vec![zone_with(
            "example.com",
            vec![
                (
                    "@",
                    "SOA",
                    "ns1.example.com. admin.example.com. (1 3600 600 604800 123)",
                ),
                ("www", "A", "10.0.0.1"),
            ],
        )];

        let answers = lookup(&zones, "www", QueryType::A).unwrap();
        assert_eq!(answers[0].ttl, 123);
    }

    #[test]
    fn test_lookup_unknown_type_matches_nothing() {
        let zones = vec![zone_with("example.com", vec![("www", "A", "10.0.0.1")])];

        let answers = lookup(&zones, "www", QueryType::Unknown(28)).unwrap();
        assert!(answers.is_empty());
    }

    #[test]
    fn test_invalid_a_rdata_fails_lookup() {
        let zones = vec![zone_with("example.com", vec![("www", "A", "not-an-ip")])];

        let res = lookup(&zones, "www", QueryType::A);
        assert!(matches!(res, Err(ResolveError::InvalidRdata { .. })));
    }

    #[test]
    fn test_mx_projection() {
        let zones = vec![zone_with(
            "example.com",
            vec![("@", "MX", "10 mail.example.com")],
        )];

        let answers = lookup(&zones, "example.com", QueryType::Mx).unwrap();
        assert_eq!(
            answers[0].data,
            RecordData::Mx {
                preference: 10,
                exchange: "mail.example.com".to_string(),
            }
        );
    }

    #[test]
    fn test_soa_projection_tolerates_parens() {
        let zones = vec![zone_with(
            "example.com",
            vec![(
                "@",
                "SOA",
                "ns1.example.com. admin.example.com. (2021120701 3600 600 604800 86400)",
            )],
        )];

        let answers = lookup(&zones, "example.com", QueryType::Soa).unwrap();
        assert_eq!(
            answers[0].data,
            RecordData::Soa {
                nameserver: "ns1.example.com.".to_string(),
                hostemail: "admin.example.com.".to_string(),
                serial: 2021120701,
                refresh: 3600,
                retry: 600,
                expire: 604800,
                minttl: 86400,
            }
        );
    }
}
